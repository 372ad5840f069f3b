//! 在块存储上建立新的FAT32卷

use binrw::BinWrite;
use binrw::io::Cursor;
use block_dev::BlockStore;

use crate::volume::fat::FatArea;
use crate::volume::mbr::{LBA_SIZE, PARTITION_TABLE, PartitionEntry};
use crate::volume::reserved::{Bpb, BpbParams, FsInfo, SIGNATURE};
use crate::{ClusterId, Error, Result};

const SECTOR_SIZE: u64 = 512;

/// 分区默认按1MiB对齐
const ALIGNED_START: u32 = 2048;

const DEFAULT_DISK_SIZE: u64 = 64 * 1024 * 1024;

/// 新卷的参数
#[derive(Debug, Clone)]
pub struct FormatOptions {
    disk_sectors: u32,
    partition_start: u32,
    sectors_per_cluster: Option<u8>,
    reserved_sectors: u16,
    fats: u8,
    volume_label: [u8; 11],
}

impl Default for FormatOptions {
    fn default() -> Self {
        Self::new(DEFAULT_DISK_SIZE)
    }
}

impl FormatOptions {
    /// 磁盘有`disk_size`字节，分区占据MBR之后的全部空间
    pub fn new(disk_size: u64) -> Self {
        let disk_sectors = (disk_size / SECTOR_SIZE).min(u64::from(u32::MAX)) as u32;
        Self {
            disk_sectors,
            partition_start: if disk_sectors > 2 * ALIGNED_START {
                ALIGNED_START
            } else {
                1
            },
            sectors_per_cluster: None,
            reserved_sectors: 32,
            fats: 2,
            volume_label: *b"NO NAME    ",
        }
    }

    pub fn partition_start(mut self, lba: u32) -> Self {
        self.partition_start = lba;
        self
    }

    /// 不设置时按卷的大小选择
    pub fn sectors_per_cluster(mut self, sectors: u8) -> Self {
        self.sectors_per_cluster = Some(sectors);
        self
    }

    pub fn reserved_sectors(mut self, sectors: u16) -> Self {
        self.reserved_sectors = sectors;
        self
    }

    pub fn fats(mut self, fats: u8) -> Self {
        self.fats = fats;
        self
    }

    /// 转为大写，截断或以空格填充到11字节
    pub fn volume_label(mut self, label: &str) -> Self {
        let mut padded = [b' '; 11];
        for (dst, src) in padded.iter_mut().zip(label.bytes()) {
            *dst = src.to_ascii_uppercase();
        }
        self.volume_label = padded;
        self
    }

    pub const fn volume_sectors(&self) -> u32 {
        self.disk_sectors.saturating_sub(self.partition_start)
    }
}

/// 按卷的扇区数选择簇大小，取自FAT32常用的对照表
fn default_cluster_sectors(sectors: u32) -> u8 {
    match sectors {
        0..=532_480 => 1,
        ..=16_777_216 => 8,
        ..=33_554_432 => 16,
        ..=67_108_864 => 32,
        _ => 64,
    }
}

/// 使FAT恰好能装下全部簇的扇区数
fn fat_sectors(total: u32, reserved: u16, fats: u8, cluster_sectors: u8) -> (u32, u32) {
    let entries_per_sector = SECTOR_SIZE as u32 / 4;
    let mut fat_sectors = 1;
    loop {
        let data = total.saturating_sub(u32::from(reserved) + u32::from(fats) * fat_sectors);
        let clusters = data / u32::from(cluster_sectors);
        let needed = (clusters + 2).div_ceil(entries_per_sector);
        if needed <= fat_sectors {
            return (fat_sectors, clusters);
        }
        fat_sectors = needed;
    }
}

/// 写入MBR、引导扇区、FSInfo、FAT与空的根目录。
///
/// 覆盖已有的FAT与根目录，数据区中其余的块保持原样。
pub fn format(store: &mut BlockStore, opts: &FormatOptions) -> Result<Bpb> {
    let invalid = |what: &str| Err(Error::VolumeFormat(what.into()));

    if opts.partition_start == 0 {
        return invalid("partition must start after the MBR");
    }
    if opts.reserved_sectors < 2 {
        return invalid("reserved area cannot hold the FSInfo sector");
    }
    if opts.fats == 0 {
        return invalid("at least one FAT is required");
    }
    let sectors_per_cluster = opts
        .sectors_per_cluster
        .unwrap_or_else(|| default_cluster_sectors(opts.volume_sectors()));
    if !sectors_per_cluster.is_power_of_two() {
        return invalid("sectors per cluster must be a power of two");
    }

    let total = opts.volume_sectors();
    let (fat_sectors, clusters) =
        fat_sectors(total, opts.reserved_sectors, opts.fats, sectors_per_cluster);
    if clusters == 0 {
        return invalid("volume too small for a data cluster");
    }

    let bpb = Bpb::new(&BpbParams {
        sectors_per_cluster,
        reserved_sectors: opts.reserved_sectors,
        fats: opts.fats,
        fat_sectors,
        hidden_sectors: opts.partition_start,
        total_sectors: total,
        volume_label: opts.volume_label,
    });
    bpb.validate()?;

    let base = u64::from(opts.partition_start) * LBA_SIZE;
    let entry = PartitionEntry::fat32(opts.partition_start, total);
    store.write(PARTITION_TABLE, &to_bytes(&entry)?)?;
    store.write(SECTOR_SIZE - 2, &SIGNATURE)?;

    let boot = to_bytes(&bpb)?;
    store.write(base, &boot)?;
    if bpb.backup_boot() > 0 {
        store.write(base + bpb.backup_boot() as u64 * SECTOR_SIZE, &boot)?;
    }

    let root = ClusterId::new(bpb.root_cluster());
    let fs_info = FsInfo::new(Some(clusters - 1), Some(root.next().raw()));
    store.write(base + bpb.fs_info() as u64 * SECTOR_SIZE, &to_bytes(&fs_info)?)?;

    let fat = FatArea::new(base, &bpb);
    let zero = [0; SECTOR_SIZE as usize];
    let fat_end = fat.offset() + u64::from(opts.fats) * u64::from(fat_sectors) * SECTOR_SIZE;
    for offset in (fat.offset()..fat_end).step_by(SECTOR_SIZE as usize) {
        store.write(offset, &zero)?;
    }

    let data_start = base + bpb.data_area() as u64 * SECTOR_SIZE;
    for sector in 0..u64::from(sectors_per_cluster) {
        store.write(data_start + sector * SECTOR_SIZE, &zero)?;
    }

    fat.set(store, ClusterId::new(0), ClusterId::new(0x0FFF_FF00 | u32::from(bpb.media())))?;
    fat.set(store, ClusterId::new(1), ClusterId::EOF)?;
    fat.set(store, root, ClusterId::EOF)?;

    log::info!(
        "formatted {total} sectors at LBA {}: {clusters} clusters of {sectors_per_cluster} sectors, \
         {} FATs of {fat_sectors} sectors",
        opts.partition_start,
        opts.fats
    );
    Ok(bpb)
}

fn to_bytes<T>(value: &T) -> Result<Vec<u8>>
where
    T: for<'a> BinWrite<Args<'a> = ()> + binrw::meta::WriteEndian,
{
    let mut buf = Cursor::new(Vec::new());
    value.write(&mut buf)?;
    Ok(buf.into_inner())
}
