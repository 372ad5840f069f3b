use core::ops::Range;

use binrw::BinRead;
use binrw::io::Cursor;
use block_dev::BlockStore;

use crate::volume::data::{DataArea, DirEntry};
use crate::volume::fat::FatArea;
use crate::volume::mbr::{PARTITION_ENTRY_SIZE, PARTITION_TABLE, PartitionEntry};
use crate::volume::reserved::{Bpb, FsInfo};
use crate::{ClusterId, Error, Result};

/// 块存储上的FAT32卷。
///
/// 卷不持有任何数据，只缓存打开时算出的各区偏移，
/// 以及当前浏览的目录位置。同一时刻只允许一个写者。
#[derive(Debug)]
pub struct Volume<'s> {
    pub(crate) store: &'s mut BlockStore,
    bpb: Bpb,
    fs_info: FsInfo,
    base_offset: u64,
    pub(crate) fat: FatArea,
    pub(crate) data: DataArea,
    /// 当前目录的字节偏移
    pub(crate) current_position: u64,
}

impl<'s> Volume<'s> {
    /// 读取分区表与引导扇区。任何一步失败都是[`Error::VolumeFormat`]。
    pub fn open(store: &'s mut BlockStore) -> Result<Self> {
        let malformed = |what: &str| {
            let what = what.to_owned();
            move |e: Error| Error::VolumeFormat(format!("{what}: {e}"))
        };

        let entry: PartitionEntry = read_struct(store, PARTITION_TABLE, PARTITION_ENTRY_SIZE)
            .map_err(malformed("partition table"))?;
        let base_offset = entry.base_offset();

        let bpb: Bpb =
            read_struct(store, base_offset, BPB_SIZE).map_err(malformed("boot sector"))?;
        bpb.validate()?;

        let block_size = store.block_size() as u64;
        if bpb.sector_bytes() as u64 % block_size != 0 || base_offset % block_size != 0 {
            return Err(Error::VolumeFormat(format!(
                "sectors of {} bytes at {base_offset:#x} are not aligned to {block_size}-byte blocks",
                bpb.sector_bytes()
            )));
        }
        if bpb.data_clusters() == 0 {
            return Err(Error::VolumeFormat("no data clusters".into()));
        }

        let fsinfo_offset = base_offset + (bpb.fs_info() * bpb.sector_bytes()) as u64;
        let fs_info: FsInfo =
            read_struct(store, fsinfo_offset, BPB_SIZE).map_err(malformed("FSInfo sector"))?;
        if !fs_info.is_valid() {
            log::warn!("FSInfo signatures missing at {fsinfo_offset:#x}, counters are meaningless");
        }

        let fat = FatArea::new(base_offset, &bpb);
        let data = DataArea::new(base_offset, &bpb);
        if fat.check(ClusterId::new(bpb.root_cluster())).is_none() {
            return Err(Error::VolumeFormat(format!(
                "root cluster {} beyond the last cluster {}",
                bpb.root_cluster(),
                fat.max_cluster()
            )));
        }

        log::info!("partition at LBA {}", entry.lba_first_sector);
        log::info!("bytes per sector: {}", bpb.sector_bytes());
        log::info!("sectors per cluster: {}", bpb.cluster_sectors());
        log::info!("reserved sectors: {}", bpb.reserved_sectors());
        log::info!("FATs: {} of {} sectors", bpb.fat_count(), bpb.fat_sectors());
        log::info!("total sectors: {}", bpb.total_sectors());
        log::info!("root cluster: {}", bpb.root_cluster());
        log::info!(
            "FSInfo: free {:?}, next free {:?}",
            fs_info.free_count(),
            fs_info.next_free()
        );
        log::debug!(
            "fat at {:#x}, data at {:#x}, cluster of {} bytes",
            fat.offset(),
            data.offset(),
            data.cluster_size()
        );

        let current_position = data.offset();
        Ok(Self {
            store,
            bpb,
            fs_info,
            base_offset,
            fat,
            data,
            current_position,
        })
    }

    pub fn get_cluster_from_offset(&self, offset: u64) -> Result<ClusterId> {
        self.data.cluster_of(offset)
    }

    pub fn get_offset_from_cluster(&self, id: ClusterId) -> Result<u64> {
        self.data.offset_of(id)
    }

    pub fn get_cluster_chain(&self, start: ClusterId) -> Result<Vec<ClusterId>> {
        self.fat.chain(self.store, start)
    }

    pub fn get_free_clusters(&self, n: usize) -> Result<Vec<ClusterId>> {
        self.fat.free_clusters(self.store, n)
    }

    /// 先扫描出`n`个空闲簇，再把它们串成链表。两步之间没有任何保护。
    pub fn create_cluster_chain(&mut self, n: usize) -> Result<Vec<ClusterId>> {
        let chain = self.fat.free_clusters(self.store, n)?;
        self.fat.link(self.store, &chain)?;
        log::debug!("allocated chain {chain:?}");
        Ok(chain)
    }

    /// 沿簇链读出文件内容
    pub fn read_file(&self, entry: &DirEntry) -> Result<Vec<u8>> {
        let size = entry.size as usize;
        let mut content = Vec::with_capacity(size);
        if entry.first_cluster == ClusterId::FREE {
            return Ok(content);
        }

        'chain: for id in self.fat.chain(self.store, entry.first_cluster)? {
            for addr in self.cluster_blocks(id)? {
                if content.len() >= size {
                    break 'chain;
                }
                content.extend_from_slice(&self.store.read_block(addr));
            }
        }
        content.truncate(size);
        Ok(content)
    }

    pub const fn bpb(&self) -> &Bpb {
        &self.bpb
    }

    /// 仅供参考，本驱动从不更新
    pub const fn fs_info(&self) -> &FsInfo {
        &self.fs_info
    }

    pub fn store(&self) -> &BlockStore {
        self.store
    }

    pub const fn base_offset(&self) -> u64 {
        self.base_offset
    }

    pub const fn fat_offset(&self) -> u64 {
        self.fat.offset()
    }

    pub const fn data_offset(&self) -> u64 {
        self.data.offset()
    }

    pub const fn cluster_size(&self) -> u64 {
        self.data.cluster_size()
    }

    pub const fn current_position(&self) -> u64 {
        self.current_position
    }

    /// 可分配的簇数，根目录所在簇也算在内
    pub fn cluster_count(&self) -> usize {
        self.fat.capacity()
    }

    /// 回到根目录，根目录簇即数据区首簇
    pub fn root(&mut self) {
        self.current_position = self.data.offset();
    }

    /// 簇占据的块地址
    pub(crate) fn cluster_blocks(&self, id: ClusterId) -> Result<Range<u32>> {
        let block_size = self.store.block_size() as u64;
        let start = self.data.offset_of(id)? / block_size;
        let count = self.data.cluster_size() / block_size;
        Ok(start as u32..(start + count) as u32)
    }
}

const BPB_SIZE: usize = 512;

fn read_struct<T>(store: &BlockStore, offset: u64, size: usize) -> Result<T>
where
    T: for<'a> BinRead<Args<'a> = ()> + binrw::meta::ReadEndian,
{
    let bytes = store.read(offset, size)?;
    Ok(T::read(&mut Cursor::new(bytes))?)
}
