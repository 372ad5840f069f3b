use binrw::binrw;

use crate::{ClusterId, Error, Result};

/// BIOS Parameter Block BIOS参数块
/// 位于保留区的第一扇区，该扇区又名启动扇区。
#[binrw]
#[brw(little)]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bpb {
    /// 跳转至启动代码的指令
    bs_jmp_boot: [u8; 3],

    /// 一般用于记录什么系统格式化此卷
    bs_oem_name: [u8; 8],

    /// 一个扇区的字节量
    byts_per_sec: u16,

    /// 一个簇的扇区数
    sec_per_clus: u8,

    /// 保留区的扇区数
    rsvd_sec_cnt: u16,

    /// 此卷的文件分配表(FAT)数量，建议为2
    num_fats: u8,

    /// - FAT32: 0
    root_ent_cnt: u16,

    /// - FAT32: 0
    tot_sec16: u16,

    /// 物理媒介的类型
    media: u8,

    /// - FAT32: 0
    fat_sz16: u16,

    /// 中断0x13模式下，轨道的扇区数
    sec_per_trk: u16,

    /// 中断0x13模式下，头数量
    num_heads: u16,

    /// 分区之前的扇区数
    hidd_sec: u32,

    /// - FAT32: 此卷的扇区总数
    tot_sec32: u32,

    /*
     * Extended BPB fields for FAT32 volume
     */
    /// FAT占用扇区数
    fat_sz32: u32,

    /// Bit 7 -- 0 means the FAT is mirrored at runtime into all FATs.
    ext_flags: u16,

    /// 卷版本号，为0x0
    fs_ver: u16,

    /// 根目录首个簇的编号，
    /// 应该为2，或首个可用的簇编号
    root_clus: u32,

    /// FSINFO所在扇区号（此扇区位于保留区），通常为1
    fs_info: u16,

    /// 非0时，表示boot备份所在扇区号（此扇区位于保留区，恒为6号）
    bk_boot_sec: u16,

    reserved: [u8; 12],

    /// 中断0x13驱动号，为0x80或0x00
    drv_num: u8,

    reserved1: u8,

    /// 0x29时，表示接下来的三个字段存在
    boot_sig: u8,

    /// 供移动介质使用
    vol_id: u32,

    /// 卷标签，与根目录记录的卷标签一致
    /// NOTE: 若不设卷标签，则值为"NO NAME    "
    vol_lab: [u8; 11],

    /// 文件系统类型：FAT12/FAT16/FAT32
    ///
    /// 只用来做告示，不应信赖此字段。
    fil_sys_type: [u8; 8],

    boot_code: [u8; 420],

    /// [0x55, 0xAA]
    signature_word: [u8; 2],
}

pub const SIGNATURE: [u8; 2] = [0x55, 0xAA];

const MEDIA_FIXED: u8 = 0xF8;

const BOOT_SIG: u8 = 0x29;

/// 建立新卷所需的参数
#[derive(Debug, Clone, Copy)]
pub struct BpbParams {
    pub sectors_per_cluster: u8,
    pub reserved_sectors: u16,
    pub fats: u8,
    pub fat_sectors: u32,
    pub hidden_sectors: u32,
    pub total_sectors: u32,
    pub volume_label: [u8; 11],
}

impl Bpb {
    pub fn new(params: &BpbParams) -> Self {
        Self {
            bs_jmp_boot: [0xEB, 0x58, 0x90],
            bs_oem_name: *b"VSDCARD ",
            byts_per_sec: 512,
            sec_per_clus: params.sectors_per_cluster,
            rsvd_sec_cnt: params.reserved_sectors,
            num_fats: params.fats,
            root_ent_cnt: 0,
            tot_sec16: 0,
            media: MEDIA_FIXED,
            fat_sz16: 0,
            sec_per_trk: 0,
            num_heads: 0,
            hidd_sec: params.hidden_sectors,
            tot_sec32: params.total_sectors,
            fat_sz32: params.fat_sectors,
            ext_flags: 0,
            fs_ver: 0,
            root_clus: 2,
            fs_info: 1,
            // 保留区放不下备份时不设备份
            bk_boot_sec: if params.reserved_sectors > 6 { 6 } else { 0 },
            reserved: [0; 12],
            drv_num: 0x80,
            reserved1: 0,
            boot_sig: BOOT_SIG,
            vol_id: 0,
            vol_lab: params.volume_label,
            fil_sys_type: *b"FAT32   ",
            boot_code: [0; 420],
            signature_word: SIGNATURE,
        }
    }

    /// 检查本驱动依赖的字段
    pub fn validate(&self) -> Result<()> {
        let fail = |what: &str| Err(Error::VolumeFormat(what.into()));

        if !matches!(self.byts_per_sec, 512 | 1024 | 2048 | 4096) {
            return fail("bytes per sector must be 512, 1024, 2048 or 4096");
        }
        if !self.sec_per_clus.is_power_of_two() {
            return fail("sectors per cluster must be a power of two");
        }
        if self.rsvd_sec_cnt == 0 {
            return fail("reserved sector count is zero");
        }
        if self.num_fats == 0 {
            return fail("no FAT on volume");
        }
        if self.root_ent_cnt != 0 || self.fat_sz16 != 0 || self.fat_sz32 == 0 {
            return fail("not a FAT32 volume");
        }
        if self.total_sectors() == 0 {
            return fail("total sector count is zero");
        }
        if self.root_clus > ClusterId::MASK || ClusterId::new(self.root_clus).validate().is_err() {
            return fail("root cluster out of range");
        }
        if self.signature_word != SIGNATURE {
            return fail("boot sector signature missing");
        }
        Ok(())
    }

    pub const fn sector_bytes(&self) -> usize {
        self.byts_per_sec as usize
    }

    pub const fn cluster_sectors(&self) -> usize {
        self.sec_per_clus as usize
    }

    pub const fn reserved_sectors(&self) -> usize {
        self.rsvd_sec_cnt as usize
    }

    pub const fn fat_count(&self) -> usize {
        self.num_fats as usize
    }

    /// FAT占用的扇区数
    pub const fn fat_sectors(&self) -> usize {
        self.fat_sz32 as usize
    }

    pub const fn total_sectors(&self) -> usize {
        if self.tot_sec16 > 0 {
            self.tot_sec16 as usize
        } else {
            self.tot_sec32 as usize
        }
    }

    pub const fn root_cluster(&self) -> u32 {
        self.root_clus
    }

    pub const fn fs_info(&self) -> usize {
        self.fs_info as usize
    }

    pub const fn backup_boot(&self) -> usize {
        self.bk_boot_sec as usize
    }

    pub const fn volume_label(&self) -> &[u8; 11] {
        &self.vol_lab
    }

    pub const fn media(&self) -> u8 {
        self.media
    }

    /// 数据区相对卷首的扇区号
    pub const fn data_area(&self) -> usize {
        self.reserved_sectors() + self.fat_count() * self.fat_sectors()
    }

    /// 数据区能容纳的簇数
    pub const fn data_clusters(&self) -> usize {
        self.total_sectors().saturating_sub(self.data_area()) / self.cluster_sectors()
    }
}
