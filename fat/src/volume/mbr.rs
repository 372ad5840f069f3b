//! 主引导记录中的分区表

use binrw::binrw;

/// 分区表在MBR中的偏移
pub const PARTITION_TABLE: u64 = 0x1BE;

/// 分区表项的字节数
pub const PARTITION_ENTRY_SIZE: usize = 16;

/// MBR中的LBA以512字节为单位
pub const LBA_SIZE: u64 = 512;

/// FAT32 with LBA
pub const TYPE_FAT32_LBA: u8 = 0x0C;

#[binrw]
#[brw(little)]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PartitionEntry {
    /// 0x80 可启动，0x00 不可启动
    pub status: u8,
    chs_start: [u8; 3],
    pub partition_type: u8,
    chs_end: [u8; 3],
    /// 分区首扇区的LBA
    pub lba_first_sector: u32,
    pub num_sectors: u32,
}

impl PartitionEntry {
    pub fn fat32(lba_first_sector: u32, num_sectors: u32) -> Self {
        Self {
            partition_type: TYPE_FAT32_LBA,
            lba_first_sector,
            num_sectors,
            ..Default::default()
        }
    }

    /// 分区在磁盘上的字节偏移
    pub fn base_offset(&self) -> u64 {
        u64::from(self.lba_first_sector) * LBA_SIZE
    }
}
