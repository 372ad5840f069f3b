//! 模拟卡的常量

pub use block_dev::BLOCK_SIZE;

/// `CARD_V2_X`
pub const CARD_VERSION: u32 = 0x0000_0001;

/// `CARD_SDHC_SDXC`
pub const CARD_TYPE: u32 = 0x0000_0001;

/// Relative Card Address
pub const RCA: u16 = 0x1234;

/// 每个设备大小单位对应的块数（SDHC/SDXC）
pub const BLOCKS_PER_DEVICE_SIZE_UNIT: u64 = 1024;
