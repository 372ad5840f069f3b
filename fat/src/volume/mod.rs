//! 卷的布局
//!
//! MBR | 保留区 | FAT区 | 数据区

pub mod data;
pub mod fat;
pub mod mbr;
pub mod reserved;
