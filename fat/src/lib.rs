//! # FAT32卷驱动
//!
//! 以[`BlockStore`](block_dev::BlockStore)为后端：
//! 解析MBR与BPB，遍历、分配簇链，列出目录、切换目录并导入文件。
//! 只支持8.3短名称。

mod cluster;
mod control;
mod dir;
mod error;
mod format;
pub mod volume;

pub use self::{
    cluster::{ClusterError, ClusterId},
    control::Volume,
    dir::Entries,
    error::{Error, Result},
    format::{FormatOptions, format},
    volume::data::{AttrFlag, DirEntry},
};
