use core::fmt;
use std::io;

use crate::ClusterId;

pub type Result<T> = core::result::Result<T, Error>;

#[derive(Debug)]
pub enum Error {
    /// 打开卷时引导结构解析失败
    VolumeFormat(String),
    /// 簇链在簇总数内没有到达链尾，或指向了不可用的簇
    CorruptChain { start: ClusterId, at: ClusterId },
    /// 簇编号落在数据区之外
    ClusterOutOfRange(ClusterId),
    /// 字节偏移落在数据区之外
    OffsetOutOfRange(u64),
    /// FAT扫描完毕仍凑不够空闲簇
    DiskFull { requested: usize, found: usize },
    /// 写入的数据没有恰好用完分配的簇链
    AllocationMismatch { allocated: usize, consumed: usize },
    NotFound(String),
    /// FAT32的文件大小字段只有32位
    FileTooLarge(u64),
    InvalidName(String),
    Codec(binrw::Error),
    Device(block_dev::Error),
    Io(io::Error),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::VolumeFormat(what) => write!(f, "malformed volume: {what}"),
            Self::CorruptChain { start, at } => {
                write!(f, "cluster chain from {start} is corrupt at {at}")
            }
            Self::ClusterOutOfRange(id) => write!(f, "cluster {id} lies outside the data area"),
            Self::OffsetOutOfRange(offset) => {
                write!(f, "offset {offset:#x} lies outside the data area")
            }
            Self::DiskFull { requested, found } => write!(
                f,
                "disk full: {requested} free clusters requested, {found} found"
            ),
            Self::AllocationMismatch {
                allocated,
                consumed,
            } => write!(
                f,
                "{allocated} clusters allocated but {consumed} consumed by the data"
            ),
            Self::NotFound(name) => write!(f, "{name:?} not found"),
            Self::FileTooLarge(size) => write!(f, "file of {size} bytes does not fit FAT32"),
            Self::InvalidName(name) => write!(f, "{name:?} is not a valid 8.3 name"),
            Self::Codec(e) => write!(f, "codec error: {e}"),
            Self::Device(e) => write!(f, "block store error: {e}"),
            Self::Io(e) => write!(f, "I/O error: {e}"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Codec(e) => Some(e),
            Self::Device(e) => Some(e),
            Self::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<binrw::Error> for Error {
    fn from(e: binrw::Error) -> Self {
        Self::Codec(e)
    }
}

impl From<block_dev::Error> for Error {
    fn from(e: block_dev::Error) -> Self {
        Self::Device(e)
    }
}

impl From<io::Error> for Error {
    fn from(e: io::Error) -> Self {
        Self::Io(e)
    }
}
