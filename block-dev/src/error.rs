use core::fmt;
use std::io;

pub type Result<T> = core::result::Result<T, Error>;

#[derive(Debug)]
pub enum Error {
    /// 一次访问跨越了块边界
    Span { offset: u64, size: usize },
    /// 块内容的长度不等于块大小
    Size { expected: usize, actual: usize },
    /// 没有任何已写入的块，无法确定镜像的范围
    Empty,
    Io(io::Error),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Span { offset, size } => write!(
                f,
                "access of {size} bytes at {offset:#x} spans more than one block"
            ),
            Self::Size { expected, actual } => {
                write!(f, "bad block length: expected {expected}, got {actual}")
            }
            Self::Empty => f.write_str("block store is empty"),
            Self::Io(e) => write!(f, "I/O error: {e}"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for Error {
    fn from(e: io::Error) -> Self {
        Self::Io(e)
    }
}
