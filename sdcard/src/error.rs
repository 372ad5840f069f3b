use core::fmt;

pub type Result<T> = core::result::Result<T, Error>;

#[derive(Debug)]
pub enum Error {
    /// 寄存器字段的值超出了声明的位宽
    FieldWidth {
        field: &'static str,
        width: u32,
        value: u64,
    },
    /// 多块传输
    Unsupported { blocks: u32 },
    /// 块地址超出卡容量
    OutOfRange { addr: u32, blocks: u64 },
    /// 句柄缓冲区装不下写入
    HandleTooShort { needed: usize, len: usize },
    Device(block_dev::Error),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::FieldWidth {
                field,
                width,
                value,
            } => write!(f, "{field}={value:#x} doesn't fit in {width} bits"),
            Self::Unsupported { blocks } => {
                write!(f, "transfer of {blocks} blocks unsupported, single block only")
            }
            Self::OutOfRange { addr, blocks } => {
                write!(f, "block {addr:#x} beyond card capacity of {blocks} blocks")
            }
            Self::HandleTooShort { needed, len } => {
                write!(f, "handle of {len} bytes, {needed} needed")
            }
            Self::Device(e) => write!(f, "block device: {e}"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Device(e) => Some(e),
            _ => None,
        }
    }
}

impl From<block_dev::Error> for Error {
    fn from(e: block_dev::Error) -> Self {
        Self::Device(e)
    }
}
