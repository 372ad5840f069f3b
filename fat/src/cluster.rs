use derive_more::{Display, Into};

/// FAT中的簇编号，只有低28位有效。
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Display, Into)]
#[repr(transparent)]
pub struct ClusterId(u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClusterError {
    Free,
    Defective,
    Reserved,
    Eof,
}

impl From<u32> for ClusterId {
    fn from(raw: u32) -> Self {
        Self::new(raw)
    }
}

impl From<ClusterId> for usize {
    fn from(id: ClusterId) -> Self {
        id.0 as usize
    }
}

impl From<ClusterId> for u64 {
    fn from(id: ClusterId) -> Self {
        id.0.into()
    }
}

/// 目录项中的`(fst_clus_lo, fst_clus_hi)`
impl From<(u16, u16)> for ClusterId {
    fn from((low, high): (u16, u16)) -> Self {
        Self::new((u32::from(high) << 16) | u32::from(low))
    }
}

impl ClusterId {
    pub const MASK: u32 = 0x0FFF_FFFF;

    pub const FREE: Self = Self(0);

    /// 最小的可用簇号
    pub const MIN: Self = Self(2);

    /// 本驱动写入的链尾标记
    pub const EOF: Self = Self(Self::MASK);

    pub const BAD: Self = Self(0x0FFF_FFF7);

    pub const fn new(raw: u32) -> Self {
        Self(raw & Self::MASK)
    }

    pub const fn raw(self) -> u32 {
        self.0
    }

    /// `0x0FFFFFF8..=0x0FFFFFFF`都表示链尾
    pub const fn is_eof(self) -> bool {
        self.0 >= 0x0FFF_FFF8
    }

    /// NOTE: 没有FAT提供的真实最大可用簇编号，无法得知全部保留簇
    pub fn is_unavailable(&self) -> bool {
        *self < Self::MIN || (Self(0x0FFF_FFF0)..=Self(0x0FFF_FFF6)).contains(self)
    }

    pub fn validate(self) -> Result<Self, ClusterError> {
        match self {
            ClusterId::FREE => Err(ClusterError::Free),
            ClusterId::BAD => Err(ClusterError::Defective),
            id if id.is_eof() => Err(ClusterError::Eof),
            id if id.is_unavailable() => Err(ClusterError::Reserved),
            id => Ok(id),
        }
    }

    /// 拆成`(低16位, 高16位)`
    pub const fn split(self) -> (u16, u16) {
        (self.0 as u16, (self.0 >> 16) as u16)
    }

    pub const fn next(self) -> Self {
        Self::new(self.0 + 1)
    }
}
