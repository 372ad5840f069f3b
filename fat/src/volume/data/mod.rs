mod dir_entry;

pub use self::dir_entry::*;
use crate::volume::reserved::Bpb;
use crate::{ClusterId, Error, Result};

/// 数据区，簇编号从根目录簇开始计
#[derive(Debug, Clone)]
pub struct DataArea {
    /// 数据区在块存储中的字节偏移
    offset: u64,
    cluster_size: u64,
    /// 数据区首簇的编号
    origin: ClusterId,
    /// 数据区末簇的编号
    last: ClusterId,
}

impl DataArea {
    pub fn new(base_offset: u64, bpb: &Bpb) -> Self {
        let sector = bpb.sector_bytes() as u64;
        let origin = bpb.root_cluster();
        let clusters = (bpb.data_clusters() as u64).min(u64::from(ClusterId::MASK - origin));
        Self {
            offset: base_offset + bpb.data_area() as u64 * sector,
            cluster_size: bpb.cluster_sectors() as u64 * sector,
            origin: ClusterId::new(origin),
            last: ClusterId::new(origin + (clusters as u32).saturating_sub(1)),
        }
    }

    pub const fn offset(&self) -> u64 {
        self.offset
    }

    pub const fn cluster_size(&self) -> u64 {
        self.cluster_size
    }

    /// 簇的首字节偏移，簇不在数据区内时报[`Error::ClusterOutOfRange`]
    pub fn offset_of(&self, id: ClusterId) -> Result<u64> {
        if id < self.origin || id > self.last {
            return Err(Error::ClusterOutOfRange(id));
        }
        let index = id.raw() - self.origin.raw();
        Ok(self.offset + u64::from(index) * self.cluster_size)
    }

    /// `offset`所在簇的编号
    pub fn cluster_of(&self, offset: u64) -> Result<ClusterId> {
        let index = offset
            .checked_sub(self.offset)
            .map(|rel| rel / self.cluster_size)
            .filter(|&index| index <= u64::from(self.last.raw() - self.origin.raw()))
            .ok_or(Error::OffsetOutOfRange(offset))?;
        Ok(ClusterId::new(self.origin.raw() + index as u32))
    }
}
