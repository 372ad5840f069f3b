//! 文件分配表
//!
//! FAT是以簇编号为下标的32位小端数组，每项存放链表上的下一个簇编号。
//! 读取时屏蔽高4位，写入时保留高4位。

use block_dev::BlockStore;

use crate::volume::reserved::Bpb;
use crate::{ClusterId, Error, Result};

const ENTRY_SIZE: u64 = 4;

/// 空闲簇扫描的最低起点：0、1保留，2为根目录
const SCAN_START: u32 = 3;

#[derive(Debug, Clone)]
pub struct FatArea {
    /// 首个FAT在块存储中的字节偏移
    offset: u64,
    /// 每个FAT的字节数
    size: u64,
    copies: usize,
    /// 根目录簇，数据区从这里开始
    min_cluster: ClusterId,
    /// 最大的可用簇编号
    max_cluster: ClusterId,
}

impl FatArea {
    pub fn new(base_offset: u64, bpb: &Bpb) -> Self {
        let sector = bpb.sector_bytes() as u64;
        let size = bpb.fat_sectors() as u64 * sector;

        let entries = size / ENTRY_SIZE;
        let data_end = u64::from(bpb.root_cluster()) + bpb.data_clusters() as u64;
        let max_cluster = entries.min(data_end).saturating_sub(1);

        Self {
            offset: base_offset + bpb.reserved_sectors() as u64 * sector,
            size,
            copies: bpb.fat_count(),
            min_cluster: ClusterId::new(bpb.root_cluster()),
            max_cluster: ClusterId::new(max_cluster.min(u64::from(ClusterId::MASK)) as u32),
        }
    }

    pub const fn offset(&self) -> u64 {
        self.offset
    }

    pub const fn max_cluster(&self) -> ClusterId {
        self.max_cluster
    }

    /// `min_cluster..=max_cluster`中的簇数
    pub fn capacity(&self) -> usize {
        (self.max_cluster.raw() + 1).saturating_sub(self.min_cluster.raw()) as usize
    }

    /// 可以出现在链表中的簇编号
    pub fn check(&self, id: ClusterId) -> Option<ClusterId> {
        id.validate()
            .ok()
            .filter(|&id| (self.min_cluster..=self.max_cluster).contains(&id))
    }

    /// 读出原始的32位表项，包括高4位
    pub fn get(&self, store: &BlockStore, id: ClusterId) -> Result<u32> {
        let bytes = store.read(self.entry(0, id), ENTRY_SIZE as usize)?;
        Ok(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    pub fn next(&self, store: &BlockStore, id: ClusterId) -> Result<ClusterId> {
        self.get(store, id).map(ClusterId::new)
    }

    /// 写入低28位，同步到每个FAT
    pub fn set(&self, store: &mut BlockStore, id: ClusterId, value: ClusterId) -> Result<()> {
        for copy in 0..self.copies {
            let pos = self.entry(copy, id);
            let bytes = store.read(pos, ENTRY_SIZE as usize)?;
            let old = u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
            let new = (old & !ClusterId::MASK) | value.raw();
            store.write(pos, &new.to_le_bytes())?;
        }
        Ok(())
    }

    /// 从`start`出发沿FAT走到链尾，返回经过的全部簇编号。
    ///
    /// 步数不超过可用簇数，超过即说明链表成环。
    pub fn chain(&self, store: &BlockStore, start: ClusterId) -> Result<Vec<ClusterId>> {
        let corrupt = |at| Error::CorruptChain { start, at };

        let mut id = self.check(start).ok_or_else(|| corrupt(start))?;
        let mut chain = Vec::new();
        loop {
            if chain.len() >= self.capacity() {
                return Err(corrupt(id));
            }
            chain.push(id);

            let next = self.next(store, id)?;
            log::trace!("FAT[{id}] = {next:#x}", next = next.raw());
            if next.is_eof() {
                break;
            }
            id = self.check(next).ok_or_else(|| corrupt(next))?;
        }

        Ok(chain)
    }

    /// 从根目录簇之后（至少3号簇）开始线性扫描，找出`n`个空闲簇
    pub fn free_clusters(&self, store: &BlockStore, n: usize) -> Result<Vec<ClusterId>> {
        let mut found = Vec::with_capacity(n);
        let block_size = store.block_size() as u64;
        let max = self.max_cluster.raw();

        let mut id = SCAN_START.max(self.min_cluster.raw() + 1);
        while id <= max && found.len() < n {
            let pos = self.entry(0, ClusterId::new(id));
            let block = store.read_block((pos / block_size) as u32);
            for entry in block[(pos % block_size) as usize..].chunks_exact(ENTRY_SIZE as usize) {
                if id > max || found.len() == n {
                    break;
                }
                let value = u32::from_le_bytes([entry[0], entry[1], entry[2], entry[3]]);
                if value & ClusterId::MASK == ClusterId::FREE.raw() {
                    found.push(ClusterId::new(id));
                }
                id += 1;
            }
        }

        if found.len() < n {
            return Err(Error::DiskFull {
                requested: n,
                found: found.len(),
            });
        }
        Ok(found)
    }

    /// 把`clusters`依次串成链表，最后一项写入链尾标记
    pub fn link(&self, store: &mut BlockStore, clusters: &[ClusterId]) -> Result<()> {
        for pair in clusters.windows(2) {
            self.set(store, pair[0], pair[1])?;
        }
        if let Some(&last) = clusters.last() {
            self.set(store, last, ClusterId::EOF)?;
        }
        Ok(())
    }

    fn entry(&self, copy: usize, id: ClusterId) -> u64 {
        self.offset + copy as u64 * self.size + u64::from(id) * ENTRY_SIZE
    }
}
