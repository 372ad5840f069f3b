use std::borrow::Cow;
use std::collections::BTreeMap;
use std::fmt::Write;

use crate::{Error, Result};

/// SD卡的标准块大小
pub const BLOCK_SIZE: usize = 512;

/// 稀疏块存储
///
/// 块地址到块内容的映射，只保存非零块。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockStore {
    block_size: usize,
    blocks: BTreeMap<u32, Box<[u8]>>,
}

impl Default for BlockStore {
    fn default() -> Self {
        Self::new()
    }
}

impl BlockStore {
    pub fn new() -> Self {
        Self::with_block_size(BLOCK_SIZE)
    }

    /// # Panics
    ///
    /// `block_size`为0时panic。
    pub fn with_block_size(block_size: usize) -> Self {
        assert!(block_size > 0, "block size must be positive");
        Self {
            block_size,
            blocks: BTreeMap::new(),
        }
    }

    pub const fn block_size(&self) -> usize {
        self.block_size
    }

    /// 读取`[offset, offset + size)`，不能跨块。
    pub fn read(&self, offset: u64, size: usize) -> Result<Vec<u8>> {
        let (addr, start) = self.locate(offset, size)?;
        Ok(self.read_block(addr)[start..start + size].to_vec())
    }

    /// 将`content`写入`offset`处，不能跨块。
    ///
    /// 先读出整块，拼接后再整块写回。
    pub fn write(&mut self, offset: u64, content: &[u8]) -> Result<()> {
        let (addr, start) = self.locate(offset, content.len())?;
        let mut block = self.read_block(addr).into_owned();
        block[start..start + content.len()].copy_from_slice(content);
        self.write_block(addr, &block)
    }

    /// 覆盖整块。全零块会从映射中移除。
    pub fn write_block(&mut self, addr: u32, content: &[u8]) -> Result<()> {
        if content.len() != self.block_size {
            return Err(Error::Size {
                expected: self.block_size,
                actual: content.len(),
            });
        }

        if content.iter().all(|&b| b == 0) {
            if self.blocks.remove(&addr).is_some() {
                log::trace!("block {addr:#x} zeroed, dropped");
            }
        } else {
            self.blocks.insert(addr, content.into());
        }

        Ok(())
    }

    /// 读取整块，未写过的块返回全零块。
    pub fn read_block(&self, addr: u32) -> Cow<'_, [u8]> {
        match self.blocks.get(&addr) {
            Some(block) => Cow::Borrowed(block),
            None => Cow::Owned(vec![0; self.block_size]),
        }
    }

    /// 非零块的数量
    pub fn block_count(&self) -> usize {
        self.blocks.len()
    }

    /// 非零块的地址，升序
    pub fn block_list(&self) -> Vec<u32> {
        self.blocks.keys().copied().collect()
    }

    /// 以十六进制打印非零块，每行16字节。
    pub fn dump_block(&self, addr: u32) -> Option<String> {
        let block = self.blocks.get(&addr)?;
        let mut out = String::with_capacity(block.len() * 3);
        for line in block.chunks(16) {
            for b in line {
                let _ = write!(out, "{b:02x} ");
            }
            out.pop();
            out.push('\n');
        }
        Some(out)
    }

    /// 非零块地址的最小值与最大值
    pub(crate) fn bounds(&self) -> Option<(u32, u32)> {
        let (&first, _) = self.blocks.first_key_value()?;
        let (&last, _) = self.blocks.last_key_value()?;
        Some((first, last))
    }

    pub(crate) fn blocks(&self) -> impl Iterator<Item = (u32, &[u8])> {
        self.blocks.iter().map(|(&addr, block)| (addr, &**block))
    }
}

impl BlockStore {
    /// 返回`offset`所在的块地址与块内偏移
    fn locate(&self, offset: u64, size: usize) -> Result<(u32, usize)> {
        let block_size = self.block_size as u64;
        let start = (offset % block_size) as usize;
        match u32::try_from(offset / block_size) {
            Ok(addr) if start + size <= self.block_size => Ok((addr, start)),
            _ => Err(Error::Span { offset, size }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pattern(seed: u8) -> Vec<u8> {
        (0..BLOCK_SIZE).map(|i| (i as u8).wrapping_add(seed) | 1).collect()
    }

    #[test]
    fn unwritten_block_is_zero() {
        let store = BlockStore::new();
        assert_eq!(&*store.read_block(42), &[0u8; BLOCK_SIZE][..]);
        assert_eq!(store.block_count(), 0);
    }

    #[test]
    fn zero_block_is_not_stored() {
        let mut store = BlockStore::new();
        store.write_block(7, &pattern(3)).unwrap();
        assert_eq!(store.block_list(), [7]);

        store.write_block(7, &[0; BLOCK_SIZE]).unwrap();
        assert_eq!(&*store.read_block(7), &[0u8; BLOCK_SIZE][..]);
        assert_eq!(store.block_count(), 0);
        assert!(!store.block_list().contains(&7));
    }

    #[test]
    fn block_round_trip() {
        let mut store = BlockStore::new();
        for addr in [0, 1, 1000, u32::MAX] {
            let content = pattern(addr as u8);
            store.write_block(addr, &content).unwrap();
            assert_eq!(&*store.read_block(addr), content.as_slice());
        }
        assert_eq!(store.block_list(), [0, 1, 1000, u32::MAX]);
    }

    #[test]
    fn wrong_length_is_rejected() {
        let mut store = BlockStore::new();
        assert!(matches!(
            store.write_block(0, &[1; 511]),
            Err(Error::Size {
                expected: 512,
                actual: 511
            })
        ));
        assert_eq!(store.block_count(), 0);
    }

    #[test]
    fn sub_block_write_splices() {
        let mut store = BlockStore::new();
        store.write(63 * 512 + 3, b"\x4c").unwrap();

        let block = store.read_block(63);
        assert_eq!(block[3], 0x4c);
        assert_eq!(block.iter().filter(|&&b| b != 0).count(), 1);
        assert_eq!(store.read(63 * 512, 4).unwrap(), [0, 0, 0, 0x4c]);
    }

    #[test]
    fn span_across_blocks_fails_without_writing() {
        let mut store = BlockStore::new();
        assert!(matches!(
            store.write(510, &[1, 2, 3]),
            Err(Error::Span {
                offset: 510,
                size: 3
            })
        ));
        assert_eq!(store.block_count(), 0);
        assert!(store.read(511, 2).is_err());
        // 正好读到块尾是合法的
        assert_eq!(store.read(510, 2).unwrap(), [0, 0]);
    }

    #[test]
    fn dump_only_materialized() {
        let mut store = BlockStore::new();
        assert!(store.dump_block(0).is_none());
        store.write(0, &[0xab, 0xcd]).unwrap();
        let dump = store.dump_block(0).unwrap();
        assert_eq!(dump.lines().count(), 32);
        assert!(dump.starts_with("ab cd 00"));
    }

    #[test]
    #[should_panic(expected = "block size must be positive")]
    fn zero_block_size() {
        BlockStore::with_block_size(0);
    }
}
