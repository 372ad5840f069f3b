//! 固件侧`SD_HandleTypeDef`的内存布局
//!
//! 句柄中的字段都是32位小端字。CID与CSD在句柄中按`uint32_t[4]`存放，
//! 所以规范的大端字节需要每4字节翻转一次。

use crate::config::BLOCK_SIZE;
use crate::{Card, Error, Result};

/// 字段相对句柄基址的偏移
pub mod offset {
    pub const CONTEXT: u32 = 48;
    pub const STATE: u32 = 52;
    pub const ERROR_CODE: u32 = 56;

    /// `HAL_SD_CardInfoTypeDef SdCard`
    pub const SD_CARD: u32 = 68;
    pub const CARD_TYPE: u32 = SD_CARD;
    pub const CARD_VERSION: u32 = SD_CARD + 4;
    pub const CLASS: u32 = SD_CARD + 8;
    pub const REL_CARD_ADD: u32 = SD_CARD + 12;
    pub const BLOCK_NBR: u32 = SD_CARD + 16;
    pub const BLOCK_SIZE: u32 = SD_CARD + 20;
    pub const LOG_BLOCK_NBR: u32 = SD_CARD + 24;
    pub const LOG_BLOCK_SIZE: u32 = SD_CARD + 28;

    pub const CSD: u32 = 100;
    pub const CID: u32 = 116;

    /// 句柄中到CID末尾为止的长度
    pub const END: u32 = CID + 16;
}

/// `HAL_SD_STATE_READY`
pub const STATE_READY: u32 = 1;

/// 对句柄的一次写入
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemWrite {
    pub offset: u32,
    pub bytes: Vec<u8>,
}

impl MemWrite {
    fn word(offset: u32, value: u32) -> Self {
        Self {
            offset,
            bytes: value.to_le_bytes().to_vec(),
        }
    }

    /// 写入以句柄基址为0的缓冲区，缓冲区至少要有[`offset::END`]字节
    pub fn apply(&self, handle: &mut [u8]) -> Result<()> {
        let start = self.offset as usize;
        let end = start + self.bytes.len();
        let len = handle.len();
        let dst = handle
            .get_mut(start..end)
            .ok_or(Error::HandleTooShort { needed: end, len })?;
        dst.copy_from_slice(&self.bytes);
        Ok(())
    }
}

/// 每4字节翻转：大端的寄存器字节 → 小端字
pub fn swap_words(register: &[u8; 16]) -> [u8; 16] {
    let mut out = *register;
    for word in out.chunks_exact_mut(4) {
        word.reverse();
    }
    out
}

/// `HAL_SD_Init`返回前对句柄所做的全部写入，按写入顺序排列。
pub fn init_writes(card: &Card) -> Vec<MemWrite> {
    let blocks = u32::try_from(card.block_count()).unwrap_or(u32::MAX);
    let block_size = BLOCK_SIZE as u32;

    vec![
        MemWrite::word(offset::CARD_TYPE, card.card_type),
        MemWrite::word(offset::CARD_VERSION, card.version),
        MemWrite {
            offset: offset::CID,
            bytes: swap_words(card.cid.as_bytes()).to_vec(),
        },
        MemWrite::word(offset::REL_CARD_ADD, card.rca.into()),
        MemWrite {
            offset: offset::CSD,
            bytes: swap_words(card.csd.as_bytes()).to_vec(),
        },
        MemWrite::word(offset::CLASS, card.csd.class().into()),
        MemWrite::word(offset::BLOCK_NBR, blocks),
        MemWrite::word(offset::LOG_BLOCK_NBR, blocks),
        MemWrite::word(offset::BLOCK_SIZE, block_size),
        MemWrite::word(offset::LOG_BLOCK_SIZE, block_size),
        MemWrite::word(offset::ERROR_CODE, 0),
        MemWrite::word(offset::STATE, STATE_READY),
        MemWrite::word(offset::CONTEXT, 0),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn word(handle: &[u8], offset: u32) -> u32 {
        let at = offset as usize;
        u32::from_le_bytes([handle[at], handle[at + 1], handle[at + 2], handle[at + 3]])
    }

    #[test]
    fn words_are_swapped() {
        let bytes: [u8; 16] = core::array::from_fn(|i| i as u8);
        assert_eq!(
            swap_words(&bytes),
            [3, 2, 1, 0, 7, 6, 5, 4, 11, 10, 9, 8, 15, 14, 13, 12]
        );
    }

    #[test]
    fn init_fills_card_info() {
        let card = Card::emulated().unwrap();
        let mut handle = vec![0xAAu8; offset::END as usize];
        for write in init_writes(&card) {
            write.apply(&mut handle).unwrap();
        }

        assert_eq!(word(&handle, offset::CARD_TYPE), 1);
        assert_eq!(word(&handle, offset::CARD_VERSION), 1);
        assert_eq!(word(&handle, offset::REL_CARD_ADD), 0x1234);
        assert_eq!(word(&handle, offset::CLASS), 0x5B5);
        assert_eq!(word(&handle, offset::BLOCK_NBR), 122_290_176);
        assert_eq!(word(&handle, offset::LOG_BLOCK_NBR), 122_290_176);
        assert_eq!(word(&handle, offset::BLOCK_SIZE), 512);
        assert_eq!(word(&handle, offset::STATE), STATE_READY);
        assert_eq!(word(&handle, offset::CONTEXT), 0);
        assert_eq!(word(&handle, offset::ERROR_CODE), 0);

        // CID[0]作为小端字读出即大端的前4字节
        assert_eq!(word(&handle, offset::CID), 0x4134_3273);
        assert_eq!(word(&handle, offset::CSD + 4), 0x5B59_0001);
    }

    #[test]
    fn device_size_from_handle_words() {
        // 固件侧 HAL_SD_GetCardCSD 的算法
        let card = Card::emulated().unwrap();
        let mut handle = vec![0u8; offset::END as usize];
        for write in init_writes(&card) {
            write.apply(&mut handle).unwrap();
        }
        let csd1 = word(&handle, offset::CSD + 4);
        let csd2 = word(&handle, offset::CSD + 8);
        let device_size = ((csd1 & 0x3F) << 16) | ((csd2 & 0xFFFF_0000) >> 16);
        assert_eq!(device_size, card.csd.device_size());
    }

    #[test]
    fn short_handle() {
        let card = Card::emulated().unwrap();
        let mut handle = vec![0u8; offset::CID as usize];
        let cid = &init_writes(&card)[2];
        assert!(matches!(
            cid.apply(&mut handle),
            Err(Error::HandleTooShort { needed, len })
                if needed == offset::END as usize && len == offset::CID as usize
        ));
        assert!(handle.iter().all(|&b| b == 0));
    }
}
