use block_dev::BlockDevice;

use crate::config::{CARD_TYPE, CARD_VERSION, RCA};
use crate::{Cid, CidFields, Csd, CsdFields, Error, Result};

/// 卡初始化时一次性确定、此后不再改变的信息
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Card {
    pub cid: Cid,
    pub csd: Csd,
    pub rca: u16,
    pub version: u32,
    pub card_type: u32,
}

impl Card {
    pub fn new(cid: &CidFields, csd: &CsdFields) -> Result<Self> {
        Ok(Self {
            cid: Cid::build(cid)?,
            csd: Csd::build(csd)?,
            rca: RCA,
            version: CARD_VERSION,
            card_type: CARD_TYPE,
        })
    }

    /// 默认的64GB卡
    pub fn emulated() -> Result<Self> {
        Self::new(&CidFields::default(), &CsdFields::default())
    }

    pub fn block_count(&self) -> u64 {
        self.csd.block_count()
    }
}

/// `HAL_SD_CardStateTypeDef`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum CardState {
    Ready = 1,
    Identification = 2,
    Standby = 3,
    Transfer = 4,
    Sending = 5,
    Receiving = 6,
    Programming = 7,
    Disconnected = 8,
    Error = 0xFF,
}

/// 以块设备为后端的SD卡
///
/// 只支持单块传输，多块请求返回[`Error::Unsupported`]且不做任何传输。
#[derive(Debug)]
pub struct SdCard<'d, D: BlockDevice> {
    card: Card,
    dev: &'d mut D,
}

impl<'d, D: BlockDevice> SdCard<'d, D> {
    pub fn new(card: Card, dev: &'d mut D) -> Self {
        Self { card, dev }
    }

    pub const fn card(&self) -> &Card {
        &self.card
    }

    /// 卡总是处于传输态
    pub const fn state(&self) -> CardState {
        CardState::Transfer
    }

    pub fn read_blocks(&self, addr: u32, blocks: u32, buf: &mut [u8]) -> Result<()> {
        log::debug!("read {blocks} block(s) at {addr:#x}");
        self.check(addr, blocks)?;
        self.dev.read_block(addr, buf)?;
        Ok(())
    }

    pub fn write_blocks(&mut self, addr: u32, blocks: u32, data: &[u8]) -> Result<()> {
        log::debug!("write {blocks} block(s) at {addr:#x}");
        self.check(addr, blocks)?;
        self.dev.write_block(addr, data)?;
        Ok(())
    }

    fn check(&self, addr: u32, blocks: u32) -> Result<()> {
        if blocks != 1 {
            log::error!("multi block transfer not supported: {blocks} blocks at {addr:#x}");
            return Err(Error::Unsupported { blocks });
        }
        let capacity = self.card.block_count();
        if u64::from(addr) >= capacity {
            return Err(Error::OutOfRange {
                addr,
                blocks: capacity,
            });
        }
        Ok(())
    }
}
