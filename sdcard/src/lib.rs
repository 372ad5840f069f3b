//! # 虚拟SD卡
//!
//! 为被测固件提供的SD卡模型：
//!
//! - [`Cid`] / [`Csd`]：按位拼装的卡识别寄存器与卡特定数据寄存器，尾部附CRC7；
//! - [`SdCard`]：以[`block_dev::BlockDevice`]为后端的单块读写；
//! - [`hal`]：固件HAL句柄中各字段的位置，以及初始化时需要写入的内容。

pub mod config;
mod card;
mod crc;
mod error;
pub mod hal;
mod register;

pub use self::{
    card::{Card, CardState, SdCard},
    crc::{crc7, crc7_and_stop_bit},
    error::{Error, Result},
    register::{Cid, CidFields, Csd, CsdFields},
};
