//! CID与CSD寄存器
//!
//! 两个寄存器都是128位：120位字段按声明顺序大端拼接，最后一字节为CRC7与结束位。

use crate::config::BLOCKS_PER_DEVICE_SIZE_UNIT;
use crate::{Error, Result, crc7_and_stop_bit};

/// 寄存器中字段部分的位数
const FIELD_BITS: u32 = 120;

/// 位宽，按寄存器中的先后顺序排列
mod width {
    pub const MID: u32 = 8;
    pub const OID: u32 = 16;
    pub const PNM: u32 = 40;
    pub const PRV: u32 = 8;
    pub const PSN: u32 = 32;
    pub const CID_RESERVED: u32 = 4;
    pub const MDT: u32 = 12;

    pub const CSD_STRUCTURE: u32 = 2;
    pub const TAAC: u32 = 8;
    pub const NSAC: u32 = 8;
    pub const TRAN_SPEED: u32 = 8;
    pub const CCC: u32 = 12;
    pub const READ_BL_LEN: u32 = 4;
    pub const C_SIZE: u32 = 22;
    pub const SECTOR_SIZE: u32 = 7;
    pub const WP_GRP_SIZE: u32 = 7;
    pub const R2W_FACTOR: u32 = 3;
    pub const WRITE_BL_LEN: u32 = 4;
    pub const FILE_FORMAT: u32 = 2;
    pub const FLAG: u32 = 1;
}

/// CSD中`C_SIZE`的最低位在整个128位寄存器中的位置
const C_SIZE_SHIFT: u32 = 48;
/// CSD中`CCC`的最低位
const CCC_SHIFT: u32 = 84;

#[derive(Debug, Clone, Copy)]
struct Field {
    name: &'static str,
    width: u32,
    value: u64,
}

const fn field(name: &'static str, width: u32, value: u64) -> Field {
    Field { name, width, value }
}

const fn reserved(width: u32) -> Field {
    field("reserved", width, 0)
}

const fn flag(name: &'static str, value: bool) -> Field {
    field(name, width::FLAG, value as u64)
}

/// 将字段依次压入，附加尾字节
fn pack(fields: &[Field]) -> Result<[u8; 16]> {
    let mut bits = 0u128;
    let mut len = 0;

    for f in fields {
        if f.value >> f.width != 0 {
            return Err(Error::FieldWidth {
                field: f.name,
                width: f.width,
                value: f.value,
            });
        }
        bits = (bits << f.width) | u128::from(f.value);
        len += f.width;
    }
    debug_assert_eq!(len, FIELD_BITS, "register layout must cover 120 bits");

    let mut bytes = (bits << 8).to_be_bytes();
    bytes[15] = crc7_and_stop_bit(&bytes[..15]);
    log::trace!("packed register {bytes:02x?}");
    Ok(bytes)
}

/// Card Identification 的各字段
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CidFields {
    /// Manufacturer ID
    pub manufacturer_id: u8,
    /// OEM/Application ID，两个ASCII字符
    pub oem_id: [u8; 2],
    /// Product name，五个ASCII字符
    pub product_name: [u8; 5],
    /// Product revision，BCD `n.m`
    pub product_revision: u8,
    /// Product serial number
    pub serial_number: u32,
    pub reserved: u8,
    /// Manufacturing date, `yym`
    pub manufacturing_date: u16,
}

impl Default for CidFields {
    fn default() -> Self {
        Self {
            manufacturer_id: 0x41,
            oem_id: *b"42",
            product_name: *b"sdcit",
            product_revision: 0x30,
            serial_number: 0x1234_5678,
            reserved: 0,
            manufacturing_date: 0x112,
        }
    }
}

impl CidFields {
    fn fields(&self) -> [Field; 7] {
        [
            field("MID", width::MID, self.manufacturer_id.into()),
            field("OID", width::OID, u16::from_be_bytes(self.oem_id).into()),
            field("PNM", width::PNM, be_u64(&self.product_name)),
            field("PRV", width::PRV, self.product_revision.into()),
            field("PSN", width::PSN, self.serial_number.into()),
            field("reserved", width::CID_RESERVED, self.reserved.into()),
            field("MDT", width::MDT, self.manufacturing_date.into()),
        ]
    }
}

/// Card Specific Data (CSD Version 2.0) 的各字段
///
/// 保留位不出现在这里，打包时恒为0。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CsdFields {
    pub csd_structure: u8,
    /// Data read access time
    pub taac: u8,
    /// Data read access time in CLK cycles
    pub nsac: u8,
    /// Max. data transfer rate
    pub tran_speed: u8,
    /// Card command classes
    pub ccc: u16,
    /// Max. read data block length, `2^n`
    pub read_bl_len: u8,
    pub read_bl_partial: bool,
    pub write_blk_misalign: bool,
    pub read_blk_misalign: bool,
    pub dsr_imp: bool,
    /// Device size
    pub c_size: u32,
    pub erase_blk_en: bool,
    /// Erase sector size
    pub sector_size: u8,
    /// Write protect group size
    pub wp_grp_size: u8,
    pub wp_grp_enable: bool,
    /// Write speed factor
    pub r2w_factor: u8,
    /// Max. write data block length, `2^n`
    pub write_bl_len: u8,
    pub write_bl_partial: bool,
    pub file_format_grp: bool,
    pub copy: bool,
    pub perm_write_protect: bool,
    pub tmp_write_protect: bool,
    pub file_format: u8,
}

impl Default for CsdFields {
    /// 64GB SDXC卡
    fn default() -> Self {
        Self {
            csd_structure: 1,
            taac: 0x0E,
            nsac: 0x00,
            tran_speed: 0x5A,
            ccc: 0x5B5,
            read_bl_len: 9,
            read_bl_partial: false,
            write_blk_misalign: false,
            read_blk_misalign: false,
            dsr_imp: false,
            c_size: 0x01D27F,
            erase_blk_en: true,
            sector_size: 0x7F,
            wp_grp_size: 0,
            wp_grp_enable: false,
            r2w_factor: 0b010,
            write_bl_len: 9,
            write_bl_partial: false,
            file_format_grp: false,
            copy: false,
            perm_write_protect: false,
            tmp_write_protect: false,
            file_format: 0,
        }
    }
}

impl CsdFields {
    fn fields(&self) -> [Field; 29] {
        [
            field("CSD_STRUCTURE", width::CSD_STRUCTURE, self.csd_structure.into()),
            reserved(6),
            field("TAAC", width::TAAC, self.taac.into()),
            field("NSAC", width::NSAC, self.nsac.into()),
            field("TRAN_SPEED", width::TRAN_SPEED, self.tran_speed.into()),
            field("CCC", width::CCC, self.ccc.into()),
            field("READ_BL_LEN", width::READ_BL_LEN, self.read_bl_len.into()),
            flag("READ_BL_PARTIAL", self.read_bl_partial),
            flag("WRITE_BLK_MISALIGN", self.write_blk_misalign),
            flag("READ_BLK_MISALIGN", self.read_blk_misalign),
            flag("DSR_IMP", self.dsr_imp),
            reserved(6),
            field("C_SIZE", width::C_SIZE, self.c_size.into()),
            reserved(1),
            flag("ERASE_BLK_EN", self.erase_blk_en),
            field("SECTOR_SIZE", width::SECTOR_SIZE, self.sector_size.into()),
            field("WP_GRP_SIZE", width::WP_GRP_SIZE, self.wp_grp_size.into()),
            flag("WP_GRP_ENABLE", self.wp_grp_enable),
            reserved(2),
            field("R2W_FACTOR", width::R2W_FACTOR, self.r2w_factor.into()),
            field("WRITE_BL_LEN", width::WRITE_BL_LEN, self.write_bl_len.into()),
            flag("WRITE_BL_PARTIAL", self.write_bl_partial),
            reserved(5),
            flag("FILE_FORMAT_GRP", self.file_format_grp),
            flag("COPY", self.copy),
            flag("PERM_WRITE_PROTECT", self.perm_write_protect),
            flag("TMP_WRITE_PROTECT", self.tmp_write_protect),
            field("FILE_FORMAT", width::FILE_FORMAT, self.file_format.into()),
            reserved(2),
        ]
    }
}

/// 卡识别寄存器，大端的规范字节序
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cid([u8; 16]);

impl Cid {
    pub fn build(fields: &CidFields) -> Result<Self> {
        pack(&fields.fields()).map(Self)
    }

    pub const fn as_bytes(&self) -> &[u8; 16] {
        &self.0
    }

    /// 尾字节：CRC7与结束位
    pub const fn trailer(&self) -> u8 {
        self.0[15]
    }

    pub fn product_name(&self) -> &[u8] {
        &self.0[3..8]
    }

    pub fn serial_number(&self) -> u32 {
        u32::from_be_bytes([self.0[9], self.0[10], self.0[11], self.0[12]])
    }
}

/// 卡特定数据寄存器，大端的规范字节序
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Csd([u8; 16]);

impl Csd {
    pub fn build(fields: &CsdFields) -> Result<Self> {
        pack(&fields.fields()).map(Self)
    }

    pub const fn as_bytes(&self) -> &[u8; 16] {
        &self.0
    }

    pub const fn trailer(&self) -> u8 {
        self.0[15]
    }

    /// `C_SIZE`，即HAL中的`DeviceSize`
    pub fn device_size(&self) -> u32 {
        ((self.bits() >> C_SIZE_SHIFT) & mask(width::C_SIZE)) as u32
    }

    /// 卡命令类，即HAL中的`Class`
    pub fn class(&self) -> u16 {
        ((self.bits() >> CCC_SHIFT) & mask(width::CCC)) as u16
    }

    /// `(DeviceSize + 1) * 1024`
    pub fn block_count(&self) -> u64 {
        (u64::from(self.device_size()) + 1) * BLOCKS_PER_DEVICE_SIZE_UNIT
    }

    fn bits(&self) -> u128 {
        u128::from_be_bytes(self.0)
    }
}

const fn mask(width: u32) -> u128 {
    (1 << width) - 1
}

fn be_u64(bytes: &[u8]) -> u64 {
    bytes.iter().fold(0, |acc, &b| (acc << 8) | u64::from(b))
}
