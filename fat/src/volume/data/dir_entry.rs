//! 数据区，存放目录项的区域，使用**簇编号**索引。
//!
//! 目录项为32字节定长记录。只支持8.3短名称，长名称目录项在遍历时跳过。

use binrw::io::Cursor;
use binrw::{BinRead, BinWrite, binrw};
use enumflags2::{BitFlags, bitflags};

use crate::{ClusterId, Error, Result};

pub const DIR_ENTRY_SIZE: usize = 32;

const NAME_LEN: usize = 8;
const EXT_LEN: usize = 3;

/// 长名称目录项的属性：ReadOnly | Hidden | System | VolumeID
const ATTR_LONG_NAME: u8 = 0x0F;
const ATTR_LONG_NAME_MASK: u8 = 0x3F;

/// 短名称中不允许出现的字符
const ILLEGAL: &[u8] = b"\"*+,./:;<=>?[\\]|";

#[binrw]
#[brw(little)]
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ShortDirEntry {
    /// 8字节名称 + 3字节扩展名，空格填充
    name: [u8; 11],

    attr: u8,

    /// Reserved, must be 0
    ntres: u8,

    /// Count of tenths of a second.
    /// Range: [0, 199]
    crt_time_tenth: u8,

    /// Creation time, granularity is 2 seconds
    crt_time: u16,

    /// Creation date
    crt_date: u16,

    /// Last access date
    lst_acc_date: u16,

    /// High word of first data cluster number
    /// for file/directory described by this entry
    fst_clus_hi: u16,

    /// Last modification time
    wrt_time: u16,

    /// Last modification date
    wrt_date: u16,

    /// Low word of first data cluster number
    /// for file/directory described by this entry
    fst_clus_lo: u16,

    /// Quantity containing size in bytes
    /// of file/directory described by this entry
    file_size: u32,
}

impl ShortDirEntry {
    /// 时间戳全部为0
    pub fn new_file(name: [u8; 11], id: ClusterId, size: u32) -> Self {
        let mut dirent = Self {
            name,
            attr: BitFlags::from_flag(AttrFlag::Archive).bits(),
            file_size: size,
            ..Default::default()
        };
        dirent.set_cluster_id(id);
        dirent
    }

    pub fn new_directory(name: [u8; 11], id: ClusterId) -> Self {
        let mut dirent = Self {
            name,
            attr: BitFlags::from_flag(AttrFlag::Directory).bits(),
            ..Default::default()
        };
        dirent.set_cluster_id(id);
        dirent
    }

    /// 长名称目录项，只用来占位
    pub fn long_name(ord: u8) -> Self {
        Self {
            name: [ord, b'a', 0, b'b', 0, b'c', 0, 0, 0, 0, 0],
            attr: ATTR_LONG_NAME,
            ..Default::default()
        }
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        Ok(Self::read(&mut Cursor::new(bytes))?)
    }

    pub fn to_bytes(&self) -> Result<[u8; DIR_ENTRY_SIZE]> {
        let mut buf = [0; DIR_ENTRY_SIZE];
        self.write(&mut Cursor::new(&mut buf[..]))?;
        Ok(buf)
    }

    pub const fn name(&self) -> &[u8; 11] {
        &self.name
    }

    pub fn attr(&self) -> BitFlags<AttrFlag> {
        BitFlags::from_bits_truncate(self.attr)
    }

    pub const fn is_long_name(&self) -> bool {
        self.attr & ATTR_LONG_NAME_MASK == ATTR_LONG_NAME
    }

    pub fn status(&self) -> DirEntryStatus {
        match self.name[0] {
            0xE5 => DirEntryStatus::Free,
            0x00 => DirEntryStatus::TailFree,
            _ => DirEntryStatus::Occupied,
        }
    }

    pub fn cluster_id(&self) -> ClusterId {
        (self.fst_clus_lo, self.fst_clus_hi).into()
    }

    pub fn set_cluster_id(&mut self, id: ClusterId) {
        (self.fst_clus_lo, self.fst_clus_hi) = id.split();
    }

    pub const fn size(&self) -> u32 {
        self.file_size
    }

    pub fn resize(&mut self, size: u32) {
        self.file_size = size;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[bitflags]
#[repr(u8)]
pub enum AttrFlag {
    ReadOnly = 0b0000_0001,
    Hidden = 0b0000_0010,
    /// The corresponding file is tagged as a component of the operating system
    System = 0b0000_0100,
    /// The corresponding entry contains the volume label
    VolumeID = 0b0000_1000,
    Directory = 0b0001_0000,
    /// Indicates that properties of the associated file have been modified
    Archive = 0b0010_0000,
}

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum DirEntryStatus {
    /// name[0] == 0xE5
    Free,
    /// name[0] == 0，此条目后的条目皆为[`DirEntryStatus::TailFree`]
    TailFree,
    /// 已被使用
    Occupied,
}

/// 解码后的短目录项
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirEntry {
    /// 目录项在块存储中的字节偏移
    pub position: u64,
    /// 名称部分，去掉了填充的空格
    pub name: String,
    /// 扩展名部分，去掉了填充的空格
    pub extension: String,
    pub raw_name: [u8; 11],
    pub attr: BitFlags<AttrFlag>,
    pub first_cluster: ClusterId,
    pub size: u32,
}

impl DirEntry {
    pub fn new(position: u64, dirent: &ShortDirEntry) -> Self {
        let (name, extension) = dirent.name.split_at(NAME_LEN);
        Self {
            position,
            name: trimmed(name),
            extension: trimmed(extension),
            raw_name: dirent.name,
            attr: dirent.attr(),
            first_cluster: dirent.cluster_id(),
            size: dirent.size(),
        }
    }

    /// `NAME.EXT`，没有扩展名时为`NAME`
    pub fn short_name(&self) -> String {
        if self.extension.is_empty() {
            self.name.clone()
        } else {
            format!("{}.{}", self.name, self.extension)
        }
    }

    pub fn is_dir(&self) -> bool {
        self.attr.contains(AttrFlag::Directory)
    }
}

fn trimmed(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes).trim_end_matches(' ').to_owned()
}

/// 将文件名转为大写、截断并以空格填充的8.3短名称。
pub fn short_name(file_name: &str) -> Result<[u8; 11]> {
    let invalid = || Error::InvalidName(file_name.to_owned());

    let (base, ext) = match file_name.rsplit_once('.') {
        Some((base, ext)) if !base.is_empty() => (base, ext),
        _ => (file_name, ""),
    };

    let mut name = [b' '; NAME_LEN + EXT_LEN];
    let (base_slots, ext_slots) = name.split_at_mut(NAME_LEN);
    for (dst, src) in [(base_slots, base), (ext_slots, ext)] {
        let mut bytes = src.bytes().filter(|&b| b != b' ' && b != b'.').peekable();
        for slot in dst.iter_mut() {
            match bytes.next() {
                Some(b) if b.is_ascii_graphic() && !ILLEGAL.contains(&b) => {
                    *slot = b.to_ascii_uppercase();
                }
                Some(_) => return Err(invalid()),
                None => break,
            }
        }
        if bytes.peek().is_some() {
            log::debug!("{file_name:?} truncated to 8.3");
        }
    }

    if name[0] == b' ' {
        return Err(invalid());
    }
    Ok(name)
}
