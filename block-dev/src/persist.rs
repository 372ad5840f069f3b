//! 镜像与字典两种持久化格式
//!
//! - 镜像：`[最小块, 最大块]`之间所有块的原始拼接，空洞补零，没有文件头。
//! - 字典：重复的`{4字节大端地址}{块内容}`记录直到文件尾，只包含非零块，保持稀疏。

use std::fs::File;
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::Path;

use crate::{BlockStore, Error, Result};

const ADDR_SIZE: usize = 4;

impl BlockStore {
    pub fn export_as_image(&self, path: impl AsRef<Path>) -> Result<()> {
        let mut writer = BufWriter::new(File::create(path)?);
        self.write_image(&mut writer)?;
        writer.flush()?;
        Ok(())
    }

    pub fn import_from_image(&mut self, path: impl AsRef<Path>) -> Result<()> {
        self.read_image(BufReader::new(File::open(path)?))
    }

    pub fn export_as_dictionary(&self, path: impl AsRef<Path>) -> Result<()> {
        let mut writer = BufWriter::new(File::create(path)?);
        self.write_dictionary(&mut writer)?;
        writer.flush()?;
        Ok(())
    }

    pub fn import_from_dictionary(&mut self, path: impl AsRef<Path>) -> Result<()> {
        self.read_dictionary(BufReader::new(File::open(path)?))
    }

    pub fn write_image(&self, mut writer: impl Write) -> Result<()> {
        let (first, last) = self.bounds().ok_or(Error::Empty)?;

        log::debug!("exporting image of blocks {first:#x}..={last:#x}");
        for addr in first..=last {
            writer.write_all(&self.read_block(addr))?;
        }
        Ok(())
    }

    /// 从0号块开始依次导入。文件尾的残块视为错误。
    pub fn read_image(&mut self, mut reader: impl Read) -> Result<()> {
        let mut buf = vec![0; self.block_size()];
        let mut addr = 0u32;
        loop {
            match read_chunk(&mut reader, &mut buf)? {
                0 => break,
                n if n < buf.len() => {
                    return Err(Error::Size {
                        expected: buf.len(),
                        actual: n,
                    });
                }
                _ => self.write_block(addr, &buf)?,
            }
            addr += 1;
        }
        log::debug!("imported {addr} blocks from image");
        Ok(())
    }

    pub fn write_dictionary(&self, mut writer: impl Write) -> Result<()> {
        for (addr, block) in self.blocks() {
            writer.write_all(&addr.to_be_bytes())?;
            writer.write_all(block)?;
        }
        Ok(())
    }

    pub fn read_dictionary(&mut self, mut reader: impl Read) -> Result<()> {
        let mut record = vec![0; ADDR_SIZE + self.block_size()];
        loop {
            match read_chunk(&mut reader, &mut record)? {
                0 => break,
                n if n < record.len() => {
                    return Err(Error::Size {
                        expected: record.len(),
                        actual: n,
                    });
                }
                _ => {
                    let (addr, block) = record.split_at(ADDR_SIZE);
                    let addr = u32::from_be_bytes([addr[0], addr[1], addr[2], addr[3]]);
                    self.write_block(addr, block)?;
                }
            }
        }
        log::debug!("imported dictionary, {} blocks", self.block_count());
        Ok(())
    }
}

/// 尽量填满`buf`，返回实际读到的字节数，0表示文件尾。
fn read_chunk(reader: &mut impl Read, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}
