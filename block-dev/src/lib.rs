//! # 块设备接口层
//!
//! 块设备是以**块**为单位存储数据的设备，例如磁盘、SD卡等；
//! [`BlockDevice`] 就是对读写块设备的抽象。
//!
//! [`BlockStore`] 是一个稀疏的内存块设备：未写过的块和全零块等价，
//! 全零块不占用存储。它可以从镜像或字典文件导入、导出。

mod error;
mod persist;
mod store;

pub use self::{
    error::{Error, Result},
    store::{BLOCK_SIZE, BlockStore},
};

/// 块设备驱动特质
///
/// 单写者，不做任何内部加锁；需要并发访问的调用者自行串行化。
pub trait BlockDevice {
    /// 块的字节数
    fn block_size(&self) -> usize;

    /// 读取整块到`buf`，`buf`的长度必须等于[`BlockDevice::block_size`]。
    fn read_block(&self, block_id: u32, buf: &mut [u8]) -> Result<()>;

    /// 以`buf`覆盖整块，`buf`的长度必须等于[`BlockDevice::block_size`]。
    fn write_block(&mut self, block_id: u32, buf: &[u8]) -> Result<()>;
}

impl BlockDevice for BlockStore {
    fn block_size(&self) -> usize {
        BlockStore::block_size(self)
    }

    fn read_block(&self, block_id: u32, buf: &mut [u8]) -> Result<()> {
        if buf.len() != self.block_size() {
            return Err(Error::Size {
                expected: self.block_size(),
                actual: buf.len(),
            });
        }
        buf.copy_from_slice(&BlockStore::read_block(self, block_id));
        Ok(())
    }

    fn write_block(&mut self, block_id: u32, buf: &[u8]) -> Result<()> {
        BlockStore::write_block(self, block_id, buf)
    }
}
