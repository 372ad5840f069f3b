//! 目录的遍历、切换与文件导入

use std::fs::File;
use std::io::{self, Read};
use std::path::Path;

use block_dev::BlockStore;

use crate::volume::data::{
    DIR_ENTRY_SIZE, DataArea, DirEntry, DirEntryStatus, ShortDirEntry, short_name,
};
use crate::volume::fat::FatArea;
use crate::{ClusterId, Error, Result, Volume};

/// 沿目录的簇链，逐个读出32字节的目录项槽位
struct Slots<'v> {
    store: &'v BlockStore,
    fat: &'v FatArea,
    data: &'v DataArea,
    start: u64,
    pos: u64,
    /// 当前簇内已读的字节数
    used: u64,
    /// 首簇之后的簇，跨簇时才去读FAT
    rest: Option<std::vec::IntoIter<ClusterId>>,
    done: bool,
}

impl<'v> Slots<'v> {
    fn new(volume: &'v Volume<'_>) -> Self {
        let start = volume.current_position;
        Self {
            store: volume.store,
            fat: &volume.fat,
            data: &volume.data,
            start,
            pos: start,
            used: (start - volume.data.offset()) % volume.data.cluster_size(),
            rest: None,
            done: false,
        }
    }

    /// 移到目录的下一个簇，没有下一个簇时返回`false`
    fn advance(&mut self) -> Result<bool> {
        let rest = match &mut self.rest {
            Some(rest) => rest,
            None => {
                let mut chain = self
                    .fat
                    .chain(self.store, self.data.cluster_of(self.start)?)?
                    .into_iter();
                chain.next();
                self.rest.insert(chain)
            }
        };

        Ok(match rest.next() {
            Some(id) => {
                self.pos = self.data.offset_of(id)?;
                self.used = 0;
                true
            }
            None => false,
        })
    }
}

impl Iterator for Slots<'_> {
    type Item = Result<(u64, ShortDirEntry)>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        if self.used == self.data.cluster_size() {
            match self.advance() {
                Ok(true) => {}
                Ok(false) => {
                    self.done = true;
                    return None;
                }
                Err(e) => {
                    self.done = true;
                    return Some(Err(e));
                }
            }
        }

        let pos = self.pos;
        self.pos += DIR_ENTRY_SIZE as u64;
        self.used += DIR_ENTRY_SIZE as u64;

        let slot = self
            .store
            .read(pos, DIR_ENTRY_SIZE)
            .map_err(Error::from)
            .and_then(|bytes| ShortDirEntry::from_bytes(&bytes));
        if slot.is_err() {
            self.done = true;
        }
        Some(slot.map(|dirent| (pos, dirent)))
    }
}

/// [`Volume::ls`]返回的目录项序列，只能遍历一遍。
pub struct Entries<'v> {
    slots: Slots<'v>,
}

impl Iterator for Entries<'_> {
    type Item = Result<DirEntry>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let (pos, dirent) = match self.slots.next()? {
                Ok(slot) => slot,
                Err(e) => return Some(Err(e)),
            };

            match dirent.status() {
                DirEntryStatus::TailFree => {
                    self.slots.done = true;
                    return None;
                }
                DirEntryStatus::Free => continue,
                DirEntryStatus::Occupied if dirent.is_long_name() => {
                    log::debug!("skip long name entry at {pos:#x}");
                    continue;
                }
                DirEntryStatus::Occupied => return Some(Ok(DirEntry::new(pos, &dirent))),
            }
        }
    }
}

impl Volume<'_> {
    /// 列出当前目录。
    pub fn ls(&self) -> Entries<'_> {
        Entries {
            slots: Slots::new(self),
        }
    }

    /// 进入当前目录下名为`name`的子目录。
    ///
    /// 找不到时返回[`Error::NotFound`]，当前位置不变。
    pub fn cd(&mut self, name: &str) -> Result<()> {
        let target = name.trim().to_ascii_uppercase();

        let mut found = None;
        for entry in self.ls() {
            let entry = entry?;
            let raw = String::from_utf8_lossy(&entry.raw_name);
            if entry.is_dir() && (entry.short_name() == target || raw.trim() == target) {
                found = Some(entry.first_cluster);
                break;
            }
        }

        match found {
            // `..`指向根目录时簇号为0
            Some(ClusterId::FREE) => self.root(),
            Some(id) => {
                let id = self
                    .fat
                    .check(id)
                    .ok_or(Error::CorruptChain { start: id, at: id })?;
                self.current_position = self.data.offset_of(id)?;
            }
            None => return Err(Error::NotFound(name.to_owned())),
        }
        log::debug!("cd {name}: now at {:#x}", self.current_position);
        Ok(())
    }

    /// 把宿主机上的文件导入当前目录
    pub fn import_file(&mut self, path: impl AsRef<Path>) -> Result<DirEntry> {
        let path = path.as_ref();
        let name = path
            .file_name()
            .and_then(|name| name.to_str())
            .ok_or_else(|| Error::InvalidName(path.display().to_string()))?;

        let file = File::open(path)?;
        let size = file.metadata()?.len();
        self.import_reader(name, file, size)
    }

    /// 把`reader`中`size`字节的内容写为当前目录下的`name`文件。
    ///
    /// 写完后，数据恰好占满分配的簇链，否则报[`Error::AllocationMismatch`]。
    pub fn import_reader(&mut self, name: &str, reader: impl Read, size: u64) -> Result<DirEntry> {
        let name = short_name(name)?;
        let file_size = u32::try_from(size).map_err(|_| Error::FileTooLarge(size))?;
        let clusters = size.div_ceil(self.data.cluster_size()).max(1) as usize;

        let slot = self.free_slot()?;
        let chain = self.create_cluster_chain(clusters)?;
        let dirent = ShortDirEntry::new_file(name, chain[0], file_size);
        self.store.write(slot, &dirent.to_bytes()?)?;

        let consumed = self.stream(&chain, reader)?;
        if consumed != chain.len() {
            return Err(Error::AllocationMismatch {
                allocated: chain.len(),
                consumed,
            });
        }

        let entry = DirEntry::new(slot, &dirent);
        log::info!(
            "imported {} ({size} bytes) at cluster {}",
            entry.short_name(),
            entry.first_cluster
        );
        Ok(entry)
    }

    /// 当前目录中第一个可用的槽位；目录已满时追加一个清零的簇。
    fn free_slot(&mut self) -> Result<u64> {
        for slot in Slots::new(self) {
            let (pos, dirent) = slot?;
            if dirent.status() != DirEntryStatus::Occupied {
                return Ok(pos);
            }
        }

        let chain = self
            .fat
            .chain(self.store, self.data.cluster_of(self.current_position)?)?;
        let grown = self.fat.free_clusters(self.store, 1)?;
        let zero = vec![0; self.store.block_size()];
        for addr in self.cluster_blocks(grown[0])? {
            self.store.write_block(addr, &zero)?;
        }
        // 链表非空，`chain`至少含有当前目录的首簇
        let tail = chain[chain.len() - 1];
        self.fat.link(self.store, &[tail, grown[0]])?;
        log::debug!("directory grown by cluster {}", grown[0]);

        self.data.offset_of(grown[0])
    }

    /// 按块把数据写入簇链，返回装有数据的簇数。
    ///
    /// 每个簇都整块写入一次，不足的部分补零。空文件也算占用一个簇。
    fn stream(&mut self, chain: &[ClusterId], mut reader: impl Read) -> Result<usize> {
        let mut buf = vec![0; self.store.block_size()];
        let mut consumed = 0;
        let mut drained = false;

        for &id in chain {
            let mut filled = false;
            for addr in self.cluster_blocks(id)? {
                buf.fill(0);
                let n = if drained { 0 } else { fill(&mut reader, &mut buf)? };
                drained |= n < buf.len();
                filled |= n > 0;
                self.store.write_block(addr, &buf)?;
            }
            if filled {
                consumed += 1;
            }
        }

        // 数据比簇链长
        if !drained && fill(&mut reader, &mut [0])? > 0 {
            consumed += 1;
        }
        Ok(consumed.max(1))
    }
}

/// 尽量读满`buf`，返回读到的字节数
fn fill(reader: &mut impl Read, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}
