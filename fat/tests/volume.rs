use std::collections::HashSet;
use std::fs;
use std::io::{self, Read};

use block_dev::BlockStore;
use fat::volume::data::ShortDirEntry;
use fat::{ClusterId, Error, FormatOptions, Volume, format};

fn init_log() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// 8扇区的卷：4个保留扇区、1个FAT、3个簇。根目录占2号簇，只剩3、4号簇空闲。
///
/// MBR 0 | BPB 512 | FSInfo 1024 | FAT 2560 | 根目录 3072 | 3号簇 3584 | 4号簇 4096
fn tiny() -> BlockStore {
    init_log();
    let mut store = BlockStore::new();
    let opts = FormatOptions::new(9 * 512)
        .partition_start(1)
        .reserved_sectors(4)
        .fats(1)
        .sectors_per_cluster(1);
    format(&mut store, &opts).unwrap();
    store
}

/// 4MiB磁盘，两个FAT，512字节的簇
fn small() -> BlockStore {
    init_log();
    let mut store = BlockStore::new();
    format(&mut store, &FormatOptions::new(4 * 1024 * 1024)).unwrap();
    store
}

fn fat_entry(store: &BlockStore, fat_offset: u64, id: ClusterId) -> u32 {
    let bytes = store.read(fat_offset + 4 * u64::from(id), 4).unwrap();
    u32::from_le_bytes(bytes.try_into().unwrap())
}

#[test]
fn open_formatted_volume() {
    let mut store = tiny();
    let vol = Volume::open(&mut store).unwrap();

    assert_eq!(vol.base_offset(), 512);
    assert_eq!(vol.fat_offset(), 2560);
    assert_eq!(vol.data_offset(), 3072);
    assert_eq!(vol.cluster_size(), 512);
    assert_eq!(vol.current_position(), 3072);
    assert_eq!(vol.cluster_count(), 3);
    assert_eq!(vol.bpb().root_cluster(), 2);
    assert_eq!(vol.fs_info().free_count(), Some(2));
    assert_eq!(vol.fs_info().next_free(), Some(3));
    assert_eq!(vol.ls().count(), 0);
}

#[test]
fn empty_store_is_not_a_volume() {
    let mut store = BlockStore::new();
    assert!(matches!(
        Volume::open(&mut store),
        Err(Error::VolumeFormat(_))
    ));
}

#[test]
fn chain_follows_allocation_order() {
    let mut store = small();
    let mut vol = Volume::open(&mut store).unwrap();

    let chain = vol.create_cluster_chain(5).unwrap();
    assert_eq!(chain, (3..8).map(ClusterId::new).collect::<Vec<_>>());
    assert_eq!(vol.get_cluster_chain(chain[0]).unwrap(), chain);
    assert_eq!(chain.iter().collect::<HashSet<_>>().len(), 5);
    assert_eq!(
        fat_entry(vol.store(), vol.fat_offset(), chain[4]),
        0x0FFF_FFFF
    );

    let next = vol.create_cluster_chain(2).unwrap();
    assert_eq!(next, [ClusterId::new(8), ClusterId::new(9)]);
}

#[test]
fn offsets_and_clusters_are_inverse() {
    let mut store = small();
    let vol = Volume::open(&mut store).unwrap();

    assert_eq!(
        vol.get_cluster_from_offset(vol.data_offset()).unwrap(),
        ClusterId::new(2)
    );
    for offset in (vol.data_offset()..)
        .step_by(vol.cluster_size() as usize)
        .take(64)
    {
        let id = vol.get_cluster_from_offset(offset).unwrap();
        assert_eq!(vol.get_offset_from_cluster(id).unwrap(), offset);
    }
}

#[test]
fn import_into_two_free_clusters() {
    let mut store = tiny();
    let mut vol = Volume::open(&mut store).unwrap();
    assert_eq!(
        vol.get_free_clusters(2).unwrap(),
        [ClusterId::new(3), ClusterId::new(4)]
    );

    let content = b"0123456789";
    let entry = vol.import_reader("a.txt", &content[..], 10).unwrap();
    assert_eq!(&entry.raw_name, b"A       TXT");
    assert_eq!(entry.size, 10);
    assert_eq!(entry.first_cluster, ClusterId::new(3));
    assert_eq!(entry.position, 3072);

    let listed = vol.ls().collect::<fat::Result<Vec<_>>>().unwrap();
    assert_eq!(listed, [entry.clone()]);
    assert_eq!(vol.read_file(&entry).unwrap(), content);

    assert!(matches!(
        vol.get_free_clusters(2),
        Err(Error::DiskFull {
            requested: 2,
            found: 1
        })
    ));
    drop(vol);

    let cluster = store.read(3584, 512).unwrap();
    assert_eq!(&cluster[..10], content);
    assert!(cluster[10..].iter().all(|&b| b == 0));
    assert_eq!(fat_entry(&store, 2560, ClusterId::new(3)), 0x0FFF_FFFF);
}

#[test]
fn long_name_entries_are_skipped() {
    let mut store = tiny();
    let long = ShortDirEntry::long_name(0x41);
    let kernel = ShortDirEntry::new_file(*b"KERNEL  BIN", ClusterId::new(3), 0);
    store.write(3072, &long.to_bytes().unwrap()).unwrap();
    store.write(3104, &kernel.to_bytes().unwrap()).unwrap();

    let vol = Volume::open(&mut store).unwrap();
    let listed = vol.ls().collect::<fat::Result<Vec<_>>>().unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].short_name(), "KERNEL.BIN");
    assert_eq!(listed[0].position, 3104);
}

#[test]
fn deleted_entries_are_skipped_and_reused() {
    let mut store = tiny();
    let mut deleted = ShortDirEntry::new_file(*b"OLD     TXT", ClusterId::new(4), 3)
        .to_bytes()
        .unwrap();
    deleted[0] = 0xE5;
    let kept = ShortDirEntry::new_file(*b"KEPT    TXT", ClusterId::new(4), 3);
    store.write(3072, &deleted).unwrap();
    store.write(3104, &kept.to_bytes().unwrap()).unwrap();

    let mut vol = Volume::open(&mut store).unwrap();
    let names = vol
        .ls()
        .map(|entry| entry.map(|entry| entry.short_name()))
        .collect::<fat::Result<Vec<_>>>()
        .unwrap();
    assert_eq!(names, ["KEPT.TXT"]);

    let entry = vol.import_reader("new.txt", &b"new"[..], 3).unwrap();
    assert_eq!(entry.position, 3072);
    assert_eq!(vol.ls().count(), 2);
}

#[test]
fn cd_to_missing_directory() {
    let mut store = small();
    let mut vol = Volume::open(&mut store).unwrap();
    let position = vol.current_position();

    assert!(matches!(vol.cd("MISSING"), Err(Error::NotFound(name)) if name == "MISSING"));
    assert_eq!(vol.current_position(), position);
}

#[test]
fn cd_into_subdirectory_and_back() {
    let mut store = small();
    let (root, sub, sub_offset) = {
        let mut vol = Volume::open(&mut store).unwrap();
        let sub = vol.create_cluster_chain(1).unwrap()[0];
        (vol.data_offset(), sub, vol.get_offset_from_cluster(sub).unwrap())
    };
    let entries = [
        (root, ShortDirEntry::new_directory(*b"SUB        ", sub)),
        (sub_offset, ShortDirEntry::new_directory(*b".          ", sub)),
        (
            sub_offset + 32,
            ShortDirEntry::new_directory(*b"..         ", ClusterId::FREE),
        ),
    ];
    for (offset, dirent) in entries {
        store.write(offset, &dirent.to_bytes().unwrap()).unwrap();
    }

    let mut vol = Volume::open(&mut store).unwrap();
    vol.import_reader("root.txt", &b"at root"[..], 7).unwrap();

    assert!(matches!(vol.cd("root.txt"), Err(Error::NotFound(_))));
    vol.cd("sub").unwrap();
    assert_eq!(vol.current_position(), sub_offset);

    let entry = vol.import_reader("b.txt", &b"in sub"[..], 6).unwrap();
    assert_eq!(entry.position, sub_offset + 64);
    let names = vol
        .ls()
        .map(|entry| entry.map(|entry| entry.short_name()))
        .collect::<fat::Result<Vec<_>>>()
        .unwrap();
    assert_eq!(names, [".", "..", "B.TXT"]);

    vol.cd("..").unwrap();
    assert_eq!(vol.current_position(), root);
    let names = vol
        .ls()
        .map(|entry| entry.map(|entry| entry.short_name()))
        .collect::<fat::Result<Vec<_>>>()
        .unwrap();
    assert_eq!(names, ["SUB", "ROOT.TXT"]);

    vol.cd("sub").unwrap();
    vol.root();
    assert_eq!(vol.current_position(), root);
}

#[test]
fn cd_into_cluster_outside_volume() {
    let mut store = tiny();
    let entries = [
        (3072, ShortDirEntry::new_directory(*b"BAD        ", ClusterId::new(1))),
        (3104, ShortDirEntry::new_directory(*b"FAR        ", ClusterId::new(100))),
    ];
    for (offset, dirent) in entries {
        store.write(offset, &dirent.to_bytes().unwrap()).unwrap();
    }

    let mut vol = Volume::open(&mut store).unwrap();
    assert!(matches!(
        vol.cd("bad"),
        Err(Error::CorruptChain { at, .. }) if at == ClusterId::new(1)
    ));
    assert!(matches!(
        vol.cd("far"),
        Err(Error::CorruptChain { at, .. }) if at == ClusterId::new(100)
    ));
    assert_eq!(vol.current_position(), 3072);
    assert_eq!(vol.ls().count(), 2);
}

#[test]
fn mapping_stays_inside_data_area() {
    let mut store = tiny();
    let vol = Volume::open(&mut store).unwrap();

    assert_eq!(vol.get_offset_from_cluster(ClusterId::new(4)).unwrap(), 4096);
    assert_eq!(vol.get_cluster_from_offset(4607).unwrap(), ClusterId::new(4));
    for id in [0, 1, 5] {
        assert!(matches!(
            vol.get_offset_from_cluster(ClusterId::new(id)),
            Err(Error::ClusterOutOfRange(_))
        ));
    }
    for offset in [0, 3071, 4608] {
        assert!(matches!(
            vol.get_cluster_from_offset(offset),
            Err(Error::OffsetOutOfRange(o)) if o == offset
        ));
    }
}

/// 根目录放在4号簇时，数据区从4号簇开始，2、3号簇不可分配
#[test]
fn root_cluster_after_reserved_clusters() {
    let mut store = tiny();
    store.write(512 + 44, &4u32.to_le_bytes()).unwrap();
    store.write(2560 + 16, &0x0FFF_FFFFu32.to_le_bytes()).unwrap();

    let mut vol = Volume::open(&mut store).unwrap();
    assert_eq!(vol.cluster_count(), 3);
    assert_eq!(vol.current_position(), 3072);
    assert_eq!(
        vol.get_free_clusters(2).unwrap(),
        [ClusterId::new(5), ClusterId::new(6)]
    );
    assert!(matches!(
        vol.get_cluster_chain(ClusterId::new(3)),
        Err(Error::CorruptChain { .. })
    ));

    let content = b"0123456789";
    let entry = vol.import_reader("a.txt", &content[..], 10).unwrap();
    assert_eq!(entry.position, 3072);
    assert_eq!(entry.first_cluster, ClusterId::new(5));
    assert_eq!(vol.ls().collect::<fat::Result<Vec<_>>>().unwrap(), [entry.clone()]);
    assert_eq!(vol.read_file(&entry).unwrap(), content);
    drop(vol);

    assert_eq!(&store.read(3072, 11).unwrap()[..], b"A       TXT");
    assert_eq!(&store.read(3584, 10).unwrap()[..], content);
    assert_eq!(fat_entry(&store, 2560, ClusterId::new(3)), 0);
}

#[test]
fn full_directory_grows() {
    let mut store = small();
    let mut vol = Volume::open(&mut store).unwrap();
    let slots = vol.cluster_size() as usize / 32;

    for i in 0..slots {
        vol.import_reader(&format!("f{i}.txt"), &b"x"[..], 1).unwrap();
    }
    let root = ClusterId::new(2);
    assert_eq!(vol.get_cluster_chain(root).unwrap(), [root]);

    let entry = vol.import_reader("last.txt", &b"y"[..], 1).unwrap();
    let grown = ClusterId::new(3 + slots as u32);
    assert_eq!(vol.get_cluster_chain(root).unwrap(), [root, grown]);
    assert_eq!(entry.position, vol.get_offset_from_cluster(grown).unwrap());
    assert_eq!(entry.first_cluster, grown.next());

    let listed = vol.ls().collect::<fat::Result<Vec<_>>>().unwrap();
    assert_eq!(listed.len(), slots + 1);
    assert_eq!(listed[slots].short_name(), "LAST.TXT");
}

#[test]
fn import_file_spanning_clusters() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("data.bin");
    let content: Vec<u8> = (0..1300u32).map(|i| (i % 251) as u8).collect();
    fs::write(&path, &content).unwrap();

    let mut store = small();
    let mut vol = Volume::open(&mut store).unwrap();
    let entry = vol.import_file(&path).unwrap();

    assert_eq!(entry.short_name(), "DATA.BIN");
    assert_eq!(entry.size, 1300);
    assert_eq!(vol.get_cluster_chain(entry.first_cluster).unwrap().len(), 3);
    assert_eq!(vol.read_file(&entry).unwrap(), content);
}

/// 读完数据后先报一次`Interrupted`
struct Interrupting<'a> {
    data: &'a [u8],
    interrupted: bool,
}

impl Read for Interrupting<'_> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.data.is_empty() && !self.interrupted {
            self.interrupted = true;
            return Err(io::ErrorKind::Interrupted.into());
        }
        self.data.read(buf)
    }
}

#[test]
fn interrupted_read_after_full_cluster() {
    let mut store = small();
    let mut vol = Volume::open(&mut store).unwrap();
    let content = [7u8; 512];
    let reader = Interrupting {
        data: &content,
        interrupted: false,
    };

    let entry = vol.import_reader("full.bin", reader, 512).unwrap();
    assert_eq!(vol.get_cluster_chain(entry.first_cluster).unwrap().len(), 1);
    assert_eq!(vol.read_file(&entry).unwrap(), content);
}

#[test]
fn empty_file_takes_one_cluster() {
    let mut store = small();
    let mut vol = Volume::open(&mut store).unwrap();

    let entry = vol.import_reader("empty", io::empty(), 0).unwrap();
    assert_eq!(entry.size, 0);
    assert_eq!(vol.get_cluster_chain(entry.first_cluster).unwrap().len(), 1);
    assert!(vol.read_file(&entry).unwrap().is_empty());
}

#[test]
fn fat_writes_are_mirrored() {
    let mut store = small();
    let mut vol = Volume::open(&mut store).unwrap();
    let fat_size = vol.bpb().fat_sectors() as u64 * 512;
    let chain = vol.create_cluster_chain(3).unwrap();

    let (first, second) = (vol.fat_offset(), vol.fat_offset() + fat_size);
    for id in chain.iter().copied().chain([ClusterId::new(0), ClusterId::new(2)]) {
        assert_eq!(
            fat_entry(vol.store(), first, id),
            fat_entry(vol.store(), second, id)
        );
    }
    assert_eq!(fat_entry(vol.store(), second, chain[0]), chain[1].raw());
}

#[test]
fn reserved_top_bits_survive_allocation() {
    let mut store = tiny();
    store.write(2560 + 12, &0xF000_0000u32.to_le_bytes()).unwrap();

    let mut vol = Volume::open(&mut store).unwrap();
    assert_eq!(vol.get_free_clusters(1).unwrap(), [ClusterId::new(3)]);
    assert_eq!(vol.create_cluster_chain(1).unwrap(), [ClusterId::new(3)]);
    assert_eq!(
        fat_entry(vol.store(), 2560, ClusterId::new(3)),
        0xFFFF_FFFF
    );
    assert_eq!(
        vol.get_cluster_chain(ClusterId::new(3)).unwrap(),
        [ClusterId::new(3)]
    );
}

#[test]
fn cyclic_chain_is_corrupt() {
    let mut store = tiny();
    store.write(2560 + 12, &4u32.to_le_bytes()).unwrap();
    store.write(2560 + 16, &3u32.to_le_bytes()).unwrap();

    let vol = Volume::open(&mut store).unwrap();
    assert!(matches!(
        vol.get_cluster_chain(ClusterId::new(3)),
        Err(Error::CorruptChain { .. })
    ));
    assert!(matches!(
        vol.get_cluster_chain(ClusterId::new(2)),
        Ok(chain) if chain == [ClusterId::new(2)]
    ));
}

#[test]
fn dangling_chain_is_corrupt() {
    let mut store = tiny();
    store.write(2560 + 12, &9u32.to_le_bytes()).unwrap();

    let vol = Volume::open(&mut store).unwrap();
    assert!(matches!(
        vol.get_cluster_chain(ClusterId::new(3)),
        Err(Error::CorruptChain { at, .. }) if at == ClusterId::new(9)
    ));
    assert!(matches!(
        vol.get_cluster_chain(ClusterId::new(4)),
        Err(Error::CorruptChain { at, .. }) if at == ClusterId::FREE
    ));
}

#[test]
fn data_must_fill_the_chain() {
    let mut store = small();
    let mut vol = Volume::open(&mut store).unwrap();

    assert!(matches!(
        vol.import_reader("short.bin", &[1u8; 10][..], 2000),
        Err(Error::AllocationMismatch {
            allocated: 4,
            consumed: 1
        })
    ));
    assert!(matches!(
        vol.import_reader("long.bin", &[1u8; 600][..], 10),
        Err(Error::AllocationMismatch {
            allocated: 1,
            consumed: 2
        })
    ));
}

#[test]
fn rejects_oversized_and_unnamed_files() {
    let mut store = small();
    let mut vol = Volume::open(&mut store).unwrap();

    assert!(matches!(
        vol.import_reader("big.bin", io::empty(), 1 << 33),
        Err(Error::FileTooLarge(_))
    ));
    assert!(matches!(
        vol.import_reader("a?b", io::empty(), 0),
        Err(Error::InvalidName(_))
    ));
    assert_eq!(vol.ls().count(), 0);
}
