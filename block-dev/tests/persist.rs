use std::fs;

use block_dev::{BLOCK_SIZE, BlockDevice, BlockStore, Error};

fn sample() -> BlockStore {
    let mut store = BlockStore::new();
    for (addr, seed) in [(0u32, 1u8), (63, 0x4c), (64, 2), (4096, 0xee), (0x00ff_ffff, 9)] {
        let block: Vec<u8> = (0..BLOCK_SIZE).map(|i| seed ^ i as u8).collect();
        store.write_block(addr, &block).unwrap();
    }
    store
}

#[test]
fn dictionary_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("card.dict");

    let store = sample();
    store.export_as_dictionary(&path).unwrap();
    assert_eq!(
        fs::metadata(&path).unwrap().len() as usize,
        store.block_count() * (4 + BLOCK_SIZE)
    );

    let mut restored = BlockStore::new();
    restored.import_from_dictionary(&path).unwrap();
    assert_eq!(restored, store);
}

#[test]
fn image_round_trip_keeps_content_in_range() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("card.img");

    let mut store = BlockStore::new();
    store.write(3 * 512, b"first").unwrap();
    store.write(9 * 512 + 500, b"last").unwrap();
    store.export_as_image(&path).unwrap();
    assert_eq!(fs::metadata(&path).unwrap().len() as usize, 7 * BLOCK_SIZE);

    // 镜像从最小块开始，导入后地址整体前移
    let mut restored = BlockStore::new();
    restored.import_from_image(&path).unwrap();
    assert_eq!(restored.block_list(), [0, 6]);
    assert_eq!(restored.read(0, 5).unwrap(), b"first");
    assert_eq!(restored.read(6 * 512 + 500, 4).unwrap(), b"last");
}

#[test]
fn export_of_empty_store_fails() {
    let dir = tempfile::tempdir().unwrap();
    let store = BlockStore::new();
    assert!(matches!(
        store.export_as_image(dir.path().join("empty.img")),
        Err(Error::Empty)
    ));
}

#[test]
fn missing_file_is_io_error() {
    let dir = tempfile::tempdir().unwrap();
    let mut store = BlockStore::new();
    assert!(matches!(
        store.import_from_dictionary(dir.path().join("nope.dict")),
        Err(Error::Io(_))
    ));
}

#[test]
fn block_device_checks_buffer_length() {
    let mut store = sample();
    let mut buf = [0u8; BLOCK_SIZE];
    BlockDevice::read_block(&store, 63, &mut buf).unwrap();
    assert_eq!(buf[0], 0x4c);

    let mut short = [0u8; 16];
    assert!(matches!(
        BlockDevice::read_block(&store, 63, &mut short),
        Err(Error::Size { .. })
    ));
    assert!(BlockDevice::write_block(&mut store, 1, &short).is_err());
    assert_eq!(store.block_count(), 5);
}
