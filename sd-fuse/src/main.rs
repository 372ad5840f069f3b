mod cli;

use std::fs;
use std::path::Path;

use anyhow::{Context, Result, anyhow};
use block_dev::{BLOCK_SIZE, BlockStore};
use clap::Parser;
use fat::{FormatOptions, Volume};
use sdcard::{Card, SdCard, hal};
use typed_bytesize::ByteSizeIec;

pub use self::cli::{Cli, Command};

fn main() -> Result<()> {
    env_logger::init();

    let cli = Cli::parse();
    match cli.command {
        Command::Format {
            size,
            cluster_sectors,
            label,
        } => {
            let mut opts = FormatOptions::new(ByteSizeIec::mib(size).0).volume_label(&label);
            if let Some(sectors) = cluster_sectors {
                opts = opts.sectors_per_cluster(sectors);
            }
            let mut store = BlockStore::new();
            fat::format(&mut store, &opts)?;
            save(&store, &cli.disk)?;
        }

        Command::Info => {
            let mut store = load(&cli.disk)?;
            let vol = Volume::open(&mut store)?;
            let bpb = vol.bpb();
            println!("label:               {}", String::from_utf8_lossy(bpb.volume_label()));
            println!("bytes per sector:    {}", bpb.sector_bytes());
            println!("sectors per cluster: {}", bpb.cluster_sectors());
            println!("reserved sectors:    {}", bpb.reserved_sectors());
            println!("FATs:                {} x {} sectors", bpb.fat_count(), bpb.fat_sectors());
            println!("total sectors:       {}", bpb.total_sectors());
            println!("root cluster:        {}", bpb.root_cluster());
            println!("clusters:            {}", vol.cluster_count());
            println!("fat offset:          {:#x}", vol.fat_offset());
            println!("data offset:         {:#x}", vol.data_offset());
            let unknown = || "unknown".to_owned();
            let free = vol.fs_info().free_count();
            let next = vol.fs_info().next_free();
            println!(
                "free (advisory):     {}",
                free.map_or_else(unknown, |n| n.to_string())
            );
            println!(
                "next free (advisory): {}",
                next.map_or_else(unknown, |n| n.to_string())
            );
        }

        Command::Ls { dir } => {
            let mut store = load(&cli.disk)?;
            let mut vol = Volume::open(&mut store)?;
            enter(&mut vol, &dir)?;
            for entry in vol.ls() {
                let entry = entry?;
                let kind = if entry.is_dir() { "<DIR>" } else { "" };
                println!(
                    "{:<12} {kind:>5} {:>10}  @{}",
                    entry.short_name(),
                    entry.size,
                    entry.first_cluster
                );
            }
        }

        Command::Import { files, dir } => {
            let mut store = load(&cli.disk)?;
            let mut vol = Volume::open(&mut store)?;
            enter(&mut vol, &dir)?;
            for file in &files {
                let entry = vol
                    .import_file(file)
                    .with_context(|| format!("failed to import {}", file.display()))?;
                println!("{} -> {}", file.display(), entry.short_name());
            }
            drop(vol);
            save(&store, &cli.disk)?;
        }

        Command::Export { path, out } => {
            let mut store = load(&cli.disk)?;
            let mut vol = Volume::open(&mut store)?;
            let (dir, name) = path.rsplit_once('/').unwrap_or(("", path.as_str()));
            enter(&mut vol, dir)?;

            let name = name.to_ascii_uppercase();
            let mut found = None;
            for entry in vol.ls() {
                let entry = entry?;
                if !entry.is_dir() && entry.short_name() == name {
                    found = Some(entry);
                    break;
                }
            }
            let entry = found.ok_or_else(|| anyhow!("{path} not found"))?;
            fs::write(&out, vol.read_file(&entry)?)?;
        }

        Command::Convert { out } => {
            let store = load(&cli.disk)?;
            save(&store, &out)?;
        }

        Command::Dump { addr } => {
            let mut store = load(&cli.disk)?;
            let card = SdCard::new(Card::emulated()?, &mut store);
            let mut block = vec![0; BLOCK_SIZE];
            card.read_blocks(addr, 1, &mut block)?;
            drop(card);

            match store.dump_block(addr) {
                Some(dump) => print!("{dump}"),
                None => println!("block {addr} is all zero"),
            }
        }

        Command::Card { handle } => {
            let card = Card::emulated()?;
            println!("CID: {}", hex(card.cid.as_bytes()));
            println!("CSD: {}", hex(card.csd.as_bytes()));
            println!(
                "product {} serial {:#010x}",
                String::from_utf8_lossy(card.cid.product_name()),
                card.cid.serial_number()
            );
            println!(
                "device size {:#x}, {} blocks of {BLOCK_SIZE} bytes",
                card.csd.device_size(),
                card.block_count()
            );
            if handle {
                for write in hal::init_writes(&card) {
                    println!("+{:<3} {}", write.offset, hex(&write.bytes));
                }
            }
        }
    }

    Ok(())
}

/// `*.dict`文件为字典格式
fn is_dictionary(path: &Path) -> bool {
    path.extension().is_some_and(|ext| ext == "dict")
}

fn load(path: &Path) -> Result<BlockStore> {
    let mut store = BlockStore::new();
    let loaded = if is_dictionary(path) {
        store.import_from_dictionary(path)
    } else {
        store.import_from_image(path)
    };
    loaded.with_context(|| format!("failed to load {}", path.display()))?;
    log::info!("loaded {} blocks from {}", store.block_count(), path.display());
    Ok(store)
}

fn save(store: &BlockStore, path: &Path) -> Result<()> {
    let saved = if is_dictionary(path) {
        store.export_as_dictionary(path)
    } else {
        store.export_as_image(path)
    };
    saved.with_context(|| format!("failed to save {}", path.display()))
}

/// 从根目录出发，逐级进入`/`分隔的目录
fn enter(vol: &mut Volume<'_>, dir: &str) -> Result<()> {
    vol.root();
    for name in dir.split('/').filter(|name| !name.is_empty()) {
        vol.cd(name)?;
    }
    Ok(())
}

fn hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}
