use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(version, about = "Build and inspect the disk behind the virtual SD card")]
pub struct Cli {
    /// Disk file, `*.dict` for the sparse dictionary format, raw image otherwise
    #[arg(long, short)]
    pub disk: PathBuf,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Write a fresh FAT32 volume to the disk
    Format {
        /// Disk size in MiB
        #[arg(long, short, default_value_t = 64)]
        size: u64,

        /// Sectors per cluster, chosen from the volume size if absent
        #[arg(long)]
        cluster_sectors: Option<u8>,

        #[arg(long, default_value = "NO NAME")]
        label: String,
    },

    /// Print the boot parameters of the volume
    Info,

    /// List a directory
    Ls {
        #[arg(default_value = "/")]
        dir: String,
    },

    /// Copy host files into a directory of the volume
    Import {
        #[arg(required = true)]
        files: Vec<PathBuf>,

        /// Target directory
        #[arg(long, short = 'C', default_value = "/")]
        dir: String,
    },

    /// Copy a file out of the volume
    Export { path: String, out: PathBuf },

    /// Rewrite the disk in the other file format
    Convert { out: PathBuf },

    /// Hex dump one block, read through the emulated card
    Dump { addr: u32 },

    /// Print the emulated card registers
    Card {
        /// Also print the writes made to the firmware SD handle
        #[arg(long = "hal")]
        handle: bool,
    },
}
