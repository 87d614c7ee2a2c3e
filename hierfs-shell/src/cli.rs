use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(about = "Inspect and modify a hierfs disk image")]
pub struct Cli {
    /// Disk image file
    #[arg(long, short, default_value = "DISK")]
    pub disk: PathBuf,

    /// Sectors on the disk
    #[arg(long)]
    pub sectors: Option<usize>,

    /// Entries per directory table
    #[arg(long)]
    pub dir_entries: Option<usize>,

    /// Most segments a path may have
    #[arg(long)]
    pub max_depth: Option<usize>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Create the image and write an empty file system to it
    Format,
    /// Create a directory
    Mkdir { path: String },
    /// Create a zero filled file of a fixed size
    Create { path: String, size: usize },
    /// Copy a host file into the image
    Cp { source: PathBuf, path: String },
    /// Print a file's contents
    Cat { path: String },
    /// List a directory
    Ls {
        /// List every directory below as well
        #[arg(short, long)]
        recursive: bool,
        #[arg(default_value = "/")]
        path: String,
    },
    /// Remove a file, or with -r a directory tree
    Rm {
        #[arg(short, long)]
        recursive: bool,
        path: String,
    },
    /// Dump the free map, bootstrap headers and root directory
    Print,
}
