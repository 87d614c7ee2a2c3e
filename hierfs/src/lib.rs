//! A small hierarchical file system over a fixed size sector device.
//!
//! Files have a fixed size set at creation, every directory is a fixed capacity
//! table of names, and free space is tracked by a bitmap of sectors. The free map
//! and the root directory are themselves files whose headers live in sectors 0
//! and 1.
//!
//! ```no_run
//! use hierfs::io::{BlockStorage, FileDisk};
//! use hierfs::{Config, FileSystem};
//!
//! let config = Config::default();
//! let dev = FileDisk::open_disk("DISK", config.num_sectors()).unwrap();
//! let fs = FileSystem::format(dev, config).unwrap();
//! fs.create_directory("/docs").unwrap();
//! fs.create("/docs/readme", 100).unwrap();
//! print!("{}", fs.list_recursive("/").unwrap());
//! ```

mod alloc;
mod config;
mod directory;
mod error;
mod fs;
mod handle;
mod header;
pub mod io;
mod openfile;
mod path;
mod txn;

pub use crate::config::{
    Config, ConfigBuilder, DIRECTORY_ENTRY_SIZE, DIRECTORY_SECTOR, FILE_NAME_MAX_LEN,
    FREE_MAP_SECTOR, MAX_FILE_SIZE, NUM_DIRECT, SECTOR_SIZE,
};
pub use crate::error::{FsError, Result};
pub use crate::fs::FileSystem;
pub use crate::handle::OpenFileId;
