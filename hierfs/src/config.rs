use crate::error::{FsError, Result};
use crate::io::SectorNumber;

/// Bytes per disk sector, the unit of allocation.
pub const SECTOR_SIZE: usize = 128;

/// Longest name a single path segment may carry. Entries reserve one more byte for
/// the terminating NUL.
pub const FILE_NAME_MAX_LEN: usize = 9;

/// Number of data sector slots in a file header. The header stores the file size and
/// the sector count ahead of the slots, all as 32-bit words, in exactly one sector.
pub const NUM_DIRECT: usize = (SECTOR_SIZE - 2 * 4) / 4;

/// Files have a fixed size chosen at creation and cannot outgrow their header.
pub const MAX_FILE_SIZE: usize = NUM_DIRECT * SECTOR_SIZE;

/// On-disk width of one directory entry.
pub const DIRECTORY_ENTRY_SIZE: usize = 16;

/// Well known location of the free sector bitmap's header.
pub const FREE_MAP_SECTOR: SectorNumber = 0;
/// Well known location of the root directory's header.
pub const DIRECTORY_SECTOR: SectorNumber = 1;

const DEFAULT_NUM_SECTORS: usize = 32 * 32;
const DEFAULT_DIR_ENTRIES: usize = 64;
const DEFAULT_MAX_PATH_DEPTH: usize = 10;

/// Geometry and limits of one file store.
///
/// The same configuration must be used to format and later mount a disk; `mount`
/// checks the bootstrap objects against it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Config {
    num_sectors: usize,
    dir_entries: usize,
    max_path_depth: usize,
}

impl Config {
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }

    /// Total sectors tracked by the free map.
    pub fn num_sectors(&self) -> usize {
        self.num_sectors
    }

    /// Fixed entry count of every directory table.
    pub fn dir_entries(&self) -> usize {
        self.dir_entries
    }

    /// Most segments a path may contain.
    pub fn max_path_depth(&self) -> usize {
        self.max_path_depth
    }

    /// Byte length of the persisted free map.
    pub fn free_map_file_size(&self) -> usize {
        (self.num_sectors + 7) / 8
    }

    /// Byte length of one persisted directory table.
    pub fn directory_file_size(&self) -> usize {
        self.dir_entries * DIRECTORY_ENTRY_SIZE
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            num_sectors: DEFAULT_NUM_SECTORS,
            dir_entries: DEFAULT_DIR_ENTRIES,
            max_path_depth: DEFAULT_MAX_PATH_DEPTH,
        }
    }
}

#[derive(Debug, Default)]
pub struct ConfigBuilder {
    num_sectors: Option<usize>,
    dir_entries: Option<usize>,
    max_path_depth: Option<usize>,
}

impl ConfigBuilder {
    pub fn with_num_sectors(mut self, sectors: usize) -> Self {
        self.num_sectors = Some(sectors);
        self
    }

    pub fn with_dir_entries(mut self, entries: usize) -> Self {
        self.dir_entries = Some(entries);
        self
    }

    pub fn with_max_path_depth(mut self, depth: usize) -> Self {
        self.max_path_depth = Some(depth);
        self
    }

    /// Validates the requested geometry. Both bootstrap objects must fit in a single
    /// header's worth of data sectors.
    pub fn build(self) -> Result<Config> {
        let config = Config {
            num_sectors: self.num_sectors.unwrap_or(DEFAULT_NUM_SECTORS),
            dir_entries: self.dir_entries.unwrap_or(DEFAULT_DIR_ENTRIES),
            max_path_depth: self.max_path_depth.unwrap_or(DEFAULT_MAX_PATH_DEPTH),
        };

        if config.num_sectors < 2 {
            return Err(FsError::InvalidConfig(format!(
                "{} sectors cannot hold the two bootstrap headers",
                config.num_sectors
            )));
        }
        if config.free_map_file_size() > MAX_FILE_SIZE {
            return Err(FsError::InvalidConfig(format!(
                "a free map for {} sectors exceeds the {} byte file limit",
                config.num_sectors, MAX_FILE_SIZE
            )));
        }
        if config.dir_entries == 0 || config.directory_file_size() > MAX_FILE_SIZE {
            return Err(FsError::InvalidConfig(format!(
                "directory tables of {} entries do not fit in one file",
                config.dir_entries
            )));
        }
        if config.max_path_depth == 0 {
            return Err(FsError::InvalidConfig(
                "paths must allow at least one segment".to_string(),
            ));
        }
        Ok(config)
    }
}
