use log::debug;

use crate::alloc::FreeMap;
use crate::directory::Directory;
use crate::error::Result;
use crate::header::FileHeader;
use crate::io::{BlockStorage, SectorNumber};
use crate::openfile::OpenFile;

/// Collects the working copies touched by one mutating operation.
///
/// Nothing reaches the disk until `commit`. Dropping the transaction instead
/// discards every staged change, so an operation that bails out with `?` leaves the
/// disk exactly as it found it.
pub struct Transaction {
    label: &'static str,
    free_map: FreeMap,
    headers: Vec<(SectorNumber, FileHeader)>,
    directories: Vec<(OpenFile, Directory)>,
    committed: bool,
}

impl Transaction {
    /// Starts a transaction around a freshly loaded copy of the free map.
    pub fn begin(label: &'static str, free_map: FreeMap) -> Self {
        Self {
            label,
            free_map,
            headers: Vec::new(),
            directories: Vec::new(),
            committed: false,
        }
    }

    pub fn free_map(&mut self) -> &mut FreeMap {
        &mut self.free_map
    }

    /// Stages `header` to be written to `sector`.
    pub fn write_header(&mut self, sector: SectorNumber, header: FileHeader) {
        self.headers.push((sector, header));
    }

    /// Stages `directory` to be written into `file`. Directories are written in the
    /// order they were staged.
    pub fn write_directory(&mut self, file: OpenFile, directory: Directory) {
        self.directories.push((file, directory));
    }

    /// Persists headers, then directories, then the free map.
    pub fn commit<T: BlockStorage>(mut self, dev: &mut T, free_map_file: &OpenFile) -> Result<()> {
        for (sector, header) in &self.headers {
            header.write_back(dev, *sector)?;
        }
        for (file, directory) in &self.directories {
            directory.write_back(file, dev)?;
        }
        self.free_map.write_back(free_map_file, dev)?;
        dev.sync_disk()?;

        self.committed = true;
        debug!(
            "{}: committed {} headers and {} directories",
            self.label,
            self.headers.len(),
            self.directories.len()
        );
        Ok(())
    }
}

impl Drop for Transaction {
    fn drop(&mut self) {
        if !self.committed {
            debug!("{}: discarding uncommitted changes", self.label);
        }
    }
}
