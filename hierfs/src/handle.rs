use std::collections::BTreeMap;

use log::warn;

use crate::error::{FsError, Result};
use crate::io::SectorNumber;
use crate::openfile::OpenFile;

/// Identifies an open file to callers outside the file system. Always positive
/// while valid; zero and negative values never name an open file.
pub type OpenFileId = i32;

/// Owns every open file and hands out ids for them. Ids are never reused, so a
/// closed id stays invalid for the lifetime of the table.
#[derive(Debug)]
pub struct HandleTable {
    next_id: OpenFileId,
    open: BTreeMap<OpenFileId, OpenFile>,
}

impl HandleTable {
    pub fn new() -> Self {
        Self {
            next_id: 1,
            open: BTreeMap::new(),
        }
    }

    pub fn insert(&mut self, file: OpenFile) -> Result<OpenFileId> {
        let id = self.next_id;
        self.next_id = id.checked_add(1).ok_or(FsError::TooManyOpenFiles)?;
        self.open.insert(id, file);
        Ok(id)
    }

    pub fn get_mut(&mut self, id: OpenFileId) -> Result<&mut OpenFile> {
        self.open.get_mut(&id).ok_or(FsError::InvalidHandle(id))
    }

    pub fn remove(&mut self, id: OpenFileId) -> Result<OpenFile> {
        self.open.remove(&id).ok_or(FsError::InvalidHandle(id))
    }

    /// Drops every handle whose file header lives in `sector`. Called once the
    /// sector has been reclaimed, so stale handles cannot reach reallocated data.
    pub fn revoke(&mut self, sector: SectorNumber) {
        self.open.retain(|id, file| {
            let stale = file.header_sector() == sector;
            if stale {
                warn!("revoking handle {} to removed file at sector {}", id, sector);
            }
            !stale
        });
    }
}

impl Default for HandleTable {
    fn default() -> Self {
        Self::new()
    }
}
