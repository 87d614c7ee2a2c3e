use log::debug;
use zerocopy::byteorder::{LittleEndian, U32};
use zerocopy::{AsBytes, FromBytes, FromZeroes};

use crate::alloc::FreeMap;
use crate::config::{MAX_FILE_SIZE, NUM_DIRECT, SECTOR_SIZE};
use crate::error::{FsError, Result};
use crate::io::{BlockStorage, SectorNumber};

type Le32 = U32<LittleEndian>;

/// On-disk image of a file header. This structure __must be exactly one sector.__
#[repr(C)]
#[derive(AsBytes, FromBytes, FromZeroes)]
struct RawHeader {
    /// The total size of the file in bytes.
    num_bytes: Le32,
    /// The number of data sectors in use.
    num_sectors: Le32,
    /// Data sectors in file order. Slots past `num_sectors` are zero.
    data_sectors: [Le32; NUM_DIRECT],
}

const _: () = assert!(std::mem::size_of::<RawHeader>() == SECTOR_SIZE);

/// The inode of this file system: the size of a file and the sectors holding its
/// bytes, in order. Every file and directory owns exactly one header sector.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileHeader {
    num_bytes: usize,
    data_sectors: Vec<SectorNumber>,
}

fn sectors_for(bytes: usize) -> usize {
    (bytes + SECTOR_SIZE - 1) / SECTOR_SIZE
}

impl FileHeader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claims enough data sectors from `free_map` to hold `file_size` bytes.
    ///
    /// On failure every sector claimed by this call is handed back, leaving the
    /// free map as it was.
    pub fn allocate(&mut self, free_map: &mut FreeMap, file_size: usize) -> Result<()> {
        debug_assert!(self.data_sectors.is_empty(), "header is already allocated");
        if file_size > MAX_FILE_SIZE {
            return Err(FsError::FileTooLarge {
                requested: file_size,
                max: MAX_FILE_SIZE,
            });
        }

        let needed = sectors_for(file_size);
        if free_map.num_clear() < needed {
            return Err(FsError::OutOfSpace);
        }

        let mut claimed = Vec::with_capacity(needed);
        for _ in 0..needed {
            match free_map.find_and_claim() {
                Some(sector) => claimed.push(sector),
                None => {
                    for sector in claimed {
                        free_map.clear(sector);
                    }
                    return Err(FsError::OutOfSpace);
                }
            }
        }

        debug!("allocated {} data sectors for {} bytes", needed, file_size);
        self.num_bytes = file_size;
        self.data_sectors = claimed;
        Ok(())
    }

    /// Returns every data sector to `free_map`. The header sector itself is the
    /// caller's to release.
    pub fn deallocate(&self, free_map: &mut FreeMap) {
        for &sector in &self.data_sectors {
            free_map.clear(sector);
        }
    }

    pub fn fetch_from<T: BlockStorage>(dev: &mut T, sector: SectorNumber) -> Result<Self> {
        let mut buf = [0u8; SECTOR_SIZE];
        dev.read_sector(sector, &mut buf)?;
        let raw = RawHeader::read_from(&buf[..])
            .ok_or_else(|| FsError::Corrupted(format!("unreadable header at {}", sector)))?;

        let num_bytes = raw.num_bytes.get() as usize;
        let num_sectors = raw.num_sectors.get() as usize;
        if num_bytes > MAX_FILE_SIZE || num_sectors != sectors_for(num_bytes) {
            return Err(FsError::Corrupted(format!(
                "header at sector {} claims {} bytes in {} sectors",
                sector, num_bytes, num_sectors
            )));
        }

        let data_sectors: Vec<SectorNumber> = raw.data_sectors[..num_sectors]
            .iter()
            .map(|s| s.get() as SectorNumber)
            .collect();
        if let Some(bad) = data_sectors.iter().find(|&&s| s >= dev.sector_count()) {
            return Err(FsError::Corrupted(format!(
                "header at sector {} points past the disk at {}",
                sector, bad
            )));
        }

        Ok(Self {
            num_bytes,
            data_sectors,
        })
    }

    pub fn write_back<T: BlockStorage>(&self, dev: &mut T, sector: SectorNumber) -> Result<()> {
        let mut raw = RawHeader::new_zeroed();
        raw.num_bytes = Le32::new(self.num_bytes as u32);
        raw.num_sectors = Le32::new(self.data_sectors.len() as u32);
        for (slot, &data) in raw.data_sectors.iter_mut().zip(&self.data_sectors) {
            *slot = Le32::new(data as u32);
        }
        dev.write_sector(sector, raw.as_bytes())?;
        Ok(())
    }

    /// Maps a byte offset within the file to the disk sector holding it.
    pub fn byte_to_sector(&self, offset: usize) -> SectorNumber {
        self.data_sectors[offset / SECTOR_SIZE]
    }

    pub fn file_length(&self) -> usize {
        self.num_bytes
    }

    pub fn data_sectors(&self) -> &[SectorNumber] {
        &self.data_sectors
    }

    /// Human readable summary used by the debug dump.
    pub fn describe(&self) -> String {
        let sectors: String = self
            .data_sectors
            .iter()
            .map(|sector| format!(" {}", sector))
            .collect();
        format!("File size: {}.  File sectors:{}", self.num_bytes, sectors)
    }
}
