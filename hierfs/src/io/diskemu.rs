use crate::config::SECTOR_SIZE;
use crate::io::{BlockStorage, SectorNumber};
use std::fs::{File, OpenOptions};
use std::io::prelude::*;
use std::io::{BufWriter, ErrorKind, SeekFrom};
use std::path::Path;

/// Emulates a sector addressed disk in userspace using a file as backing storage.
/// Sector `n` lives at byte offset `n * SECTOR_SIZE` of the file.
pub struct FileDisk {
    /// The file must be a fixed-size file some exact multiple of the size of a sector.
    fd: File,
    /// The total number of sectors available in the file store.
    sector_count: usize,
}

impl FileDisk {
    /// Returns ownership of the underlying file descriptor to the caller.
    pub fn into_file(self) -> File {
        self.fd
    }

    fn check_range(&self, sector: SectorNumber) -> std::io::Result<()> {
        if sector >= self.sector_count {
            return Err(std::io::Error::new(
                ErrorKind::InvalidInput,
                "sector out of range",
            ));
        }
        Ok(())
    }
}

impl BlockStorage for FileDisk {
    fn open_disk<P: AsRef<Path>>(dest: P, nsectors: usize) -> std::io::Result<Self>
    where
        Self: std::marker::Sized,
    {
        // Return error if the file does not exist rather than create one.
        let file = OpenOptions::new().read(true).write(true).open(dest)?;
        let len = file.metadata()?.len();
        if len < (nsectors * SECTOR_SIZE) as u64 {
            return Err(std::io::Error::new(
                ErrorKind::InvalidData,
                "disk image is smaller than the requested sector count",
            ));
        }

        Ok(FileDisk {
            fd: file,
            sector_count: nsectors,
        })
    }

    fn read_sector(&mut self, sector: SectorNumber, buf: &mut [u8]) -> std::io::Result<()> {
        self.check_range(sector)?;
        if buf.len() < SECTOR_SIZE {
            return Err(std::io::Error::new(
                ErrorKind::InvalidInput,
                "buffer does not contain enough space to read sector",
            ));
        }
        self.fd
            .seek(SeekFrom::Start((sector * SECTOR_SIZE) as u64))?;
        // Limit the read to just the sector specified.
        self.fd.read_exact(&mut buf[..SECTOR_SIZE])
    }

    /// This method truncates writes that exceed the sector size.
    fn write_sector(&mut self, sector: SectorNumber, buf: &[u8]) -> std::io::Result<()> {
        self.check_range(sector)?;
        self.fd
            .seek(SeekFrom::Start((sector * SECTOR_SIZE) as u64))?;

        let max = SECTOR_SIZE.min(buf.len());
        self.fd.write_all(&buf[..max])
    }

    fn sector_count(&self) -> usize {
        self.sector_count
    }

    fn sync_disk(&mut self) -> std::io::Result<()> {
        self.fd.sync_all()
    }
}

pub struct FileDiskBuilder {
    fd: File,
    sector_count: usize,
    clear: bool,
}

impl From<File> for FileDiskBuilder {
    fn from(fd: File) -> Self {
        FileDiskBuilder {
            fd,
            sector_count: 0,
            clear: true,
        }
    }
}

impl FileDiskBuilder {
    /// Sets the number of desired sectors in the device.
    pub fn with_sector_count(mut self, sectors: usize) -> Self {
        self.sector_count = sectors;
        self
    }

    /// Controls whether `build` zeroes the medium. Reopening an already formatted
    /// image must leave it alone.
    pub fn clear_medium(mut self, clear: bool) -> Self {
        self.clear = clear;
        self
    }

    /// This builder assumes ownership of the file descriptor used and, unless told
    /// otherwise, does destructive things to prepare the file for use.
    pub fn build(mut self) -> std::io::Result<FileDisk> {
        if self.sector_count == 0 {
            return Err(std::io::Error::new(
                ErrorKind::InvalidInput,
                "sector count must be greater than zero",
            ));
        }
        if self.clear {
            self.zero_sectors()?;
        }
        Ok(FileDisk {
            fd: self.fd,
            sector_count: self.sector_count,
        })
    }

    fn zero_sectors(&mut self) -> std::io::Result<()> {
        self.fd.seek(SeekFrom::Start(0))?;
        let mut bfd = BufWriter::new(&self.fd);
        // Zero out the "disk", buffering each write to prevent excessive syscalls.
        for _ in 0..self.sector_count {
            bfd.write_all(&[0x00; SECTOR_SIZE])?;
        }
        bfd.flush()
    }
}
