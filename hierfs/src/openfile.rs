use crate::config::SECTOR_SIZE;
use crate::error::Result;
use crate::header::FileHeader;
use crate::io::{BlockStorage, SectorNumber};

/// A byte addressable view over the data sectors of one file header.
///
/// Files have a fixed length: reads and writes are clamped to it, and both report
/// how many bytes were actually transferred.
#[derive(Debug, Clone)]
pub struct OpenFile {
    header_sector: SectorNumber,
    header: FileHeader,
    seek_position: usize,
}

impl OpenFile {
    /// Opens the file whose header lives in `sector`.
    pub fn open<T: BlockStorage>(dev: &mut T, sector: SectorNumber) -> Result<Self> {
        let header = FileHeader::fetch_from(dev, sector)?;
        Ok(Self::from_header(sector, header))
    }

    /// Wraps a header that is already in memory, e.g. one that has not been
    /// written to disk yet.
    pub fn from_header(header_sector: SectorNumber, header: FileHeader) -> Self {
        Self {
            header_sector,
            header,
            seek_position: 0,
        }
    }

    pub fn header_sector(&self) -> SectorNumber {
        self.header_sector
    }

    pub fn header(&self) -> &FileHeader {
        &self.header
    }

    pub fn length(&self) -> usize {
        self.header.file_length()
    }

    /// Bytes between the seek position and the end of the file.
    pub fn remaining(&self) -> usize {
        self.length().saturating_sub(self.seek_position)
    }

    pub fn seek(&mut self, position: usize) {
        self.seek_position = position;
    }

    /// Reads from the current seek position, advancing it.
    pub fn read<T: BlockStorage>(&mut self, dev: &mut T, buf: &mut [u8]) -> Result<usize> {
        let read = self.read_at(dev, buf, self.seek_position)?;
        self.seek_position += read;
        Ok(read)
    }

    /// Writes at the current seek position, advancing it.
    pub fn write<T: BlockStorage>(&mut self, dev: &mut T, buf: &[u8]) -> Result<usize> {
        let written = self.write_at(dev, buf, self.seek_position)?;
        self.seek_position += written;
        Ok(written)
    }

    pub fn read_at<T: BlockStorage>(
        &self,
        dev: &mut T,
        buf: &mut [u8],
        offset: usize,
    ) -> Result<usize> {
        let len = self.clamp(buf.len(), offset);
        if len == 0 {
            return Ok(0);
        }

        let mut sector_buf = [0u8; SECTOR_SIZE];
        let mut done = 0;
        while done < len {
            let pos = offset + done;
            let in_sector = pos % SECTOR_SIZE;
            let chunk = (SECTOR_SIZE - in_sector).min(len - done);
            dev.read_sector(self.header.byte_to_sector(pos), &mut sector_buf)?;
            buf[done..done + chunk].copy_from_slice(&sector_buf[in_sector..in_sector + chunk]);
            done += chunk;
        }
        Ok(len)
    }

    pub fn write_at<T: BlockStorage>(&self, dev: &mut T, buf: &[u8], offset: usize) -> Result<usize> {
        let len = self.clamp(buf.len(), offset);
        if len == 0 {
            return Ok(0);
        }

        let mut sector_buf = [0u8; SECTOR_SIZE];
        let mut done = 0;
        while done < len {
            let pos = offset + done;
            let in_sector = pos % SECTOR_SIZE;
            let chunk = (SECTOR_SIZE - in_sector).min(len - done);
            let sector = self.header.byte_to_sector(pos);
            // Partial sectors keep the bytes around the written range.
            if chunk < SECTOR_SIZE {
                dev.read_sector(sector, &mut sector_buf)?;
            }
            sector_buf[in_sector..in_sector + chunk].copy_from_slice(&buf[done..done + chunk]);
            dev.write_sector(sector, &sector_buf)?;
            done += chunk;
        }
        Ok(len)
    }

    fn clamp(&self, requested: usize, offset: usize) -> usize {
        let length = self.length();
        if offset >= length {
            0
        } else {
            requested.min(length - offset)
        }
    }
}
