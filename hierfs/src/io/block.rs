use std::path::Path;

/// The sector number to access ranging from 0 (the first sector) to n - 1 (the last
/// sector) where n is number of sectors available.
pub type SectorNumber = usize;

/// Raw sector device underneath the file store. Every transfer moves exactly one
/// sector of `SECTOR_SIZE` bytes.
///
/// Tried to map as closely as possible to the prescribed interface found here:
/// http://web.mit.edu/6.033/1997/handouts/html/04sfs.html.
pub trait BlockStorage {
    /// Opens a disk at the specified path. This method does not validate the
    /// storage sectors, it is up for clients to ensure disks are appropriately initialized.
    fn open_disk<P: AsRef<Path>>(path: P, nsectors: usize) -> std::io::Result<Self>
    where
        Self: std::marker::Sized;
    /// Reads disk sector number into provided buffer.
    ///
    /// # Errors
    ///
    /// Attempting to read a sector out of range, or into a buffer smaller than one
    /// sector, will return an error.
    fn read_sector(&mut self, sector: SectorNumber, buf: &mut [u8]) -> std::io::Result<()>;
    /// Writes provided buffer into the specified sector number. Buffers longer than a
    /// sector are truncated.
    ///
    /// # Errors
    ///
    /// Attempting to write a sector out of range will return an error.
    fn write_sector(&mut self, sector: SectorNumber, buf: &[u8]) -> std::io::Result<()>;
    /// The total number of sectors the device exposes.
    fn sector_count(&self) -> usize;
    /// Flush any buffered disk IO from memory. This is useful if it must guaranteed
    /// the disk writes actually occurred, for instance, if being re-read from
    /// disk.
    fn sync_disk(&mut self) -> std::io::Result<()>;
}
