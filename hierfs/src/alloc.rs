use log::debug;

use crate::error::{FsError, Result};
use crate::io::{BlockStorage, SectorNumber};
use crate::openfile::OpenFile;

#[derive(Debug, PartialEq)]
pub enum State {
    Free,
    Used,
}

/// One bit per tracked item, packed into 64-bit words. A set bit means used.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bitmap {
    bitmap: Vec<u64>,
    num_bits: usize,
}

impl Bitmap {
    pub fn new(num_bits: usize) -> Self {
        Self {
            bitmap: vec![0; (num_bits + 63) / 64],
            num_bits,
        }
    }

    /// Rebuilds a bitmap from its persisted form, one byte per eight bits with bit 0
    /// of byte 0 tracking item 0.
    pub fn parse(buf: &[u8], num_bits: usize) -> Self {
        let mut map = Self::new(num_bits);
        for (i, word) in map.bitmap.iter_mut().enumerate() {
            let mut bytes = [0u8; 8];
            let start = (i * 8).min(buf.len());
            let end = (start + 8).min(buf.len());
            bytes[..end - start].copy_from_slice(&buf[start..end]);
            *word = u64::from_le_bytes(bytes);
        }
        // Bits past the end of the map are never allocatable.
        if let Some(last) = map.bitmap.last_mut() {
            let tail = num_bits % 64;
            if tail != 0 {
                *last &= (1u64 << tail) - 1;
            }
        }
        map
    }

    pub fn serialize(&self) -> Vec<u8> {
        self.bitmap
            .iter()
            .flat_map(|word| word.to_le_bytes())
            .take((self.num_bits + 7) / 8)
            .collect()
    }

    pub fn len(&self) -> usize {
        self.num_bits
    }

    pub fn get(&self, bit: usize) -> State {
        assert!(bit < self.num_bits, "bit {} outside bitmap", bit);
        // Grab the u64 containing the significant bit.
        let word = self.bitmap[bit / 64];
        let mask = 0b01_u64 << (bit % 64);
        if word & mask == 0 {
            State::Free
        } else {
            State::Used
        }
    }

    pub fn set_reserved(&mut self, bit: usize) {
        assert!(bit < self.num_bits, "bit {} outside bitmap", bit);
        self.bitmap[bit / 64] |= 0b01_u64 << (bit % 64);
    }

    pub fn set_free(&mut self, bit: usize) {
        assert!(bit < self.num_bits, "bit {} outside bitmap", bit);
        self.bitmap[bit / 64] &= !(0b01_u64 << (bit % 64));
    }

    pub fn num_clear(&self) -> usize {
        let used: usize = self.bitmap.iter().map(|w| w.count_ones() as usize).sum();
        self.num_bits - used
    }

    /// Iterates over every used bit in ascending order.
    pub fn used(&self) -> impl Iterator<Item = usize> + '_ {
        (0..self.num_bits).filter(move |&bit| self.get(bit) == State::Used)
    }
}

/// Implements a naive allocation policy. On each call to the iterator the next free
/// bit at or after the marker is returned; the caller decides whether to claim it.
///
/// ## Other Pre-Allocation Policies
///
/// 1. Allocation that attempts to find enough contiguous available sectors so data can be
///    allocated close together (speed ups through sequential reads).
/// 2. Allocation that attempts to spread randomly over sectors to prevent wear of physical
///    devices in the front section (that may be rewritten many times before allocating to
///    the back).
pub struct NextAvailableAllocation<'a> {
    /// Keeps track of the next starting place for looking for available sectors.
    marker: usize,
    bitmap: &'a Bitmap,
}

impl<'a> NextAvailableAllocation<'a> {
    pub fn new(bitmap: &'a Bitmap) -> Self {
        Self { marker: 0, bitmap }
    }
}

impl Iterator for NextAvailableAllocation<'_> {
    type Item = usize;

    fn next(&mut self) -> Option<Self::Item> {
        while self.marker < self.bitmap.len() {
            let candidate = self.marker;
            self.marker += 1;
            if let State::Free = self.bitmap.get(candidate) {
                return Some(candidate);
            }
        }
        None
    }
}

/// The free sector allocator. One bit per disk sector, persisted as the contents of
/// the file whose header lives in `FREE_MAP_SECTOR`.
///
/// A `FreeMap` is always a working copy: changes reach the disk only through
/// `write_back`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FreeMap {
    map: Bitmap,
}

impl FreeMap {
    /// An all clear map, used when formatting.
    pub fn new(num_sectors: usize) -> Self {
        Self {
            map: Bitmap::new(num_sectors),
        }
    }

    pub fn fetch_from<T: BlockStorage>(
        file: &OpenFile,
        dev: &mut T,
        num_sectors: usize,
    ) -> Result<Self> {
        let mut buf = vec![0; (num_sectors + 7) / 8];
        let read = file.read_at(dev, &mut buf, 0)?;
        if read != buf.len() {
            return Err(FsError::Corrupted(format!(
                "free map holds {} bytes, expected {}",
                read,
                buf.len()
            )));
        }
        Ok(Self {
            map: Bitmap::parse(&buf, num_sectors),
        })
    }

    pub fn write_back<T: BlockStorage>(&self, file: &OpenFile, dev: &mut T) -> Result<()> {
        let image = self.map.serialize();
        let written = file.write_at(dev, &image, 0)?;
        if written != image.len() {
            return Err(FsError::Corrupted(format!(
                "free map file holds {} of {} bytes",
                written,
                image.len()
            )));
        }
        Ok(())
    }

    /// Claims the lowest free sector.
    pub fn find_and_claim(&mut self) -> Option<SectorNumber> {
        let sector = NextAvailableAllocation::new(&self.map).next()?;
        self.map.set_reserved(sector);
        debug!("claimed sector {}", sector);
        Some(sector)
    }

    /// Forces a sector into use. Only valid for sectors nobody owns yet.
    pub fn mark(&mut self, sector: SectorNumber) {
        assert_eq!(
            self.map.get(sector),
            State::Free,
            "sector {} is already marked",
            sector
        );
        self.map.set_reserved(sector);
    }

    pub fn clear(&mut self, sector: SectorNumber) {
        assert_eq!(
            self.map.get(sector),
            State::Used,
            "sector {} is already free",
            sector
        );
        self.map.set_free(sector);
        debug!("released sector {}", sector);
    }

    pub fn num_clear(&self) -> usize {
        self.map.num_clear()
    }

    pub fn used_sectors(&self) -> impl Iterator<Item = SectorNumber> + '_ {
        self.map.used()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn can_read_and_write_values_to_bitmap() {
        let mut bmp = Bitmap::new(128);

        bmp.set_reserved(2);

        assert_eq!(bmp.get(0), State::Free);
        assert_eq!(bmp.get(2), State::Used);
    }

    #[test]
    fn can_set_values_at_ends_of_bitmap() {
        let mut bmp = Bitmap::new(4096);

        bmp.set_reserved(0);
        bmp.set_reserved(4095);

        assert_eq!(bmp.get(0), State::Used);
        assert_eq!(bmp.get(4095), State::Used);
    }

    #[test]
    fn can_toggle_sector_between_free_and_used() {
        let mut bmp = Bitmap::new(64);
        bmp.set_reserved(9);
        bmp.set_reserved(10);
        assert_eq!(bmp.get(10), State::Used);

        bmp.set_free(10);
        assert_eq!(bmp.get(10), State::Free);
        // Neighbours keep their state.
        assert_eq!(bmp.get(9), State::Used);
    }

    #[test]
    #[should_panic(expected = "outside bitmap")]
    fn out_of_range_access_panics() {
        Bitmap::new(10).get(10);
    }

    #[test]
    fn serialized_form_is_one_bit_per_sector() {
        let mut bmp = Bitmap::new(20);
        bmp.set_reserved(0);
        bmp.set_reserved(9);
        bmp.set_reserved(19);

        let bytes = bmp.serialize();
        assert_eq!(bytes, vec![0b0000_0001, 0b0000_0010, 0b0000_1000]);
        assert_eq!(Bitmap::parse(&bytes, 20), bmp);
    }

    #[test]
    fn parse_ignores_bits_past_the_end() {
        let bmp = Bitmap::parse(&[0xff, 0xff], 12);
        assert_eq!(bmp.num_clear(), 0);
        assert_eq!(bmp.used().count(), 12);
    }

    #[test]
    fn next_available_skips_used_sectors() {
        let mut bmp = Bitmap::new(8);
        bmp.set_reserved(0);
        bmp.set_reserved(1);
        bmp.set_reserved(3);

        let free: Vec<usize> = NextAvailableAllocation::new(&bmp).collect();
        assert_eq!(free, vec![2, 4, 5, 6, 7]);
    }

    #[test]
    fn find_and_claim_exhausts_the_map() {
        let mut map = FreeMap::new(3);
        assert_eq!(map.find_and_claim(), Some(0));
        assert_eq!(map.find_and_claim(), Some(1));
        assert_eq!(map.find_and_claim(), Some(2));
        assert_eq!(map.find_and_claim(), None);
        assert_eq!(map.num_clear(), 0);

        map.clear(1);
        assert_eq!(map.find_and_claim(), Some(1));
    }

    #[test]
    #[should_panic(expected = "already marked")]
    fn marking_a_used_sector_panics() {
        let mut map = FreeMap::new(8);
        map.mark(1);
        map.mark(1);
    }

    #[test]
    #[should_panic(expected = "already free")]
    fn clearing_a_free_sector_panics() {
        FreeMap::new(8).clear(3);
    }
}
