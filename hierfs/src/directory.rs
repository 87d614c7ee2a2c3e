//! A directory is a fixed length table of name to header-sector bindings, stored as
//! the contents of an ordinary file.
//!
//! The table never grows: once every slot is in use no more names can be added.
//! A `Directory` in memory is a working copy. It reflects the disk only after
//! `fetch_from`, and the disk reflects it only after `write_back`.

use zerocopy::byteorder::{LittleEndian, U32};
use zerocopy::{AsBytes, FromBytes, FromZeroes};

use crate::config::{DIRECTORY_ENTRY_SIZE, FILE_NAME_MAX_LEN};
use crate::error::{FsError, Result};
use crate::header::FileHeader;
use crate::io::{BlockStorage, SectorNumber};
use crate::openfile::OpenFile;

const EMPTY_FOLDER: &str = "Empty Folder";

#[repr(C)]
#[derive(AsBytes, FromBytes, FromZeroes)]
struct RawEntry {
    in_use: u8,
    is_directory: u8,
    /// NUL terminated.
    name: [u8; FILE_NAME_MAX_LEN + 1],
    sector: U32<LittleEndian>,
}

const _: () = assert!(std::mem::size_of::<RawEntry>() == DIRECTORY_ENTRY_SIZE);

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DirectoryEntry {
    pub in_use: bool,
    pub is_directory: bool,
    /// Header sector of the named file. Meaningless unless `in_use`.
    pub sector: SectorNumber,
    pub name: String,
}

impl DirectoryEntry {
    fn decode(raw: &RawEntry) -> Result<Self> {
        if raw.in_use == 0 {
            return Ok(Self::default());
        }
        let len = raw
            .name
            .iter()
            .position(|&c| c == 0)
            .ok_or_else(|| FsError::Corrupted("unterminated directory entry".to_string()))?;
        let name = std::str::from_utf8(&raw.name[..len])
            .map_err(|_| FsError::Corrupted("directory entry name is not utf-8".to_string()))?;
        Ok(Self {
            in_use: true,
            is_directory: raw.is_directory != 0,
            sector: raw.sector.get() as SectorNumber,
            name: name.to_string(),
        })
    }

    fn encode(&self) -> RawEntry {
        let mut raw = RawEntry::new_zeroed();
        raw.in_use = self.in_use as u8;
        raw.is_directory = self.is_directory as u8;
        let bytes = self.name.as_bytes();
        let len = bytes.len().min(FILE_NAME_MAX_LEN);
        raw.name[..len].copy_from_slice(&bytes[..len]);
        raw.sector = U32::new(self.sector as u32);
        raw
    }

    fn tag(&self) -> &'static str {
        if self.is_directory {
            "[D]"
        } else {
            "[F]"
        }
    }
}

/// Checks that `name` can be stored in a single entry.
pub fn validate_name(name: &str) -> Result<()> {
    if name.is_empty() || name.contains('/') || name.contains('\0') {
        return Err(FsError::InvalidPath(name.to_string()));
    }
    if name.len() > FILE_NAME_MAX_LEN {
        return Err(FsError::NameTooLong {
            name: name.to_string(),
            max: FILE_NAME_MAX_LEN,
        });
    }
    Ok(())
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Directory {
    table: Vec<DirectoryEntry>,
}

impl Directory {
    /// An empty table with `size` slots.
    pub fn new(size: usize) -> Self {
        Self {
            table: vec![DirectoryEntry::default(); size],
        }
    }

    /// Loads a table of `size` slots from offset 0 of `file`.
    pub fn fetch_from<T: BlockStorage>(file: &OpenFile, dev: &mut T, size: usize) -> Result<Self> {
        let mut buf = vec![0u8; size * DIRECTORY_ENTRY_SIZE];
        let read = file.read_at(dev, &mut buf, 0)?;
        if read != buf.len() {
            return Err(FsError::Corrupted(format!(
                "directory at sector {} holds {} bytes, expected {}",
                file.header_sector(),
                read,
                buf.len()
            )));
        }

        let table = buf
            .chunks_exact(DIRECTORY_ENTRY_SIZE)
            .map(|chunk| {
                RawEntry::read_from(chunk)
                    .ok_or_else(|| FsError::Corrupted("short directory entry".to_string()))
                    .and_then(|raw| DirectoryEntry::decode(&raw))
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { table })
    }

    /// Writes the whole table to offset 0 of `file`.
    pub fn write_back<T: BlockStorage>(&self, file: &OpenFile, dev: &mut T) -> Result<()> {
        let mut image = Vec::with_capacity(self.table.len() * DIRECTORY_ENTRY_SIZE);
        for entry in &self.table {
            image.extend_from_slice(entry.encode().as_bytes());
        }
        let written = file.write_at(dev, &image, 0)?;
        if written != image.len() {
            return Err(FsError::Corrupted(format!(
                "directory file at sector {} is too small for its table",
                file.header_sector()
            )));
        }
        Ok(())
    }

    pub fn capacity(&self) -> usize {
        self.table.len()
    }

    fn find_index(&self, name: &str) -> Option<usize> {
        self.table
            .iter()
            .position(|entry| entry.in_use && entry.name == name)
    }

    /// Header sector of the entry called `name`.
    pub fn find(&self, name: &str) -> Option<SectorNumber> {
        self.lookup(name).map(|entry| entry.sector)
    }

    pub fn lookup(&self, name: &str) -> Option<&DirectoryEntry> {
        self.find_index(name).map(|i| &self.table[i])
    }

    /// Binds `name` to `sector` in the first unused slot.
    pub fn add(&mut self, name: &str, sector: SectorNumber, is_directory: bool) -> Result<()> {
        validate_name(name)?;
        if self.find_index(name).is_some() {
            return Err(FsError::NameCollision(name.to_string()));
        }

        let slot = self
            .table
            .iter_mut()
            .find(|entry| !entry.in_use)
            .ok_or(FsError::DirectoryFull)?;
        *slot = DirectoryEntry {
            in_use: true,
            is_directory,
            sector,
            name: name.to_string(),
        };
        Ok(())
    }

    /// Frees the slot bound to `name`. The slot's sector is left as it was.
    pub fn remove(&mut self, name: &str) -> Result<()> {
        let i = self
            .find_index(name)
            .ok_or_else(|| FsError::PathNotFound(name.to_string()))?;
        self.table[i].in_use = false;
        self.table[i].is_directory = false;
        Ok(())
    }

    /// In-use entries in slot order.
    pub fn entries(&self) -> impl Iterator<Item = &DirectoryEntry> {
        self.table.iter().filter(|entry| entry.in_use)
    }

    pub fn is_empty(&self) -> bool {
        self.entries().next().is_none()
    }

    /// One `name [F]` or `name [D]` line per entry.
    pub fn list(&self) -> String {
        self.entries()
            .map(|entry| format!("{} {}\n", entry.name, entry.tag()))
            .collect()
    }

    /// Lists this table and, depth first, every directory below it. Each level is
    /// indented by two more spaces.
    ///
    /// `ancestors` holds the header sectors of the directories being listed,
    /// outermost first; reaching one of them again means the tree has a cycle.
    pub fn recursive_list<T: BlockStorage>(
        &self,
        dev: &mut T,
        depth: usize,
        ancestors: &mut Vec<SectorNumber>,
        out: &mut String,
    ) -> Result<()> {
        let indent = "  ".repeat(depth);
        if self.is_empty() {
            out.push_str(&format!("{}{}\n", indent, EMPTY_FOLDER));
            return Ok(());
        }

        for entry in self.entries() {
            out.push_str(&format!("{}{} {}\n", indent, entry.name, entry.tag()));
            if !entry.is_directory {
                continue;
            }
            if ancestors.contains(&entry.sector) {
                return Err(FsError::Corrupted(format!(
                    "directory {} at sector {} contains itself",
                    entry.name, entry.sector
                )));
            }
            let file = OpenFile::open(dev, entry.sector)?;
            let child = Directory::fetch_from(&file, dev, self.capacity())?;
            ancestors.push(entry.sector);
            let listed = child.recursive_list(dev, depth + 1, ancestors, out);
            ancestors.pop();
            listed?;
        }
        Ok(())
    }

    /// Every entry with its header sector and header contents.
    pub fn print<T: BlockStorage>(&self, dev: &mut T) -> Result<String> {
        let mut out = String::from("Directory contents:\n");
        for entry in self.entries() {
            let hdr = FileHeader::fetch_from(dev, entry.sector)?;
            out.push_str(&format!(
                "Name: {}, Sector: {}\n{}\n",
                entry.name,
                entry.sector,
                hdr.describe()
            ));
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alloc::FreeMap;
    use crate::io::{FileDisk, FileDiskBuilder};

    fn create_test_device() -> FileDisk {
        FileDiskBuilder::from(tempfile::tempfile().unwrap())
            .with_sector_count(64)
            .build()
            .expect("Could not initialize disk emulator.")
    }

    /// Formats a directory file of `size` entries whose header is at `sector`.
    fn directory_file(
        dev: &mut FileDisk,
        map: &mut FreeMap,
        sector: SectorNumber,
        size: usize,
    ) -> OpenFile {
        map.mark(sector);
        let mut hdr = FileHeader::new();
        hdr.allocate(map, size * DIRECTORY_ENTRY_SIZE).unwrap();
        hdr.write_back(dev, sector).unwrap();
        let file = OpenFile::from_header(sector, hdr);
        Directory::new(size).write_back(&file, dev).unwrap();
        file
    }

    #[test]
    fn add_find_and_remove() {
        let mut dir = Directory::new(4);
        dir.add("foo", 5, false).unwrap();

        assert_eq!(dir.find("foo"), Some(5));
        assert_eq!(dir.find("fo"), None);
        assert_eq!(dir.find("FOO"), None);

        dir.remove("foo").unwrap();
        assert_eq!(dir.find("foo"), None);
        assert!(matches!(dir.remove("foo"), Err(FsError::PathNotFound(_))));
    }

    #[test]
    fn duplicate_names_collide() {
        let mut dir = Directory::new(4);
        dir.add("foo", 5, false).unwrap();
        let before = dir.clone();

        assert!(matches!(
            dir.add("foo", 6, true),
            Err(FsError::NameCollision(_))
        ));
        assert_eq!(dir, before);
    }

    #[test]
    fn full_table_rejects_new_names() {
        let mut dir = Directory::new(2);
        dir.add("a", 2, false).unwrap();
        dir.add("b", 3, false).unwrap();
        assert!(matches!(dir.add("c", 4, false), Err(FsError::DirectoryFull)));

        // A freed slot is reused.
        dir.remove("a").unwrap();
        dir.add("c", 4, false).unwrap();
        assert_eq!(dir.list(), "c [F]\nb [F]\n");
    }

    #[test]
    fn names_must_fit_an_entry() {
        let mut dir = Directory::new(2);
        assert!(matches!(
            dir.add("ten_chars!", 2, false),
            Err(FsError::NameTooLong { .. })
        ));
        assert!(matches!(dir.add("a/b", 2, false), Err(FsError::InvalidPath(_))));
        dir.add("nine_char", 2, false).unwrap();
    }

    #[test]
    fn table_survives_a_trip_through_disk() {
        let mut dev = create_test_device();
        let mut map = FreeMap::new(64);
        let file = directory_file(&mut dev, &mut map, 1, 8);

        let mut dir = Directory::new(8);
        dir.add("foo", 5, false).unwrap();
        dir.add("bar", 9, true).unwrap();
        dir.write_back(&file, &mut dev).unwrap();

        let loaded = Directory::fetch_from(&file, &mut dev, 8).unwrap();
        let entries: Vec<_> = loaded
            .entries()
            .map(|e| (e.name.as_str(), e.sector, e.is_directory))
            .collect();
        assert_eq!(entries, vec![("foo", 5, false), ("bar", 9, true)]);
        assert_eq!(loaded, dir);
    }

    #[test]
    fn recursive_listing_indents_and_marks_empty_folders() {
        let mut dev = create_test_device();
        let mut map = FreeMap::new(64);
        map.mark(0);
        let root_file = directory_file(&mut dev, &mut map, 1, 4);
        let sub_file = directory_file(&mut dev, &mut map, 20, 4);
        let empty_file = directory_file(&mut dev, &mut map, 30, 4);

        let mut sub = Directory::new(4);
        sub.add("inner", 40, false).unwrap();
        sub.add("empty", 30, true).unwrap();
        sub.write_back(&sub_file, &mut dev).unwrap();
        assert!(Directory::fetch_from(&empty_file, &mut dev, 4).unwrap().is_empty());

        let mut root = Directory::new(4);
        root.add("a", 41, false).unwrap();
        root.add("sub", 20, true).unwrap();
        root.write_back(&root_file, &mut dev).unwrap();

        let mut out = String::new();
        root.recursive_list(&mut dev, 0, &mut vec![1], &mut out).unwrap();
        assert_eq!(
            out,
            "a [F]\nsub [D]\n  inner [F]\n  empty [D]\n    Empty Folder\n"
        );
    }

    #[test]
    fn empty_table_lists_nothing_flat() {
        let dir = Directory::new(4);
        assert_eq!(dir.list(), "");
        let mut out = String::new();
        let mut dev = create_test_device();
        dir.recursive_list(&mut dev, 1, &mut Vec::new(), &mut out).unwrap();
        assert_eq!(out, "  Empty Folder\n");
    }

    #[test]
    fn cycles_are_reported_instead_of_followed() {
        let mut dev = create_test_device();
        let mut map = FreeMap::new(64);
        let root_file = directory_file(&mut dev, &mut map, 1, 4);

        let mut root = Directory::new(4);
        root.add("loop", 1, true).unwrap();
        root.write_back(&root_file, &mut dev).unwrap();

        let mut out = String::new();
        let result = root.recursive_list(&mut dev, 0, &mut vec![1], &mut out);
        assert!(matches!(result, Err(FsError::Corrupted(_))));
    }
}
