use log::{debug, info, warn};
use spin::Mutex;

use crate::alloc::FreeMap;
use crate::config::{Config, DIRECTORY_SECTOR, FREE_MAP_SECTOR};
use crate::directory::{Directory, DirectoryEntry};
use crate::error::{FsError, Result};
use crate::handle::{HandleTable, OpenFileId};
use crate::header::FileHeader;
use crate::io::{BlockStorage, SectorNumber};
use crate::openfile::OpenFile;
use crate::path::{self, Resolved};
use crate::txn::Transaction;

/// A hierarchical file system on a sector device.
///
/// # Layout
/// ==========================================================================
/// | Free map header | Root directory header | Everything else             |
/// ==========================================================================
///
/// The free sector bitmap and the root directory are ordinary files whose headers
/// sit in sectors 0 and 1, so they can be found when mounting. Every other file or
/// directory is found by following directory entries down from the root. Both
/// bootstrap files stay open for as long as the file system is mounted.
///
/// Mutating operations load working copies of the directory and free map they
/// need, and write them back only when every step succeeded. A failed operation
/// leaves the disk untouched.
///
/// All state sits behind one lock; each public call holds it from start to finish,
/// so operations never interleave.
pub struct FileSystem<T: BlockStorage> {
    volume: Mutex<Volume<T>>,
}

struct Volume<T: BlockStorage> {
    dev: T,
    config: Config,
    free_map_file: OpenFile,
    directory_file: OpenFile,
    handles: HandleTable,
}

impl<T: BlockStorage> FileSystem<T> {
    /// Initializes an empty file system onto `dev`: an empty root directory and a
    /// free map with only the bootstrap objects allocated.
    pub fn format(mut dev: T, config: Config) -> Result<Self> {
        check_device(&dev, &config)?;
        info!("Formatting the file system.");

        let mut free_map = FreeMap::new(config.num_sectors());
        let directory = Directory::new(config.dir_entries());

        // Allocate the header sectors first so no one else grabs them.
        free_map.mark(FREE_MAP_SECTOR);
        free_map.mark(DIRECTORY_SECTOR);

        let mut map_hdr = FileHeader::new();
        map_hdr.allocate(&mut free_map, config.free_map_file_size())?;
        let mut dir_hdr = FileHeader::new();
        dir_hdr.allocate(&mut free_map, config.directory_file_size())?;

        debug!("Writing headers back to disk.");
        map_hdr.write_back(&mut dev, FREE_MAP_SECTOR)?;
        dir_hdr.write_back(&mut dev, DIRECTORY_SECTOR)?;

        let free_map_file = OpenFile::from_header(FREE_MAP_SECTOR, map_hdr);
        let directory_file = OpenFile::from_header(DIRECTORY_SECTOR, dir_hdr);

        debug!("Writing bitmap and directory back to disk.");
        free_map.write_back(&free_map_file, &mut dev)?;
        directory.write_back(&directory_file, &mut dev)?;
        dev.sync_disk()?;

        Ok(Self::from_volume(Volume {
            dev,
            config,
            free_map_file,
            directory_file,
            handles: HandleTable::new(),
        }))
    }

    /// Opens a previously formatted file system.
    pub fn mount(mut dev: T, config: Config) -> Result<Self> {
        check_device(&dev, &config)?;

        let free_map_file = OpenFile::open(&mut dev, FREE_MAP_SECTOR)?;
        if free_map_file.length() != config.free_map_file_size() {
            return Err(FsError::Corrupted(format!(
                "free map is {} bytes, expected {} for {} sectors",
                free_map_file.length(),
                config.free_map_file_size(),
                config.num_sectors()
            )));
        }
        let directory_file = OpenFile::open(&mut dev, DIRECTORY_SECTOR)?;
        if directory_file.length() != config.directory_file_size() {
            return Err(FsError::Corrupted(format!(
                "root directory is {} bytes, expected {} for {} entries",
                directory_file.length(),
                config.directory_file_size(),
                config.dir_entries()
            )));
        }

        info!("Mounted file system of {} sectors.", config.num_sectors());
        Ok(Self::from_volume(Volume {
            dev,
            config,
            free_map_file,
            directory_file,
            handles: HandleTable::new(),
        }))
    }

    fn from_volume(volume: Volume<T>) -> Self {
        Self {
            volume: Mutex::new(volume),
        }
    }

    /// Gives the device back, closing every open file.
    pub fn into_device(self) -> T {
        self.volume.into_inner().dev
    }

    pub fn config(&self) -> Config {
        self.volume.lock().config
    }

    /// Creates a file of `initial_size` bytes. Files cannot grow later.
    pub fn create(&self, path: &str, initial_size: usize) -> Result<()> {
        debug!("Creating file {} size {}", path, initial_size);
        self.volume.lock().create_object(path, initial_size, false)
    }

    /// Creates an empty directory.
    pub fn create_directory(&self, path: &str) -> Result<()> {
        debug!("Creating directory {}", path);
        let mut volume = self.volume.lock();
        let size = volume.config.directory_file_size();
        volume.create_object(path, size, true)
    }

    /// Opens a file (or directory) for reading and writing.
    pub fn open(&self, path: &str) -> Result<OpenFileId> {
        debug!("Opening file {}", path);
        let mut volume = self.volume.lock();
        let resolved = volume.resolve(path, true)?;
        let sector = leaf_entry(&resolved, path)?.sector;
        let file = OpenFile::open(&mut volume.dev, sector)?;
        volume.handles.insert(file)
    }

    pub fn close(&self, id: OpenFileId) -> Result<()> {
        check_id(id)?;
        self.volume.lock().handles.remove(id).map(|_| ())
    }

    /// Reads up to `size` bytes from the handle's position.
    pub fn read(&self, id: OpenFileId, size: usize) -> Result<Vec<u8>> {
        check_id(id)?;
        let mut guard = self.volume.lock();
        let Volume { dev, handles, .. } = &mut *guard;
        let file = handles.get_mut(id)?;
        let mut buf = vec![0; size.min(file.remaining())];
        let read = file.read(dev, &mut buf)?;
        buf.truncate(read);
        Ok(buf)
    }

    /// Writes `buf` at the handle's position, returning how much fit in the file.
    pub fn write(&self, id: OpenFileId, buf: &[u8]) -> Result<usize> {
        check_id(id)?;
        let mut guard = self.volume.lock();
        let Volume { dev, handles, .. } = &mut *guard;
        let file = handles.get_mut(id)?;
        let written = file.write(dev, buf)?;
        dev.sync_disk()?;
        Ok(written)
    }

    pub fn seek(&self, id: OpenFileId, position: usize) -> Result<()> {
        check_id(id)?;
        self.volume.lock().handles.get_mut(id)?.seek(position);
        Ok(())
    }

    /// Length in bytes of the open file.
    pub fn length(&self, id: OpenFileId) -> Result<usize> {
        check_id(id)?;
        Ok(self.volume.lock().handles.get_mut(id)?.length())
    }

    /// Deletes a file, returning its header and data sectors to the free map.
    pub fn remove(&self, path: &str) -> Result<()> {
        debug!("Removing file {}", path);
        let mut volume = self.volume.lock();
        let resolved = volume.resolve(path, true)?;
        let entry = leaf_entry(&resolved, path)?.clone();
        if entry.is_directory {
            return Err(FsError::IsADirectory(path.to_string()));
        }
        let Resolved {
            dir_file,
            directory,
            ..
        } = resolved;
        volume.remove_entry(&dir_file, directory, &entry)
    }

    /// Deletes a directory and, depth first, everything below it.
    pub fn remove_recursive(&self, path: &str) -> Result<()> {
        debug!("Removing directory tree {}", path);
        let mut volume = self.volume.lock();
        let resolved = volume.resolve(path, true)?;
        let entry = leaf_entry(&resolved, path)?.clone();
        if !entry.is_directory {
            return Err(FsError::NotADirectory(path.to_string()));
        }
        let mut ancestors = vec![DIRECTORY_SECTOR];
        if resolved.dir_file.header_sector() != DIRECTORY_SECTOR {
            ancestors.push(resolved.dir_file.header_sector());
        }
        volume.remove_tree(&resolved.dir_file, &entry, &mut ancestors)
    }

    /// One `name [F]`/`name [D]` line per entry of the directory at `path`.
    pub fn list(&self, path: &str) -> Result<String> {
        let mut volume = self.volume.lock();
        Ok(volume.resolve(path, false)?.directory.list())
    }

    /// The tree below the directory at `path`, indented by depth.
    pub fn list_recursive(&self, path: &str) -> Result<String> {
        let mut volume = self.volume.lock();
        let resolved = volume.resolve(path, false)?;
        let mut ancestors = vec![DIRECTORY_SECTOR];
        if resolved.dir_file.header_sector() != DIRECTORY_SECTOR {
            ancestors.push(resolved.dir_file.header_sector());
        }
        let mut out = String::new();
        resolved
            .directory
            .recursive_list(&mut volume.dev, 0, &mut ancestors, &mut out)?;
        Ok(out)
    }

    /// Dumps the bootstrap headers, the allocated sectors and the root directory.
    pub fn print(&self) -> Result<String> {
        let mut guard = self.volume.lock();
        let volume = &mut *guard;
        let free_map = volume.load_free_map()?;
        let root = Directory::fetch_from(
            &volume.directory_file,
            &mut volume.dev,
            volume.config.dir_entries(),
        )?;

        let used: Vec<String> = free_map.used_sectors().map(|s| s.to_string()).collect();
        let mut out = format!(
            "Bit map file header:\n{}\nDirectory file header:\n{}\nBitmap set:\n{}\n",
            volume.free_map_file.header().describe(),
            volume.directory_file.header().describe(),
            used.join(", ")
        );
        out.push_str(&root.print(&mut volume.dev)?);
        Ok(out)
    }

    /// Number of unallocated sectors on disk.
    pub fn free_sectors(&self) -> Result<usize> {
        Ok(self.volume.lock().load_free_map()?.num_clear())
    }
}

impl<T: BlockStorage> Volume<T> {
    fn resolve(&mut self, path: &str, creating: bool) -> Result<Resolved> {
        path::resolve(
            &mut self.dev,
            &self.directory_file,
            &self.config,
            path,
            creating,
        )
    }

    fn load_free_map(&mut self) -> Result<FreeMap> {
        FreeMap::fetch_from(
            &self.free_map_file,
            &mut self.dev,
            self.config.num_sectors(),
        )
    }

    fn commit(&mut self, txn: Transaction) -> Result<()> {
        txn.commit(&mut self.dev, &self.free_map_file)
    }

    /// The steps to create a file or directory are:
    ///   Make sure the name doesn't already exist
    ///   Allocate a sector for the header
    ///   Add the name to the parent directory
    ///   Allocate space on disk for the data sectors
    ///   For a directory, write an empty table into it
    ///   Flush the header, the directories and the free map back to disk
    fn create_object(&mut self, path: &str, size: usize, is_directory: bool) -> Result<()> {
        let Resolved {
            dir_file,
            mut directory,
            segments,
        } = self.resolve(path, true)?;
        let name = segments
            .last()
            .ok_or_else(|| FsError::InvalidPath(path.to_string()))?;

        if directory.find(name).is_some() {
            warn!("{} is already in directory", path);
            return Err(FsError::NameCollision(name.clone()));
        }

        let label = if is_directory { "mkdir" } else { "create" };
        let mut txn = Transaction::begin(label, self.load_free_map()?);
        let sector = txn.free_map().find_and_claim().ok_or(FsError::OutOfSpace)?;
        directory.add(name, sector, is_directory)?;

        let mut hdr = FileHeader::new();
        hdr.allocate(txn.free_map(), size)?;
        txn.write_header(sector, hdr.clone());
        if is_directory {
            txn.write_directory(
                OpenFile::from_header(sector, hdr),
                Directory::new(self.config.dir_entries()),
            );
        }
        txn.write_directory(dir_file, directory);
        self.commit(txn)?;

        info!("created {} with header at sector {}", path, sector);
        Ok(())
    }

    /// Releases `entry`'s header and data sectors and drops it from `parent`, the
    /// working copy of `parent_file`'s table.
    fn remove_entry(
        &mut self,
        parent_file: &OpenFile,
        mut parent: Directory,
        entry: &DirectoryEntry,
    ) -> Result<()> {
        let mut txn = Transaction::begin("remove", self.load_free_map()?);
        let hdr = FileHeader::fetch_from(&mut self.dev, entry.sector)?;
        hdr.deallocate(txn.free_map());
        txn.free_map().clear(entry.sector);
        parent.remove(&entry.name)?;
        txn.write_directory(parent_file.clone(), parent);
        self.commit(txn)?;

        self.handles.revoke(entry.sector);
        info!("removed {} from sector {}", entry.name, entry.sector);
        Ok(())
    }

    /// Removes every entry of the directory `entry` in slot order, recursing into
    /// sub-directories, then the directory itself. Each removal commits on its own.
    fn remove_tree(
        &mut self,
        parent_file: &OpenFile,
        entry: &DirectoryEntry,
        ancestors: &mut Vec<SectorNumber>,
    ) -> Result<()> {
        if ancestors.contains(&entry.sector) {
            return Err(FsError::Corrupted(format!(
                "directory {} at sector {} contains itself",
                entry.name, entry.sector
            )));
        }

        let entries = self.config.dir_entries();
        let dir_file = OpenFile::open(&mut self.dev, entry.sector)?;
        let children: Vec<DirectoryEntry> = Directory::fetch_from(&dir_file, &mut self.dev, entries)?
            .entries()
            .cloned()
            .collect();

        ancestors.push(entry.sector);
        for child in &children {
            if child.is_directory {
                self.remove_tree(&dir_file, child, ancestors)?;
            } else {
                let current = Directory::fetch_from(&dir_file, &mut self.dev, entries)?;
                self.remove_entry(&dir_file, current, child)?;
            }
        }
        ancestors.pop();

        let parent = Directory::fetch_from(parent_file, &mut self.dev, entries)?;
        self.remove_entry(parent_file, parent, entry)
    }
}

fn check_device<T: BlockStorage>(dev: &T, config: &Config) -> Result<()> {
    if dev.sector_count() < config.num_sectors() {
        return Err(FsError::InvalidConfig(format!(
            "device has {} sectors, configuration needs {}",
            dev.sector_count(),
            config.num_sectors()
        )));
    }
    Ok(())
}

fn check_id(id: OpenFileId) -> Result<()> {
    if id <= 0 {
        return Err(FsError::InvalidHandle(id));
    }
    Ok(())
}

/// The entry the last segment of a resolved path names.
fn leaf_entry<'a>(resolved: &'a Resolved, path: &str) -> Result<&'a DirectoryEntry> {
    resolved
        .leaf()
        .and_then(|name| resolved.directory.lookup(name))
        .ok_or_else(|| FsError::PathNotFound(path.to_string()))
}
