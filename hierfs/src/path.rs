use log::debug;

use crate::config::Config;
use crate::directory::{validate_name, Directory};
use crate::error::{FsError, Result};
use crate::io::BlockStorage;
use crate::openfile::OpenFile;

/// Splits `path` on `/`. Empty segments are dropped, so leading, trailing and
/// repeated separators are harmless and `"/"` yields no segments at all.
pub fn parse(path: &str, config: &Config) -> Result<Vec<String>> {
    let segments: Vec<String> = path
        .split('/')
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect();

    if segments.len() > config.max_path_depth() {
        return Err(FsError::PathTooDeep {
            depth: segments.len(),
            max: config.max_path_depth(),
        });
    }
    for segment in &segments {
        validate_name(segment)?;
    }
    Ok(segments)
}

/// The directory a path lives in, loaded and ready to use.
pub struct Resolved {
    /// The last directory descended into.
    pub dir_file: OpenFile,
    /// Working copy of `dir_file`'s table.
    pub directory: Directory,
    /// Every parsed segment, including the ones not descended into.
    pub segments: Vec<String>,
}

impl Resolved {
    /// The final segment, which names the target inside `directory`.
    pub fn leaf(&self) -> Option<&str> {
        self.segments.last().map(String::as_str)
    }
}

/// Walks `path` from the root directory.
///
/// With `creating` set the final segment is not descended into, so the result is
/// the directory that does (or will) contain it. Without it every segment must name
/// a directory and the result is the directory the path names.
pub fn resolve<T: BlockStorage>(
    dev: &mut T,
    root: &OpenFile,
    config: &Config,
    path: &str,
    creating: bool,
) -> Result<Resolved> {
    let segments = parse(path, config)?;
    if creating && segments.is_empty() {
        return Err(FsError::InvalidPath(path.to_string()));
    }
    let walk = segments.len() - creating as usize;

    let mut dir_file = root.clone();
    let mut directory = Directory::fetch_from(&dir_file, dev, config.dir_entries())?;
    for (i, segment) in segments[..walk].iter().enumerate() {
        let entry = directory
            .lookup(segment)
            .ok_or_else(|| FsError::PathNotFound(path.to_string()))?;
        if !entry.is_directory {
            return Err(FsError::NotADirectory(format!(
                "/{}",
                segments[..=i].join("/")
            )));
        }
        dir_file = OpenFile::open(dev, entry.sector)?;
        directory = Directory::fetch_from(&dir_file, dev, config.dir_entries())?;
    }

    debug!(
        "resolved {:?} to directory at sector {}",
        path,
        dir_file.header_sector()
    );
    Ok(Resolved {
        dir_file,
        directory,
        segments,
    })
}
