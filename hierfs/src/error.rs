use thiserror::Error;

use crate::handle::OpenFileId;

pub type Result<T> = std::result::Result<T, FsError>;

#[derive(Error, Debug)]
pub enum FsError {
    #[error("{0} already exists in directory")]
    NameCollision(String),
    #[error("no space in directory")]
    DirectoryFull,
    #[error("no free sectors left on disk")]
    OutOfSpace,
    #[error("no such file or directory: {0}")]
    PathNotFound(String),
    #[error("invalid file handle {0}")]
    InvalidHandle(OpenFileId),
    #[error("not a directory: {0}")]
    NotADirectory(String),
    #[error("is a directory: {0}")]
    IsADirectory(String),
    #[error("invalid path: {0:?}")]
    InvalidPath(String),
    #[error("name {name:?} is longer than {max} bytes")]
    NameTooLong { name: String, max: usize },
    #[error("path has {depth} segments, at most {max} are allowed")]
    PathTooDeep { depth: usize, max: usize },
    #[error("file of {requested} bytes exceeds the {max} byte limit")]
    FileTooLarge { requested: usize, max: usize },
    #[error("no file handles left")]
    TooManyOpenFiles,
    #[error("corrupted file system: {0}")]
    Corrupted(String),
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    #[error("disk i/o failed")]
    Io(#[from] std::io::Error),
}
