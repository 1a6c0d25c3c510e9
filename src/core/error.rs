use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum GongError {
    #[error("Format error: {0}")]
    Format(String),

    #[error("Invalid gong file {path:?}: {reason}")]
    InvalidFormat { path: PathBuf, reason: String },

    #[error("Corrupt archive {path:?}: {reason}")]
    CorruptArchive { path: PathBuf, reason: String },

    #[error("Truncated directory entry: {field} needs {needed} bytes, got {got}")]
    TruncatedEntry {
        field: &'static str,
        needed: usize,
        got: usize,
    },

    #[error("Asset id '{0}' is already present in the archive")]
    DuplicateId(String),

    #[error("Asset '{0}' is empty (size 0)")]
    EmptyAsset(String),

    #[error("Asset '{id}' already has offset {offset}; offsets are assigned on write")]
    PreassignedOffset { id: String, offset: u32 },

    #[error("Entry {field} is {len} bytes (max {max})")]
    EntryTooLarge {
        field: &'static str,
        len: usize,
        max: usize,
    },

    #[error("Asset not found: {0}")]
    AssetNotFound(String),

    #[error("Asset '{id}' uses unsupported compression method {tag}")]
    UnsupportedCompression { id: String, tag: u8 },

    #[error("Failed to read source {path:?} for asset '{id}': {reason}")]
    SourceRead {
        id: String,
        path: PathBuf,
        reason: String,
    },

    #[error("File already exists: {0:?}")]
    AlreadyExists(PathBuf),

    #[error("Archive exceeds the 32-bit offset space ({0} bytes)")]
    ArchiveTooLarge(u64),

    #[error("Invalid entry: {0}")]
    InvalidEntry(String),

    #[error("Invalid format descriptor: {0}")]
    InvalidDescriptor(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("I/O error on {path:?}: {source}")]
    PathIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl GongError {
    /// Wrap an I/O failure with the path it happened on
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        GongError::PathIo {
            path: path.into(),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, GongError>;
