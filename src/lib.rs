//! # Gong - Single-File Asset Archive
//!
//! `gong-rs` packs a set of named assets into one `.gong` file: a small fixed
//! header, a directory of entries and the raw payloads back to back.
//!
//! - **Staged appends**: assets are staged from source files and written in
//!   one pass
//! - **Resident payloads**: `load` reads every payload, lookups never touch disk
//! - **Pluggable I/O**: archives run over the host filesystem or an in-memory one
//! - **Versioned layout**: the framing markers come from a [`FormatDescriptor`]
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use gong_rs::{Archive, Result};
//!
//! # fn main() -> Result<()> {
//! // Opens the archive, creating an empty one if it doesn't exist yet
//! let mut archive = Archive::load("game.gong")?;
//!
//! // Stage assets, then write them all at once
//! archive.stage("logo", "assets/logo.png")?;
//! archive.stage("theme", "assets/theme.ogg")?;
//! archive.write()?;
//!
//! let (entry, data) = archive.get("logo")?;
//! println!("{} ({} bytes)", entry.name, data.len());
//! # Ok(())
//! # }
//! ```
//!
//! ## Custom Layouts
//!
//! ```rust,no_run
//! use gong_rs::{ArchiveBuilder, Result};
//!
//! # fn main() -> Result<()> {
//! let archive = ArchiveBuilder::new()
//!     .path("levels.gong")
//!     .format_file("formats/gong-v1.toml")
//!     .create_new()
//!     .build()?;
//!
//! println!("{}", archive.list_json()?);
//! # Ok(())
//! # }
//! ```

pub mod core;

// Re-export core modules internally so crate:: paths in core still work
pub(crate) use core::{allocator, entry, error, format, header, io};

// Re-export core types that users need
pub use crate::core::{
    allocator::{assign_offsets, directory_size},
    archive::{encode_archive, Archive, ArchiveState, AssetInfo, AssetStatus, PackedAsset, PendingAsset},
    entry::{Entry, COMPRESSION_NONE, MAX_FIELD_LEN},
    error::{GongError, Result},
    format::FormatDescriptor,
    header::{DirectoryHeader, Marker},
    io::{ArchiveFile, FileStat, Filesystem, MemoryFile, MemoryFs, OsFs},
};

use std::path::PathBuf;
use tracing::debug;

/// Builder for opening archives with a non-default layout or stricter
/// creation rules
///
/// # Examples
///
/// ```rust,no_run
/// use gong_rs::{ArchiveBuilder, FormatDescriptor, MemoryFs};
///
/// # fn main() -> gong_rs::Result<()> {
/// let fs = MemoryFs::new();
/// let archive = ArchiveBuilder::new()
///     .path("/bundle.gong")
///     .format(FormatDescriptor::v1())
///     .build_in(fs)?;
///
/// assert_eq!(archive.packed_len(), 0);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone, Default)]
pub struct ArchiveBuilder {
    path: Option<PathBuf>,
    format: Option<FormatDescriptor>,
    format_file: Option<PathBuf>,
    create_new: bool,
}

impl ArchiveBuilder {
    /// Create a new ArchiveBuilder with default settings
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the archive path (required)
    pub fn path<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.path = Some(path.into());
        self
    }

    /// Use an explicit format descriptor
    pub fn format(mut self, format: FormatDescriptor) -> Self {
        self.format = Some(format);
        self
    }

    /// Read the format descriptor from a TOML file
    ///
    /// The file is read through the same [`Filesystem`] the archive opens on.
    /// Ignored when [`ArchiveBuilder::format`] is also set.
    pub fn format_file<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.format_file = Some(path.into());
        self
    }

    /// Fail with `AlreadyExists` instead of loading an existing archive
    pub fn create_new(mut self) -> Self {
        self.create_new = true;
        self
    }

    /// Open the archive on the host filesystem
    pub fn build(self) -> Result<Archive> {
        self.build_in(OsFs)
    }

    /// Open the archive on the given filesystem
    pub fn build_in<F: Filesystem>(self, fs: F) -> Result<Archive<F>> {
        let path = self.path.ok_or_else(|| {
            GongError::Io(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                "archive path must be set",
            ))
        })?;

        let format = match (self.format, self.format_file) {
            (Some(format), _) => format,
            (None, Some(file)) => {
                debug!("Reading format descriptor from {:?}", file);
                let bytes =
                    crate::io::read_bytes(&fs, &file).map_err(|e| GongError::io(&file, e))?;
                let source = String::from_utf8(bytes).map_err(|_| {
                    GongError::InvalidDescriptor(format!("{:?} is not valid UTF-8", file))
                })?;
                FormatDescriptor::from_toml(&source)?
            }
            (None, None) => FormatDescriptor::default(),
        };

        if self.create_new {
            Archive::create_with(fs, path, format)
        } else {
            Archive::load_with(fs, path, format)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn custom_format() -> FormatDescriptor {
        let mut format = FormatDescriptor::v1();
        format.format_marker = Marker::new(b"GNG2".to_vec());
        format
    }

    #[test]
    fn test_builder_requires_path() {
        let result = ArchiveBuilder::new().build_in(MemoryFs::new());
        assert!(matches!(result, Err(GongError::Io(_))));
    }

    #[test]
    fn test_builder_create_new() {
        let fs = MemoryFs::new();
        ArchiveBuilder::new()
            .path("/a.gong")
            .create_new()
            .build_in(fs.clone())
            .unwrap();

        // Loading is fine, creating again is not
        assert!(ArchiveBuilder::new().path("/a.gong").build_in(fs.clone()).is_ok());
        assert!(matches!(
            ArchiveBuilder::new().path("/a.gong").create_new().build_in(fs),
            Err(GongError::AlreadyExists(_))
        ));
    }

    #[test]
    fn test_builder_format_file_in_memory() {
        let format = custom_format();
        let fs = MemoryFs::new();
        fs.write_file("/formats/gng2.toml", format.to_toml().unwrap().into_bytes());

        let archive = ArchiveBuilder::new()
            .path("/custom.gong")
            .format_file("/formats/gng2.toml")
            .build_in(fs.clone())
            .unwrap();

        assert_eq!(archive.format(), &format);
        let bytes = fs.read_file("/custom.gong").unwrap();
        assert_eq!(&bytes[2..6], b"GNG2");
        assert_eq!(bytes.len(), format.header_size() + 6);
    }

    #[test]
    fn test_builder_format_file_not_on_host() {
        // Only the in-memory tree has the descriptor
        let host = TempDir::new().unwrap();
        let descriptor = host.path().join("gng2.toml");
        std::fs::write(&descriptor, custom_format().to_toml().unwrap()).unwrap();

        let result = ArchiveBuilder::new()
            .path("/custom.gong")
            .format_file(&descriptor)
            .build_in(MemoryFs::new());
        assert!(matches!(result, Err(GongError::PathIo { .. })));
    }

    #[test]
    fn test_builder_format_file_on_disk() {
        let dir = TempDir::new().unwrap();
        let descriptor = dir.path().join("gng2.toml");
        std::fs::write(&descriptor, custom_format().to_toml().unwrap()).unwrap();

        let archive = ArchiveBuilder::new()
            .path(dir.path().join("custom.gong"))
            .format_file(&descriptor)
            .build()
            .unwrap();
        assert_eq!(archive.format(), &custom_format());
    }

    #[test]
    fn test_builder_rejects_bad_descriptor() {
        let fs = MemoryFs::new();
        fs.write_file("/bad.toml", b"name = 12".to_vec());

        let result = ArchiveBuilder::new()
            .path("/bad.gong")
            .format_file("/bad.toml")
            .build_in(fs.clone());
        assert!(matches!(result, Err(GongError::InvalidDescriptor(_))));

        fs.write_file("/binary.toml", vec![0xFF, 0xFE, 0x00]);
        let result = ArchiveBuilder::new()
            .path("/bad.gong")
            .format_file("/binary.toml")
            .build_in(fs);
        assert!(matches!(result, Err(GongError::InvalidDescriptor(_))));
    }
}
