//! Gong core: format codecs, offset allocation, filesystem access and the
//! archive aggregate

pub mod allocator;
pub mod archive;
pub mod entry;
pub mod error;
pub mod format;
pub mod header;
pub mod io;

pub use archive::{Archive, ArchiveState, AssetInfo, AssetStatus, PackedAsset, PendingAsset};
pub use entry::Entry;
pub use error::{GongError, Result};
pub use format::FormatDescriptor;
pub use header::{DirectoryHeader, Marker};
