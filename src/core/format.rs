//! Gong format descriptor
//!
//! The markers that frame an archive are not process-wide constants: they are
//! carried by an immutable [`FormatDescriptor`] handed to every codec call, so
//! several format revisions can live side by side (for example in tests).
//!
//! A descriptor can be built in code or loaded from TOML:
//!
//! ```
//! use gong_rs::FormatDescriptor;
//!
//! let format = FormatDescriptor::from_toml(r#"
//!     name = "gong"
//!     version = "1.0.0"
//!     start_of_file = [255, 214]
//!     format_marker = [71, 79, 78, 71, 0]
//!     start_of_assets = [255, 216]
//!     end_of_assets = [255, 217]
//!     end_of_file = [255, 215]
//! "#).unwrap();
//!
//! assert_eq!(format, FormatDescriptor::v1());
//! assert_eq!(format.header_size(), 13);
//! ```

use crate::error::{GongError, Result};
use crate::header::{Marker, COUNT_LEN, DIRECTORY_SIZE_LEN};
use semver::Version;
use serde::{Deserialize, Serialize};

/// Start of Gong
pub const START_OF_FILE: [u8; 2] = [0xFF, 0xD6];

/// Gong file identifier
pub const FORMAT_MARKER: [u8; 5] = *b"GONG\0";

/// Start of the asset payload region
pub const START_OF_ASSETS: [u8; 2] = [0xFF, 0xD8];

/// End of the asset payload region
pub const END_OF_ASSETS: [u8; 2] = [0xFF, 0xD9];

/// End of Gong
pub const END_OF_FILE: [u8; 2] = [0xFF, 0xD7];

/// Longest marker a descriptor may declare
pub const MAX_MARKER_LEN: usize = 16;

/// Immutable description of one revision of the Gong layout
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormatDescriptor {
    /// Human-readable format name
    pub name: String,

    /// Format revision
    pub version: Version,

    /// Leading marker at offset 0
    pub start_of_file: Marker,

    /// Format identifier following the start-of-file marker
    pub format_marker: Marker,

    /// Marker between the directory and the first payload
    pub start_of_assets: Marker,

    /// Marker after the last payload
    pub end_of_assets: Marker,

    /// Final marker of the file
    pub end_of_file: Marker,
}

impl FormatDescriptor {
    /// The canonical Gong layout
    pub fn v1() -> Self {
        FormatDescriptor {
            name: "gong".to_string(),
            version: Version::new(1, 0, 0),
            start_of_file: Marker::from(&START_OF_FILE[..]),
            format_marker: Marker::from(&FORMAT_MARKER[..]),
            start_of_assets: Marker::from(&START_OF_ASSETS[..]),
            end_of_assets: Marker::from(&END_OF_ASSETS[..]),
            end_of_file: Marker::from(&END_OF_FILE[..]),
        }
    }

    /// Parse and validate a descriptor from TOML
    pub fn from_toml(source: &str) -> Result<Self> {
        let format: FormatDescriptor =
            toml::from_str(source).map_err(|e| GongError::InvalidDescriptor(e.to_string()))?;
        format.validate()?;
        Ok(format)
    }

    /// Render the descriptor as TOML
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| GongError::InvalidDescriptor(e.to_string()))
    }

    /// Validate marker lengths and distinctness
    pub fn validate(&self) -> Result<()> {
        for (label, marker) in self.markers() {
            if marker.is_empty() {
                return Err(GongError::InvalidDescriptor(format!(
                    "{} marker cannot be empty",
                    label
                )));
            }
            if marker.len() > MAX_MARKER_LEN {
                return Err(GongError::InvalidDescriptor(format!(
                    "{} marker is {} bytes (max {})",
                    label,
                    marker.len(),
                    MAX_MARKER_LEN
                )));
            }
        }

        if self.start_of_file == self.format_marker {
            return Err(GongError::InvalidDescriptor(
                "start-of-file and format markers must differ".to_string(),
            ));
        }

        Ok(())
    }

    /// Combined length of the two leading markers
    pub fn markers_len(&self) -> usize {
        self.start_of_file.len() + self.format_marker.len()
    }

    /// Size of the fixed header: both leading markers, count and directory size
    pub fn header_size(&self) -> usize {
        self.markers_len() + COUNT_LEN + DIRECTORY_SIZE_LEN
    }

    /// Absolute position of the first payload byte for a directory of
    /// `directory_size` bytes
    pub fn payload_base(&self, directory_size: u32) -> u64 {
        self.header_size() as u64 + directory_size as u64 + self.start_of_assets.len() as u64
    }

    /// Bytes written after the last payload
    pub fn trailer_len(&self) -> usize {
        self.end_of_assets.len() + self.end_of_file.len()
    }

    fn markers(&self) -> [(&'static str, &Marker); 5] {
        [
            ("start-of-file", &self.start_of_file),
            ("format", &self.format_marker),
            ("start-of-assets", &self.start_of_assets),
            ("end-of-assets", &self.end_of_assets),
            ("end-of-file", &self.end_of_file),
        ]
    }
}

impl Default for FormatDescriptor {
    fn default() -> Self {
        Self::v1()
    }
}
