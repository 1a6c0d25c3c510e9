//! Marker and directory header codec
//!
//! Every archive starts with a fixed-size header:
//!
//! ```text
//! [start-of-file marker][format marker][entry count: u16 BE][directory size: u32 BE]
//! ```
//!
//! The marker bytes come from the [`FormatDescriptor`] passed to every call,
//! the two integers are always big-endian.

use crate::error::{GongError, Result};
use crate::format::FormatDescriptor;
use serde::{Deserialize, Serialize};
use std::io::{self, Read, Seek, SeekFrom, Write};

/// Width of the entry count field
pub const COUNT_LEN: usize = 2;

/// Width of the directory size field
pub const DIRECTORY_SIZE_LEN: usize = 4;

/// A fixed magic byte sequence identifying a file or section boundary
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Marker(Vec<u8>);

impl Marker {
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        Marker(bytes.into())
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Write the marker bytes at the writer's current position
    pub fn write_to<W: Write>(&self, writer: &mut W) -> io::Result<()> {
        writer.write_all(&self.0)
    }

    /// Check whether the marker is present at `offset`
    ///
    /// A short read counts as a mismatch rather than an error.
    pub fn is_at<R: Read + Seek>(&self, reader: &mut R, offset: u64) -> io::Result<bool> {
        reader.seek(SeekFrom::Start(offset))?;

        let mut found = Vec::with_capacity(self.0.len());
        reader
            .by_ref()
            .take(self.0.len() as u64)
            .read_to_end(&mut found)?;

        Ok(found == self.0)
    }
}

impl From<&[u8]> for Marker {
    fn from(bytes: &[u8]) -> Self {
        Marker(bytes.to_vec())
    }
}

/// Directory summary stored right after the leading markers
///
/// `entry_count` and `directory_size` are the single source of truth readers
/// use to know how many entries to decode and where the payload region begins.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectoryHeader {
    /// Number of directory entries
    pub entry_count: u16,

    /// Total encoded size of all directory entries in bytes
    pub directory_size: u32,
}

impl DirectoryHeader {
    pub fn new(entry_count: u16, directory_size: u32) -> Self {
        DirectoryHeader {
            entry_count,
            directory_size,
        }
    }

    /// Serialize the full fixed header: both leading markers plus the summary
    pub fn to_bytes(&self, format: &FormatDescriptor) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(format.header_size());

        bytes.extend_from_slice(format.start_of_file.as_bytes());
        bytes.extend_from_slice(format.format_marker.as_bytes());
        bytes.extend_from_slice(&self.summary_bytes());

        bytes
    }

    /// Deserialize the fixed header, checking both leading markers
    pub fn from_bytes(format: &FormatDescriptor, bytes: &[u8]) -> Result<Self> {
        let header_size = format.header_size();
        if bytes.len() < header_size {
            return Err(GongError::Format(format!(
                "header needs {} bytes, got {}",
                header_size,
                bytes.len()
            )));
        }

        let mut offset = 0;

        let sof = format.start_of_file.as_bytes();
        if &bytes[offset..offset + sof.len()] != sof {
            return Err(GongError::Format(
                "file does not start with the start-of-file marker".to_string(),
            ));
        }
        offset += sof.len();

        let ident = format.format_marker.as_bytes();
        if &bytes[offset..offset + ident.len()] != ident {
            return Err(GongError::Format(
                "format marker does not follow the start-of-file marker".to_string(),
            ));
        }
        offset += ident.len();

        let entry_count = u16::from_be_bytes([bytes[offset], bytes[offset + 1]]);
        offset += COUNT_LEN;

        let directory_size = u32::from_be_bytes([
            bytes[offset],
            bytes[offset + 1],
            bytes[offset + 2],
            bytes[offset + 3],
        ]);

        Ok(DirectoryHeader {
            entry_count,
            directory_size,
        })
    }

    /// Read and decode the header from the start of `reader`
    pub fn read_from<R: Read + Seek>(format: &FormatDescriptor, reader: &mut R) -> Result<Self> {
        reader.seek(SeekFrom::Start(0))?;

        let mut buffer = Vec::with_capacity(format.header_size());
        reader
            .by_ref()
            .take(format.header_size() as u64)
            .read_to_end(&mut buffer)?;

        Self::from_bytes(format, &buffer)
    }

    /// Overwrite only the count and size fields of an existing header
    ///
    /// The leading markers are left untouched.
    pub fn patch<W: Write + Seek>(&self, format: &FormatDescriptor, writer: &mut W) -> Result<()> {
        writer.seek(SeekFrom::Start(format.markers_len() as u64))?;
        writer.write_all(&self.summary_bytes())?;
        writer.flush()?;
        Ok(())
    }

    fn summary_bytes(&self) -> [u8; COUNT_LEN + DIRECTORY_SIZE_LEN] {
        let mut summary = [0u8; COUNT_LEN + DIRECTORY_SIZE_LEN];
        summary[..COUNT_LEN].copy_from_slice(&self.entry_count.to_be_bytes());
        summary[COUNT_LEN..].copy_from_slice(&self.directory_size.to_be_bytes());
        summary
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_header_layout() {
        let format = FormatDescriptor::v1();
        let header = DirectoryHeader::new(3, 0x0102_0304);

        let bytes = header.to_bytes(&format);
        assert_eq!(bytes.len(), 13);
        assert_eq!(&bytes[0..2], &[0xFF, 0xD6]);
        assert_eq!(&bytes[2..7], b"GONG\0");
        assert_eq!(&bytes[7..9], &[0x00, 0x03]);
        assert_eq!(&bytes[9..13], &[0x01, 0x02, 0x03, 0x04]);
    }

    #[test]
    fn test_header_serialization() {
        let format = FormatDescriptor::v1();
        let header = DirectoryHeader::new(42, 1234);

        let decoded = DirectoryHeader::from_bytes(&format, &header.to_bytes(&format)).unwrap();
        assert_eq!(decoded, header);
    }

    #[test]
    fn test_empty_header_decodes_to_zero() {
        let format = FormatDescriptor::v1();
        let bytes = DirectoryHeader::default().to_bytes(&format);

        let decoded = DirectoryHeader::from_bytes(&format, &bytes).unwrap();
        assert_eq!(decoded.entry_count, 0);
        assert_eq!(decoded.directory_size, 0);
    }

    #[test]
    fn test_invalid_start_marker() {
        let format = FormatDescriptor::v1();
        let mut bytes = DirectoryHeader::new(1, 20).to_bytes(&format);
        bytes[0] = 0x00;

        assert!(matches!(
            DirectoryHeader::from_bytes(&format, &bytes),
            Err(GongError::Format(_))
        ));
    }

    #[test]
    fn test_invalid_format_marker() {
        let format = FormatDescriptor::v1();
        let mut bytes = DirectoryHeader::new(1, 20).to_bytes(&format);
        bytes[3] = b'X';

        assert!(matches!(
            DirectoryHeader::from_bytes(&format, &bytes),
            Err(GongError::Format(_))
        ));
    }

    #[test]
    fn test_short_header() {
        let format = FormatDescriptor::v1();
        let bytes = DirectoryHeader::new(1, 20).to_bytes(&format);

        assert!(matches!(
            DirectoryHeader::from_bytes(&format, &bytes[..10]),
            Err(GongError::Format(_))
        ));
    }

    #[test]
    fn test_patch_rewrites_only_summary() {
        let format = FormatDescriptor::v1();
        let mut bytes = DirectoryHeader::new(1, 20).to_bytes(&format);
        bytes.extend_from_slice(b"trailing payload");
        let mut cursor = Cursor::new(bytes);

        DirectoryHeader::new(7, 999).patch(&format, &mut cursor).unwrap();

        let patched = cursor.into_inner();
        assert_eq!(&patched[0..7], &[0xFF, 0xD6, b'G', b'O', b'N', b'G', 0]);
        assert_eq!(&patched[13..], b"trailing payload");

        let decoded = DirectoryHeader::from_bytes(&format, &patched).unwrap();
        assert_eq!(decoded, DirectoryHeader::new(7, 999));
    }

    #[test]
    fn test_read_from_stream() {
        let format = FormatDescriptor::v1();
        let mut cursor = Cursor::new(DirectoryHeader::new(2, 40).to_bytes(&format));

        let header = DirectoryHeader::read_from(&format, &mut cursor).unwrap();
        assert_eq!(header, DirectoryHeader::new(2, 40));
    }

    #[test]
    fn test_marker_is_at() {
        let marker = Marker::new(vec![0xFF, 0xD8]);
        let mut cursor = Cursor::new(vec![0x00, 0xFF, 0xD8, 0x01]);

        assert!(marker.is_at(&mut cursor, 1).unwrap());
        assert!(!marker.is_at(&mut cursor, 0).unwrap());
        // Past the end is a mismatch, not an error
        assert!(!marker.is_at(&mut cursor, 3).unwrap());
    }
}
