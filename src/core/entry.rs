//! Directory entry codec
//!
//! One entry per asset, laid out as:
//!
//! ```text
//! [id len: u8][id][name len: u8][name][offset: u32 BE][size: u32 BE][compression: u8]
//! ```

use crate::error::{GongError, Result};
use serde::{Deserialize, Serialize};
use std::io::Read;

/// Longest id or name a one-byte length prefix can describe
pub const MAX_FIELD_LEN: usize = u8::MAX as usize;

/// Compression tag for payloads stored as-is (the only supported value)
pub const COMPRESSION_NONE: u8 = 0;

/// Encoded size of an entry with empty id and name
const FIXED_LEN: u32 = 1 + 1 + 4 + 4 + 1;

/// Directory record describing one asset (metadata only, no payload)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entry {
    /// Unique lookup key
    pub id: String,

    /// Display / output filename
    pub name: String,

    /// Absolute payload position, assigned by the offset allocator on write
    pub offset: u32,

    /// Payload length in bytes
    pub size: u32,

    /// Compression tag, 0 = stored
    pub compression: u8,
}

impl Entry {
    /// Create an unpacked entry (offset 0, stored uncompressed)
    pub fn new(id: impl Into<String>, name: impl Into<String>, size: u32) -> Self {
        Entry {
            id: id.into(),
            name: name.into(),
            offset: 0,
            size,
            compression: COMPRESSION_NONE,
        }
    }

    /// Serialized length of this entry
    pub fn encoded_size(&self) -> u32 {
        FIXED_LEN + self.id.len() as u32 + self.name.len() as u32
    }

    /// Check that id and name fit their length prefixes
    pub fn validate(&self) -> Result<()> {
        check_len("id", &self.id)?;
        check_len("name", &self.name)?;
        Ok(())
    }

    pub fn is_compressed(&self) -> bool {
        self.compression != COMPRESSION_NONE
    }

    /// Encode to a fresh buffer
    pub fn encode(&self) -> Result<Vec<u8>> {
        let mut bytes = Vec::with_capacity(self.encoded_size() as usize);
        self.encode_into(&mut bytes)?;
        Ok(bytes)
    }

    /// Append the encoded entry to `buf`
    ///
    /// Nothing is written if the entry fails validation.
    pub fn encode_into(&self, buf: &mut Vec<u8>) -> Result<()> {
        self.validate()?;

        buf.push(self.id.len() as u8);
        buf.extend_from_slice(self.id.as_bytes());
        buf.push(self.name.len() as u8);
        buf.extend_from_slice(self.name.as_bytes());
        buf.extend_from_slice(&self.offset.to_be_bytes());
        buf.extend_from_slice(&self.size.to_be_bytes());
        buf.push(self.compression);

        Ok(())
    }

    /// Decode one entry from the reader's current position
    pub fn decode<R: Read>(reader: &mut R) -> Result<Self> {
        let id_len = read_exact_field(reader, "id length", 1)?[0] as usize;
        let id = read_string(reader, "id", id_len)?;

        let name_len = read_exact_field(reader, "name length", 1)?[0] as usize;
        let name = read_string(reader, "name", name_len)?;

        let offset = read_u32(reader, "offset")?;
        let size = read_u32(reader, "size")?;
        let compression = read_exact_field(reader, "compression", 1)?[0];

        Ok(Entry {
            id,
            name,
            offset,
            size,
            compression,
        })
    }
}

fn check_len(field: &'static str, value: &str) -> Result<()> {
    if value.len() > MAX_FIELD_LEN {
        return Err(GongError::EntryTooLarge {
            field,
            len: value.len(),
            max: MAX_FIELD_LEN,
        });
    }
    Ok(())
}

/// Read exactly `needed` bytes, reporting how many arrived on a short read
fn read_exact_field<R: Read>(reader: &mut R, field: &'static str, needed: usize) -> Result<Vec<u8>> {
    let mut buf = Vec::with_capacity(needed);
    reader.by_ref().take(needed as u64).read_to_end(&mut buf)?;

    if buf.len() < needed {
        return Err(GongError::TruncatedEntry {
            field,
            needed,
            got: buf.len(),
        });
    }

    Ok(buf)
}

fn read_string<R: Read>(reader: &mut R, field: &'static str, len: usize) -> Result<String> {
    let bytes = read_exact_field(reader, field, len)?;
    String::from_utf8(bytes)
        .map_err(|_| GongError::Format(format!("entry {} is not valid UTF-8", field)))
}

fn read_u32<R: Read>(reader: &mut R, field: &'static str) -> Result<u32> {
    let bytes = read_exact_field(reader, field, 4)?;
    Ok(u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
}
