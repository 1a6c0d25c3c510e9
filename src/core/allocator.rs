//! Payload offset allocation
//!
//! Payloads are packed back to back right after the start-of-assets marker,
//! in directory order. Growing the directory shifts every payload, so offsets
//! are recomputed over the full entry list on each write.

use crate::entry::Entry;
use crate::error::{GongError, Result};
use crate::format::FormatDescriptor;
use tracing::debug;

/// Total encoded size of a directory
pub fn directory_size<'a, I>(entries: I) -> Result<u32>
where
    I: IntoIterator<Item = &'a Entry>,
{
    let total: u64 = entries
        .into_iter()
        .map(|entry| entry.encoded_size() as u64)
        .sum();

    u32::try_from(total).map_err(|_| GongError::ArchiveTooLarge(total))
}

/// Assign every entry's payload offset and return the directory size
///
/// The first payload starts at `format.payload_base(directory_size)`, each
/// following payload starts where the previous one ends. An empty list
/// returns 0 and assigns nothing.
pub fn assign_offsets<'a, I>(format: &FormatDescriptor, entries: I) -> Result<u32>
where
    I: IntoIterator<Item = &'a mut Entry>,
{
    let mut entries: Vec<&'a mut Entry> = entries.into_iter().collect();
    if entries.is_empty() {
        return Ok(0);
    }

    let total = directory_size(entries.iter().map(|entry| &**entry))?;

    let mut next = format.payload_base(total);
    for entry in entries.iter_mut() {
        entry.offset = u32::try_from(next).map_err(|_| GongError::ArchiveTooLarge(next))?;
        next += entry.size as u64;
    }

    // The last payload must end inside the addressable range as well
    if next > u32::MAX as u64 + 1 {
        return Err(GongError::ArchiveTooLarge(next));
    }

    debug!(
        "Assigned offsets for {} entries (directory {} bytes, payloads end at {})",
        entries.len(),
        total,
        next
    );

    Ok(total)
}
