//! Property-based tests for the directory codec and offset allocator

use gong_rs::{assign_offsets, Archive, Entry, FormatDescriptor, MemoryFs};
use proptest::prelude::*;
use std::io::Cursor;

fn entry_strategy() -> impl Strategy<Value = Entry> {
    (
        "[a-z0-9_-]{1,40}",
        "[a-zA-Z0-9 ._-]{0,80}",
        any::<u32>(),
        1u32..,
        any::<u8>(),
    )
        .prop_map(|(id, name, offset, size, compression)| Entry {
            id,
            name,
            offset,
            size,
            compression,
        })
}

proptest! {
    #[test]
    fn prop_entry_round_trip(entry in entry_strategy()) {
        let bytes = entry.encode().unwrap();
        prop_assert_eq!(bytes.len() as u32, entry.encoded_size());

        let decoded = Entry::decode(&mut Cursor::new(bytes)).unwrap();
        prop_assert_eq!(decoded, entry);
    }

    #[test]
    fn prop_offsets_are_monotonic(sizes in prop::collection::vec(1u32..1_000_000, 1..64)) {
        let format = FormatDescriptor::v1();
        let mut entries: Vec<Entry> = sizes
            .iter()
            .enumerate()
            .map(|(i, &size)| Entry::new(format!("asset-{}", i), format!("asset-{}.bin", i), size))
            .collect();

        let total = assign_offsets(&format, entries.iter_mut()).unwrap();
        prop_assert_eq!(total, entries.iter().map(Entry::encoded_size).sum::<u32>());
        prop_assert_eq!(entries[0].offset as u64, format.payload_base(total));

        for pair in entries.windows(2) {
            prop_assert_eq!(pair[1].offset, pair[0].offset + pair[0].size);
        }
    }

    #[test]
    fn prop_written_archive_reloads(payloads in prop::collection::vec(
        prop::collection::vec(any::<u8>(), 1..512),
        1..12
    )) {
        let fs = MemoryFs::new();
        let mut archive = Archive::load_in(fs.clone(), "/prop.gong").unwrap();

        for (i, payload) in payloads.iter().enumerate() {
            let source = format!("/src/{}.bin", i);
            fs.write_file(&source, payload.clone());
            archive.stage(format!("asset-{}", i), &source).unwrap();
        }
        archive.write().unwrap();
        drop(archive);

        let archive = Archive::load_in(fs, "/prop.gong").unwrap();
        prop_assert_eq!(archive.packed_len(), payloads.len());
        for (i, payload) in payloads.iter().enumerate() {
            let (_, data) = archive.get(&format!("asset-{}", i)).unwrap();
            prop_assert_eq!(data, &payload[..]);
        }
    }
}
