#![no_main]
use gong_rs::Entry;
use libfuzzer_sys::fuzz_target;
use std::io::Cursor;

fuzz_target!(|data: &[u8]| {
    let mut cursor = Cursor::new(data);
    if let Ok(entry) = Entry::decode(&mut cursor) {
        let encoded = entry.encode().expect("decoded entry must re-encode");
        assert_eq!(&encoded[..], &data[..encoded.len()]);
    }
});
