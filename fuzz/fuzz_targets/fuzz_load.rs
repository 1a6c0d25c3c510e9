#![no_main]
use gong_rs::{Archive, MemoryFs};
use libfuzzer_sys::fuzz_target;

// Arbitrary bytes as an archive image: load must fail cleanly or round-trip
fuzz_target!(|data: &[u8]| {
    let fs = MemoryFs::new();
    fs.write_file("/fuzz.gong", data.to_vec());

    let mut archive = match Archive::load_in(fs.clone(), "/fuzz.gong") {
        Ok(archive) => archive,
        Err(_) => return,
    };

    for entry in archive.entries().cloned().collect::<Vec<_>>() {
        let _ = archive.get(&entry.id);
    }

    // A loaded archive must survive a rewrite and load again
    if archive.write().is_ok() {
        let reloaded = Archive::load_in(fs, "/fuzz.gong").expect("rewritten archive must load");
        assert_eq!(reloaded.packed_len(), archive.packed_len());
    }
});
