#![no_main]
use arbitrary::Arbitrary;
use gong_rs::{Archive, MemoryFs};
use libfuzzer_sys::fuzz_target;

#[derive(Arbitrary, Debug)]
struct Asset {
    id: String,
    payload: Vec<u8>,
}

fuzz_target!(|assets: Vec<Asset>| {
    let fs = MemoryFs::new();
    let mut archive = match Archive::create_in(fs.clone(), "/fuzz.gong") {
        Ok(archive) => archive,
        Err(_) => return,
    };

    for (i, asset) in assets.iter().take(64).enumerate() {
        let source = format!("/src/{}", i);
        fs.write_file(&source, asset.payload.clone());
        let _ = archive.stage(asset.id.clone(), &source);
    }

    if archive.write().is_err() {
        return;
    }

    let reloaded = Archive::load_in(fs, "/fuzz.gong").expect("written archive must load");
    for asset in reloaded.entries() {
        let (_, data) = reloaded.get(&asset.id).expect("packed asset must be readable");
        let (_, original) = archive.get(&asset.id).expect("asset packed before reload");
        assert_eq!(data, original);
    }
});
