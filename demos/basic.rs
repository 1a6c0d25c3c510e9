//! Pack a couple of assets into a gong archive, then read them back
//!
//! Run with `cargo run --example basic`.

use gong_rs::{Archive, Result};
use std::fs;

fn main() -> Result<()> {
    let dir = std::env::temp_dir().join(format!("gong-demo-{}", std::process::id()));
    fs::create_dir_all(&dir).map_err(|e| gong_rs::GongError::io(&dir, e))?;

    let logo = dir.join("logo.png");
    let theme = dir.join("theme.ogg");
    fs::write(&logo, vec![0x89; 1024]).map_err(|e| gong_rs::GongError::io(&logo, e))?;
    fs::write(&theme, b"OggS not really audio").map_err(|e| gong_rs::GongError::io(&theme, e))?;

    let path = dir.join("demo.gong");
    let mut archive = Archive::load(&path)?;
    archive.append_assets([("logo", &logo), ("theme", &theme)])?;
    archive.write()?;

    println!("Wrote {:?}", archive.path());
    println!("{}", archive.list_json()?);

    let reopened = Archive::load(&path)?;
    for entry in reopened.entries() {
        let (_, data) = reopened.get(&entry.id)?;
        println!("{:>8} {:>6} bytes @ {}", entry.id, data.len(), entry.offset);
    }

    reopened.extract("theme", dir.join("theme-copy.ogg"))?;
    println!(
        "Extracted theme: {} bytes",
        fs::metadata(dir.join("theme-copy.ogg"))
            .map_err(|e| gong_rs::GongError::io(&dir, e))?
            .len()
    );

    fs::remove_dir_all(&dir).ok();
    Ok(())
}
