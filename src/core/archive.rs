//! Gong archive
//!
//! Owns the directory of a single archive file and drives the
//! load / append / write protocol against it.
//!
//! Payloads of packed entries are resident in memory after [`Archive::load`].
//! Staged entries only remember their source path until [`Archive::write`]
//! reads them, rebuilds the whole image in a scratch buffer and copies it
//! over the backing file.

use crate::allocator;
use crate::entry::Entry;
use crate::error::{GongError, Result};
use crate::format::FormatDescriptor;
use crate::header::DirectoryHeader;
use crate::io::{self, ArchiveFile, Filesystem, OsFs};
use serde::{Deserialize, Serialize};
use std::io::{BufReader, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Lifecycle state of an open archive
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArchiveState {
    /// Directory and payloads read from disk, nothing staged
    Loaded,
    /// Entries staged but not yet written
    Dirty,
    /// Staged entries written back, nothing pending
    Flushed,
}

/// Whether a listed asset is on disk or still staged
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AssetStatus {
    Packed,
    Pending,
}

/// Listing row for one asset
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetInfo {
    pub id: String,
    pub name: String,
    pub size: u32,

    /// Payload offset (None until the entry has been written)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub offset: Option<u32>,

    pub compression: u8,
    pub status: AssetStatus,
}

/// A committed entry with its payload bytes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackedAsset {
    pub entry: Entry,
    pub data: Vec<u8>,
}

/// An entry accepted by `append` and waiting for the next write
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingAsset {
    pub entry: Entry,
    pub source: PathBuf,
}

/// An open gong archive
///
/// # Examples
///
/// ```rust,no_run
/// use gong_rs::{Archive, Result};
///
/// # fn main() -> Result<()> {
/// let mut archive = Archive::load("bundle.gong")?;
/// archive.stage("logo", "assets/logo.png")?;
/// archive.write()?;
///
/// let (entry, data) = archive.get("logo")?;
/// println!("{} is {} bytes", entry.name, data.len());
/// # Ok(())
/// # }
/// ```
pub struct Archive<F: Filesystem = OsFs> {
    fs: F,
    path: PathBuf,
    file: F::File,
    format: FormatDescriptor,
    header: DirectoryHeader,
    packed: Vec<PackedAsset>,
    pending: Vec<PendingAsset>,
    state: ArchiveState,
}

impl Archive<OsFs> {
    /// Create a new, empty archive on the host filesystem
    pub fn create<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::create_in(OsFs, path)
    }

    /// Load an archive from the host filesystem, creating it if absent
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::load_in(OsFs, path)
    }
}

impl<F: Filesystem> Archive<F> {
    /// Create a new, empty archive using the default format
    pub fn create_in<P: AsRef<Path>>(fs: F, path: P) -> Result<Self> {
        Self::create_with(fs, path, FormatDescriptor::default())
    }

    /// Create a new, empty archive
    ///
    /// Fails with `AlreadyExists` if anything exists at `path`.
    pub fn create_with<P: AsRef<Path>>(fs: F, path: P, format: FormatDescriptor) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        format.validate()?;

        if fs.exists(&path) {
            return Err(GongError::AlreadyExists(path));
        }

        info!("Creating gong file {:?}", path);
        let mut file = fs.create(&path).map_err(|e| create_error(&path, e))?;
        initialize(&format, &mut file, &path)?;

        Ok(Archive {
            fs,
            path,
            file,
            format,
            header: DirectoryHeader::default(),
            packed: Vec::new(),
            pending: Vec::new(),
            state: ArchiveState::Loaded,
        })
    }

    /// Load an archive using the default format
    pub fn load_in<P: AsRef<Path>>(fs: F, path: P) -> Result<Self> {
        Self::load_with(fs, path, FormatDescriptor::default())
    }

    /// Load an archive, creating and initializing it if the path is absent
    ///
    /// The directory and every payload are read into memory. On failure the
    /// backing file handle is closed before returning.
    pub fn load_with<P: AsRef<Path>>(fs: F, path: P, format: FormatDescriptor) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        format.validate()?;

        info!("Loading gong file {:?}", path);
        let (mut file, created) =
            io::acquire_file(&fs, &path).map_err(|e| create_error(&path, e))?;
        if created {
            initialize(&format, &mut file, &path)?;
        }

        let (header, packed) = read_archive(&format, &mut file, &path)?;
        info!(
            "Loaded {} entries ({} directory bytes) from {:?}",
            header.entry_count, header.directory_size, path
        );

        Ok(Archive {
            fs,
            path,
            file,
            format,
            header,
            packed,
            pending: Vec::new(),
            state: ArchiveState::Loaded,
        })
    }

    /// Stage an entry whose payload will be read from `source` on write
    ///
    /// The entry must be unpacked (offset 0), non-empty and use an id that is
    /// neither packed nor already staged.
    pub fn append(&mut self, entry: Entry, source: impl Into<PathBuf>) -> Result<()> {
        if entry.id.is_empty() {
            return Err(GongError::InvalidEntry("asset id cannot be empty".to_string()));
        }
        entry.validate()?;

        if self.contains(&entry.id) {
            return Err(GongError::DuplicateId(entry.id));
        }
        if entry.size == 0 {
            return Err(GongError::EmptyAsset(entry.id));
        }
        if entry.offset != 0 {
            return Err(GongError::PreassignedOffset {
                id: entry.id,
                offset: entry.offset,
            });
        }
        if self.packed.len() + self.pending.len() >= u16::MAX as usize {
            return Err(GongError::InvalidEntry(format!(
                "directory is full ({} entries)",
                u16::MAX
            )));
        }

        let source = source.into();
        debug!(
            "Staged asset '{}' ({} bytes) from {:?}",
            entry.id, entry.size, source
        );
        self.pending.push(PendingAsset { entry, source });
        self.state = ArchiveState::Dirty;

        Ok(())
    }

    /// Stat `source` and stage it under `id`
    ///
    /// The entry's name is the source's file name and its size the current
    /// file length.
    pub fn stage(&mut self, id: impl Into<String>, source: impl AsRef<Path>) -> Result<()> {
        let id = id.into();
        let source = source.as_ref();

        let stat = self
            .fs
            .stat(source)
            .map_err(|e| source_error(&id, source, e.to_string()))?;
        if stat.is_dir {
            return Err(source_error(&id, source, "is a directory".to_string()));
        }
        let size = u32::try_from(stat.size).map_err(|_| {
            source_error(&id, source, format!("{} bytes exceeds 4 GiB", stat.size))
        })?;

        let name = source
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| id.clone());

        self.append(Entry::new(id, name, size), source)
    }

    /// Stage several `(id, source)` pairs in iteration order
    ///
    /// Stops at the first failure; pairs staged before it stay staged.
    /// Returns the number of staged assets.
    pub fn append_assets<I, S, P>(&mut self, assets: I) -> Result<usize>
    where
        I: IntoIterator<Item = (S, P)>,
        S: Into<String>,
        P: AsRef<Path>,
    {
        let mut staged = 0;
        for (id, source) in assets {
            self.stage(id, source)?;
            staged += 1;
        }

        if staged == 0 {
            return Err(GongError::InvalidEntry(format!(
                "no assets to append to {:?}",
                self.path
            )));
        }

        Ok(staged)
    }

    /// Read staged payloads, rebuild the archive image and commit it
    ///
    /// The full image is assembled in memory before the backing file is
    /// touched. Any failure up to that point leaves both the file and this
    /// archive unchanged.
    pub fn write(&mut self) -> Result<()> {
        info!(
            "Writing gong file {:?} ({} packed, {} pending)",
            self.path,
            self.packed.len(),
            self.pending.len()
        );

        let mut staged = Vec::with_capacity(self.pending.len());
        for pending in &self.pending {
            staged.push(self.read_source(pending)?);
        }

        // Build: packed entries first, then staged ones, in insertion order
        let mut entries: Vec<Entry> = self
            .packed
            .iter()
            .map(|asset| asset.entry.clone())
            .chain(staged.iter().map(|asset| asset.entry.clone()))
            .collect();
        let directory_size = allocator::assign_offsets(&self.format, entries.iter_mut())?;

        let entry_count = u16::try_from(entries.len()).map_err(|_| {
            GongError::InvalidEntry(format!("{} entries exceed the directory limit", entries.len()))
        })?;
        let header = DirectoryHeader::new(entry_count, directory_size);

        let payloads: Vec<&[u8]> = self
            .packed
            .iter()
            .map(|asset| asset.data.as_slice())
            .chain(staged.iter().map(|asset| asset.data.as_slice()))
            .collect();
        let image = encode_archive(&self.format, &header, &entries, &payloads)?;

        // Commit: replace the file, then the in-memory directory
        self.commit_image(&image)?;

        let staged_entries = entries.split_off(self.packed.len());
        for (asset, entry) in self.packed.iter_mut().zip(entries) {
            asset.entry = entry;
        }
        for (mut asset, entry) in staged.into_iter().zip(staged_entries) {
            asset.entry = entry;
            self.packed.push(asset);
        }

        self.pending.clear();
        self.header = header;
        self.state = ArchiveState::Flushed;

        info!(
            "Wrote {:?}: {} assets, {} bytes",
            self.path,
            self.packed.len(),
            image.len()
        );
        Ok(())
    }

    /// Look up a packed asset and its resident payload
    pub fn get(&self, id: &str) -> Result<(&Entry, &[u8])> {
        let asset = self
            .packed
            .iter()
            .find(|asset| asset.entry.id == id)
            .ok_or_else(|| GongError::AssetNotFound(id.to_string()))?;

        if asset.entry.is_compressed() {
            return Err(GongError::UnsupportedCompression {
                id: asset.entry.id.clone(),
                tag: asset.entry.compression,
            });
        }

        Ok((&asset.entry, asset.data.as_slice()))
    }

    /// Write a packed asset's payload to a new file at `output`
    pub fn extract(&self, id: &str, output: impl AsRef<Path>) -> Result<()> {
        let output = output.as_ref();
        let (entry, data) = self.get(id)?;

        let mut file = self
            .fs
            .create(output)
            .map_err(|e| create_error(output, e))?;
        file.write_all(data)
            .and_then(|_| file.sync())
            .map_err(|e| GongError::io(output, e))?;

        info!("Extracted '{}' ({} bytes) to {:?}", entry.id, data.len(), output);
        Ok(())
    }

    /// Packed assets followed by pending ones
    pub fn list(&self) -> Vec<AssetInfo> {
        let packed = self.packed.iter().map(|asset| AssetInfo {
            id: asset.entry.id.clone(),
            name: asset.entry.name.clone(),
            size: asset.entry.size,
            offset: Some(asset.entry.offset),
            compression: asset.entry.compression,
            status: AssetStatus::Packed,
        });
        let pending = self.pending.iter().map(|asset| AssetInfo {
            id: asset.entry.id.clone(),
            name: asset.entry.name.clone(),
            size: asset.entry.size,
            offset: None,
            compression: asset.entry.compression,
            status: AssetStatus::Pending,
        });

        packed.chain(pending).collect()
    }

    /// The listing rendered as pretty JSON
    pub fn list_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(&self.list())?)
    }

    /// Whether `id` is packed or staged
    pub fn contains(&self, id: &str) -> bool {
        self.packed.iter().any(|asset| asset.entry.id == id)
            || self.pending.iter().any(|asset| asset.entry.id == id)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn format(&self) -> &FormatDescriptor {
        &self.format
    }

    /// Header as last read from or written to disk
    pub fn header(&self) -> DirectoryHeader {
        self.header
    }

    pub fn state(&self) -> ArchiveState {
        self.state
    }

    /// Number of committed entries
    pub fn packed_len(&self) -> usize {
        self.packed.len()
    }

    /// Number of staged entries awaiting a write
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Committed directory entries in on-disk order
    pub fn entries(&self) -> impl Iterator<Item = &Entry> {
        self.packed.iter().map(|asset| &asset.entry)
    }

    pub fn packed(&self) -> &[PackedAsset] {
        &self.packed
    }

    pub fn pending(&self) -> &[PendingAsset] {
        &self.pending
    }

    fn read_source(&self, pending: &PendingAsset) -> Result<PackedAsset> {
        let id = &pending.entry.id;
        let source = &pending.source;

        let stat = self
            .fs
            .stat(source)
            .map_err(|e| source_error(id, source, e.to_string()))?;
        if stat.is_dir {
            return Err(source_error(id, source, "is a directory".to_string()));
        }

        let data =
            io::read_bytes(&self.fs, source).map_err(|e| source_error(id, source, e.to_string()))?;
        if data.is_empty() {
            return Err(source_error(id, source, "file is empty".to_string()));
        }
        let size = u32::try_from(data.len()).map_err(|_| {
            source_error(id, source, format!("{} bytes exceeds 4 GiB", data.len()))
        })?;

        if size != pending.entry.size {
            debug!(
                "Source for '{}' changed size since staging ({} -> {} bytes)",
                id, pending.entry.size, size
            );
        }

        let mut entry = pending.entry.clone();
        entry.size = size;
        Ok(PackedAsset { entry, data })
    }

    fn commit_image(&mut self, image: &[u8]) -> Result<()> {
        let path = &self.path;
        let file = &mut self.file;

        file.seek(SeekFrom::Start(0))
            .and_then(|_| file.write_all(image))
            .and_then(|_| file.set_len(image.len() as u64))
            .and_then(|_| file.flush())
            .and_then(|_| file.sync())
            .map_err(|e| GongError::io(path, e))
    }
}

/// Encode a complete archive image
///
/// `entries` must already carry allocator-assigned offsets and `payloads`
/// must line up with them one to one.
pub fn encode_archive(
    format: &FormatDescriptor,
    header: &DirectoryHeader,
    entries: &[Entry],
    payloads: &[&[u8]],
) -> Result<Vec<u8>> {
    if entries.len() != payloads.len() {
        return Err(GongError::InvalidEntry(format!(
            "{} entries but {} payloads",
            entries.len(),
            payloads.len()
        )));
    }

    let payload_len: usize = payloads.iter().map(|p| p.len()).sum();
    let mut image = Vec::with_capacity(
        format.header_size()
            + header.directory_size as usize
            + format.start_of_assets.len()
            + payload_len
            + format.trailer_len(),
    );

    image.extend_from_slice(&header.to_bytes(format));
    for entry in entries {
        entry.encode_into(&mut image)?;
    }

    format.start_of_assets.write_to(&mut image)?;
    for (entry, payload) in entries.iter().zip(payloads) {
        if image.len() as u64 != entry.offset as u64 || payload.len() as u64 != entry.size as u64 {
            return Err(GongError::InvalidEntry(format!(
                "entry '{}' expects {} bytes at offset {}, image has {} bytes at {}",
                entry.id,
                entry.size,
                entry.offset,
                payload.len(),
                image.len()
            )));
        }
        image.extend_from_slice(payload);
    }
    format.end_of_assets.write_to(&mut image)?;
    format.end_of_file.write_to(&mut image)?;

    Ok(image)
}

/// Write the empty archive image to a freshly created file
fn initialize<W: ArchiveFile>(format: &FormatDescriptor, file: &mut W, path: &Path) -> Result<()> {
    debug!("Initializing new gong file {:?}", path);
    let image = encode_archive(format, &DirectoryHeader::default(), &[], &[])?;

    file.seek(SeekFrom::Start(0))
        .and_then(|_| file.write_all(&image))
        .and_then(|_| file.set_len(image.len() as u64))
        .and_then(|_| file.sync())
        .map_err(|e| GongError::io(path, e))
}

/// Validate markers, decode the directory and read every payload
fn read_archive<R: Read + Seek>(
    format: &FormatDescriptor,
    file: &mut R,
    path: &Path,
) -> Result<(DirectoryHeader, Vec<PackedAsset>)> {
    let invalid = |reason: String| GongError::InvalidFormat {
        path: path.to_path_buf(),
        reason,
    };
    let corrupt = |reason: String| GongError::CorruptArchive {
        path: path.to_path_buf(),
        reason,
    };

    if !format
        .start_of_file
        .is_at(file, 0)
        .map_err(|e| GongError::io(path, e))?
    {
        return Err(invalid(
            "file does not start with the start-of-file marker".to_string(),
        ));
    }
    if !format
        .format_marker
        .is_at(file, format.start_of_file.len() as u64)
        .map_err(|e| GongError::io(path, e))?
    {
        return Err(invalid(
            "format marker does not follow the start-of-file marker".to_string(),
        ));
    }

    let header = DirectoryHeader::read_from(format, file).map_err(|e| match e {
        GongError::Format(reason) => invalid(reason),
        other => other,
    })?;

    let file_len = file
        .seek(SeekFrom::End(0))
        .map_err(|e| GongError::io(path, e))?;
    file.seek(SeekFrom::Start(format.header_size() as u64))
        .map_err(|e| GongError::io(path, e))?;

    let mut entries = Vec::with_capacity(header.entry_count as usize);
    {
        let mut directory =
            BufReader::new(file.by_ref().take(header.directory_size as u64));
        for index in 0..header.entry_count {
            let entry = Entry::decode(&mut directory).map_err(|e| match e {
                GongError::TruncatedEntry { .. } | GongError::Format(_) => {
                    corrupt(format!("directory entry {}: {}", index, e))
                }
                other => other,
            })?;
            entries.push(entry);
        }
    }

    let decoded_size = allocator::directory_size(&entries)?;
    if decoded_size != header.directory_size {
        return Err(corrupt(format!(
            "header declares {} directory bytes, entries occupy {}",
            header.directory_size, decoded_size
        )));
    }

    let payload_base = format.payload_base(header.directory_size);
    let mut packed = Vec::with_capacity(entries.len());
    for (index, entry) in entries.into_iter().enumerate() {
        if (entry.offset as u64) < payload_base {
            return Err(corrupt(format!(
                "entry {} ('{}') starts at offset {}, before the payload region at {}",
                index, entry.id, entry.offset, payload_base
            )));
        }

        let end = entry.offset as u64 + entry.size as u64;
        if end > file_len {
            return Err(corrupt(format!(
                "entry {} ('{}') declares {} bytes at offset {}, file is {} bytes",
                index, entry.id, entry.size, entry.offset, file_len
            )));
        }

        file.seek(SeekFrom::Start(entry.offset as u64))
            .map_err(|e| GongError::io(path, e))?;
        let mut data = Vec::with_capacity(entry.size as usize);
        file.by_ref()
            .take(entry.size as u64)
            .read_to_end(&mut data)
            .map_err(|e| GongError::io(path, e))?;

        if data.len() != entry.size as usize {
            return Err(corrupt(format!(
                "entry {} ('{}') declares {} bytes, only {} present",
                index,
                entry.id,
                entry.size,
                data.len()
            )));
        }

        if entry.is_compressed() {
            warn!(
                "Entry '{}' uses unsupported compression method {}",
                entry.id, entry.compression
            );
        }
        debug!(
            "Read {} payload bytes for '{}' at offset {}",
            data.len(),
            entry.id,
            entry.offset
        );

        packed.push(PackedAsset { entry, data });
    }

    Ok((header, packed))
}

fn create_error(path: &Path, e: std::io::Error) -> GongError {
    if e.kind() == std::io::ErrorKind::AlreadyExists {
        GongError::AlreadyExists(path.to_path_buf())
    } else {
        GongError::io(path, e)
    }
}

fn source_error(id: &str, source: &Path, reason: String) -> GongError {
    GongError::SourceRead {
        id: id.to_string(),
        path: source.to_path_buf(),
        reason,
    }
}
