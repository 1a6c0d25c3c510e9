//! Filesystem access for gong archives
//!
//! The archive engine never touches `std::fs` directly. It goes through the
//! [`Filesystem`] capability, which has two implementations:
//!
//! - [`OsFs`] - the host filesystem
//! - [`MemoryFs`] - a shared in-memory tree, handy for tests and embedding

use parking_lot::Mutex;
use std::collections::HashMap;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

/// Result of a stat call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileStat {
    pub is_dir: bool,
    pub size: u64,
}

/// An open file handle usable as an archive backing store
pub trait ArchiveFile: Read + Write + Seek {
    /// Truncate or extend the file to exactly `len` bytes
    fn set_len(&mut self, len: u64) -> io::Result<()>;

    /// Flush buffered data and metadata to the storage medium
    fn sync(&mut self) -> io::Result<()>;
}

/// Path-addressed file operations the archive engine relies on
///
/// Errors follow `std::io` conventions: a missing path is
/// `ErrorKind::NotFound`, creating over an existing path is
/// `ErrorKind::AlreadyExists`.
pub trait Filesystem {
    type File: ArchiveFile;

    fn exists(&self, path: &Path) -> bool;

    /// Open an existing file read-only
    fn open_read(&self, path: &Path) -> io::Result<Self::File>;

    /// Open an existing file for reading and writing
    fn open_read_write(&self, path: &Path) -> io::Result<Self::File>;

    /// Create a new file for reading and writing, failing if it exists
    fn create(&self, path: &Path) -> io::Result<Self::File>;

    fn stat(&self, path: &Path) -> io::Result<FileStat>;
}

/// Open `path` read-write, creating it if absent
///
/// Returns the handle and whether the file was freshly created (and therefore
/// still needs an empty archive image written to it).
pub fn acquire_file<F: Filesystem>(fs: &F, path: &Path) -> io::Result<(F::File, bool)> {
    if fs.exists(path) {
        Ok((fs.open_read_write(path)?, false))
    } else {
        debug!("{:?} does not exist, creating it", path);
        Ok((fs.create(path)?, true))
    }
}

/// Read a whole file into memory
pub fn read_bytes<F: Filesystem>(fs: &F, path: &Path) -> io::Result<Vec<u8>> {
    let mut file = fs.open_read(path)?;
    let mut data = Vec::new();
    file.read_to_end(&mut data)?;
    Ok(data)
}

/// The host filesystem
#[derive(Debug, Clone, Copy, Default)]
pub struct OsFs;

impl ArchiveFile for File {
    fn set_len(&mut self, len: u64) -> io::Result<()> {
        File::set_len(self, len)
    }

    fn sync(&mut self) -> io::Result<()> {
        self.sync_all()
    }
}

impl Filesystem for OsFs {
    type File = File;

    fn exists(&self, path: &Path) -> bool {
        path.exists()
    }

    fn open_read(&self, path: &Path) -> io::Result<File> {
        File::open(path)
    }

    fn open_read_write(&self, path: &Path) -> io::Result<File> {
        OpenOptions::new().read(true).write(true).open(path)
    }

    fn create(&self, path: &Path) -> io::Result<File> {
        OpenOptions::new()
            .read(true)
            .write(true)
            .create_new(true)
            .open(path)
    }

    fn stat(&self, path: &Path) -> io::Result<FileStat> {
        let metadata = fs::metadata(path)?;
        Ok(FileStat {
            is_dir: metadata.is_dir(),
            size: metadata.len(),
        })
    }
}

#[derive(Debug, Clone)]
enum Node {
    File(Arc<Mutex<Vec<u8>>>),
    Dir,
}

/// In-memory filesystem
///
/// Clones share the same tree, so a test can keep one handle for setup and
/// inspection while an archive owns another.
#[derive(Debug, Clone, Default)]
pub struct MemoryFs {
    nodes: Arc<Mutex<HashMap<PathBuf, Node>>>,
}

impl MemoryFs {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create or replace a file with the given contents
    pub fn write_file(&self, path: impl AsRef<Path>, data: impl Into<Vec<u8>>) {
        self.nodes.lock().insert(
            path.as_ref().to_path_buf(),
            Node::File(Arc::new(Mutex::new(data.into()))),
        );
    }

    /// Snapshot of a file's contents
    pub fn read_file(&self, path: impl AsRef<Path>) -> Option<Vec<u8>> {
        match self.nodes.lock().get(path.as_ref()) {
            Some(Node::File(data)) => Some(data.lock().clone()),
            _ => None,
        }
    }

    pub fn create_dir(&self, path: impl AsRef<Path>) {
        self.nodes
            .lock()
            .insert(path.as_ref().to_path_buf(), Node::Dir);
    }

    /// Remove a file or directory entry, returning whether it existed
    pub fn remove(&self, path: impl AsRef<Path>) -> bool {
        self.nodes.lock().remove(path.as_ref()).is_some()
    }

    /// Cut a file down to `len` bytes
    pub fn truncate(&self, path: impl AsRef<Path>, len: usize) -> bool {
        match self.nodes.lock().get(path.as_ref()) {
            Some(Node::File(data)) => {
                data.lock().truncate(len);
                true
            }
            _ => false,
        }
    }

    fn open(&self, path: &Path, writable: bool) -> io::Result<MemoryFile> {
        match self.nodes.lock().get(path) {
            Some(Node::File(data)) => Ok(MemoryFile {
                data: Arc::clone(data),
                pos: 0,
                writable,
            }),
            Some(Node::Dir) => Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("{:?} is a directory", path),
            )),
            None => Err(not_found(path)),
        }
    }
}

fn not_found(path: &Path) -> io::Error {
    io::Error::new(io::ErrorKind::NotFound, format!("{:?} not found", path))
}

impl Filesystem for MemoryFs {
    type File = MemoryFile;

    fn exists(&self, path: &Path) -> bool {
        self.nodes.lock().contains_key(path)
    }

    fn open_read(&self, path: &Path) -> io::Result<MemoryFile> {
        self.open(path, false)
    }

    fn open_read_write(&self, path: &Path) -> io::Result<MemoryFile> {
        self.open(path, true)
    }

    fn create(&self, path: &Path) -> io::Result<MemoryFile> {
        let mut nodes = self.nodes.lock();
        if nodes.contains_key(path) {
            return Err(io::Error::new(
                io::ErrorKind::AlreadyExists,
                format!("{:?} already exists", path),
            ));
        }

        let data = Arc::new(Mutex::new(Vec::new()));
        nodes.insert(path.to_path_buf(), Node::File(Arc::clone(&data)));

        Ok(MemoryFile {
            data,
            pos: 0,
            writable: true,
        })
    }

    fn stat(&self, path: &Path) -> io::Result<FileStat> {
        match self.nodes.lock().get(path) {
            Some(Node::File(data)) => Ok(FileStat {
                is_dir: false,
                size: data.lock().len() as u64,
            }),
            Some(Node::Dir) => Ok(FileStat {
                is_dir: true,
                size: 0,
            }),
            None => Err(not_found(path)),
        }
    }
}

/// Handle to a [`MemoryFs`] file
#[derive(Debug)]
pub struct MemoryFile {
    data: Arc<Mutex<Vec<u8>>>,
    pos: u64,
    writable: bool,
}

impl MemoryFile {
    fn check_writable(&self) -> io::Result<()> {
        if self.writable {
            Ok(())
        } else {
            Err(io::Error::new(
                io::ErrorKind::PermissionDenied,
                "file opened read-only",
            ))
        }
    }
}

impl Read for MemoryFile {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let data = self.data.lock();
        let start = (self.pos as usize).min(data.len());
        let n = buf.len().min(data.len() - start);

        buf[..n].copy_from_slice(&data[start..start + n]);
        self.pos += n as u64;

        Ok(n)
    }
}

impl Write for MemoryFile {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.check_writable()?;

        let mut data = self.data.lock();
        let start = self.pos as usize;
        let end = start + buf.len();
        if data.len() < end {
            data.resize(end, 0);
        }

        data[start..end].copy_from_slice(buf);
        self.pos = end as u64;

        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Seek for MemoryFile {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        let len = self.data.lock().len() as i128;
        let target = match pos {
            SeekFrom::Start(offset) => offset as i128,
            SeekFrom::End(delta) => len + delta as i128,
            SeekFrom::Current(delta) => self.pos as i128 + delta as i128,
        };

        if target < 0 {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "seek before start of file",
            ));
        }

        self.pos = target as u64;
        Ok(self.pos)
    }
}

impl ArchiveFile for MemoryFile {
    fn set_len(&mut self, len: u64) -> io::Result<()> {
        self.check_writable()?;
        self.data.lock().resize(len as usize, 0);
        Ok(())
    }

    fn sync(&mut self) -> io::Result<()> {
        Ok(())
    }
}
