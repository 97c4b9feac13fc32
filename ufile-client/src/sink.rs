//! Transfer destinations supporting concurrent positioned writes

use crate::Result;
use parking_lot::Mutex;
use std::fs::{File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};
use ufile_core::ETag;

/// Destination of a parallel download
///
/// Workers write disjoint ranges concurrently, so `write_at` takes `&self`.
pub trait Sink: Send + Sync {
    /// Write all of `data` at `offset`
    fn write_at(&self, offset: u64, data: &[u8]) -> io::Result<()>;

    /// Current size in bytes
    fn len(&self) -> io::Result<u64>;

    fn is_empty(&self) -> io::Result<bool> {
        Ok(self.len()? == 0)
    }

    fn flush(&self) -> io::Result<()>;

    /// Object ETag of the current content
    fn etag(&self) -> Result<ETag>;

    /// Backing file, if any
    fn path(&self) -> Option<&Path> {
        None
    }
}

/// File on disk written with positioned I/O
#[derive(Debug)]
pub struct FileSink {
    file: File,
    path: PathBuf,
}

impl FileSink {
    /// Create or truncate the file at `path`
    pub fn create(path: impl Into<PathBuf>) -> io::Result<Self> {
        let path = path.into();
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(&path)?;
        Ok(FileSink { file, path })
    }
}

impl Sink for FileSink {
    #[cfg(unix)]
    fn write_at(&self, offset: u64, data: &[u8]) -> io::Result<()> {
        use std::os::unix::fs::FileExt;
        self.file.write_all_at(data, offset)
    }

    #[cfg(windows)]
    fn write_at(&self, offset: u64, data: &[u8]) -> io::Result<()> {
        use std::os::windows::fs::FileExt;
        let mut written = 0;
        while written < data.len() {
            match self.file.seek_write(&data[written..], offset + written as u64) {
                Ok(0) => return Err(io::ErrorKind::WriteZero.into()),
                Ok(n) => written += n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(e) => return Err(e),
            }
        }
        Ok(())
    }

    fn len(&self) -> io::Result<u64> {
        Ok(self.file.metadata()?.len())
    }

    fn flush(&self) -> io::Result<()> {
        self.file.sync_data()
    }

    fn etag(&self) -> Result<ETag> {
        Ok(ETag::from_file(&self.path)?)
    }

    fn path(&self) -> Option<&Path> {
        Some(&self.path)
    }
}

/// Growable in-memory buffer
#[derive(Debug, Default)]
pub struct MemorySink {
    data: Mutex<Vec<u8>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        MemorySink {
            data: Mutex::new(Vec::with_capacity(capacity)),
        }
    }

    /// Copy of the current content
    pub fn snapshot(&self) -> Vec<u8> {
        self.data.lock().clone()
    }

    pub fn into_inner(self) -> Vec<u8> {
        self.data.into_inner()
    }
}

impl Sink for MemorySink {
    fn write_at(&self, offset: u64, data: &[u8]) -> io::Result<()> {
        let start = usize::try_from(offset)
            .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "offset exceeds memory"))?;
        let end = start
            .checked_add(data.len())
            .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "write exceeds memory"))?;

        let mut buf = self.data.lock();
        if buf.len() < end {
            buf.resize(end, 0);
        }
        buf[start..end].copy_from_slice(data);
        Ok(())
    }

    fn len(&self) -> io::Result<u64> {
        Ok(self.data.lock().len() as u64)
    }

    fn flush(&self) -> io::Result<()> {
        Ok(())
    }

    fn etag(&self) -> Result<ETag> {
        Ok(ETag::from_bytes(&self.data.lock()))
    }
}
