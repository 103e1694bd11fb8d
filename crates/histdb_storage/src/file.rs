//! File-based storage backend.

use crate::backend::StorageBackend;
use crate::error::{StorageError, StorageResult};
use parking_lot::RwLock;
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

/// A file-based storage backend.
///
/// Bytes live in a single append-only file and survive process restarts.
/// Directory creation and locking belong to the layer above; this type
/// only opens the file it is pointed at.
///
/// # Durability
///
/// - `flush()` calls `File::flush()` to push buffered writes to the OS
/// - `sync()` calls `File::sync_all()` so data and metadata reach disk
///
/// # Thread Safety
///
/// The file handle and cached length sit behind [`RwLock`]s, so a shared
/// reference can be read from any thread.
///
/// # Example
///
/// ```no_run
/// use histdb_storage::{FileBackend, StorageBackend};
/// use std::path::Path;
///
/// let mut backend = FileBackend::open(Path::new("journal.log")).unwrap();
/// backend.append(b"frame").unwrap();
/// backend.sync().unwrap();
/// ```
#[derive(Debug)]
pub struct FileBackend {
    path: PathBuf,
    file: RwLock<File>,
    len: RwLock<u64>,
}

impl FileBackend {
    /// Opens or creates the file at `path`.
    ///
    /// An existing file is opened without truncation so its contents can
    /// be replayed; a missing file is created empty.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened or created.
    pub fn open(path: &Path) -> StorageResult<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)?;

        let len = file.metadata()?.len();

        Ok(Self {
            path: path.to_path_buf(),
            file: RwLock::new(file),
            len: RwLock::new(len),
        })
    }

    /// Returns the path of the underlying file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl StorageBackend for FileBackend {
    fn read_at(&self, offset: u64, len: usize) -> StorageResult<Vec<u8>> {
        let size = *self.len.read();
        let end = offset.saturating_add(len as u64);

        if offset > size || end > size {
            return Err(StorageError::OutOfBounds { offset, len, size });
        }

        if len == 0 {
            return Ok(Vec::new());
        }

        let mut file = self.file.write();
        file.seek(SeekFrom::Start(offset))?;

        let mut buffer = vec![0u8; len];
        file.read_exact(&mut buffer)?;

        Ok(buffer)
    }

    fn append(&mut self, data: &[u8]) -> StorageResult<u64> {
        if data.is_empty() {
            return Ok(*self.len.read());
        }

        let mut file = self.file.write();
        let mut len = self.len.write();

        let offset = *len;
        file.seek(SeekFrom::End(0))?;
        file.write_all(data)?;
        *len += data.len() as u64;

        Ok(offset)
    }

    fn flush(&mut self) -> StorageResult<()> {
        let mut file = self.file.write();
        file.flush()?;
        Ok(())
    }

    fn sync(&mut self) -> StorageResult<()> {
        let file = self.file.write();
        file.sync_all()?;
        Ok(())
    }

    fn len(&self) -> StorageResult<u64> {
        Ok(*self.len.read())
    }

    fn truncate(&mut self, new_len: u64) -> StorageResult<()> {
        let mut file = self.file.write();
        let mut len = self.len.write();

        if new_len > *len {
            return Err(StorageError::TruncateBeyondEnd {
                requested: new_len,
                size: *len,
            });
        }

        file.set_len(new_len)?;
        file.sync_all()?;
        *len = new_len;

        Ok(())
    }
}
