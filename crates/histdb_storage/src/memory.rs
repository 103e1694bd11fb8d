//! In-memory storage backend for tests and ephemeral stores.

use crate::backend::StorageBackend;
use crate::error::{StorageError, StorageResult};
use parking_lot::RwLock;

/// An in-memory storage backend.
///
/// Holds all bytes in a `Vec`, so nothing survives the process. Suitable
/// for unit tests, integration tests, and throwaway stores.
///
/// Crash-recovery tests use [`snapshot`](Self::snapshot) to capture the
/// bytes an interrupted run left behind, then reopen a store over
/// [`from_snapshot`](Self::from_snapshot) to replay them.
///
/// # Thread Safety
///
/// Reads and writes are guarded by a [`RwLock`], so a shared reference
/// can be read from any thread.
///
/// # Example
///
/// ```rust
/// use histdb_storage::{InMemoryBackend, StorageBackend};
///
/// let mut backend = InMemoryBackend::new();
/// let offset = backend.append(b"frame bytes").unwrap();
/// assert_eq!(offset, 0);
/// assert_eq!(backend.len().unwrap(), 11);
/// ```
#[derive(Debug, Default)]
pub struct InMemoryBackend {
    data: RwLock<Vec<u8>>,
}

impl InMemoryBackend {
    /// Creates an empty backend.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a backend seeded with pre-existing bytes.
    ///
    /// Pairs with [`snapshot`](Self::snapshot) to simulate reopening a
    /// store after a crash.
    #[must_use]
    pub fn from_snapshot(data: Vec<u8>) -> Self {
        Self {
            data: RwLock::new(data),
        }
    }

    /// Returns a copy of everything written so far.
    #[must_use]
    pub fn snapshot(&self) -> Vec<u8> {
        self.data.read().clone()
    }
}

impl StorageBackend for InMemoryBackend {
    fn read_at(&self, offset: u64, len: usize) -> StorageResult<Vec<u8>> {
        let data = self.data.read();
        let size = data.len() as u64;
        let start = offset as usize;
        let end = start.saturating_add(len);

        if offset > size || end > data.len() {
            return Err(StorageError::OutOfBounds { offset, len, size });
        }

        Ok(data[start..end].to_vec())
    }

    fn append(&mut self, new_data: &[u8]) -> StorageResult<u64> {
        let mut data = self.data.write();
        let offset = data.len() as u64;
        data.extend_from_slice(new_data);
        Ok(offset)
    }

    fn flush(&mut self) -> StorageResult<()> {
        // Nothing buffered.
        Ok(())
    }

    fn sync(&mut self) -> StorageResult<()> {
        // No metadata to sync.
        Ok(())
    }

    fn len(&self) -> StorageResult<u64> {
        Ok(self.data.read().len() as u64)
    }

    fn truncate(&mut self, new_len: u64) -> StorageResult<()> {
        let mut data = self.data.write();
        let size = data.len() as u64;

        if new_len > size {
            return Err(StorageError::TruncateBeyondEnd {
                requested: new_len,
                size,
            });
        }

        data.truncate(new_len as usize);
        Ok(())
    }
}
