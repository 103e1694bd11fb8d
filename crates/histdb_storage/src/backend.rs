//! Storage backend trait definition.

use crate::error::StorageResult;

/// A low-level byte store for the histdb journal.
///
/// Backends provide append-only writes plus positional reads. They never
/// interpret the bytes they hold; framing, checksums, and replay all live
/// above this trait.
///
/// # Invariants
///
/// - `append` returns the offset the data landed at
/// - `read_at` returns exactly the bytes previously appended there
/// - `flush` makes appended data durable against process exit
/// - `sync` additionally makes file metadata durable
/// - implementations must be `Send + Sync`
pub trait StorageBackend: Send + Sync {
    /// Reads `len` bytes starting at `offset`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::StorageError::OutOfBounds`] if any part of the
    /// requested range lies beyond the current length, or an I/O error.
    fn read_at(&self, offset: u64, len: usize) -> StorageResult<Vec<u8>>;

    /// Appends data at the end, returning the offset it was written at.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying write fails.
    fn append(&mut self, data: &[u8]) -> StorageResult<u64>;

    /// Pushes pending writes down to the OS.
    ///
    /// # Errors
    ///
    /// Returns an error if the flush fails.
    fn flush(&mut self) -> StorageResult<()>;

    /// Makes data and metadata durable on disk.
    ///
    /// Stronger than [`Self::flush`]: after `sync` returns, the store
    /// survives power loss, not just process exit.
    ///
    /// # Errors
    ///
    /// Returns an error if the sync fails.
    fn sync(&mut self) -> StorageResult<()>;

    /// Returns the current length in bytes, which is also the offset the
    /// next `append` will write at.
    ///
    /// # Errors
    ///
    /// Returns an error if the length cannot be determined.
    fn len(&self) -> StorageResult<u64>;

    /// Returns true if nothing has been written yet.
    ///
    /// # Errors
    ///
    /// Returns an error if the length cannot be determined.
    fn is_empty(&self) -> StorageResult<bool> {
        Ok(self.len()? == 0)
    }

    /// Discards everything after `new_len` bytes.
    ///
    /// Used to drop a torn journal tail before appending resumes.
    ///
    /// # Errors
    ///
    /// Returns [`crate::StorageError::TruncateBeyondEnd`] if `new_len`
    /// exceeds the current length, or an I/O error.
    fn truncate(&mut self, new_len: u64) -> StorageResult<()>;
}
