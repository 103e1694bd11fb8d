//! Error types for storage backends.

use std::io;
use thiserror::Error;

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Errors produced by storage backends.
#[derive(Debug, Error)]
pub enum StorageError {
    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Attempted to read outside the written range.
    #[error("read out of bounds: offset {offset}, len {len}, store holds {size} bytes")]
    OutOfBounds {
        /// Requested read offset.
        offset: u64,
        /// Requested read length.
        len: usize,
        /// Current store size in bytes.
        size: u64,
    },

    /// Attempted to truncate to a length greater than the current size.
    #[error("cannot truncate to {requested} bytes, store holds {size}")]
    TruncateBeyondEnd {
        /// Requested new length.
        requested: u64,
        /// Current store size in bytes.
        size: u64,
    },
}
