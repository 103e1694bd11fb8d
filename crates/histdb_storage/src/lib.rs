//! # histdb Storage
//!
//! Storage backends for the histdb journal.
//!
//! Backends are **opaque byte stores**: they append, read back, and flush
//! bytes without any knowledge of journal framing, temporal tables, or
//! sync trackers. All format interpretation happens in `histdb_core`.
//!
//! Two implementations are provided:
//!
//! - [`InMemoryBackend`] for tests and crash simulation (snapshot the
//!   bytes, drop the store, reopen from the snapshot)
//! - [`FileBackend`] for persistent storage
//!
//! ## Example
//!
//! ```rust
//! use histdb_storage::{InMemoryBackend, StorageBackend};
//!
//! let mut backend = InMemoryBackend::new();
//! let offset = backend.append(b"frame").unwrap();
//! assert_eq!(offset, 0);
//! assert_eq!(backend.read_at(0, 5).unwrap(), b"frame");
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod backend;
mod error;
mod file;
mod memory;

pub use backend::StorageBackend;
pub use error::{StorageError, StorageResult};
pub use file::FileBackend;
pub use memory::InMemoryBackend;
