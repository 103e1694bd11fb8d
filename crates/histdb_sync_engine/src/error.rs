//! Error types for the sync engine.
//!
//! Failures split into two families with different consequences:
//!
//! - [`FetchError`] describes a failed snapshot fetch. It is handled data:
//!   the attempt records it on the tracker, schedules a retry, and returns
//!   a normal outcome.
//! - [`SyncError`] describes a fault in the engine itself (most importantly
//!   a store failure). It aborts the attempt without advancing the tracker,
//!   so the same attempt is retried on the next run.

use thiserror::Error;

/// A failed snapshot fetch reported by a [`SnapshotClient`].
///
/// [`SnapshotClient`]: crate::SnapshotClient
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FetchError {
    /// The endpoint answered with a non-success status.
    #[error("endpoint returned {code}: {message}")]
    Endpoint {
        /// HTTP-like status code.
        code: u16,
        /// Message carried in the response body.
        message: String,
    },

    /// The request never produced a usable response.
    #[error("transport error: {0}")]
    Transport(String),

    /// An I/O fault below the transport.
    #[error("i/o error: {0}")]
    Io(String),
}

impl FetchError {
    /// Creates an endpoint error.
    pub fn endpoint(code: u16, message: impl Into<String>) -> Self {
        Self::Endpoint {
            code,
            message: message.into(),
        }
    }

    /// Creates a transport error.
    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport(message.into())
    }

    /// Creates an I/O error.
    pub fn io(message: impl Into<String>) -> Self {
        Self::Io(message.into())
    }

    /// Whether a retry can reasonably succeed without intervention.
    ///
    /// Transport and I/O faults are transient by nature; endpoint errors
    /// are transient only when the server itself failed.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Endpoint { code, .. } => *code >= 500,
            Self::Transport(_) | Self::Io(_) => true,
        }
    }
}

/// Errors that abort a sync attempt.
#[derive(Debug, Error)]
pub enum SyncError {
    /// The history store rejected or failed an operation.
    ///
    /// The tracker is left untouched so the attempt repeats on the
    /// next run.
    #[error("store error: {0}")]
    Store(#[from] histdb_core::StoreError),

    /// No synchronizer is registered for the requested data kind.
    #[error("unknown data kind: {kind}")]
    UnknownKind {
        /// The kind that was requested.
        kind: String,
    },
}

impl SyncError {
    /// Creates an unknown-kind error.
    pub fn unknown_kind(kind: impl Into<String>) -> Self {
        Self::UnknownKind { kind: kind.into() }
    }
}

/// Result type for sync operations.
pub type SyncResult<T> = Result<T, SyncError>;
