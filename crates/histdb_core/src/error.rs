//! Error types for the temporal record store.

use crate::record::NaturalKey;
use crate::time::{Lifespan, Timestamp};
use crate::tracker::TrackerId;
use crate::types::AccountId;
use std::io;
use thiserror::Error;

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors that can occur in store operations.
///
/// Any variant returned from a unit of work aborts that unit: nothing the
/// closure staged is applied or journaled.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Storage backend error.
    #[error("storage error: {0}")]
    Storage(#[from] histdb_storage::StorageError),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// CBOR encode or decode failure.
    #[error("codec error: {message}")]
    Codec {
        /// Description of the failure.
        message: String,
    },

    /// Journal is corrupted or invalid.
    #[error("journal corruption: {message}")]
    JournalCorruption {
        /// Description of the corruption.
        message: String,
    },

    /// Checksum mismatch in a journal frame.
    #[error("checksum mismatch: expected {expected:08x}, got {actual:08x}")]
    ChecksumMismatch {
        /// Expected checksum.
        expected: u32,
        /// Actual checksum.
        actual: u32,
    },

    /// A new version's lifespan would overlap an existing one.
    #[error(
        "interval overlap in {kind} for {account} key {key}: candidate {candidate} hits {existing}"
    )]
    IntervalOverlap {
        /// Payload kind of the table.
        kind: String,
        /// Account the record belongs to.
        account: AccountId,
        /// Natural key within the account.
        key: NaturalKey,
        /// Lifespan that was being inserted.
        candidate: Lifespan,
        /// Lifespan already present.
        existing: Lifespan,
    },

    /// A closed lifespan would be empty (`start >= end`).
    #[error("empty interval: start {start} is not before end {end}")]
    EmptyInterval {
        /// Proposed start.
        start: Timestamp,
        /// Proposed end.
        end: Timestamp,
    },

    /// No version with the given start exists.
    #[error("version not found in {kind} for {account} key {key} starting {start}")]
    VersionNotFound {
        /// Payload kind of the table.
        kind: String,
        /// Account searched.
        account: AccountId,
        /// Natural key searched.
        key: NaturalKey,
        /// Start timestamp searched.
        start: Timestamp,
    },

    /// The version addressed by a close is already closed.
    #[error("version already closed in {kind} for {account} key {key} starting {start}")]
    AlreadyClosed {
        /// Payload kind of the table.
        kind: String,
        /// Account addressed.
        account: AccountId,
        /// Natural key addressed.
        key: NaturalKey,
        /// Start of the version.
        start: Timestamp,
    },

    /// A close time precedes the version's start.
    #[error("close at {at} precedes version start {start}")]
    CloseBeforeStart {
        /// Requested close time.
        at: Timestamp,
        /// Start of the open version.
        start: Timestamp,
    },

    /// An unfinished tracker already exists for the account and kind.
    #[error("unfinished tracker already open for {account} kind {kind}")]
    TrackerConflict {
        /// Account with the open tracker.
        account: AccountId,
        /// Data kind with the open tracker.
        kind: String,
    },

    /// The tracker has already reached a terminal status.
    #[error("tracker {id} is already sealed")]
    TrackerSealed {
        /// The sealed tracker.
        id: TrackerId,
    },

    /// No tracker with the given ID exists.
    #[error("tracker not found: {id}")]
    TrackerNotFound {
        /// The missing tracker.
        id: TrackerId,
    },

    /// Store directory is locked by another process.
    #[error("store locked: another process has exclusive access")]
    StoreLocked,

    /// Invalid store format or version.
    #[error("invalid store format: {message}")]
    InvalidFormat {
        /// Description of the format issue.
        message: String,
    },

    /// Store is closed.
    #[error("store is closed")]
    StoreClosed,
}

impl StoreError {
    /// Creates a codec error.
    pub fn codec(message: impl Into<String>) -> Self {
        Self::Codec {
            message: message.into(),
        }
    }

    /// Creates a journal corruption error.
    pub fn journal_corruption(message: impl Into<String>) -> Self {
        Self::JournalCorruption {
            message: message.into(),
        }
    }

    /// Creates an invalid format error.
    pub fn invalid_format(message: impl Into<String>) -> Self {
        Self::InvalidFormat {
            message: message.into(),
        }
    }
}
