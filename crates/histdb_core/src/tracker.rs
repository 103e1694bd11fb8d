//! Sync trackers: one row per fetch attempt against the remote API.
//!
//! A tracker starts `UNFINISHED` with a scheduled time, and is sealed to
//! `FINISHED` or `ERROR` exactly once. At most one unfinished tracker
//! exists per account and kind, which is what serializes concurrent sync
//! attempts without any cross-process coordination beyond the store.

use crate::error::{StoreError, StoreResult};
use crate::time::Timestamp;
use crate::types::AccountId;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use uuid::Uuid;

/// Status of a sync tracker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SyncStatus {
    /// Attempt not yet performed (or currently running).
    Unfinished,
    /// Attempt completed and its snapshot was applied.
    Finished,
    /// Attempt failed; a successor was scheduled.
    Error,
}

impl SyncStatus {
    /// Returns true if the status can never change again.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Finished | Self::Error)
    }

    /// Returns the canonical uppercase name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Unfinished => "UNFINISHED",
            Self::Finished => "FINISHED",
            Self::Error => "ERROR",
        }
    }
}

impl fmt::Display for SyncStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Unique identifier for a sync tracker.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct TrackerId(pub Uuid);

impl TrackerId {
    /// Creates a new random tracker ID.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Returns the underlying UUID.
    #[must_use]
    pub const fn as_uuid(self) -> Uuid {
        self.0
    }
}

impl Default for TrackerId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for TrackerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One sync attempt for an account and data kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncTracker {
    /// Unique tracker ID.
    pub id: TrackerId,
    /// Account being synced.
    pub account: AccountId,
    /// Data kind being synced.
    pub kind: String,
    /// When the attempt becomes due.
    pub scheduled: Timestamp,
    /// When execution began, set at seal time.
    pub started: Option<Timestamp>,
    /// When execution ended, set at seal time.
    pub ended: Option<Timestamp>,
    /// Current status.
    pub status: SyncStatus,
    /// Human-readable outcome, set at seal time.
    pub detail: Option<String>,
    /// Digest of the snapshot applied by the previous finished attempt.
    ///
    /// Lets the next attempt skip reconciliation when the remote data has
    /// not changed.
    pub prior_hash: Option<String>,
}

impl SyncTracker {
    /// Creates an unfinished tracker due at `scheduled`.
    pub fn unfinished(account: AccountId, kind: impl Into<String>, scheduled: Timestamp) -> Self {
        Self {
            id: TrackerId::new(),
            account,
            kind: kind.into(),
            scheduled,
            started: None,
            ended: None,
            status: SyncStatus::Unfinished,
            detail: None,
            prior_hash: None,
        }
    }

    /// Attaches the digest of the previously applied snapshot.
    #[must_use]
    pub fn with_prior_hash(mut self, hash: impl Into<String>) -> Self {
        self.prior_hash = Some(hash.into());
        self
    }

    /// Returns true if the attempt should run now.
    #[must_use]
    pub fn is_due(&self, now: Timestamp) -> bool {
        self.status == SyncStatus::Unfinished && self.scheduled <= now
    }

    /// Returns true if the tracker has not been sealed.
    #[must_use]
    pub fn is_open(&self) -> bool {
        !self.status.is_terminal()
    }
}

/// In-memory tracker rows with an index over open slots.
#[derive(Debug, Default)]
pub(crate) struct TrackerTable {
    rows: BTreeMap<TrackerId, SyncTracker>,
    open: BTreeMap<(AccountId, String), TrackerId>,
}

impl TrackerTable {
    /// Inserts an unfinished tracker, enforcing one open slot per
    /// account and kind.
    pub(crate) fn insert_open(&mut self, row: SyncTracker) -> StoreResult<()> {
        if !row.is_open() {
            return Err(StoreError::invalid_format(
                "tracker inserted as open must be unfinished",
            ));
        }

        let slot = (row.account, row.kind.clone());
        if self.open.contains_key(&slot) {
            return Err(StoreError::TrackerConflict {
                account: row.account,
                kind: row.kind,
            });
        }

        self.open.insert(slot, row.id);
        self.rows.insert(row.id, row);
        Ok(())
    }

    /// Seals a tracker to a terminal status.
    pub(crate) fn seal(
        &mut self,
        id: TrackerId,
        status: SyncStatus,
        started: Option<Timestamp>,
        ended: Option<Timestamp>,
        detail: Option<String>,
    ) -> StoreResult<()> {
        if !status.is_terminal() {
            return Err(StoreError::invalid_format("seal status must be terminal"));
        }

        let row = self
            .rows
            .get_mut(&id)
            .ok_or(StoreError::TrackerNotFound { id })?;

        if row.status.is_terminal() {
            return Err(StoreError::TrackerSealed { id });
        }

        row.status = status;
        row.started = started;
        row.ended = ended;
        row.detail = detail;

        self.open.remove(&(row.account, row.kind.clone()));
        Ok(())
    }

    /// Returns the open tracker for an account and kind, if any.
    pub(crate) fn open_for(&self, account: AccountId, kind: &str) -> Option<&SyncTracker> {
        let id = self.open.get(&(account, kind.to_string()))?;
        self.rows.get(id)
    }

    /// Returns a tracker by ID.
    pub(crate) fn get(&self, id: TrackerId) -> Option<&SyncTracker> {
        self.rows.get(&id)
    }

    /// Returns the finished tracker with the latest end time.
    pub(crate) fn latest_finished(&self, account: AccountId, kind: &str) -> Option<&SyncTracker> {
        self.rows
            .values()
            .filter(|t| t.account == account && t.kind == kind && t.status == SyncStatus::Finished)
            .max_by_key(|t| t.ended)
    }

    /// Returns true if any attempt for the account and kind finished.
    pub(crate) fn has_finished(&self, account: AccountId, kind: &str) -> bool {
        self.rows
            .values()
            .any(|t| t.account == account && t.kind == kind && t.status == SyncStatus::Finished)
    }

    /// Returns every attempt for the account and kind, oldest first.
    pub(crate) fn trail(&self, account: AccountId, kind: &str) -> Vec<&SyncTracker> {
        let mut rows: Vec<&SyncTracker> = self
            .rows
            .values()
            .filter(|t| t.account == account && t.kind == kind)
            .collect();
        rows.sort_by_key(|t| t.scheduled);
        rows
    }

    /// Total tracker count.
    pub(crate) fn len(&self) -> usize {
        self.rows.len()
    }

    /// Open tracker count.
    pub(crate) fn count_open(&self) -> usize {
        self.open.len()
    }
}
