//! The synchronization unit: one attempt for one account and data kind.
//!
//! An attempt walks five steps: resolve the pending tracker, check
//! due-ness and prerequisites, fetch through the client, reconcile the
//! mapped snapshot at the current instant, then seal the tracker and
//! open its successor. Reconcile and seal commit as two consecutive
//! units; a crash between them leaves the tracker pending, and the next
//! attempt redoes reconciliation idempotently before sealing.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use histdb_core::{
    AccountId, HistoryStore, NaturalKey, StoreError, StoreResult, SyncTracker, TemporalPayload,
    Timestamp,
};
use histdb_model::AccountContainer;
use sha2::{Digest, Sha256};
use tracing::{debug, warn};

use crate::config::SyncConfig;
use crate::error::{FetchError, SyncResult};
use crate::evolve::{self, EvolveStats};
use crate::hint;
use crate::report::{SkipReason, SyncOutcome};
use crate::tracker;

/// Detail recorded on a tracker sealed after a successful attempt.
const UPDATED_OK: &str = "Updated successfully";

/// A snapshot of one data kind for one account.
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot<R> {
    /// The raw payload as the endpoint returned it.
    pub payload: R,
    /// Raw cache-expiry hint, e.g. `Thu, 21 Dec 2017 12:00:00 GMT`.
    pub cache_until: Option<String>,
}

impl<R> Snapshot<R> {
    /// Creates a snapshot without a cache hint.
    pub fn new(payload: R) -> Self {
        Self {
            payload,
            cache_until: None,
        }
    }

    /// Attaches the endpoint's cache-expiry hint.
    #[must_use]
    pub fn with_cache_until(mut self, hint: impl Into<String>) -> Self {
        self.cache_until = Some(hint.into());
        self
    }
}

/// Fetches snapshots from the remote endpoint.
///
/// Implementations wrap whatever transport the host uses; the engine
/// sees only the resulting snapshot or a [`FetchError`].
pub trait SnapshotClient: Send + Sync {
    /// Raw payload shape returned by the endpoint.
    type Raw;

    /// Fetches the current snapshot for an account.
    fn request(&self, account: AccountId) -> Result<Snapshot<Self::Raw>, FetchError>;
}

/// How reconciliation treats a mapped snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EvolveMode {
    /// Each mapped record is reconciled on its own; stored records
    /// absent from the snapshot are left untouched.
    Scalar,
    /// The snapshot lists the account's complete set: stored records
    /// absent from it are closed.
    FullSet,
}

/// The capability set describing one synchronized data kind.
///
/// One implementation per kind replaces a subclass-per-kind hierarchy:
/// the unit executor owns the lifecycle and asks the capability set for
/// the pieces that differ between kinds.
pub trait DataTypeSpec: Send + Sync {
    /// Raw payload shape fetched from the endpoint.
    type Raw;
    /// Stored payload type.
    type Payload: TemporalPayload;

    /// How mapped records are reconciled.
    fn mode(&self) -> EvolveMode;

    /// Maps the raw endpoint payload into stored records.
    fn map(&self, raw: Self::Raw) -> Vec<Self::Payload>;

    /// Stable kind string; names both the table and the tracker slot.
    fn kind(&self) -> &'static str {
        <Self::Payload as TemporalPayload>::KIND
    }

    /// Per-kind scheduling interval; `None` uses the configured default.
    fn interval(&self) -> Option<Duration> {
        None
    }

    /// A kind that must have finished at least once before this one
    /// runs.
    fn prerequisite(&self) -> Option<&'static str> {
        None
    }
}

/// Executes synchronization attempts for one data kind.
pub struct SyncUnit<S, C> {
    spec: S,
    client: Arc<C>,
    config: SyncConfig,
    cancelled: AtomicBool,
}

impl<S, C> SyncUnit<S, C>
where
    S: DataTypeSpec,
    C: SnapshotClient<Raw = S::Raw>,
{
    /// Creates a unit from its capability spec and fetch collaborator.
    pub fn new(spec: S, client: Arc<C>, config: SyncConfig) -> Self {
        Self {
            spec,
            client,
            config,
            cancelled: AtomicBool::new(false),
        }
    }

    /// The kind this unit synchronizes.
    pub fn kind(&self) -> &'static str {
        self.spec.kind()
    }

    /// Requests cancellation of the attempt in flight.
    ///
    /// Observed between steps. The tracker is left pending, so the next
    /// attempt picks up where this one stopped.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    /// Clears a previous cancellation request.
    pub fn reset_cancel(&self) {
        self.cancelled.store(false, Ordering::SeqCst);
    }

    fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Runs one attempt for `account` at the instant `now`.
    ///
    /// Skips and fetch failures are reported in the returned
    /// [`SyncOutcome`]; only store faults surface as `Err`, leaving the
    /// tracker pending for the next run.
    pub fn execute(
        &self,
        store: &HistoryStore,
        account: AccountId,
        now: Timestamp,
    ) -> SyncResult<SyncOutcome> {
        let kind = self.spec.kind();

        let pending =
            store.unit_of_work(|uow| tracker::get_or_create_unfinished(uow, account, kind, now))?;
        if !pending.is_due(now) {
            debug!(kind, %account, due = %pending.scheduled, "not due, skipping");
            return Ok(SyncOutcome::Skipped(SkipReason::NotDue {
                due: pending.scheduled,
            }));
        }
        if let Some(required) = self.spec.prerequisite() {
            if !store.has_finished_sync(account, required)? {
                debug!(kind, %account, required, "prerequisite never finished, skipping");
                return Ok(SyncOutcome::Skipped(SkipReason::PrerequisiteMissing {
                    kind: required,
                }));
            }
        }
        if self.is_cancelled() {
            return Ok(SyncOutcome::Skipped(SkipReason::Cancelled));
        }

        let started = now;
        let snapshot = match self.client.request(account) {
            Ok(snapshot) => snapshot,
            Err(err) => return self.record_failure(store, &pending, account, started, now, &err),
        };
        if self.is_cancelled() {
            return Ok(SyncOutcome::Skipped(SkipReason::Cancelled));
        }

        let entities = self.spec.map(snapshot.payload);
        let digest = snapshot_digest(&entities)?;
        let snapshot_unchanged = pending.prior_hash.as_deref() == Some(digest.as_str());

        let stats = if snapshot_unchanged {
            debug!(kind, %account, "snapshot digest unchanged, skipping reconciliation");
            EvolveStats::default()
        } else {
            match self.spec.mode() {
                EvolveMode::Scalar => store.unit_of_work(|uow| {
                    let mut stats = EvolveStats::default();
                    for entity in &entities {
                        stats.merge(evolve::reconcile(uow, account, now, entity)?);
                    }
                    Ok(stats)
                })?,
                EvolveMode::FullSet => {
                    store.unit_of_work(|uow| evolve::reconcile_set(uow, account, now, entities))?
                }
            }
        };
        if self.is_cancelled() {
            // Reconciliation may already be committed; the pending
            // tracker makes the next attempt redo and seal it.
            return Ok(SyncOutcome::Skipped(SkipReason::Cancelled));
        }

        let interval = self.spec.interval().unwrap_or(self.config.default_interval);
        let reported = snapshot.cache_until.as_deref().and_then(hint::parse_expiry);
        let next_due = hint::successor_due(snapshot.cache_until.as_deref(), now, interval);
        store.unit_of_work(|uow| {
            tracker::mark_finished(uow, &pending, started, now, UPDATED_OK, next_due, Some(digest))?;
            if let Some(expiry) = reported {
                let mut container: AccountContainer =
                    uow.get_container(account)?.unwrap_or_default();
                container.set_expiry(kind, expiry);
                uow.put_container(account, &container)?;
            }
            Ok(())
        })?;

        debug!(
            kind,
            %account,
            created = stats.created,
            evolved = stats.evolved,
            closed = stats.closed,
            unchanged = stats.unchanged,
            next = %next_due,
            "sync finished"
        );
        Ok(SyncOutcome::Completed {
            stats,
            next_due,
            snapshot_unchanged,
        })
    }

    fn record_failure(
        &self,
        store: &HistoryStore,
        pending: &SyncTracker,
        account: AccountId,
        started: Timestamp,
        now: Timestamp,
        err: &FetchError,
    ) -> SyncResult<SyncOutcome> {
        let detail = clip(err.to_string(), self.config.detail_limit);
        let next_due = now.saturating_add(self.config.error_interval);
        store.unit_of_work(|uow| {
            tracker::mark_error(uow, pending, started, now, detail.clone(), next_due)?;
            Ok(())
        })?;

        warn!(kind = self.spec.kind(), %account, %err, retry = %next_due, "sync attempt failed");
        Ok(SyncOutcome::Failed { detail, next_due })
    }
}

impl<S, C> std::fmt::Debug for SyncUnit<S, C>
where
    S: DataTypeSpec,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncUnit")
            .field("kind", &self.spec.kind())
            .field("cancelled", &self.cancelled)
            .finish_non_exhaustive()
    }
}

/// Digest of a mapped snapshot, stable under endpoint ordering.
///
/// Entries are keyed and sorted by natural key before hashing, with the
/// last occurrence of a repeated key winning, mirroring reconciliation.
fn snapshot_digest<P: TemporalPayload>(entities: &[P]) -> StoreResult<String> {
    let mut by_key: BTreeMap<NaturalKey, Vec<u8>> = BTreeMap::new();
    for entity in entities {
        let mut buf = Vec::new();
        ciborium::ser::into_writer(entity, &mut buf)
            .map_err(|err| StoreError::codec(err.to_string()))?;
        by_key.insert(entity.natural_key(), buf);
    }

    let mut hasher = Sha256::new();
    for (key, bytes) in &by_key {
        let mut key_buf = Vec::new();
        ciborium::ser::into_writer(key, &mut key_buf)
            .map_err(|err| StoreError::codec(err.to_string()))?;
        hasher.update(&key_buf);
        hasher.update(bytes);
    }
    Ok(format!("{:x}", hasher.finalize()))
}

/// Cuts a detail string to `limit` bytes at a character boundary.
fn clip(mut detail: String, limit: usize) -> String {
    if detail.len() > limit {
        let mut cut = limit;
        while cut > 0 && !detail.is_char_boundary(cut) {
            cut -= 1;
        }
        detail.truncate(cut);
    }
    detail
}
