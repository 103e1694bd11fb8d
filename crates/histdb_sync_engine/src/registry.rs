//! Registry of synchronizers, one per data kind.

use std::fmt;

use histdb_core::{AccountId, HistoryStore, Timestamp};

use crate::error::{SyncError, SyncResult};
use crate::report::SyncOutcome;
use crate::unit::{DataTypeSpec, SnapshotClient, SyncUnit};

/// Object-safe face of a sync unit, letting units over different
/// payload types share one registry.
pub trait Synchronizer: Send + Sync {
    /// The kind this synchronizer owns.
    fn kind(&self) -> &'static str;

    /// Runs one attempt for `account` at the instant `now`.
    fn run(
        &self,
        store: &HistoryStore,
        account: AccountId,
        now: Timestamp,
    ) -> SyncResult<SyncOutcome>;

    /// Requests cancellation of the attempt in flight.
    fn cancel(&self);

    /// Clears a previous cancellation request.
    fn reset_cancel(&self);
}

impl<S, C> Synchronizer for SyncUnit<S, C>
where
    S: DataTypeSpec,
    C: SnapshotClient<Raw = S::Raw>,
{
    fn kind(&self) -> &'static str {
        SyncUnit::kind(self)
    }

    fn run(
        &self,
        store: &HistoryStore,
        account: AccountId,
        now: Timestamp,
    ) -> SyncResult<SyncOutcome> {
        self.execute(store, account, now)
    }

    fn cancel(&self) {
        SyncUnit::cancel(self);
    }

    fn reset_cancel(&self) {
        SyncUnit::reset_cancel(self);
    }
}

/// Synchronizers for every data kind of an account.
///
/// Units run in registration order, so kinds with prerequisites should
/// be registered after the kinds they depend on.
#[derive(Default)]
pub struct SyncRegistry {
    units: Vec<Box<dyn Synchronizer>>,
}

impl SyncRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a synchronizer, replacing any previous one for its kind.
    pub fn register(&mut self, unit: Box<dyn Synchronizer>) -> &mut Self {
        match self.units.iter_mut().find(|u| u.kind() == unit.kind()) {
            Some(slot) => *slot = unit,
            None => self.units.push(unit),
        }
        self
    }

    /// Returns the synchronizer for a kind.
    pub fn get(&self, kind: &str) -> Option<&dyn Synchronizer> {
        self.units
            .iter()
            .find(|u| u.kind() == kind)
            .map(|unit| unit.as_ref())
    }

    /// Registered kinds, in run order.
    pub fn kinds(&self) -> Vec<&'static str> {
        self.units.iter().map(|u| u.kind()).collect()
    }

    /// Number of registered kinds.
    pub fn len(&self) -> usize {
        self.units.len()
    }

    /// Returns true if no synchronizer is registered.
    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }

    /// Runs one attempt for a single kind.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::UnknownKind`] if no synchronizer is
    /// registered for `kind`.
    pub fn run(
        &self,
        store: &HistoryStore,
        account: AccountId,
        kind: &str,
        now: Timestamp,
    ) -> SyncResult<SyncOutcome> {
        let unit = self
            .get(kind)
            .ok_or_else(|| SyncError::unknown_kind(kind))?;
        unit.run(store, account, now)
    }

    /// Runs every registered unit once, in registration order.
    ///
    /// Skips and fetch failures are ordinary entries in the returned
    /// reports; a store fault aborts the remaining units.
    pub fn run_all(
        &self,
        store: &HistoryStore,
        account: AccountId,
        now: Timestamp,
    ) -> SyncResult<Vec<(&'static str, SyncOutcome)>> {
        let mut reports = Vec::with_capacity(self.units.len());
        for unit in &self.units {
            let outcome = unit.run(store, account, now)?;
            reports.push((unit.kind(), outcome));
        }
        Ok(reports)
    }

    /// Requests cancellation on every registered unit.
    pub fn cancel_all(&self) {
        for unit in &self.units {
            unit.cancel();
        }
    }
}

impl fmt::Debug for SyncRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SyncRegistry")
            .field("kinds", &self.kinds())
            .finish()
    }
}
