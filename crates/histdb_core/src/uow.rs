//! Units of work: staged mutations with read-your-writes.
//!
//! A [`UnitOfWork`] validates and stages journal operations without
//! touching store state. The overlay it keeps lets later calls in the
//! same unit see earlier ones, which is what makes close-then-create at
//! one instant and seal-then-successor tracker handoffs expressible as
//! single atomic units.

use crate::codec;
use crate::error::{StoreError, StoreResult};
use crate::journal::JournalOp;
use crate::record::{NaturalKey, TemporalPayload, Version};
use crate::store::HistoryStore;
use crate::table::decode_version;
use crate::time::{Lifespan, Timestamp};
use crate::tracker::{SyncStatus, SyncTracker, TrackerId};
use crate::types::{AccountId, TableId};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};

/// Pending effects of the current unit, layered over base state.
#[derive(Debug, Default)]
struct Overlay {
    /// Kinds defined in this unit.
    defined: BTreeMap<String, TableId>,
    /// Next table ID to hand out, fetched from base on first use.
    next_table: Option<TableId>,
    /// Versions created in this unit, with their current end.
    created: BTreeMap<(TableId, AccountId, NaturalKey, Timestamp), (Timestamp, Vec<u8>)>,
    /// Ends staged for base versions.
    closed: BTreeMap<(TableId, AccountId, NaturalKey, Timestamp), Timestamp>,
    /// Trackers opened in this unit, by slot.
    opened: BTreeMap<(AccountId, String), SyncTracker>,
    /// Trackers sealed in this unit.
    sealed: BTreeSet<TrackerId>,
    /// Containers replaced in this unit.
    containers: BTreeMap<AccountId, Vec<u8>>,
}

/// One atomic unit of staged mutations.
///
/// Obtained inside [`HistoryStore::unit_of_work`]; everything staged
/// here is journaled and applied together when the closure returns
/// `Ok`, and discarded entirely on `Err`.
///
/// Reads on the unit ([`latest`](Self::latest),
/// [`live_for`](Self::live_for), and friends) see base state patched by
/// the unit's own staged operations.
#[derive(Debug)]
pub struct UnitOfWork<'s> {
    store: &'s HistoryStore,
    staged: Vec<JournalOp>,
    overlay: Overlay,
}

impl<'s> UnitOfWork<'s> {
    pub(crate) fn new(store: &'s HistoryStore) -> Self {
        Self {
            store,
            staged: Vec::new(),
            overlay: Overlay::default(),
        }
    }

    pub(crate) fn into_staged(self) -> Vec<JournalOp> {
        self.staged
    }

    /// Resolves a kind to its table, defining it if this unit is the
    /// first to use it.
    fn resolve_table(&mut self, kind: &str) -> StoreResult<TableId> {
        if let Some(id) = self.lookup_table(kind)? {
            return Ok(id);
        }

        let id = match self.overlay.next_table {
            Some(id) => id,
            None => self.store.read_state(|state| Ok(state.tables.next_id()))?,
        };
        self.overlay.next_table = Some(id.next());
        self.overlay.defined.insert(kind.to_string(), id);
        self.staged.push(JournalOp::DefineTable {
            table: id,
            kind: kind.to_string(),
        });
        Ok(id)
    }

    fn lookup_table(&self, kind: &str) -> StoreResult<Option<TableId>> {
        if let Some(id) = self.overlay.defined.get(kind) {
            return Ok(Some(*id));
        }
        self.store.read_state(|state| Ok(state.tables.lookup(kind)))
    }

    /// Finds any effective version of `(account, key)` overlapping
    /// `candidate`, with this unit's closes already applied.
    fn find_overlap(
        &self,
        table: TableId,
        account: AccountId,
        key: &NaturalKey,
        candidate: Lifespan,
    ) -> StoreResult<Option<Lifespan>> {
        let lo = (table, account, key.clone(), Timestamp::from_millis(i64::MIN));
        let hi = (table, account, key.clone(), Timestamp::FOREVER);
        for ((_, _, _, start), (end, _)) in self.overlay.created.range(lo..=hi) {
            let life = Lifespan::new(*start, *end);
            if life.overlaps(candidate) {
                return Ok(Some(life));
            }
        }

        self.store.read_state(|state| {
            let Some(raw) = state.versions.get(&table) else {
                return Ok(None);
            };
            for (life, _) in raw.versions_of(account, key) {
                let effective = match self
                    .overlay
                    .closed
                    .get(&(table, account, key.clone(), life.start))
                {
                    Some(end) => Lifespan::new(life.start, *end),
                    None => life,
                };
                if effective.overlaps(candidate) {
                    return Ok(Some(effective));
                }
            }
            Ok(None)
        })
    }

    /// Stages a new open version of a record starting at `at`.
    ///
    /// The natural key is derived from the payload. The version's
    /// lifespan is `[at, forever)`; evolving the record later closes it
    /// and creates a successor.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::IntervalOverlap`] if any effective version
    /// of the record overlaps the new lifespan, or
    /// [`StoreError::EmptyInterval`] if the lifespan would be empty.
    pub fn create<P: TemporalPayload>(
        &mut self,
        account: AccountId,
        at: Timestamp,
        payload: &P,
    ) -> StoreResult<()> {
        let key = payload.natural_key();
        let life = Lifespan::open(at);
        if life.start >= life.end {
            return Err(StoreError::EmptyInterval {
                start: life.start,
                end: life.end,
            });
        }

        let table = self.resolve_table(P::KIND)?;
        if let Some(existing) = self.find_overlap(table, account, &key, life)? {
            return Err(StoreError::IntervalOverlap {
                kind: P::KIND.to_string(),
                account,
                key,
                candidate: life,
                existing,
            });
        }

        let bytes = codec::to_vec(payload)?;
        self.overlay.created.insert(
            (table, account, key.clone(), at),
            (Timestamp::FOREVER, bytes.clone()),
        );
        self.staged.push(JournalOp::CreateVersion {
            table,
            account,
            key,
            life,
            payload: bytes,
        });
        Ok(())
    }

    /// Stages the close of the open version starting at `start`,
    /// setting its exclusive end to `at`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::VersionNotFound`] if no version of the
    /// record starts at `start`, [`StoreError::AlreadyClosed`] if that
    /// version already has an end, [`StoreError::CloseBeforeStart`] if
    /// `at` precedes the start, or [`StoreError::EmptyInterval`] if `at`
    /// equals it.
    pub fn close<P: TemporalPayload>(
        &mut self,
        account: AccountId,
        key: &NaturalKey,
        start: Timestamp,
        at: Timestamp,
    ) -> StoreResult<()> {
        let Some(table) = self.lookup_table(P::KIND)? else {
            return Err(StoreError::VersionNotFound {
                kind: P::KIND.to_string(),
                account,
                key: key.clone(),
                start,
            });
        };
        let row = (table, account, key.clone(), start);

        if let Some((end, _)) = self.overlay.created.get(&row) {
            if !end.is_forever() {
                return Err(StoreError::AlreadyClosed {
                    kind: P::KIND.to_string(),
                    account,
                    key: key.clone(),
                    start,
                });
            }
        } else if self.overlay.closed.contains_key(&row) {
            return Err(StoreError::AlreadyClosed {
                kind: P::KIND.to_string(),
                account,
                key: key.clone(),
                start,
            });
        } else {
            let life = self.store.read_state(|state| {
                Ok(state.versions.get(&table).and_then(|raw| {
                    raw.versions_of(account, key)
                        .map(|(life, _)| life)
                        .find(|life| life.start == start)
                }))
            })?;
            match life {
                None => {
                    return Err(StoreError::VersionNotFound {
                        kind: P::KIND.to_string(),
                        account,
                        key: key.clone(),
                        start,
                    });
                }
                Some(life) if !life.is_open() => {
                    return Err(StoreError::AlreadyClosed {
                        kind: P::KIND.to_string(),
                        account,
                        key: key.clone(),
                        start,
                    });
                }
                Some(_) => {}
            }
        }

        if at < start {
            return Err(StoreError::CloseBeforeStart { at, start });
        }
        if at == start {
            return Err(StoreError::EmptyInterval { start, end: at });
        }

        if let Some((end, _)) = self.overlay.created.get_mut(&row) {
            *end = at;
        } else {
            self.overlay.closed.insert(row, at);
        }
        self.staged.push(JournalOp::CloseVersion {
            table,
            account,
            key: key.clone(),
            start,
            end: at,
        });
        Ok(())
    }

    /// Stages a new unfinished tracker.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::TrackerConflict`] if an unfinished tracker
    /// for the same account and kind exists and was not sealed earlier
    /// in this unit, or [`StoreError::InvalidFormat`] if the row is not
    /// unfinished.
    pub fn open_tracker(&mut self, row: SyncTracker) -> StoreResult<()> {
        if !row.is_open() {
            return Err(StoreError::invalid_format(
                "tracker opened in a unit must be unfinished",
            ));
        }

        let slot = (row.account, row.kind.clone());
        if self.overlay.opened.contains_key(&slot) {
            return Err(StoreError::TrackerConflict {
                account: row.account,
                kind: row.kind,
            });
        }
        let base_open = self
            .store
            .read_state(|state| Ok(state.trackers.open_for(row.account, &row.kind).map(|t| t.id)))?;
        if let Some(open_id) = base_open {
            if !self.overlay.sealed.contains(&open_id) {
                return Err(StoreError::TrackerConflict {
                    account: row.account,
                    kind: row.kind,
                });
            }
        }

        self.staged.push(JournalOp::OpenTracker { row: row.clone() });
        self.overlay.opened.insert(slot, row);
        Ok(())
    }

    /// Stages the seal of a tracker to a terminal status, freeing its
    /// slot for a successor opened later in the same unit.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::TrackerNotFound`] if the tracker does not
    /// exist, [`StoreError::TrackerSealed`] if it already reached a
    /// terminal status, or [`StoreError::InvalidFormat`] if `status` is
    /// not terminal.
    pub fn seal_tracker(
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
        if self.overlay.sealed.contains(&id) {
            return Err(StoreError::TrackerSealed { id });
        }

        let opened_slot = self
            .overlay
            .opened
            .iter()
            .find(|(_, row)| row.id == id)
            .map(|(slot, _)| slot.clone());
        match opened_slot {
            Some(slot) => {
                self.overlay.opened.remove(&slot);
            }
            None => {
                let row = self
                    .store
                    .read_state(|state| Ok(state.trackers.get(id).cloned()))?
                    .ok_or(StoreError::TrackerNotFound { id })?;
                if row.status.is_terminal() {
                    return Err(StoreError::TrackerSealed { id });
                }
            }
        }

        self.overlay.sealed.insert(id);
        self.staged.push(JournalOp::SealTracker {
            id,
            status,
            started,
            ended,
            detail,
        });
        Ok(())
    }

    /// Stages the replacement of an account's container document.
    ///
    /// # Errors
    ///
    /// Returns an error if the container fails to encode.
    pub fn put_container<T: Serialize>(&mut self, account: AccountId, container: &T) -> StoreResult<()> {
        let payload = codec::to_vec(container)?;
        self.overlay.containers.insert(account, payload.clone());
        self.staged.push(JournalOp::PutContainer { account, payload });
        Ok(())
    }

    /// Returns the record's open version as this unit sees it.
    ///
    /// # Errors
    ///
    /// Returns an error if a payload fails to decode.
    pub fn latest<P: TemporalPayload>(
        &self,
        account: AccountId,
        key: &NaturalKey,
    ) -> StoreResult<Option<Version<P>>> {
        let Some(table) = self.lookup_table(P::KIND)? else {
            return Ok(None);
        };

        let lo = (table, account, key.clone(), Timestamp::from_millis(i64::MIN));
        let hi = (table, account, key.clone(), Timestamp::FOREVER);
        for ((_, _, _, start), (end, payload)) in self.overlay.created.range(lo..=hi) {
            if end.is_forever() {
                return Ok(Some(decode_version(
                    account,
                    key.clone(),
                    Lifespan::open(*start),
                    payload,
                )?));
            }
        }

        self.store.read_state(|state| {
            let Some(raw) = state.versions.get(&table) else {
                return Ok(None);
            };
            match raw.open_version(account, key) {
                Some((life, payload)) => {
                    if self
                        .overlay
                        .closed
                        .contains_key(&(table, account, key.clone(), life.start))
                    {
                        Ok(None)
                    } else {
                        Ok(Some(decode_version(account, key.clone(), life, payload)?))
                    }
                }
                None => Ok(None),
            }
        })
    }

    /// Returns every version of a kind live at `at` for one account, as
    /// this unit sees it, ordered by natural key.
    ///
    /// # Errors
    ///
    /// Returns an error if a payload fails to decode.
    pub fn live_for<P: TemporalPayload>(
        &self,
        account: AccountId,
        at: Timestamp,
    ) -> StoreResult<Vec<Version<P>>> {
        let Some(table) = self.lookup_table(P::KIND)? else {
            return Ok(Vec::new());
        };

        let mut live: BTreeMap<NaturalKey, Version<P>> = BTreeMap::new();

        self.store.read_state(|state| {
            let Some(raw) = state.versions.get(&table) else {
                return Ok(());
            };
            for (key, life, payload) in raw.live_for(account, at) {
                let effective = match self
                    .overlay
                    .closed
                    .get(&(table, account, key.clone(), life.start))
                {
                    Some(end) => Lifespan::new(life.start, *end),
                    None => life,
                };
                if effective.contains(at) {
                    live.insert(
                        key.clone(),
                        decode_version(account, key.clone(), effective, payload)?,
                    );
                }
            }
            Ok(())
        })?;

        let lo = (
            table,
            account,
            NaturalKey::Int(i64::MIN),
            Timestamp::from_millis(i64::MIN),
        );
        for ((t, a, key, start), (end, payload)) in self.overlay.created.range(lo..) {
            if (*t, *a) != (table, account) {
                break;
            }
            let life = Lifespan::new(*start, *end);
            if life.contains(at) {
                live.insert(key.clone(), decode_version(account, key.clone(), life, payload)?);
            }
        }

        Ok(live.into_values().collect())
    }

    /// Returns the unfinished tracker for an account and kind as this
    /// unit sees it.
    ///
    /// # Errors
    ///
    /// Returns an error if the store is closed.
    pub fn open_tracker_for(
        &self,
        account: AccountId,
        kind: &str,
    ) -> StoreResult<Option<SyncTracker>> {
        if let Some(row) = self.overlay.opened.get(&(account, kind.to_string())) {
            return Ok(Some(row.clone()));
        }
        self.store.read_state(|state| {
            Ok(state
                .trackers
                .open_for(account, kind)
                .filter(|row| !self.overlay.sealed.contains(&row.id))
                .cloned())
        })
    }

    /// Returns an account's container document as this unit sees it.
    ///
    /// # Errors
    ///
    /// Returns an error if the container fails to decode.
    pub fn get_container<T: DeserializeOwned>(&self, account: AccountId) -> StoreResult<Option<T>> {
        if let Some(bytes) = self.overlay.containers.get(&account) {
            return Ok(Some(codec::from_slice(bytes)?));
        }
        self.store.read_state(|state| match state.containers.get(&account) {
            Some(bytes) => Ok(Some(codec::from_slice(bytes)?)),
            None => Ok(None),
        })
    }
}
