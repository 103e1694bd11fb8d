//! Store facade and journal recovery.

use crate::codec;
use crate::config::StoreConfig;
use crate::dir::StoreDir;
use crate::error::{StoreError, StoreResult};
use crate::journal::{JournalLog, JournalOp};
use crate::record::TemporalPayload;
use crate::table::{RawTable, TableRegistry, TemporalTable};
use crate::tracker::{SyncTracker, TrackerId, TrackerTable};
use crate::types::{AccountId, SequenceNo, TableId, UnitId};
use crate::uow::UnitOfWork;
use histdb_storage::StorageBackend;
use parking_lot::{Mutex, RwLock};
use serde::de::DeserializeOwned;
use std::collections::BTreeMap;
use std::path::Path;

/// All store state, rebuilt from the journal on open.
///
/// The journal is the sole source of truth: the table registry, every
/// version interval, every tracker row, and the account containers are
/// reconstructed by replaying committed units in order.
#[derive(Debug, Default)]
pub(crate) struct StoreState {
    pub(crate) tables: TableRegistry,
    pub(crate) versions: BTreeMap<TableId, RawTable>,
    pub(crate) trackers: TrackerTable,
    pub(crate) containers: BTreeMap<AccountId, Vec<u8>>,
}

impl StoreState {
    /// Returns the raw table holding a payload kind, if one is defined.
    pub(crate) fn raw_table(&self, kind: &str) -> Option<&RawTable> {
        let table = self.tables.lookup(kind)?;
        self.versions.get(&table)
    }

    /// Applies one committed operation.
    ///
    /// Shared between replay and live commits, so a reopened store always
    /// converges on the same state a running store had.
    fn apply(&mut self, op: JournalOp) -> StoreResult<()> {
        match op {
            JournalOp::DefineTable { table, kind } => {
                self.tables.apply_define(table, kind);
                self.versions.entry(table).or_default();
            }
            JournalOp::CreateVersion {
                table,
                account,
                key,
                life,
                payload,
            } => {
                self.versions
                    .entry(table)
                    .or_default()
                    .insert(account, key, life, payload);
            }
            JournalOp::CloseVersion {
                table,
                account,
                key,
                start,
                end,
            } => {
                let closed = self
                    .versions
                    .get_mut(&table)
                    .is_some_and(|raw| raw.set_end(account, &key, start, end));
                if !closed {
                    return Err(StoreError::journal_corruption(format!(
                        "close of unknown version in {table} for {account}"
                    )));
                }
            }
            JournalOp::OpenTracker { row } => self.trackers.insert_open(row)?,
            JournalOp::SealTracker {
                id,
                status,
                started,
                ended,
                detail,
            } => self.trackers.seal(id, status, started, ended, detail)?,
            JournalOp::PutContainer { account, payload } => {
                self.containers.insert(account, payload);
            }
            JournalOp::Begin { .. } | JournalOp::Commit { .. } => {
                return Err(StoreError::journal_corruption(
                    "unit marker applied as an operation",
                ));
            }
        }
        Ok(())
    }
}

/// Counters owned by the single writer.
#[derive(Debug)]
struct WriterState {
    next_unit: UnitId,
    next_seq: SequenceNo,
}

/// What replay found in the journal.
struct Recovery {
    state: StoreState,
    next_unit: UnitId,
    next_seq: SequenceNo,
    units_applied: u64,
    units_dropped: u64,
    /// End of the last whole frame; a torn tail is truncated here.
    valid_len: u64,
}

/// Point-in-time store statistics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoreStats {
    /// Number of defined tables.
    pub tables: usize,
    /// Total stored versions across all tables.
    pub versions: usize,
    /// Total tracker rows.
    pub trackers: usize,
    /// Tracker rows still unfinished.
    pub open_trackers: usize,
    /// Journal size in bytes.
    pub journal_bytes: u64,
}

/// The temporal record store.
///
/// `HistoryStore` is the entry point for everything the crate does:
/// opening and recovering the journal, reading versioned records through
/// [`table`](Self::table), and mutating state through
/// [`unit_of_work`](Self::unit_of_work).
///
/// # Opening a Store
///
/// ```rust,ignore
/// use histdb_core::HistoryStore;
/// use std::path::Path;
///
/// let store = HistoryStore::open(Path::new("history"))?;
///
/// store.unit_of_work(|uow| {
///     uow.create(account, now, &balance)?;
///     Ok(())
/// })?;
///
/// store.close()?;
/// ```
///
/// For tests, [`open_in_memory`](Self::open_in_memory) gives a store
/// with no files behind it.
pub struct HistoryStore {
    /// Configuration.
    config: StoreConfig,
    /// Store directory holding the lock. `None` for in-memory stores.
    dir: Option<StoreDir>,
    /// The append-only journal.
    journal: JournalLog,
    /// Replayed state.
    state: RwLock<StoreState>,
    /// Writer counters, also serializing units of work.
    writer: Mutex<WriterState>,
    /// Whether the store is open.
    is_open: RwLock<bool>,
}

impl HistoryStore {
    /// Opens a store from a directory path.
    ///
    /// Creates the directory if missing, acquires an exclusive lock, and
    /// replays the journal.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::StoreLocked`] if another process holds the
    /// directory, [`StoreError::JournalCorruption`] or
    /// [`StoreError::ChecksumMismatch`] if the journal is damaged beyond
    /// its tail, or an I/O error.
    pub fn open(path: &Path) -> StoreResult<Self> {
        Self::open_with_config(path, StoreConfig::default())
    }

    /// Opens a store from a directory path with custom configuration.
    ///
    /// # Errors
    ///
    /// As [`open`](Self::open); additionally returns
    /// [`StoreError::InvalidFormat`] when the directory is missing and
    /// `create_if_missing` is off.
    pub fn open_with_config(path: &Path, config: StoreConfig) -> StoreResult<Self> {
        use histdb_storage::FileBackend;

        let dir = StoreDir::open(path, config.create_if_missing)?;
        let backend = FileBackend::open(&dir.journal_path())?;
        Self::from_parts(config, Some(dir), JournalLog::new(Box::new(backend)))
    }

    /// Opens a store over a pre-built storage backend.
    ///
    /// Lower-level constructor used when the caller manages its own
    /// backend; no directory lock is taken. Most callers want
    /// [`open`](Self::open) instead.
    ///
    /// # Errors
    ///
    /// Returns an error if replaying the backend's contents fails.
    pub fn open_with_backend(
        backend: Box<dyn StorageBackend>,
        config: StoreConfig,
    ) -> StoreResult<Self> {
        Self::from_parts(config, None, JournalLog::new(backend))
    }

    /// Opens a fresh in-memory store for testing.
    ///
    /// # Errors
    ///
    /// Never fails in practice; the signature matches the other
    /// constructors.
    pub fn open_in_memory() -> StoreResult<Self> {
        use histdb_storage::InMemoryBackend;
        Self::open_with_backend(Box::new(InMemoryBackend::new()), StoreConfig::default())
    }

    fn from_parts(config: StoreConfig, dir: Option<StoreDir>, journal: JournalLog) -> StoreResult<Self> {
        let recovery = Self::replay(&journal)?;

        let total_len = journal.len()?;
        if recovery.valid_len < total_len {
            tracing::warn!(
                dropped_bytes = total_len - recovery.valid_len,
                "truncating torn journal tail"
            );
            journal.truncate(recovery.valid_len)?;
            journal.sync()?;
        }
        if recovery.units_dropped > 0 {
            tracing::warn!(
                units = recovery.units_dropped,
                "dropped uncommitted units during replay"
            );
        }

        tracing::info!(
            tables = recovery.state.tables.len(),
            trackers = recovery.state.trackers.len(),
            units = recovery.units_applied,
            journal_bytes = recovery.valid_len,
            "store opened"
        );

        Ok(Self {
            config,
            dir,
            journal,
            state: RwLock::new(recovery.state),
            writer: Mutex::new(WriterState {
                next_unit: recovery.next_unit,
                next_seq: recovery.next_seq,
            }),
            is_open: RwLock::new(true),
        })
    }

    /// Replays the journal into fresh state.
    ///
    /// Operations are buffered per unit and applied only when the unit's
    /// `Commit` is seen, so a unit interrupted mid-write leaves no trace.
    /// An operation outside any unit is corruption, not a torn tail.
    fn replay(journal: &JournalLog) -> StoreResult<Recovery> {
        let mut state = StoreState::default();
        let mut pending: Option<(UnitId, Vec<JournalOp>)> = None;
        let mut max_unit = 0u64;
        let mut max_seq = 0u64;
        let mut units_applied = 0u64;
        let mut units_dropped = 0u64;

        let mut iter = journal.iter()?;
        while let Some(item) = iter.next() {
            let (offset, op) = item?;
            match op {
                JournalOp::Begin { unit } => {
                    if pending.take().is_some() {
                        units_dropped += 1;
                    }
                    max_unit = max_unit.max(unit.as_u64());
                    pending = Some((unit, Vec::new()));
                }
                JournalOp::Commit { unit, seq } => {
                    let Some((open_unit, ops)) = pending.take() else {
                        return Err(StoreError::journal_corruption(format!(
                            "commit without begin at offset {offset}"
                        )));
                    };
                    if open_unit != unit {
                        return Err(StoreError::journal_corruption(format!(
                            "commit for {unit} while {open_unit} is open at offset {offset}"
                        )));
                    }
                    for op in ops {
                        state.apply(op)?;
                    }
                    max_seq = max_seq.max(seq.as_u64());
                    units_applied += 1;
                }
                other => match pending.as_mut() {
                    Some((_, ops)) => ops.push(other),
                    None => {
                        return Err(StoreError::journal_corruption(format!(
                            "{} outside unit at offset {offset}",
                            other.label()
                        )));
                    }
                },
            }
        }
        if pending.is_some() {
            units_dropped += 1;
        }

        let valid_len = iter.offset();
        drop(iter);

        Ok(Recovery {
            state,
            next_unit: UnitId::new(max_unit + 1),
            next_seq: SequenceNo::new(max_seq + 1),
            units_applied,
            units_dropped,
            valid_len,
        })
    }

    /// Executes a function as one atomic unit of work.
    ///
    /// Everything the closure stages is journaled and applied together
    /// when it returns `Ok`; on `Err` nothing is journaled or applied.
    /// Units are serialized, so the closure sees a stable base state.
    ///
    /// A closure that stages nothing commits nothing, whatever it
    /// returns.
    ///
    /// # Errors
    ///
    /// Returns the closure's error, or an error committing the unit.
    pub fn unit_of_work<F, T>(&self, f: F) -> StoreResult<T>
    where
        F: FnOnce(&mut UnitOfWork<'_>) -> StoreResult<T>,
    {
        self.ensure_open()?;
        let mut writer = self.writer.lock();

        let mut uow = UnitOfWork::new(self);
        let value = f(&mut uow)?;
        let staged = uow.into_staged();

        if staged.is_empty() {
            return Ok(value);
        }

        let unit = writer.next_unit;
        writer.next_unit = unit.next();
        let seq = writer.next_seq;
        writer.next_seq = seq.next();

        self.commit_unit(unit, seq, staged)?;
        Ok(value)
    }

    /// Journals and applies one unit.
    ///
    /// The journal write completes (and is flushed or synced per the
    /// configuration) before any in-memory state changes, so a crash
    /// between the two replays to the same state.
    fn commit_unit(&self, unit: UnitId, seq: SequenceNo, staged: Vec<JournalOp>) -> StoreResult<()> {
        let ops = staged.len();

        self.journal.append(&JournalOp::Begin { unit })?;
        for op in &staged {
            self.journal.append(op)?;
        }
        self.journal.append(&JournalOp::Commit { unit, seq })?;

        if self.config.sync_on_commit {
            self.journal.sync()?;
        } else {
            self.journal.flush()?;
        }

        let mut state = self.state.write();
        for op in staged {
            state.apply(op)?;
        }

        tracing::debug!(%unit, %seq, ops, "unit committed");
        Ok(())
    }

    /// Runs a read against the current state under the read lock.
    pub(crate) fn read_state<R>(
        &self,
        f: impl FnOnce(&StoreState) -> StoreResult<R>,
    ) -> StoreResult<R> {
        self.ensure_open()?;
        let state = self.state.read();
        f(&state)
    }

    /// Returns the typed read facade for one payload kind.
    #[must_use]
    pub fn table<P: TemporalPayload>(&self) -> TemporalTable<'_, P> {
        TemporalTable::new(self)
    }

    /// Returns the unfinished tracker for an account and kind, if any.
    ///
    /// # Errors
    ///
    /// Returns an error if the store is closed.
    pub fn open_tracker(&self, account: AccountId, kind: &str) -> StoreResult<Option<SyncTracker>> {
        self.read_state(|state| Ok(state.trackers.open_for(account, kind).cloned()))
    }

    /// Returns a tracker by ID.
    ///
    /// # Errors
    ///
    /// Returns an error if the store is closed.
    pub fn tracker(&self, id: TrackerId) -> StoreResult<Option<SyncTracker>> {
        self.read_state(|state| Ok(state.trackers.get(id).cloned()))
    }

    /// Returns the most recently finished tracker for an account and
    /// kind.
    ///
    /// # Errors
    ///
    /// Returns an error if the store is closed.
    pub fn latest_finished_tracker(
        &self,
        account: AccountId,
        kind: &str,
    ) -> StoreResult<Option<SyncTracker>> {
        self.read_state(|state| Ok(state.trackers.latest_finished(account, kind).cloned()))
    }

    /// Returns true if any sync attempt for the account and kind has
    /// finished.
    ///
    /// # Errors
    ///
    /// Returns an error if the store is closed.
    pub fn has_finished_sync(&self, account: AccountId, kind: &str) -> StoreResult<bool> {
        self.read_state(|state| Ok(state.trackers.has_finished(account, kind)))
    }

    /// Returns every sync attempt for the account and kind, oldest
    /// first.
    ///
    /// # Errors
    ///
    /// Returns an error if the store is closed.
    pub fn tracker_trail(&self, account: AccountId, kind: &str) -> StoreResult<Vec<SyncTracker>> {
        self.read_state(|state| {
            Ok(state
                .trackers
                .trail(account, kind)
                .into_iter()
                .cloned()
                .collect())
        })
    }

    /// Returns an account's container document, if one was stored.
    ///
    /// # Errors
    ///
    /// Returns an error if the store is closed or the container fails to
    /// decode.
    pub fn get_container<T: DeserializeOwned>(&self, account: AccountId) -> StoreResult<Option<T>> {
        self.read_state(|state| match state.containers.get(&account) {
            Some(bytes) => Ok(Some(codec::from_slice(bytes)?)),
            None => Ok(None),
        })
    }

    /// Returns current store statistics.
    ///
    /// # Errors
    ///
    /// Returns an error if the store is closed.
    pub fn stats(&self) -> StoreResult<StoreStats> {
        let journal_bytes = self.journal.len()?;
        self.read_state(|state| {
            Ok(StoreStats {
                tables: state.tables.len(),
                versions: state.versions.values().map(RawTable::len).sum(),
                trackers: state.trackers.len(),
                open_trackers: state.trackers.count_open(),
                journal_bytes,
            })
        })
    }

    /// Closes the store, syncing the journal.
    ///
    /// Further operations fail with [`StoreError::StoreClosed`]. Closing
    /// twice is a no-op.
    ///
    /// # Errors
    ///
    /// Returns an error if the final sync fails.
    pub fn close(&self) -> StoreResult<()> {
        let mut is_open = self.is_open.write();
        if !*is_open {
            return Ok(());
        }
        self.journal.sync()?;
        *is_open = false;
        tracing::info!("store closed");
        Ok(())
    }

    /// Checks if the store is open.
    #[must_use]
    pub fn is_open(&self) -> bool {
        *self.is_open.read()
    }

    fn ensure_open(&self) -> StoreResult<()> {
        if *self.is_open.read() {
            Ok(())
        } else {
            Err(StoreError::StoreClosed)
        }
    }

    /// Returns the store configuration.
    #[must_use]
    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// Returns the store directory path, or `None` for in-memory stores.
    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        self.dir.as_ref().map(StoreDir::path)
    }
}

impl std::fmt::Debug for HistoryStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HistoryStore")
            .field("is_open", &self.is_open())
            .field("path", &self.path())
            .finish_non_exhaustive()
    }
}

impl Drop for HistoryStore {
    fn drop(&mut self) {
        let _ = self.close();
    }
}
