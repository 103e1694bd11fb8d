//! Temporal interval tables and their typed read facade.
//!
//! Each payload kind gets one table. Rows are keyed by
//! `(account, natural key, lifespan start)`, so a `BTreeMap` walk yields
//! versions grouped per record in chronological order, which is what the
//! paged live-scan and the overlap checks lean on.

use crate::codec;
use crate::error::StoreResult;
use crate::record::{NaturalKey, TemporalPayload, Version};
use crate::store::HistoryStore;
use crate::time::{Lifespan, Timestamp};
use crate::types::{AccountId, TableId};
use std::collections::{BTreeMap, VecDeque};
use std::marker::PhantomData;
use std::ops::Bound;

/// Page size used by [`LiveScan`] when walking a full table.
const SCAN_PAGE: usize = 128;

/// A keyset-paged request over live records.
#[derive(Debug, Clone, PartialEq)]
pub struct PageRequest {
    /// Resume strictly after this record, or start from the beginning.
    pub after: Option<(AccountId, NaturalKey)>,
    /// Maximum records per page, at least one.
    pub limit: usize,
}

impl PageRequest {
    /// Creates a request for the first page.
    #[must_use]
    pub fn first(limit: usize) -> Self {
        Self {
            after: None,
            limit: limit.max(1),
        }
    }

    /// Creates a request resuming after a previous page's cursor.
    #[must_use]
    pub fn after(cursor: (AccountId, NaturalKey), limit: usize) -> Self {
        Self {
            after: Some(cursor),
            limit: limit.max(1),
        }
    }
}

/// One page of results plus the cursor for the next page.
#[derive(Debug, Clone, PartialEq)]
pub struct Page<T> {
    /// Records in `(account, natural key)` order.
    pub items: Vec<T>,
    /// Cursor for the next page, or `None` on the last page.
    pub next: Option<(AccountId, NaturalKey)>,
}

impl<T> Page<T> {
    /// Returns true if another page exists.
    #[must_use]
    pub fn has_more(&self) -> bool {
        self.next.is_some()
    }

    fn empty() -> Self {
        Self {
            items: Vec::new(),
            next: None,
        }
    }
}

/// A stored version: the interval end plus the CBOR payload bytes.
///
/// The interval start lives in the row key.
#[derive(Debug, Clone)]
pub(crate) struct StoredVersion {
    pub(crate) end: Timestamp,
    pub(crate) payload: Vec<u8>,
}

/// Untyped interval table for one payload kind.
#[derive(Debug, Default)]
pub(crate) struct RawTable {
    rows: BTreeMap<(AccountId, NaturalKey, Timestamp), StoredVersion>,
}

impl RawTable {
    pub(crate) fn insert(
        &mut self,
        account: AccountId,
        key: NaturalKey,
        life: Lifespan,
        payload: Vec<u8>,
    ) {
        self.rows.insert(
            (account, key, life.start),
            StoredVersion {
                end: life.end,
                payload,
            },
        );
    }

    /// Sets the end of the version starting at `start`.
    ///
    /// Returns false if no such version exists.
    pub(crate) fn set_end(
        &mut self,
        account: AccountId,
        key: &NaturalKey,
        start: Timestamp,
        end: Timestamp,
    ) -> bool {
        match self.rows.get_mut(&(account, key.clone(), start)) {
            Some(stored) => {
                stored.end = end;
                true
            }
            None => false,
        }
    }

    /// Returns the lifespan of any stored version overlapping `candidate`.
    pub(crate) fn find_overlap(
        &self,
        account: AccountId,
        key: &NaturalKey,
        candidate: Lifespan,
    ) -> Option<Lifespan> {
        self.versions_of(account, key)
            .map(|(life, _)| life)
            .find(|life| life.overlaps(candidate))
    }

    /// All versions of one record, ordered by start.
    pub(crate) fn versions_of<'a>(
        &'a self,
        account: AccountId,
        key: &NaturalKey,
    ) -> impl Iterator<Item = (Lifespan, &'a [u8])> + 'a {
        let lo = (account, key.clone(), Timestamp::from_millis(i64::MIN));
        let hi = (account, key.clone(), Timestamp::FOREVER);
        self.rows
            .range(lo..=hi)
            .map(|((_, _, start), stored)| (Lifespan::new(*start, stored.end), &stored.payload[..]))
    }

    /// The version whose interval contains `at`, if any.
    pub(crate) fn version_at(
        &self,
        account: AccountId,
        key: &NaturalKey,
        at: Timestamp,
    ) -> Option<(Lifespan, &[u8])> {
        let lo = (account, key.clone(), Timestamp::from_millis(i64::MIN));
        let hi = (account, key.clone(), at);
        let ((_, _, start), stored) = self.rows.range(lo..=hi).next_back()?;
        let life = Lifespan::new(*start, stored.end);
        life.contains(at).then_some((life, &stored.payload[..]))
    }

    /// The open version, if the record currently has one.
    ///
    /// An open interval extends to forever, so it is always the
    /// chronologically last version of its record.
    pub(crate) fn open_version(
        &self,
        account: AccountId,
        key: &NaturalKey,
    ) -> Option<(Lifespan, &[u8])> {
        let (life, payload) = self.versions_of(account, key).last()?;
        life.is_open().then_some((life, payload))
    }

    /// Every version whose interval intersects `range`, ordered by start.
    pub(crate) fn history(
        &self,
        account: AccountId,
        key: &NaturalKey,
        range: Lifespan,
    ) -> Vec<(Lifespan, &[u8])> {
        self.versions_of(account, key)
            .filter(|(life, _)| life.overlaps(range))
            .collect()
    }

    /// Walks versions live at `at` across all records, in
    /// `(account, natural key)` order, starting after `after`.
    pub(crate) fn live_from<'a>(
        &'a self,
        at: Timestamp,
        after: Option<&(AccountId, NaturalKey)>,
    ) -> impl Iterator<Item = (AccountId, &'a NaturalKey, Lifespan, &'a [u8])> + 'a {
        // (account, key, FOREVER) sorts after every real version of the
        // cursor record and before the next record's versions.
        let start_bound = match after {
            Some((account, key)) => {
                Bound::Excluded((*account, key.clone(), Timestamp::FOREVER))
            }
            None => Bound::Unbounded,
        };
        self.rows
            .range((start_bound, Bound::Unbounded))
            .filter_map(move |((account, key, start), stored)| {
                let life = Lifespan::new(*start, stored.end);
                life.contains(at)
                    .then_some((*account, key, life, &stored.payload[..]))
            })
    }

    /// Versions live at `at` belonging to one account, all keys.
    pub(crate) fn live_for<'a>(
        &'a self,
        account: AccountId,
        at: Timestamp,
    ) -> impl Iterator<Item = (&'a NaturalKey, Lifespan, &'a [u8])> + 'a {
        let lo = (
            account,
            NaturalKey::Int(i64::MIN),
            Timestamp::from_millis(i64::MIN),
        );
        self.rows
            .range(lo..)
            .take_while(move |((a, _, _), _)| *a == account)
            .filter_map(move |((_, key, start), stored)| {
                let life = Lifespan::new(*start, stored.end);
                life.contains(at).then_some((key, life, &stored.payload[..]))
            })
    }

    pub(crate) fn len(&self) -> usize {
        self.rows.len()
    }
}

/// Maps payload kinds to table IDs.
///
/// Rebuilt from `DefineTable` journal operations on open; there is no
/// separate manifest file to drift out of sync.
#[derive(Debug)]
pub(crate) struct TableRegistry {
    by_kind: BTreeMap<String, TableId>,
    next: TableId,
}

impl Default for TableRegistry {
    fn default() -> Self {
        Self {
            by_kind: BTreeMap::new(),
            next: TableId::new(0),
        }
    }
}

impl TableRegistry {
    pub(crate) fn lookup(&self, kind: &str) -> Option<TableId> {
        self.by_kind.get(kind).copied()
    }

    /// The ID the next new kind will receive.
    pub(crate) fn next_id(&self) -> TableId {
        self.next
    }

    pub(crate) fn apply_define(&mut self, table: TableId, kind: String) {
        self.by_kind.insert(kind, table);
        if table >= self.next {
            self.next = table.next();
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.by_kind.len()
    }
}

pub(crate) fn decode_version<P: TemporalPayload>(
    account: AccountId,
    key: NaturalKey,
    life: Lifespan,
    payload: &[u8],
) -> StoreResult<Version<P>> {
    Ok(Version {
        account,
        key,
        life,
        payload: codec::from_slice(payload)?,
    })
}

/// Typed read facade over one payload kind's table.
///
/// Obtained from [`HistoryStore::table`]; queries take a consistent
/// snapshot of the store state for their duration. Mutation goes through
/// [`HistoryStore::unit_of_work`] instead.
///
/// # Example
///
/// ```no_run
/// use histdb_core::{AccountId, HistoryStore, NaturalKey, Timestamp};
/// # use histdb_core::{NaturalKey as _NK, StoreResult, TemporalPayload};
/// # use serde::{Deserialize, Serialize};
/// # #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
/// # struct Standing { faction_id: i64, value: i64 }
/// # impl TemporalPayload for Standing {
/// #     const KIND: &'static str = "standings";
/// #     fn natural_key(&self) -> NaturalKey { NaturalKey::int(self.faction_id) }
/// # }
/// # fn demo(store: &HistoryStore) -> StoreResult<()> {
/// let table = store.table::<Standing>();
/// let current = table.latest(AccountId::new(7), &NaturalKey::int(500_001))?;
/// # Ok(()) }
/// ```
pub struct TemporalTable<'s, P> {
    store: &'s HistoryStore,
    _marker: PhantomData<P>,
}

impl<P> Clone for TemporalTable<'_, P> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<P> Copy for TemporalTable<'_, P> {}

impl<'s, P: TemporalPayload> TemporalTable<'s, P> {
    pub(crate) fn new(store: &'s HistoryStore) -> Self {
        Self {
            store,
            _marker: PhantomData,
        }
    }

    /// Returns the version current at `at`, if the record existed then.
    ///
    /// # Errors
    ///
    /// Returns an error if the store is closed or the payload fails to
    /// decode.
    pub fn get_at(
        &self,
        account: AccountId,
        key: &NaturalKey,
        at: Timestamp,
    ) -> StoreResult<Option<Version<P>>> {
        self.store.read_state(|state| {
            let Some(raw) = state.raw_table(P::KIND) else {
                return Ok(None);
            };
            match raw.version_at(account, key, at) {
                Some((life, payload)) => {
                    Ok(Some(decode_version(account, key.clone(), life, payload)?))
                }
                None => Ok(None),
            }
        })
    }

    /// Returns the open version, or `None` if the record is closed out
    /// or was never observed.
    ///
    /// # Errors
    ///
    /// Returns an error if the store is closed or the payload fails to
    /// decode.
    pub fn latest(&self, account: AccountId, key: &NaturalKey) -> StoreResult<Option<Version<P>>> {
        self.store.read_state(|state| {
            let Some(raw) = state.raw_table(P::KIND) else {
                return Ok(None);
            };
            match raw.open_version(account, key) {
                Some((life, payload)) => {
                    Ok(Some(decode_version(account, key.clone(), life, payload)?))
                }
                None => Ok(None),
            }
        })
    }

    /// Returns every version whose interval intersects `range`, ordered
    /// by start.
    ///
    /// # Errors
    ///
    /// Returns an error if the store is closed or a payload fails to
    /// decode.
    pub fn history(
        &self,
        account: AccountId,
        key: &NaturalKey,
        range: Lifespan,
    ) -> StoreResult<Vec<Version<P>>> {
        self.store.read_state(|state| {
            let Some(raw) = state.raw_table(P::KIND) else {
                return Ok(Vec::new());
            };
            raw.history(account, key, range)
                .into_iter()
                .map(|(life, payload)| decode_version(account, key.clone(), life, payload))
                .collect()
        })
    }

    /// Returns one page of versions live at `at` that match `predicate`,
    /// ordered by `(account, natural key)`.
    ///
    /// The returned page's `next` cursor resumes where this page ended;
    /// records created or closed between pages are seen or missed the way
    /// any keyset pagination sees them.
    ///
    /// # Errors
    ///
    /// Returns an error if the store is closed or a payload fails to
    /// decode.
    pub fn live_at<F>(
        &self,
        at: Timestamp,
        mut predicate: F,
        page: &PageRequest,
    ) -> StoreResult<Page<Version<P>>>
    where
        F: FnMut(&Version<P>) -> bool,
    {
        self.store.read_state(|state| {
            let Some(raw) = state.raw_table(P::KIND) else {
                return Ok(Page::empty());
            };

            let mut items: Vec<Version<P>> = Vec::new();
            let mut next = None;

            for (account, key, life, payload) in raw.live_from(at, page.after.as_ref()) {
                let version = decode_version(account, key.clone(), life, payload)?;
                if !predicate(&version) {
                    continue;
                }
                if items.len() == page.limit {
                    // One more match exists; resume after the last
                    // returned record.
                    next = items.last().map(|v: &Version<P>| (v.account, v.key.clone()));
                    break;
                }
                items.push(version);
            }

            Ok(Page { items, next })
        })
    }

    /// Returns a lazy iterator over all versions live at `at` matching
    /// `predicate`.
    ///
    /// Pages through [`live_at`](Self::live_at) internally, re-acquiring
    /// the store's read lock per page, so long scans never starve
    /// writers.
    pub fn scan_live<F>(&self, at: Timestamp, predicate: F) -> LiveScan<'s, P, F>
    where
        F: FnMut(&Version<P>) -> bool,
    {
        LiveScan {
            table: *self,
            at,
            predicate,
            cursor: None,
            buffer: VecDeque::new(),
            done: false,
        }
    }

    /// Returns every version of this kind live at `at` for one account.
    ///
    /// # Errors
    ///
    /// Returns an error if the store is closed or a payload fails to
    /// decode.
    pub fn live_for(&self, account: AccountId, at: Timestamp) -> StoreResult<Vec<Version<P>>> {
        self.store.read_state(|state| {
            let Some(raw) = state.raw_table(P::KIND) else {
                return Ok(Vec::new());
            };
            raw.live_for(account, at)
                .map(|(key, life, payload)| decode_version(account, key.clone(), life, payload))
                .collect()
        })
    }
}

/// Lazy full-table scan over live versions.
///
/// Yields `StoreResult<Version<P>>`; iteration stops after the first
/// error.
pub struct LiveScan<'s, P, F> {
    table: TemporalTable<'s, P>,
    at: Timestamp,
    predicate: F,
    cursor: Option<(AccountId, NaturalKey)>,
    buffer: VecDeque<Version<P>>,
    done: bool,
}

impl<P, F> Iterator for LiveScan<'_, P, F>
where
    P: TemporalPayload,
    F: FnMut(&Version<P>) -> bool,
{
    type Item = StoreResult<Version<P>>;

    fn next(&mut self) -> Option<Self::Item> {
        if let Some(version) = self.buffer.pop_front() {
            return Some(Ok(version));
        }
        if self.done {
            return None;
        }

        let request = PageRequest {
            after: self.cursor.clone(),
            limit: SCAN_PAGE,
        };
        match self.table.live_at(self.at, &mut self.predicate, &request) {
            Ok(page) => {
                self.done = page.next.is_none();
                self.cursor = page.next;
                self.buffer.extend(page.items);
                match self.buffer.pop_front() {
                    Some(version) => Some(Ok(version)),
                    None => {
                        self.done = true;
                        None
                    }
                }
            }
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ts(millis: i64) -> Timestamp {
        Timestamp::from_millis(millis)
    }

    fn account(id: i64) -> AccountId {
        AccountId::new(id)
    }

    fn payload(tag: u8) -> Vec<u8> {
        vec![tag]
    }

    #[test]
    fn version_at_respects_half_open_bounds() {
        let mut table = RawTable::default();
        table.insert(
            account(1),
            NaturalKey::int(0),
            Lifespan::new(ts(100), ts(200)),
            payload(1),
        );
        table.insert(
            account(1),
            NaturalKey::int(0),
            Lifespan::open(ts(200)),
            payload(2),
        );

        let key = NaturalKey::int(0);
        assert!(table.version_at(account(1), &key, ts(99)).is_none());

        let (life, bytes) = table.version_at(account(1), &key, ts(100)).unwrap();
        assert_eq!(life.end, ts(200));
        assert_eq!(bytes, &[1]);

        // The boundary instant belongs to the successor
        let (life, bytes) = table.version_at(account(1), &key, ts(200)).unwrap();
        assert!(life.is_open());
        assert_eq!(bytes, &[2]);
    }

    #[test]
    fn open_version_requires_open_end() {
        let mut table = RawTable::default();
        let key = NaturalKey::int(0);
        table.insert(
            account(1),
            key.clone(),
            Lifespan::new(ts(100), ts(200)),
            payload(1),
        );

        assert!(table.open_version(account(1), &key).is_none());

        table.insert(account(1), key.clone(), Lifespan::open(ts(200)), payload(2));
        let (life, bytes) = table.open_version(account(1), &key).unwrap();
        assert_eq!(life.start, ts(200));
        assert_eq!(bytes, &[2]);
    }

    #[test]
    fn find_overlap_ignores_touching_intervals() {
        let mut table = RawTable::default();
        let key = NaturalKey::int(0);
        table.insert(
            account(1),
            key.clone(),
            Lifespan::new(ts(100), ts(200)),
            payload(1),
        );

        assert!(table
            .find_overlap(account(1), &key, Lifespan::open(ts(200)))
            .is_none());
        let hit = table
            .find_overlap(account(1), &key, Lifespan::new(ts(150), ts(250)))
            .unwrap();
        assert_eq!(hit, Lifespan::new(ts(100), ts(200)));
    }

    #[test]
    fn find_overlap_sees_open_versions() {
        let mut table = RawTable::default();
        let key = NaturalKey::int(0);
        table.insert(account(1), key.clone(), Lifespan::open(ts(100)), payload(1));

        let hit = table
            .find_overlap(account(1), &key, Lifespan::open(ts(500)))
            .unwrap();
        assert!(hit.is_open());
    }

    #[test]
    fn set_end_updates_row() {
        let mut table = RawTable::default();
        let key = NaturalKey::int(0);
        table.insert(account(1), key.clone(), Lifespan::open(ts(100)), payload(1));

        assert!(table.set_end(account(1), &key, ts(100), ts(300)));
        let (life, _) = table.version_at(account(1), &key, ts(150)).unwrap();
        assert_eq!(life.end, ts(300));

        assert!(!table.set_end(account(1), &key, ts(999), ts(1000)));
    }

    #[test]
    fn history_returns_intersecting_versions_in_order() {
        let mut table = RawTable::default();
        let key = NaturalKey::int(0);
        table.insert(
            account(1),
            key.clone(),
            Lifespan::new(ts(0), ts(100)),
            payload(1),
        );
        table.insert(
            account(1),
            key.clone(),
            Lifespan::new(ts(100), ts(200)),
            payload(2),
        );
        table.insert(account(1), key.clone(), Lifespan::open(ts(200)), payload(3));

        let hits = table.history(account(1), &key, Lifespan::new(ts(150), ts(250)));
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].1, &[2]);
        assert_eq!(hits[1].1, &[3]);

        let all = table.history(account(1), &key, Lifespan::open(ts(0)));
        assert_eq!(all.len(), 3);
    }

    #[test]
    fn live_from_walks_in_key_order_and_respects_cursor() {
        let mut table = RawTable::default();
        for (acct, division) in [(2, 1), (1, 2), (1, 1), (2, 2)] {
            table.insert(
                account(acct),
                NaturalKey::int(division),
                Lifespan::open(ts(100)),
                payload(acct as u8 * 10 + division as u8),
            );
        }
        // A closed version must not appear
        table.insert(
            account(1),
            NaturalKey::int(3),
            Lifespan::new(ts(0), ts(50)),
            payload(99),
        );

        let all: Vec<_> = table
            .live_from(ts(100), None)
            .map(|(a, k, _, _)| (a, k.clone()))
            .collect();
        assert_eq!(
            all,
            vec![
                (account(1), NaturalKey::int(1)),
                (account(1), NaturalKey::int(2)),
                (account(2), NaturalKey::int(1)),
                (account(2), NaturalKey::int(2)),
            ]
        );

        let cursor = (account(1), NaturalKey::int(2));
        let rest: Vec<_> = table
            .live_from(ts(100), Some(&cursor))
            .map(|(a, k, _, _)| (a, k.clone()))
            .collect();
        assert_eq!(
            rest,
            vec![
                (account(2), NaturalKey::int(1)),
                (account(2), NaturalKey::int(2)),
            ]
        );
    }

    #[test]
    fn live_for_isolates_accounts() {
        let mut table = RawTable::default();
        table.insert(
            account(1),
            NaturalKey::int(1),
            Lifespan::open(ts(100)),
            payload(1),
        );
        table.insert(
            account(2),
            NaturalKey::int(1),
            Lifespan::open(ts(100)),
            payload(2),
        );

        let keys: Vec<_> = table
            .live_for(account(1), ts(100))
            .map(|(k, _, _)| k.clone())
            .collect();
        assert_eq!(keys, vec![NaturalKey::int(1)]);
    }

    #[test]
    fn registry_assigns_sequential_ids() {
        let mut registry = TableRegistry::default();
        assert_eq!(registry.next_id(), TableId::new(0));

        registry.apply_define(TableId::new(0), "wallet_balances".into());
        registry.apply_define(TableId::new(1), "titles".into());

        assert_eq!(registry.lookup("wallet_balances"), Some(TableId::new(0)));
        assert_eq!(registry.lookup("titles"), Some(TableId::new(1)));
        assert_eq!(registry.next_id(), TableId::new(2));
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn page_request_clamps_zero_limit() {
        let request = PageRequest::first(0);
        assert_eq!(request.limit, 1);
    }
}
