//! Reconciliation of fetched snapshots against stored history.
//!
//! Each observation compares the fresh payload with the open version of
//! the same record and either creates, evolves, or leaves it alone. An
//! evolve closes the old version and opens the new one at the same
//! instant, so a record's consecutive lifespans always meet exactly at
//! the observation time.

use std::collections::BTreeMap;

use histdb_core::{AccountId, NaturalKey, StoreResult, TemporalPayload, Timestamp, UnitOfWork};

/// Counters describing what one reconciliation pass did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EvolveStats {
    /// Records observed for the first time.
    pub created: usize,
    /// Records whose value changed (old closed, new opened).
    pub evolved: usize,
    /// Records closed because the fresh set no longer contains them.
    pub closed: usize,
    /// Records whose value matched the open version.
    pub unchanged: usize,
}

impl EvolveStats {
    /// Number of versions written by the pass.
    pub fn changes(&self) -> usize {
        self.created + self.evolved + self.closed
    }

    /// Whether the pass wrote nothing.
    pub fn is_noop(&self) -> bool {
        self.changes() == 0
    }

    /// Folds another pass's counters into this one.
    pub fn merge(&mut self, other: Self) {
        self.created += other.created;
        self.evolved += other.evolved;
        self.closed += other.closed;
        self.unchanged += other.unchanged;
    }
}

/// Reconciles one observed record.
///
/// The first observation of a key creates an open version starting at
/// `at`. A payload equal to the open version (per
/// [`TemporalPayload::same_value`]) is a no-op, so replaying the same
/// snapshot is idempotent. A differing payload closes the open version
/// at `at` and creates a new open version starting at `at`.
pub fn reconcile<P: TemporalPayload>(
    uow: &mut UnitOfWork<'_>,
    account: AccountId,
    at: Timestamp,
    fresh: &P,
) -> StoreResult<EvolveStats> {
    let mut stats = EvolveStats::default();
    reconcile_into(uow, account, at, fresh, &mut stats)?;
    Ok(stats)
}

/// Reconciles a full observed set of records of one data type.
///
/// Every record in `fresh` is reconciled as in [`reconcile`]; when the
/// snapshot repeats a natural key, the last occurrence wins. Records
/// live at `at` whose key is absent from `fresh` are closed at `at`
/// with no replacement — the endpoint reports complete state, so
/// absence means the record is gone.
pub fn reconcile_set<P: TemporalPayload>(
    uow: &mut UnitOfWork<'_>,
    account: AccountId,
    at: Timestamp,
    fresh: Vec<P>,
) -> StoreResult<EvolveStats> {
    let mut stats = EvolveStats::default();

    let mut observed: BTreeMap<NaturalKey, P> = BTreeMap::new();
    for payload in fresh {
        observed.insert(payload.natural_key(), payload);
    }

    for version in uow.live_for::<P>(account, at)? {
        if !observed.contains_key(&version.key) {
            uow.close::<P>(account, &version.key, version.life.start, at)?;
            stats.closed += 1;
        }
    }

    for payload in observed.values() {
        reconcile_into(uow, account, at, payload, &mut stats)?;
    }

    Ok(stats)
}

fn reconcile_into<P: TemporalPayload>(
    uow: &mut UnitOfWork<'_>,
    account: AccountId,
    at: Timestamp,
    fresh: &P,
    stats: &mut EvolveStats,
) -> StoreResult<()> {
    let key = fresh.natural_key();
    match uow.latest::<P>(account, &key)? {
        None => {
            uow.create(account, at, fresh)?;
            stats.created += 1;
        }
        Some(current) if current.payload.same_value(fresh) => {
            stats.unchanged += 1;
        }
        Some(current) => {
            uow.close::<P>(account, &key, current.life.start, at)?;
            uow.create(account, at, fresh)?;
            stats.evolved += 1;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use histdb_core::{HistoryStore, Lifespan};
    use histdb_model::{Credits, Title, WalletBalance};

    const ACCOUNT: AccountId = AccountId::new(93_813_310);

    fn at(millis: i64) -> Timestamp {
        Timestamp::from_millis(millis)
    }

    #[test]
    fn first_observation_creates() {
        let store = HistoryStore::open_in_memory().unwrap();
        let balance = WalletBalance::new(1000, Credits::from_f64(8123.00));

        let stats = store
            .unit_of_work(|uow| reconcile(uow, ACCOUNT, at(1_000), &balance))
            .unwrap();
        assert_eq!(stats.created, 1);
        assert_eq!(stats.changes(), 1);

        let live = store
            .table::<WalletBalance>()
            .latest(ACCOUNT, &NaturalKey::Int(1000))
            .unwrap()
            .unwrap();
        assert_eq!(live.payload, balance);
        assert_eq!(live.life, Lifespan::open(at(1_000)));
    }

    #[test]
    fn identical_snapshot_is_noop() {
        let store = HistoryStore::open_in_memory().unwrap();
        let balance = WalletBalance::new(1000, Credits::from_f64(8123.00));

        store
            .unit_of_work(|uow| reconcile(uow, ACCOUNT, at(1_000), &balance))
            .unwrap();
        let stats = store
            .unit_of_work(|uow| reconcile(uow, ACCOUNT, at(2_000), &balance))
            .unwrap();

        assert_eq!(stats.unchanged, 1);
        assert!(stats.is_noop());

        let history = store
            .table::<WalletBalance>()
            .history(ACCOUNT, &NaturalKey::Int(1000), Lifespan::open(Timestamp::EPOCH))
            .unwrap();
        assert_eq!(history.len(), 1);
        assert!(history[0].is_open());
    }

    #[test]
    fn representation_noise_is_no_change() {
        let store = HistoryStore::open_in_memory().unwrap();

        store
            .unit_of_work(|uow| {
                reconcile(
                    uow,
                    ACCOUNT,
                    at(1_000),
                    &WalletBalance::new(1000, Credits::from_f64(100.10)),
                )
            })
            .unwrap();
        let stats = store
            .unit_of_work(|uow| {
                reconcile(
                    uow,
                    ACCOUNT,
                    at(2_000),
                    &WalletBalance::new(1000, Credits::from_f64(100.099_999_999)),
                )
            })
            .unwrap();

        assert_eq!(stats.unchanged, 1);
    }

    #[test]
    fn changed_value_evolves_at_exact_boundary() {
        let store = HistoryStore::open_in_memory().unwrap();
        let key = NaturalKey::Int(1000);

        store
            .unit_of_work(|uow| {
                reconcile(
                    uow,
                    ACCOUNT,
                    at(1_000),
                    &WalletBalance::new(1000, Credits::from_f64(8123.00)),
                )
            })
            .unwrap();
        let stats = store
            .unit_of_work(|uow| {
                reconcile(
                    uow,
                    ACCOUNT,
                    at(5_000),
                    &WalletBalance::new(1000, Credits::from_f64(12_994.75)),
                )
            })
            .unwrap();
        assert_eq!(stats.evolved, 1);

        let history = store
            .table::<WalletBalance>()
            .history(ACCOUNT, &key, Lifespan::open(Timestamp::EPOCH))
            .unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].life, Lifespan::new(at(1_000), at(5_000)));
        assert_eq!(history[1].life, Lifespan::open(at(5_000)));
        assert_eq!(history[0].life.end, history[1].life.start);
        assert_eq!(history[1].payload.balance, Credits::from_hundredths(1_299_475));
    }

    #[test]
    fn set_diff_creates_evolves_and_closes() {
        let store = HistoryStore::open_in_memory().unwrap();

        store
            .unit_of_work(|uow| {
                reconcile_set(
                    uow,
                    ACCOUNT,
                    at(1_000),
                    vec![Title::new(1, "Mining Director"), Title::new(2, "Recruiter")],
                )
            })
            .unwrap();
        let stats = store
            .unit_of_work(|uow| {
                reconcile_set(
                    uow,
                    ACCOUNT,
                    at(2_000),
                    vec![Title::new(1, "Fleet Commander"), Title::new(3, "Diplomat")],
                )
            })
            .unwrap();

        assert_eq!(stats.evolved, 1);
        assert_eq!(stats.created, 1);
        assert_eq!(stats.closed, 1);
        assert_eq!(stats.unchanged, 0);

        let table = store.table::<Title>();
        let live = table.live_for(ACCOUNT, at(2_000)).unwrap();
        let names: Vec<&str> = live.iter().map(|v| v.payload.name.as_str()).collect();
        assert_eq!(names, ["Fleet Commander", "Diplomat"]);

        let gone = table.latest(ACCOUNT, &NaturalKey::Int(2)).unwrap();
        assert!(gone.is_none());
        let closed = table.get_at(ACCOUNT, &NaturalKey::Int(2), at(1_500)).unwrap().unwrap();
        assert_eq!(closed.life.end, at(2_000));
    }

    #[test]
    fn repeated_key_last_occurrence_wins() {
        let store = HistoryStore::open_in_memory().unwrap();

        let stats = store
            .unit_of_work(|uow| {
                reconcile_set(
                    uow,
                    ACCOUNT,
                    at(1_000),
                    vec![Title::new(7, "Stale"), Title::new(7, "Current")],
                )
            })
            .unwrap();
        assert_eq!(stats.created, 1);

        let live = store
            .table::<Title>()
            .latest(ACCOUNT, &NaturalKey::Int(7))
            .unwrap()
            .unwrap();
        assert_eq!(live.payload.name, "Current");
    }

    #[test]
    fn empty_set_closes_everything() {
        let store = HistoryStore::open_in_memory().unwrap();

        store
            .unit_of_work(|uow| {
                reconcile_set(
                    uow,
                    ACCOUNT,
                    at(1_000),
                    vec![Title::new(1, "A"), Title::new(2, "B")],
                )
            })
            .unwrap();
        let stats = store
            .unit_of_work(|uow| reconcile_set::<Title>(uow, ACCOUNT, at(2_000), Vec::new()))
            .unwrap();

        assert_eq!(stats.closed, 2);
        let live = store.table::<Title>().live_for(ACCOUNT, at(2_000)).unwrap();
        assert!(live.is_empty());
    }

    #[test]
    fn whole_pass_commits_as_one_unit() {
        let store = HistoryStore::open_in_memory().unwrap();

        store
            .unit_of_work(|uow| {
                reconcile_set(uow, ACCOUNT, at(1_000), vec![Title::new(1, "A")])
            })
            .unwrap();

        // A close inside the pass cannot land without its sibling create.
        let result = store.unit_of_work(|uow| {
            reconcile_set(uow, ACCOUNT, at(2_000), vec![Title::new(2, "B")])?;
            Err::<(), _>(histdb_core::StoreError::invalid_format("abort"))
        });
        assert!(result.is_err());

        let live = store.table::<Title>().live_for(ACCOUNT, at(2_000)).unwrap();
        assert_eq!(live.len(), 1);
        assert_eq!(live[0].payload.name, "A");
    }
}
