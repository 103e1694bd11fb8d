//! End-to-end tests driving the sync engine against real stores.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use histdb_core::{
    AccountId, HistoryStore, Lifespan, NaturalKey, SyncStatus, TemporalPayload, Timestamp,
};
use histdb_model::{
    AccountContainer, CharacterLocation, Credits, CurrentShip, LoyaltyPoints, Title, WalletBalance,
};
use histdb_sync_engine::{
    get_or_create_unfinished, reconcile, CharacterLocationSpec, CurrentShipSpec, FetchError,
    LoyaltyPointsSpec, RawCharacterLocation, RawCurrentShip, RawLoyaltyPoints, RawTitle,
    RawWalletBalance, Snapshot, SnapshotClient, SyncConfig, SyncOutcome, SyncRegistry, SyncUnit,
    TitlesSpec, WalletBalanceSpec,
};
use parking_lot::Mutex;

const ACCOUNT: AccountId = AccountId::new(93_813_310);

fn at(millis: i64) -> Timestamp {
    Timestamp::from_millis(millis)
}

/// Client answering from a canned script, in call order.
struct ScriptedClient<R> {
    script: Mutex<VecDeque<Result<Snapshot<R>, FetchError>>>,
    calls: AtomicUsize,
}

impl<R: Send + Sync> ScriptedClient<R> {
    fn new(script: Vec<Result<Snapshot<R>, FetchError>>) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(script.into()),
            calls: AtomicUsize::new(0),
        })
    }

    fn one(item: Result<Snapshot<R>, FetchError>) -> Arc<Self> {
        Self::new(vec![item])
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl<R: Send + Sync> SnapshotClient for ScriptedClient<R> {
    type Raw = R;

    fn request(&self, _account: AccountId) -> Result<Snapshot<R>, FetchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.script
            .lock()
            .pop_front()
            .unwrap_or_else(|| Err(FetchError::transport("script exhausted")))
    }
}

fn raw_balance(division: i32, balance: f64) -> RawWalletBalance {
    RawWalletBalance { division, balance }
}

fn raw_title(title_id: i32, name: &str) -> RawTitle {
    RawTitle {
        title_id,
        name: name.into(),
    }
}

#[test]
fn first_pass_covers_every_kind() {
    let store = HistoryStore::open_in_memory().unwrap();
    let config = SyncConfig::default();

    let mut registry = SyncRegistry::new();
    registry
        .register(Box::new(SyncUnit::new(
            WalletBalanceSpec,
            ScriptedClient::one(Ok(Snapshot::new(vec![
                raw_balance(1000, 12_994.75),
                raw_balance(1001, 250.00),
            ]))),
            config.clone(),
        )))
        .register(Box::new(SyncUnit::new(
            CharacterLocationSpec,
            ScriptedClient::one(Ok(Snapshot::new(RawCharacterLocation {
                solar_system_id: 30_000_142,
                station_id: Some(60_003_760),
            }))),
            config.clone(),
        )))
        .register(Box::new(SyncUnit::new(
            CurrentShipSpec,
            ScriptedClient::one(Ok(Snapshot::new(RawCurrentShip {
                type_id: 17_478,
                item_id: 1_002_943_704_788,
                name: "Gravel Magnet".into(),
            }))),
            config.clone(),
        )))
        .register(Box::new(SyncUnit::new(
            TitlesSpec,
            ScriptedClient::one(Ok(Snapshot::new(vec![
                raw_title(1, "Mining Director"),
                raw_title(2, "Recruiter"),
            ]))),
            config.clone(),
        )))
        .register(Box::new(SyncUnit::new(
            LoyaltyPointsSpec,
            ScriptedClient::one(Ok(Snapshot::new(vec![RawLoyaltyPoints {
                corporation_id: 1_000_125,
                loyalty_points: 12_750,
            }]))),
            config,
        )));

    let now = at(1_700_000_000_000);
    let reports = registry.run_all(&store, ACCOUNT, now).unwrap();

    assert_eq!(reports.len(), 5);
    for (kind, outcome) in &reports {
        assert!(
            matches!(outcome, SyncOutcome::Completed { .. }),
            "{kind} did not complete: {outcome:?}"
        );
    }

    let balances = store.table::<WalletBalance>().live_for(ACCOUNT, now).unwrap();
    assert_eq!(balances.len(), 2);
    assert_eq!(balances[0].payload.balance, Credits::from_hundredths(1_299_475));

    let location = store
        .table::<CharacterLocation>()
        .latest(ACCOUNT, &NaturalKey::singleton())
        .unwrap()
        .unwrap();
    assert_eq!(location.payload.station_id, Some(60_003_760));

    let ship = store
        .table::<CurrentShip>()
        .latest(ACCOUNT, &NaturalKey::singleton())
        .unwrap()
        .unwrap();
    assert_eq!(ship.payload.name, "Gravel Magnet");

    assert_eq!(store.table::<Title>().live_for(ACCOUNT, now).unwrap().len(), 2);
    assert_eq!(
        store
            .table::<LoyaltyPoints>()
            .live_for(ACCOUNT, now)
            .unwrap()[0]
            .payload
            .points,
        12_750
    );

    for kind in registry.kinds() {
        assert!(store.has_finished_sync(ACCOUNT, kind).unwrap(), "{kind}");
        let pending = store.open_tracker(ACCOUNT, kind).unwrap().unwrap();
        assert!(pending.scheduled > now, "{kind} successor not rescheduled");
    }
}

#[test]
fn balance_change_closes_and_opens_at_the_same_instant() {
    let store = HistoryStore::open_in_memory().unwrap();
    let client = ScriptedClient::new(vec![
        Ok(Snapshot::new(vec![raw_balance(1000, 8_123.00)])),
        Ok(Snapshot::new(vec![raw_balance(1000, 12_994.75)])),
    ]);
    let unit = SyncUnit::new(WalletBalanceSpec, client, SyncConfig::default());

    let first = at(1_000_000);
    unit.execute(&store, ACCOUNT, first).unwrap();

    let second = at(1_000_000 + 15 * 60 * 1000);
    let outcome = unit.execute(&store, ACCOUNT, second).unwrap();
    let SyncOutcome::Completed { stats, .. } = outcome else {
        panic!("expected completion, got {outcome:?}");
    };
    assert_eq!(stats.evolved, 1);

    let history = store
        .table::<WalletBalance>()
        .history(ACCOUNT, &NaturalKey::Int(1000), Lifespan::open(Timestamp::EPOCH))
        .unwrap();
    assert_eq!(history.len(), 2);
    assert_eq!(history[0].payload.balance, Credits::from_hundredths(812_300));
    assert_eq!(history[0].life, Lifespan::new(first, second));
    assert_eq!(history[1].payload.balance, Credits::from_hundredths(1_299_475));
    assert_eq!(history[1].life, Lifespan::open(second));
}

#[test]
fn titles_follow_the_grant_and_revoke_cycle() {
    let store = HistoryStore::open_in_memory().unwrap();
    let client = ScriptedClient::new(vec![
        Ok(Snapshot::new(vec![
            raw_title(1, "Mining Director"),
            raw_title(2, "Recruiter"),
        ])),
        Ok(Snapshot::new(vec![
            raw_title(1, "Fleet Commander"),
            raw_title(3, "Diplomat"),
        ])),
    ]);
    let unit = SyncUnit::new(TitlesSpec, client, SyncConfig::default());

    let first = at(2_000_000);
    unit.execute(&store, ACCOUNT, first).unwrap();

    let second = at(2_000_000 + 60 * 60 * 1000);
    let outcome = unit.execute(&store, ACCOUNT, second).unwrap();
    let SyncOutcome::Completed { stats, .. } = outcome else {
        panic!("expected completion, got {outcome:?}");
    };
    assert_eq!(stats.evolved, 1);
    assert_eq!(stats.created, 1);
    assert_eq!(stats.closed, 1);

    let table = store.table::<Title>();
    let live = table.live_for(ACCOUNT, second).unwrap();
    let names: Vec<&str> = live.iter().map(|v| v.payload.name.as_str()).collect();
    assert_eq!(names, ["Fleet Commander", "Diplomat"]);

    let revoked = table
        .get_at(ACCOUNT, &NaturalKey::Int(2), first)
        .unwrap()
        .unwrap();
    assert_eq!(revoked.life.end, second);
}

#[test]
fn failed_fetch_schedules_retry_that_succeeds() {
    let store = HistoryStore::open_in_memory().unwrap();
    let client = ScriptedClient::new(vec![
        Err(FetchError::transport("connection reset")),
        Ok(Snapshot::new(vec![raw_balance(1000, 42.00)])),
    ]);
    let unit = SyncUnit::new(WalletBalanceSpec, Arc::clone(&client), SyncConfig::default());

    let first = at(3_000_000);
    let outcome = unit.execute(&store, ACCOUNT, first).unwrap();
    let SyncOutcome::Failed { next_due, .. } = outcome else {
        panic!("expected failure, got {outcome:?}");
    };
    assert_eq!(next_due, at(3_000_000 + 5 * 60 * 1000));

    // Not due yet: no fetch happens.
    let outcome = unit.execute(&store, ACCOUNT, at(3_000_100)).unwrap();
    assert!(outcome.is_skip());
    assert_eq!(client.calls(), 1);

    // Due: the retry succeeds.
    let outcome = unit.execute(&store, ACCOUNT, next_due).unwrap();
    assert!(matches!(outcome, SyncOutcome::Completed { .. }));

    let trail = store.tracker_trail(ACCOUNT, WalletBalance::KIND).unwrap();
    let statuses: Vec<SyncStatus> = trail.iter().map(|t| t.status).collect();
    assert_eq!(
        statuses,
        [SyncStatus::Error, SyncStatus::Finished, SyncStatus::Unfinished]
    );

    let history = store
        .table::<WalletBalance>()
        .history(ACCOUNT, &NaturalKey::Int(1000), Lifespan::open(Timestamp::EPOCH))
        .unwrap();
    assert_eq!(history.len(), 1);
}

#[test]
fn interrupted_attempt_recovers_without_duplicating_history() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("account-93813310");
    let balance = WalletBalance::new(1000, Credits::from_f64(8_123.00));

    // An attempt that committed its reconciliation but went down before
    // sealing the tracker.
    let interrupted = {
        let store = HistoryStore::open(&path).unwrap();
        let pending = store
            .unit_of_work(|uow| {
                get_or_create_unfinished(uow, ACCOUNT, WalletBalance::KIND, at(1_000))
            })
            .unwrap();
        store
            .unit_of_work(|uow| reconcile(uow, ACCOUNT, at(1_000), &balance))
            .unwrap();
        pending.id
    };

    let store = HistoryStore::open(&path).unwrap();
    let pending = store
        .open_tracker(ACCOUNT, WalletBalance::KIND)
        .unwrap()
        .unwrap();
    assert_eq!(pending.id, interrupted);
    assert!(pending.is_due(at(2_000)));

    // The re-run fetches the same snapshot; reconciliation is a no-op
    // and the original tracker finally seals.
    let client = ScriptedClient::one(Ok(Snapshot::new(vec![raw_balance(1000, 8_123.00)])));
    let unit = SyncUnit::new(WalletBalanceSpec, client, SyncConfig::default());
    let outcome = unit.execute(&store, ACCOUNT, at(2_000)).unwrap();
    let SyncOutcome::Completed { stats, .. } = outcome else {
        panic!("expected completion, got {outcome:?}");
    };
    assert_eq!(stats.unchanged, 1);
    assert_eq!(stats.changes(), 0);

    let history = store
        .table::<WalletBalance>()
        .history(ACCOUNT, &NaturalKey::Int(1000), Lifespan::open(Timestamp::EPOCH))
        .unwrap();
    assert_eq!(history.len(), 1);

    let trail = store.tracker_trail(ACCOUNT, WalletBalance::KIND).unwrap();
    assert_eq!(trail.len(), 2);
    assert_eq!(trail[0].id, interrupted);
    assert_eq!(trail[0].status, SyncStatus::Finished);
    assert_eq!(trail[1].status, SyncStatus::Unfinished);
}

#[test]
fn schedule_survives_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("account-93813310");
    let hint_instant = at(1_513_857_600_000);

    {
        let store = HistoryStore::open(&path).unwrap();
        let client = ScriptedClient::one(Ok(Snapshot::new(vec![raw_balance(1000, 77.50)])
            .with_cache_until("Thu, 21 Dec 2017 12:00:00 GMT")));
        let unit = SyncUnit::new(WalletBalanceSpec, client, SyncConfig::default());
        unit.execute(&store, ACCOUNT, at(1_513_850_000_000)).unwrap();
        store.close().unwrap();
    }

    let store = HistoryStore::open(&path).unwrap();
    let pending = store
        .open_tracker(ACCOUNT, WalletBalance::KIND)
        .unwrap()
        .unwrap();
    assert_eq!(pending.scheduled, hint_instant);

    let container: AccountContainer = store.get_container(ACCOUNT).unwrap().unwrap();
    assert_eq!(container.expiry_for(WalletBalance::KIND), Some(hint_instant));

    // Still inside the cache window: skip without touching the client.
    let client = ScriptedClient::new(Vec::new());
    let unit = SyncUnit::new(WalletBalanceSpec, Arc::clone(&client), SyncConfig::default());
    let outcome = unit
        .execute(&store, ACCOUNT, at(1_513_853_000_000))
        .unwrap();
    assert_eq!(outcome.next_due(), Some(hint_instant));
    assert_eq!(client.calls(), 0);

    let live = store
        .table::<WalletBalance>()
        .live_for(ACCOUNT, at(1_513_853_000_000))
        .unwrap();
    assert_eq!(live[0].payload.balance, Credits::from_hundredths(7_750));
}
