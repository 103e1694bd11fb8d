//! Tracker resolution and advancement.
//!
//! The store enforces at most one unfinished tracker per account and
//! kind; this module builds the attempt lifecycle on top of that slot.
//! Sealing a tracker and opening its successor happen in one unit, so
//! after the genesis attempt the slot is never observed empty.

use histdb_core::{AccountId, StoreResult, SyncStatus, SyncTracker, Timestamp, UnitOfWork};

/// Returns the pending tracker for an account and kind, creating the
/// genesis tracker if the slot has never been filled.
///
/// Idempotent: while a tracker is pending, every call returns that row
/// and `scheduled` is ignored. Units are serialized by the store's
/// writer, so two racing attempts resolve to the same tracker.
pub fn get_or_create_unfinished(
    uow: &mut UnitOfWork<'_>,
    account: AccountId,
    kind: &str,
    scheduled: Timestamp,
) -> StoreResult<SyncTracker> {
    if let Some(row) = uow.open_tracker_for(account, kind)? {
        return Ok(row);
    }
    let row = SyncTracker::unfinished(account, kind, scheduled);
    uow.open_tracker(row.clone())?;
    Ok(row)
}

/// Seals the tracker `FINISHED` and opens its successor.
///
/// The successor is due at `next_scheduled` and carries `prior_hash`,
/// the digest of the snapshot this attempt applied.
#[allow(clippy::too_many_arguments)]
pub fn mark_finished(
    uow: &mut UnitOfWork<'_>,
    tracker: &SyncTracker,
    started: Timestamp,
    ended: Timestamp,
    detail: impl Into<String>,
    next_scheduled: Timestamp,
    prior_hash: Option<String>,
) -> StoreResult<SyncTracker> {
    advance(
        uow,
        tracker,
        SyncStatus::Finished,
        started,
        ended,
        detail.into(),
        next_scheduled,
        prior_hash,
    )
}

/// Seals the tracker `ERROR` and opens its successor.
///
/// Failures are never terminal: the successor is due at
/// `next_scheduled` and inherits the sealed tracker's `prior_hash`,
/// since a failed fetch learns nothing new about the remote data.
pub fn mark_error(
    uow: &mut UnitOfWork<'_>,
    tracker: &SyncTracker,
    started: Timestamp,
    ended: Timestamp,
    detail: impl Into<String>,
    next_scheduled: Timestamp,
) -> StoreResult<SyncTracker> {
    advance(
        uow,
        tracker,
        SyncStatus::Error,
        started,
        ended,
        detail.into(),
        next_scheduled,
        tracker.prior_hash.clone(),
    )
}

#[allow(clippy::too_many_arguments)]
fn advance(
    uow: &mut UnitOfWork<'_>,
    tracker: &SyncTracker,
    status: SyncStatus,
    started: Timestamp,
    ended: Timestamp,
    detail: String,
    next_scheduled: Timestamp,
    prior_hash: Option<String>,
) -> StoreResult<SyncTracker> {
    uow.seal_tracker(tracker.id, status, Some(started), Some(ended), Some(detail))?;

    let mut successor = SyncTracker::unfinished(tracker.account, tracker.kind.clone(), next_scheduled);
    if let Some(hash) = prior_hash {
        successor = successor.with_prior_hash(hash);
    }
    uow.open_tracker(successor.clone())?;
    Ok(successor)
}

#[cfg(test)]
mod tests {
    use super::*;
    use histdb_core::HistoryStore;

    const KIND: &str = "wallet_balances";
    const ACCOUNT: AccountId = AccountId::new(42);

    fn at(millis: i64) -> Timestamp {
        Timestamp::from_millis(millis)
    }

    #[test]
    fn genesis_fills_the_slot() {
        let store = HistoryStore::open_in_memory().unwrap();

        let row = store
            .unit_of_work(|uow| get_or_create_unfinished(uow, ACCOUNT, KIND, at(100)))
            .unwrap();
        assert_eq!(row.scheduled, at(100));
        assert_eq!(row.status, SyncStatus::Unfinished);

        let stored = store.open_tracker(ACCOUNT, KIND).unwrap().unwrap();
        assert_eq!(stored.id, row.id);
    }

    #[test]
    fn pending_tracker_is_returned_not_duplicated() {
        let store = HistoryStore::open_in_memory().unwrap();

        let first = store
            .unit_of_work(|uow| get_or_create_unfinished(uow, ACCOUNT, KIND, at(100)))
            .unwrap();
        let second = store
            .unit_of_work(|uow| get_or_create_unfinished(uow, ACCOUNT, KIND, at(9_999)))
            .unwrap();

        assert_eq!(first.id, second.id);
        assert_eq!(second.scheduled, at(100));
        assert_eq!(store.tracker_trail(ACCOUNT, KIND).unwrap().len(), 1);
    }

    #[test]
    fn finish_seals_and_opens_successor() {
        let store = HistoryStore::open_in_memory().unwrap();

        let genesis = store
            .unit_of_work(|uow| get_or_create_unfinished(uow, ACCOUNT, KIND, at(100)))
            .unwrap();
        let successor = store
            .unit_of_work(|uow| {
                mark_finished(
                    uow,
                    &genesis,
                    at(150),
                    at(160),
                    "Updated successfully",
                    at(1_000),
                    Some("digest-1".into()),
                )
            })
            .unwrap();

        let sealed = store.tracker(genesis.id).unwrap().unwrap();
        assert_eq!(sealed.status, SyncStatus::Finished);
        assert_eq!(sealed.started, Some(at(150)));
        assert_eq!(sealed.ended, Some(at(160)));
        assert_eq!(sealed.detail.as_deref(), Some("Updated successfully"));

        let pending = store.open_tracker(ACCOUNT, KIND).unwrap().unwrap();
        assert_eq!(pending.id, successor.id);
        assert_eq!(pending.scheduled, at(1_000));
        assert_eq!(pending.prior_hash.as_deref(), Some("digest-1"));
    }

    #[test]
    fn error_still_opens_successor() {
        let store = HistoryStore::open_in_memory().unwrap();

        let genesis = store
            .unit_of_work(|uow| get_or_create_unfinished(uow, ACCOUNT, KIND, at(100)))
            .unwrap();
        store
            .unit_of_work(|uow| {
                mark_error(uow, &genesis, at(150), at(160), "transport error: timed out", at(500))
            })
            .unwrap();

        let sealed = store.tracker(genesis.id).unwrap().unwrap();
        assert_eq!(sealed.status, SyncStatus::Error);
        assert_eq!(sealed.detail.as_deref(), Some("transport error: timed out"));
        assert!(!store.has_finished_sync(ACCOUNT, KIND).unwrap());

        let pending = store.open_tracker(ACCOUNT, KIND).unwrap().unwrap();
        assert_eq!(pending.scheduled, at(500));
    }

    #[test]
    fn error_successor_inherits_prior_hash() {
        let store = HistoryStore::open_in_memory().unwrap();

        let genesis = store
            .unit_of_work(|uow| get_or_create_unfinished(uow, ACCOUNT, KIND, at(0)))
            .unwrap();
        let after_success = store
            .unit_of_work(|uow| {
                mark_finished(uow, &genesis, at(10), at(20), "Updated successfully", at(100), Some("digest-1".into()))
            })
            .unwrap();
        let after_failure = store
            .unit_of_work(|uow| {
                mark_error(uow, &after_success, at(110), at(120), "endpoint returned 502: bad gateway", at(200))
            })
            .unwrap();

        assert_eq!(after_failure.prior_hash.as_deref(), Some("digest-1"));
    }

    #[test]
    fn slot_is_never_empty_after_genesis() {
        let store = HistoryStore::open_in_memory().unwrap();

        let mut current = store
            .unit_of_work(|uow| get_or_create_unfinished(uow, ACCOUNT, KIND, at(0)))
            .unwrap();
        for round in 1..=4 {
            let tracker = current.clone();
            current = store
                .unit_of_work(|uow| {
                    mark_finished(
                        uow,
                        &tracker,
                        at(round * 10),
                        at(round * 10 + 5),
                        "Updated successfully",
                        at(round * 100),
                        None,
                    )
                })
                .unwrap();
            assert!(store.open_tracker(ACCOUNT, KIND).unwrap().is_some());
        }

        let trail = store.tracker_trail(ACCOUNT, KIND).unwrap();
        assert_eq!(trail.len(), 5);
        let finished = trail
            .iter()
            .filter(|t| t.status == SyncStatus::Finished)
            .count();
        assert_eq!(finished, 4);
    }
}
