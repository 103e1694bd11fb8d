//! Test fixtures and store helpers.
//!
//! Provides convenience functions for setting up test stores and
//! common starting states.

use histdb_core::{AccountId, HistoryStore};
use std::path::PathBuf;
use std::sync::Once;
use tempfile::TempDir;

/// Account every scenario helper writes under.
pub const TEST_ACCOUNT: AccountId = AccountId::new(90_000_001);

/// A test store with automatic cleanup.
pub struct TestStore {
    /// The store instance.
    pub store: HistoryStore,
    /// The temporary directory (kept alive to prevent cleanup).
    _temp_dir: Option<TempDir>,
}

impl TestStore {
    /// Creates a new in-memory test store.
    pub fn memory() -> Self {
        Self {
            store: HistoryStore::open_in_memory().expect("Failed to open in-memory store"),
            _temp_dir: None,
        }
    }

    /// Creates a new file-based test store in a temporary directory.
    pub fn file() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let store_path = temp_dir.path().join("store");
        let store = HistoryStore::open(&store_path).expect("Failed to open file store");

        Self {
            store,
            _temp_dir: Some(temp_dir),
        }
    }

    /// Returns the store directory if file-based, None if in-memory.
    pub fn path(&self) -> Option<PathBuf> {
        self._temp_dir.as_ref().map(|d| d.path().join("store"))
    }
}

impl std::ops::Deref for TestStore {
    type Target = HistoryStore;

    fn deref(&self) -> &Self::Target {
        &self.store
    }
}

impl std::ops::DerefMut for TestStore {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.store
    }
}

/// Runs a test with a temporary in-memory store.
///
/// # Example
///
/// ```rust,ignore
/// use histdb_testkit::with_temp_store;
///
/// #[test]
/// fn my_test() {
///     with_temp_store(|store| {
///         let table = store.table::<WalletBalance>();
///         // ... test operations
///     });
/// }
/// ```
pub fn with_temp_store<F, R>(f: F) -> R
where
    F: FnOnce(&HistoryStore) -> R,
{
    let test_store = TestStore::memory();
    f(&test_store.store)
}

/// Runs a test with a temporary file-based store.
///
/// The closure also receives the store directory, handy for tests that
/// close and reopen the store to exercise journal replay.
pub fn with_file_store<F, R>(f: F) -> R
where
    F: FnOnce(&HistoryStore, &std::path::Path) -> R,
{
    let test_store = TestStore::file();
    let path = test_store.path().expect("File store should have a path");
    f(&test_store.store, &path)
}

static LOGGING: Once = Once::new();

/// Installs a tracing subscriber that honors `RUST_LOG`, once per process.
///
/// Safe to call at the top of every test; later calls are no-ops. Output
/// goes through the test writer so it is captured per test.
pub fn init_test_logging() {
    LOGGING.call_once(|| {
        let filter = tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .try_init();
    });
}

/// Test scenario helpers.
pub mod scenarios {
    use super::*;
    use histdb_core::Timestamp;
    use histdb_model::{Credits, WalletBalance};
    use histdb_sync_engine::{get_or_create_unfinished, mark_finished, reconcile_set};

    /// Creates a store whose test account's master wallet evolved `depth` times.
    ///
    /// Each round observes a different balance one hour after the
    /// previous one, so the division 1000 record ends up with `depth`
    /// versions chained end-to-start.
    pub fn wallet_history(depth: usize) -> TestStore {
        let test_store = TestStore::memory();
        let base = Timestamp::from_millis(1_500_000_000_000);

        for round in 0..depth {
            let at = Timestamp::from_millis(base.as_millis() + round as i64 * 3_600_000);
            let snapshot = vec![WalletBalance::new(
                1_000,
                Credits::from_hundredths((round as i64 + 1) * 250_000),
            )];
            test_store
                .unit_of_work(|uow| reconcile_set(uow, TEST_ACCOUNT, at, snapshot))
                .expect("Failed to reconcile wallet snapshot");
        }

        test_store
    }

    /// Creates a store where one sync kind already finished for the test
    /// account, leaving its pending successor scheduled an hour later.
    pub fn finished_sync(kind: &'static str) -> TestStore {
        let test_store = TestStore::memory();
        let started = Timestamp::from_millis(1_500_000_000_000);
        let ended = Timestamp::from_millis(1_500_000_004_000);
        let next = Timestamp::from_millis(1_500_003_600_000);

        test_store
            .unit_of_work(|uow| {
                let tracker = get_or_create_unfinished(uow, TEST_ACCOUNT, kind, started)?;
                mark_finished(uow, &tracker, started, ended, "Updated successfully", next, None)?;
                Ok(())
            })
            .expect("Failed to seed finished sync");

        test_store
    }
}
