//! Scripted snapshot client for sync-unit tests.

use histdb_core::AccountId;
use histdb_sync_engine::{FetchError, Snapshot, SnapshotClient};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};

/// A snapshot client that replays a canned script of responses.
///
/// Each request consumes the next scripted response in order. Once the
/// script runs dry every further request fails with a transport error,
/// which keeps an over-eager scheduler visible in test output instead
/// of silently serving stale data.
///
/// # Example
///
/// ```rust,ignore
/// let client = ScriptedClient::with_script(vec![
///     Ok(Snapshot::new(raw_balances()).with_cache_until("Thu, 21 Dec 2017 12:00:00 GMT")),
///     Err(FetchError::endpoint(502, "bad gateway")),
/// ]);
/// ```
pub struct ScriptedClient<R> {
    script: Mutex<VecDeque<Result<Snapshot<R>, FetchError>>>,
    calls: AtomicUsize,
}

impl<R> ScriptedClient<R> {
    /// Creates a client with an empty script.
    pub fn new() -> Self {
        Self {
            script: Mutex::new(VecDeque::new()),
            calls: AtomicUsize::new(0),
        }
    }

    /// Creates a client that serves exactly one successful snapshot.
    pub fn one(payload: R) -> Self {
        Self::with_script(vec![Ok(Snapshot::new(payload))])
    }

    /// Creates a client preloaded with the given responses.
    pub fn with_script(script: Vec<Result<Snapshot<R>, FetchError>>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            calls: AtomicUsize::new(0),
        }
    }

    /// Appends a response to the end of the script.
    pub fn push(&self, response: Result<Snapshot<R>, FetchError>) {
        self.script.lock().push_back(response);
    }

    /// Number of requests made so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Number of scripted responses not yet consumed.
    pub fn remaining(&self) -> usize {
        self.script.lock().len()
    }
}

impl<R> Default for ScriptedClient<R> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R> fmt::Debug for ScriptedClient<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScriptedClient")
            .field("calls", &self.calls())
            .field("remaining", &self.remaining())
            .finish_non_exhaustive()
    }
}

impl<R: Send + Sync> SnapshotClient for ScriptedClient<R> {
    type Raw = R;

    fn request(&self, _account: AccountId) -> Result<Snapshot<R>, FetchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.script
            .lock()
            .pop_front()
            .unwrap_or_else(|| Err(FetchError::transport("scripted client exhausted")))
    }
}
