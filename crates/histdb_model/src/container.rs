//! The per-account container document.

use histdb_core::Timestamp;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Account-level sync metadata, stored as one document per account.
///
/// Unlike versioned records the container is replaced whole; it carries
/// bookkeeping that needs no history, currently the cache expiry the
/// remote API last reported per data kind.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountContainer {
    /// Cache expiry per data kind, as reported by the remote API.
    pub expiries: BTreeMap<String, Timestamp>,
}

impl AccountContainer {
    /// Creates an empty container.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the recorded cache expiry for a data kind.
    #[must_use]
    pub fn expiry_for(&self, kind: &str) -> Option<Timestamp> {
        self.expiries.get(kind).copied()
    }

    /// Records the cache expiry for a data kind.
    pub fn set_expiry(&mut self, kind: impl Into<String>, at: Timestamp) {
        self.expiries.insert(kind.into(), at);
    }
}
