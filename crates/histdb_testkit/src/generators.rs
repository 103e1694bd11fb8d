//! Property-based test generators using proptest.
//!
//! Provides strategies for generating random temporal data that stays
//! within the ranges the store accepts.

use histdb_core::{AccountId, NaturalKey, Timestamp};
use histdb_model::{Credits, Title, WalletBalance};
use proptest::prelude::*;

/// Strategy for generating timestamps between 2000-01-01 and 2100-01-01.
pub fn timestamp_strategy() -> impl Strategy<Value = Timestamp> {
    (946_684_800_000i64..4_102_444_800_000).prop_map(Timestamp::from_millis)
}

/// Strategy for generating account identifiers.
pub fn account_strategy() -> impl Strategy<Value = AccountId> {
    (90_000_000i64..100_000_000).prop_map(AccountId::new)
}

/// Strategy for generating natural keys of both shapes.
pub fn natural_key_strategy() -> impl Strategy<Value = NaturalKey> {
    prop_oneof![
        (0i64..10_000).prop_map(NaturalKey::int),
        prop::string::string_regex("[a-z][a-z0-9_]{0,15}")
            .expect("Invalid regex")
            .prop_map(|key| NaturalKey::text(key)),
    ]
}

/// Strategy for generating credit amounts up to a hundred billion,
/// either sign, at hundredth precision.
pub fn credits_strategy() -> impl Strategy<Value = Credits> {
    (-10_000_000_000_000i64..10_000_000_000_000).prop_map(Credits::from_hundredths)
}

/// Strategy for generating a single division balance.
pub fn wallet_balance_strategy() -> impl Strategy<Value = WalletBalance> {
    (1_000i32..1_007, credits_strategy())
        .prop_map(|(division, balance)| WalletBalance::new(division, balance))
}

/// Strategy for one wallet snapshot: up to seven divisions, each
/// appearing at most once.
pub fn wallet_snapshot_strategy() -> impl Strategy<Value = Vec<WalletBalance>> {
    prop::collection::btree_map(1_000i32..1_007, credits_strategy(), 0..7).prop_map(|divisions| {
        divisions
            .into_iter()
            .map(|(division, balance)| WalletBalance::new(division, balance))
            .collect()
    })
}

/// Strategy for generating title grants.
pub fn title_strategy() -> impl Strategy<Value = Title> {
    (
        1i32..64,
        prop::string::string_regex("[A-Z][a-z]{2,11}").expect("Invalid regex"),
    )
        .prop_map(|(title_id, name)| Title::new(title_id, name))
}

/// Strategy for a run of wallet snapshots as an endpoint would serve
/// them across successive sync passes.
pub fn snapshot_sequence_strategy(max_len: usize) -> impl Strategy<Value = Vec<Vec<WalletBalance>>> {
    prop::collection::vec(wallet_snapshot_strategy(), 1..max_len)
}

/// Configuration for property tests.
#[derive(Debug, Clone)]
pub struct PropTestConfig {
    /// Number of test cases to run.
    pub cases: u32,
    /// Maximum shrink iterations.
    pub max_shrink_iters: u32,
}

impl Default for PropTestConfig {
    fn default() -> Self {
        Self {
            cases: 256,
            max_shrink_iters: 1000,
        }
    }
}

impl PropTestConfig {
    /// Creates a configuration for quick tests.
    #[must_use]
    pub fn quick() -> Self {
        Self {
            cases: 32,
            max_shrink_iters: 100,
        }
    }

    /// Creates a configuration for thorough tests.
    #[must_use]
    pub fn thorough() -> Self {
        Self {
            cases: 1024,
            max_shrink_iters: 10000,
        }
    }

    /// Converts to proptest config.
    #[must_use]
    pub fn to_proptest_config(&self) -> ProptestConfig {
        ProptestConfig {
            cases: self.cases,
            max_shrink_iters: self.max_shrink_iters,
            ..ProptestConfig::default()
        }
    }
}
