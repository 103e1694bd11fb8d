//! # HistDB Sync Engine
//!
//! Snapshot reconciliation and sync scheduling on top of
//! [`histdb_core`]. The engine ingests point-in-time snapshots of a
//! remote account's state from a rate-limited, cache-hinting endpoint
//! and maintains the full change history: fresh observations are
//! diffed against the open versions in the store, and every attempt is
//! recorded by a tracker that also schedules its successor.
//!
//! ## Design Principles
//!
//! - **Capability specs, not subclasses**: each data kind is described
//!   by a [`DataTypeSpec`] (raw shape, mapping, evolve mode, interval)
//!   and executed by the one generic [`SyncUnit`].
//! - **Failures are data**: a failed fetch seals the tracker `ERROR`
//!   and schedules a retry; only store faults abort an attempt.
//! - **Store-resident single-flight**: the one-unfinished-tracker
//!   invariant serializes attempts per account and kind without any
//!   in-process coordination.
//! - **Explicit clock**: `now` is threaded through every call; the
//!   engine never reads the wall clock behind the caller's back.
//!
//! ## Example
//!
//! ```rust
//! use std::sync::Arc;
//!
//! use histdb_core::{AccountId, HistoryStore, Timestamp};
//! use histdb_model::WalletBalance;
//! use histdb_sync_engine::{
//!     FetchError, RawWalletBalance, Snapshot, SnapshotClient, SyncConfig, SyncOutcome,
//!     SyncUnit, WalletBalanceSpec,
//! };
//!
//! struct OneShot;
//!
//! impl SnapshotClient for OneShot {
//!     type Raw = Vec<RawWalletBalance>;
//!
//!     fn request(&self, _account: AccountId) -> Result<Snapshot<Self::Raw>, FetchError> {
//!         Ok(Snapshot::new(vec![RawWalletBalance {
//!             division: 1000,
//!             balance: 12_994.75,
//!         }])
//!         .with_cache_until("Thu, 21 Dec 2017 12:00:00 GMT"))
//!     }
//! }
//!
//! let store = HistoryStore::open_in_memory()?;
//! let unit = SyncUnit::new(WalletBalanceSpec, Arc::new(OneShot), SyncConfig::default());
//!
//! let account = AccountId::new(93_813_310);
//! let now = Timestamp::from_millis(1_513_850_000_000);
//! let outcome = unit.execute(&store, account, now)?;
//! assert!(matches!(outcome, SyncOutcome::Completed { .. }));
//!
//! let live = store.table::<WalletBalance>().live_for(account, now)?;
//! assert_eq!(live.len(), 1);
//! # Ok::<(), histdb_sync_engine::SyncError>(())
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod config;
mod datatypes;
mod error;
mod evolve;
mod hint;
mod registry;
mod report;
mod tracker;
mod unit;

pub use config::SyncConfig;
pub use datatypes::{
    CharacterLocationSpec, CurrentShipSpec, LoyaltyPointsSpec, RawCharacterLocation,
    RawCurrentShip, RawLoyaltyPoints, RawTitle, RawWalletBalance, TitlesSpec, WalletBalanceSpec,
};
pub use error::{FetchError, SyncError, SyncResult};
pub use evolve::{reconcile, reconcile_set, EvolveStats};
pub use hint::{parse_expiry, successor_due};
pub use registry::{SyncRegistry, Synchronizer};
pub use report::{SkipReason, SyncOutcome};
pub use tracker::{get_or_create_unfinished, mark_error, mark_finished};
pub use unit::{DataTypeSpec, EvolveMode, Snapshot, SnapshotClient, SyncUnit};
