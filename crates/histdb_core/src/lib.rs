//! # HistDB Core
//!
//! Temporal record store for HistDB.
//!
//! This crate keeps the full history of observed account state. Records
//! never change in place: each is a chain of immutable versions, every
//! version carrying the half-open interval `[life.start, life.end)`
//! during which it was the truth. The open version of a record has an
//! end of [`Timestamp::FOREVER`].
//!
//! ## Design Principles
//!
//! - The journal is the sole source of truth; every table, version,
//!   tracker, and container is rebuilt by replaying it on open
//! - Mutations happen in atomic units of work; a unit is journaled and
//!   applied in full, or not at all
//! - Versions of one record never overlap, and closing at the same
//!   instant a successor starts leaves no gap between them
//! - Sync trackers carry the fetch schedule, with at most one
//!   unfinished tracker per account and kind
//!
//! ## Example
//!
//! ```rust
//! use histdb_core::{AccountId, HistoryStore, NaturalKey, TemporalPayload, Timestamp};
//! use serde::{Deserialize, Serialize};
//!
//! #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
//! struct Standing {
//!     faction_id: i64,
//!     value: i64,
//! }
//!
//! impl TemporalPayload for Standing {
//!     const KIND: &'static str = "standings";
//!
//!     fn natural_key(&self) -> NaturalKey {
//!         NaturalKey::int(self.faction_id)
//!     }
//! }
//!
//! let store = HistoryStore::open_in_memory()?;
//! let account = AccountId::new(7);
//! let now = Timestamp::from_millis(1_000);
//!
//! store.unit_of_work(|uow| {
//!     uow.create(
//!         account,
//!         now,
//!         &Standing {
//!             faction_id: 500_001,
//!             value: 5,
//!         },
//!     )
//! })?;
//!
//! let current = store
//!     .table::<Standing>()
//!     .latest(account, &NaturalKey::int(500_001))?
//!     .expect("just created");
//! assert_eq!(current.payload.value, 5);
//! assert!(current.life.is_open());
//!
//! store.close()?;
//! # Ok::<(), histdb_core::StoreError>(())
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod codec;
mod config;
mod dir;
mod error;
mod journal;
mod record;
mod store;
mod table;
mod time;
mod tracker;
mod types;
mod uow;

pub use config::StoreConfig;
pub use error::{StoreError, StoreResult};
pub use record::{NaturalKey, TemporalPayload, Version};
pub use store::{HistoryStore, StoreStats};
pub use table::{LiveScan, Page, PageRequest, TemporalTable};
pub use time::{Lifespan, Timestamp};
pub use tracker::{SyncStatus, SyncTracker, TrackerId};
pub use types::{AccountId, SequenceNo, TableId, UnitId};
pub use uow::UnitOfWork;
