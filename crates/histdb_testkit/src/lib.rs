//! # HistDB Testkit
//!
//! Test utilities for HistDB.
//!
//! This crate provides:
//! - Store fixtures with automatic cleanup
//! - A scripted snapshot client for driving sync units
//! - Property-based test generators using proptest
//! - Structural checks for version histories
//!
//! ## Usage
//!
//! ```rust,ignore
//! use histdb_testkit::prelude::*;
//!
//! #[test]
//! fn test_with_store() {
//!     with_temp_store(|store| {
//!         let table = store.table::<WalletBalance>();
//!         // ... test operations
//!     });
//! }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod client;
pub mod fixtures;
pub mod generators;
pub mod invariants;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::client::*;
    pub use crate::fixtures::*;
    pub use crate::generators::*;
    pub use crate::invariants::*;
}

pub use client::*;
pub use fixtures::*;
pub use generators::*;
pub use invariants::*;
