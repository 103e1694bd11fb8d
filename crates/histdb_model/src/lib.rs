//! # HistDB Model
//!
//! Account state payload types for HistDB.
//!
//! Each type here is one kind of observed account state, implementing
//! [`TemporalPayload`](histdb_core::TemporalPayload) so the store can
//! version it: wallet balances per division, the character's location
//! and current ship, titles, and loyalty point balances. [`Credits`]
//! normalizes floating-point currency to fixed hundredths so equal
//! balances always compare equal across snapshots.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod character;
mod container;
mod loyalty;
mod money;
mod wallet;

pub use character::{CharacterLocation, CurrentShip, Title};
pub use container::AccountContainer;
pub use loyalty::LoyaltyPoints;
pub use money::Credits;
pub use wallet::WalletBalance;
