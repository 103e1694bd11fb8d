//! Wallet balances.

use crate::money::Credits;
use histdb_core::{NaturalKey, TemporalPayload};
use serde::{Deserialize, Serialize};

/// Balance of one wallet division.
///
/// Accounts carry several wallet divisions; each is its own record keyed
/// by division number, so one division changing does not touch the
/// others' histories.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WalletBalance {
    /// Wallet division number.
    pub division: i32,
    /// Balance at observation time.
    pub balance: Credits,
}

impl WalletBalance {
    /// Creates a balance record.
    #[must_use]
    pub const fn new(division: i32, balance: Credits) -> Self {
        Self { division, balance }
    }
}

impl TemporalPayload for WalletBalance {
    const KIND: &'static str = "wallet_balances";

    fn natural_key(&self) -> NaturalKey {
        NaturalKey::int(i64::from(self.division))
    }
}
