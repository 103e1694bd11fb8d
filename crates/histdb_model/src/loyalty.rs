//! Loyalty point balances.

use histdb_core::{NaturalKey, TemporalPayload};
use serde::{Deserialize, Serialize};

/// Loyalty points held with one corporation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoyaltyPoints {
    /// Corporation granting the points.
    pub corporation_id: i64,
    /// Point balance at observation time.
    pub points: i64,
}

impl LoyaltyPoints {
    /// Creates a loyalty point record.
    #[must_use]
    pub const fn new(corporation_id: i64, points: i64) -> Self {
        Self {
            corporation_id,
            points,
        }
    }
}

impl TemporalPayload for LoyaltyPoints {
    const KIND: &'static str = "loyalty_points";

    fn natural_key(&self) -> NaturalKey {
        NaturalKey::int(self.corporation_id)
    }
}
