//! Fixed-point money.
//!
//! Wallet APIs report balances as floating-point currency. Comparing
//! floats across snapshots would evolve records on representation noise,
//! so balances are normalized to integer hundredths at the edge and stay
//! integers everywhere else.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A currency amount in hundredths, the smallest unit the remote API
/// reports.
///
/// `Credits` is deliberately arithmetic-free: the store only ever
/// compares observed balances, it never computes with them.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Credits(pub i64);

impl Credits {
    /// Zero credits.
    pub const ZERO: Self = Self(0);

    /// Creates an amount from integer hundredths.
    #[must_use]
    pub const fn from_hundredths(hundredths: i64) -> Self {
        Self(hundredths)
    }

    /// Returns the amount in hundredths.
    #[must_use]
    pub const fn as_hundredths(self) -> i64 {
        self.0
    }

    /// Creates an amount from whole currency units, saturating at the
    /// representable range.
    #[must_use]
    pub const fn from_major(units: i64) -> Self {
        Self(units.saturating_mul(100))
    }

    /// Normalizes a floating-point amount as the remote API reports it.
    ///
    /// Rounds to the nearest hundredth, so two snapshots of the same
    /// balance always normalize to the same value. Out-of-range inputs
    /// saturate; a NaN maps to zero.
    #[must_use]
    pub fn from_f64(amount: f64) -> Self {
        Self((amount * 100.0).round() as i64)
    }

    /// Returns the amount as floating point, for display-style uses
    /// only.
    #[must_use]
    pub fn to_f64(self) -> f64 {
        self.0 as f64 / 100.0
    }
}

impl fmt::Display for Credits {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let magnitude = self.0.unsigned_abs();
        write!(f, "{sign}{}.{:02}", magnitude / 100, magnitude % 100)
    }
}
