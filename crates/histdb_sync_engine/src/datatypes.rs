//! Built-in data kinds: raw endpoint shapes and their capability specs.
//!
//! Each spec pairs the payload the endpoint returns with the stored
//! model type and the scheduling interval matching the endpoint's cache
//! window. Normalization happens in `map`, so representation noise in
//! the raw payload never reaches change detection.

use std::time::Duration;

use histdb_model::{CharacterLocation, Credits, CurrentShip, LoyaltyPoints, Title, WalletBalance};
use serde::{Deserialize, Serialize};

use crate::unit::{DataTypeSpec, EvolveMode};

/// One wallet division row as the endpoint reports it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawWalletBalance {
    /// Wallet division, 1000 through 1006.
    pub division: i32,
    /// Balance in major units with a decimal fraction.
    pub balance: f64,
}

/// Capability spec for wallet balances.
#[derive(Debug, Clone, Copy, Default)]
pub struct WalletBalanceSpec;

impl DataTypeSpec for WalletBalanceSpec {
    type Raw = Vec<RawWalletBalance>;
    type Payload = WalletBalance;

    fn mode(&self) -> EvolveMode {
        EvolveMode::FullSet
    }

    fn map(&self, raw: Vec<RawWalletBalance>) -> Vec<WalletBalance> {
        raw.into_iter()
            .map(|row| WalletBalance::new(row.division, Credits::from_f64(row.balance)))
            .collect()
    }

    fn interval(&self) -> Option<Duration> {
        Some(Duration::from_secs(15 * 60))
    }
}

/// The character's position as the endpoint reports it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawCharacterLocation {
    /// Solar system the character is in.
    pub solar_system_id: i64,
    /// Station the character is docked at, if any.
    pub station_id: Option<i64>,
}

/// Capability spec for the character's location.
#[derive(Debug, Clone, Copy, Default)]
pub struct CharacterLocationSpec;

impl DataTypeSpec for CharacterLocationSpec {
    type Raw = RawCharacterLocation;
    type Payload = CharacterLocation;

    fn mode(&self) -> EvolveMode {
        EvolveMode::Scalar
    }

    fn map(&self, raw: RawCharacterLocation) -> Vec<CharacterLocation> {
        let location = match raw.station_id {
            Some(station_id) => CharacterLocation::docked(raw.solar_system_id, station_id),
            None => CharacterLocation::in_space(raw.solar_system_id),
        };
        vec![location]
    }

    fn interval(&self) -> Option<Duration> {
        Some(Duration::from_secs(5 * 60))
    }
}

/// The ship the character is flying, as the endpoint reports it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawCurrentShip {
    /// Ship type.
    pub type_id: i64,
    /// The specific hull.
    pub item_id: i64,
    /// Player-assigned name.
    pub name: String,
}

/// Capability spec for the current ship.
#[derive(Debug, Clone, Copy, Default)]
pub struct CurrentShipSpec;

impl DataTypeSpec for CurrentShipSpec {
    type Raw = RawCurrentShip;
    type Payload = CurrentShip;

    fn mode(&self) -> EvolveMode {
        EvolveMode::Scalar
    }

    fn map(&self, raw: RawCurrentShip) -> Vec<CurrentShip> {
        vec![CurrentShip {
            type_id: raw.type_id,
            item_id: raw.item_id,
            name: raw.name,
        }]
    }

    fn interval(&self) -> Option<Duration> {
        Some(Duration::from_secs(5 * 60))
    }
}

/// One granted title row as the endpoint reports it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawTitle {
    /// Title ID within the corporation.
    pub title_id: i32,
    /// Title text.
    pub name: String,
}

/// Capability spec for corporation titles.
#[derive(Debug, Clone, Copy, Default)]
pub struct TitlesSpec;

impl DataTypeSpec for TitlesSpec {
    type Raw = Vec<RawTitle>;
    type Payload = Title;

    fn mode(&self) -> EvolveMode {
        EvolveMode::FullSet
    }

    fn map(&self, raw: Vec<RawTitle>) -> Vec<Title> {
        raw.into_iter()
            .map(|row| Title::new(row.title_id, row.name))
            .collect()
    }

    fn interval(&self) -> Option<Duration> {
        Some(Duration::from_secs(60 * 60))
    }
}

/// One loyalty point row as the endpoint reports it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawLoyaltyPoints {
    /// Corporation granting the points.
    pub corporation_id: i64,
    /// Current point balance.
    pub loyalty_points: i64,
}

/// Capability spec for loyalty points.
#[derive(Debug, Clone, Copy, Default)]
pub struct LoyaltyPointsSpec;

impl DataTypeSpec for LoyaltyPointsSpec {
    type Raw = Vec<RawLoyaltyPoints>;
    type Payload = LoyaltyPoints;

    fn mode(&self) -> EvolveMode {
        EvolveMode::FullSet
    }

    fn map(&self, raw: Vec<RawLoyaltyPoints>) -> Vec<LoyaltyPoints> {
        raw.into_iter()
            .map(|row| LoyaltyPoints::new(row.corporation_id, row.loyalty_points))
            .collect()
    }

    fn interval(&self) -> Option<Duration> {
        Some(Duration::from_secs(60 * 60))
    }
}
