//! Character state: location, ship, and titles.

use histdb_core::{NaturalKey, TemporalPayload};
use serde::{Deserialize, Serialize};

/// Where the character currently is.
///
/// A singleton record: each account has exactly one location chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CharacterLocation {
    /// Solar system the character is in.
    pub solar_system_id: i64,
    /// Station the character is docked at, if docked.
    pub station_id: Option<i64>,
}

impl CharacterLocation {
    /// Creates an undocked location.
    #[must_use]
    pub const fn in_space(solar_system_id: i64) -> Self {
        Self {
            solar_system_id,
            station_id: None,
        }
    }

    /// Creates a docked location.
    #[must_use]
    pub const fn docked(solar_system_id: i64, station_id: i64) -> Self {
        Self {
            solar_system_id,
            station_id: Some(station_id),
        }
    }
}

impl TemporalPayload for CharacterLocation {
    const KIND: &'static str = "character_location";

    fn natural_key(&self) -> NaturalKey {
        NaturalKey::singleton()
    }
}

/// The ship the character is flying.
///
/// A singleton record. Renaming the ship evolves it like any other
/// field change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CurrentShip {
    /// Ship type.
    pub type_id: i64,
    /// The specific hull.
    pub item_id: i64,
    /// Player-assigned name.
    pub name: String,
}

impl TemporalPayload for CurrentShip {
    const KIND: &'static str = "current_ship";

    fn natural_key(&self) -> NaturalKey {
        NaturalKey::singleton()
    }
}

/// One title granted to the character, keyed by title ID.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Title {
    /// Title ID within the corporation.
    pub title_id: i32,
    /// Title text.
    pub name: String,
}

impl Title {
    /// Creates a title record.
    pub fn new(title_id: i32, name: impl Into<String>) -> Self {
        Self {
            title_id,
            name: name.into(),
        }
    }
}

impl TemporalPayload for Title {
    const KIND: &'static str = "titles";

    fn natural_key(&self) -> NaturalKey {
        NaturalKey::int(i64::from(self.title_id))
    }
}
