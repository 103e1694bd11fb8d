//! Temporal records: payload trait, natural keys, and versions.

use crate::time::{Lifespan, Timestamp};
use crate::types::AccountId;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fmt;

/// The identity of a record within its account and kind.
///
/// Natural keys come from the payload itself, not from the store: a
/// wallet balance is keyed by its division, a title by its title ID.
/// Kinds that track a single value per account use
/// [`NaturalKey::singleton`].
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum NaturalKey {
    /// Numeric key, e.g. a division or corporation ID.
    Int(i64),
    /// Textual key.
    Text(String),
}

impl NaturalKey {
    /// The key used by kinds with exactly one record per account.
    #[must_use]
    pub const fn singleton() -> Self {
        Self::Int(0)
    }

    /// Creates a numeric key.
    #[must_use]
    pub const fn int(id: i64) -> Self {
        Self::Int(id)
    }

    /// Creates a textual key.
    pub fn text(key: impl Into<String>) -> Self {
        Self::Text(key.into())
    }
}

impl fmt::Display for NaturalKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int(id) => write!(f, "{id}"),
            Self::Text(key) => write!(f, "{key}"),
        }
    }
}

/// Trait for values whose history the store tracks.
///
/// Implementors are plain serde types plus two pieces of metadata: a
/// stable kind string naming the table the payloads live in, and a
/// natural key identifying the record within an account.
///
/// Equality of payloads decides whether a fresh observation evolves the
/// record or leaves it untouched, so any normalization (fixed-scale
/// money, trimmed strings) must happen before construction — two
/// payloads representing the same value must compare equal.
///
/// # Example
///
/// ```rust
/// use histdb_core::{NaturalKey, TemporalPayload};
/// use serde::{Deserialize, Serialize};
///
/// #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
/// struct Standing {
///     faction_id: i64,
///     value: i64,
/// }
///
/// impl TemporalPayload for Standing {
///     const KIND: &'static str = "standings";
///
///     fn natural_key(&self) -> NaturalKey {
///         NaturalKey::int(self.faction_id)
///     }
/// }
/// ```
pub trait TemporalPayload:
    Serialize + DeserializeOwned + Clone + PartialEq + Send + Sync + 'static
{
    /// Stable name of the table holding this kind of payload.
    ///
    /// Changing it orphans previously journaled history.
    const KIND: &'static str;

    /// Returns the record's identity within its account.
    fn natural_key(&self) -> NaturalKey;

    /// Returns true if two payloads represent the same observed value.
    ///
    /// Defaults to `==`; override only when some fields must not count
    /// toward change detection.
    fn same_value(&self, other: &Self) -> bool {
        self == other
    }
}

/// One version of a record: a payload plus the interval it was current.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Version<P> {
    /// Account the record belongs to.
    pub account: AccountId,
    /// Natural key within the account.
    pub key: NaturalKey,
    /// Validity interval `[start, end)`.
    pub life: Lifespan,
    /// The observed value.
    pub payload: P,
}

impl<P: TemporalPayload> Version<P> {
    /// Creates an open version first observed at `at`.
    ///
    /// The natural key is derived from the payload.
    #[must_use]
    pub fn open(account: AccountId, at: Timestamp, payload: P) -> Self {
        Self {
            account,
            key: payload.natural_key(),
            life: Lifespan::open(at),
            payload,
        }
    }

    /// Returns true if this version is still current.
    #[must_use]
    pub fn is_open(&self) -> bool {
        self.life.is_open()
    }
}
