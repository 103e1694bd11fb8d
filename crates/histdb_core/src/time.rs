//! Timestamps and version lifespans.
//!
//! All times in histdb are UTC milliseconds since the Unix epoch. A
//! version's lifespan is a half-open interval `[start, end)`; an open
//! version carries the [`Timestamp::FOREVER`] sentinel as its end.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// A point in time, stored as UTC milliseconds since the Unix epoch.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
#[serde(transparent)]
pub struct Timestamp(pub i64);

impl Timestamp {
    /// Sentinel meaning "still current": the exclusive end of an open
    /// version's lifespan. Compares greater than every real time.
    pub const FOREVER: Self = Self(i64::MAX);

    /// The Unix epoch.
    pub const EPOCH: Self = Self(0);

    /// Creates a timestamp from raw epoch milliseconds.
    #[must_use]
    pub const fn from_millis(millis: i64) -> Self {
        Self(millis)
    }

    /// Returns the raw epoch milliseconds.
    #[must_use]
    pub const fn as_millis(self) -> i64 {
        self.0
    }

    /// Returns the current wall-clock time.
    ///
    /// Callers on the sync path should capture this once and thread the
    /// value through, so one pass observes one instant.
    #[must_use]
    pub fn now() -> Self {
        Self(Utc::now().timestamp_millis())
    }

    /// Returns true if this is the open-end sentinel.
    #[must_use]
    pub const fn is_forever(self) -> bool {
        self.0 == i64::MAX
    }

    /// Creates a timestamp from a chrono UTC datetime.
    #[must_use]
    pub fn from_datetime(dt: DateTime<Utc>) -> Self {
        Self(dt.timestamp_millis())
    }

    /// Converts to a chrono UTC datetime.
    ///
    /// Returns `None` for the sentinel and for values outside chrono's
    /// representable range.
    #[must_use]
    pub fn to_datetime(self) -> Option<DateTime<Utc>> {
        if self.is_forever() {
            return None;
        }
        DateTime::from_timestamp_millis(self.0)
    }

    /// Adds a duration, clamping at the largest real value.
    #[must_use]
    pub fn saturating_add(self, duration: Duration) -> Self {
        let millis = i64::try_from(duration.as_millis()).unwrap_or(i64::MAX);
        Self(self.0.saturating_add(millis))
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_forever() {
            return write!(f, "forever");
        }
        match self.to_datetime() {
            Some(dt) => write!(f, "{}", dt.to_rfc3339()),
            None => write!(f, "{}ms", self.0),
        }
    }
}

/// The half-open validity interval `[start, end)` of a version.
///
/// `start` is the instant the value was first observed; `end` is the
/// instant a differing value replaced it. An open version has
/// `end == Timestamp::FOREVER`. Adjacent versions of the same record
/// share a boundary: the old version's `end` equals the new version's
/// `start`, leaving no gap and no overlap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Lifespan {
    /// Inclusive start of validity.
    pub start: Timestamp,
    /// Exclusive end of validity.
    pub end: Timestamp,
}

impl Lifespan {
    /// Creates a closed lifespan `[start, end)`.
    #[must_use]
    pub const fn new(start: Timestamp, end: Timestamp) -> Self {
        Self { start, end }
    }

    /// Creates an open lifespan starting at `start`.
    #[must_use]
    pub const fn open(start: Timestamp) -> Self {
        Self {
            start,
            end: Timestamp::FOREVER,
        }
    }

    /// Returns true if the version is still current.
    #[must_use]
    pub const fn is_open(self) -> bool {
        self.end.is_forever()
    }

    /// Returns true if `at` falls within `[start, end)`.
    #[must_use]
    pub fn contains(self, at: Timestamp) -> bool {
        self.start <= at && at < self.end
    }

    /// Returns true if two half-open intervals share any instant.
    ///
    /// Touching intervals (`a.end == b.start`) do not overlap.
    #[must_use]
    pub fn overlaps(self, other: Self) -> bool {
        self.start < other.end && other.start < self.end
    }

    /// Returns this lifespan closed at `end`.
    #[must_use]
    pub const fn closed_at(self, end: Timestamp) -> Self {
        Self {
            start: self.start,
            end,
        }
    }
}

impl fmt::Display for Lifespan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {})", self.start, self.end)
    }
}
