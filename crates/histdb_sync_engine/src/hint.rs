//! Cache-expiry hint parsing.
//!
//! The endpoint annotates each snapshot with the instant its cache
//! entry lapses, as an HTTP-date (`Thu, 21 Dec 2017 12:00:00 GMT`) or
//! an RFC 3339 instant. Polling before that instant returns the same
//! cached payload, so the successor attempt is scheduled at the hint.

use std::time::Duration;

use chrono::{DateTime, Utc};
use histdb_core::Timestamp;

/// Parses a cache-expiry hint.
///
/// Accepts HTTP-dates (RFC 1123, parsed as RFC 2822) and RFC 3339
/// instants. Returns `None` for anything else.
pub fn parse_expiry(hint: &str) -> Option<Timestamp> {
    let hint = hint.trim();
    DateTime::parse_from_rfc2822(hint)
        .or_else(|_| DateTime::parse_from_rfc3339(hint))
        .ok()
        .map(|at| Timestamp::from_datetime(at.with_timezone(&Utc)))
}

/// Picks the scheduled-time for a successor attempt.
///
/// A parseable hint in the future wins. A hint in the past schedules
/// immediately (clamped to `now`). An absent or unparseable hint falls
/// back to `now + fallback`.
pub fn successor_due(hint: Option<&str>, now: Timestamp, fallback: Duration) -> Timestamp {
    match hint.and_then(parse_expiry) {
        Some(at) if at > now => at,
        Some(_) => now,
        None => now.saturating_add(fallback),
    }
}
