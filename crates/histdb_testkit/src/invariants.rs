//! Structural checks for version histories.
//!
//! Property tests run these after every mutation batch; the checks
//! mirror what the store guarantees for a single record's timeline.

use histdb_core::Version;

/// Asserts that `versions` form a well-formed history for one record.
///
/// The slice must be ordered by life start with no overlapping spans,
/// every span must be non-empty, and only the final version may be
/// open. Panics with a description of the first violation.
pub fn assert_version_partition<P>(versions: &[Version<P>]) {
    for (index, version) in versions.iter().enumerate() {
        assert!(
            version.life.start < version.life.end,
            "version {index} has an empty or inverted span: {} .. {}",
            version.life.start,
            version.life.end
        );
        assert!(
            !version.life.is_open() || index == versions.len() - 1,
            "version {index} is open but later versions follow"
        );
    }
    for (index, pair) in versions.windows(2).enumerate() {
        assert!(
            pair[0].life.end <= pair[1].life.start,
            "versions {index} and {} overlap: [{} .. {}) and [{} .. {})",
            index + 1,
            pair[0].life.start,
            pair[0].life.end,
            pair[1].life.start,
            pair[1].life.end
        );
    }
}

/// Asserts the history is a partition with no gaps between versions.
///
/// Holds for records present in every snapshot; a record that vanished
/// and later reappeared legitimately leaves a gap, so use
/// [`assert_version_partition`] for those.
pub fn assert_gapless<P>(versions: &[Version<P>]) {
    assert_version_partition(versions);
    for (index, pair) in versions.windows(2).enumerate() {
        assert!(
            pair[0].life.end == pair[1].life.start,
            "gap after version {index}: {} .. {}",
            pair[0].life.end,
            pair[1].life.start
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use histdb_core::{AccountId, Lifespan, NaturalKey, Timestamp};
    use histdb_model::{Credits, WalletBalance};

    fn closed(start: i64, end: i64) -> Version<WalletBalance> {
        Version {
            account: AccountId::new(90_000_001),
            key: NaturalKey::int(1_000),
            life: Lifespan::new(Timestamp::from_millis(start), Timestamp::from_millis(end)),
            payload: WalletBalance::new(1_000, Credits::from_hundredths(5_000)),
        }
    }

    fn open(start: i64) -> Version<WalletBalance> {
        Version {
            account: AccountId::new(90_000_001),
            key: NaturalKey::int(1_000),
            life: Lifespan::open(Timestamp::from_millis(start)),
            payload: WalletBalance::new(1_000, Credits::from_hundredths(5_000)),
        }
    }

    #[test]
    fn accepts_an_empty_history() {
        assert_version_partition::<WalletBalance>(&[]);
        assert_gapless::<WalletBalance>(&[]);
    }

    #[test]
    fn accepts_a_chained_history() {
        let history = [closed(10, 20), closed(20, 30), open(30)];
        assert_version_partition(&history);
        assert_gapless(&history);
    }

    #[test]
    fn partition_allows_gaps_where_gapless_does_not() {
        let history = [closed(10, 20), open(40)];
        assert_version_partition(&history);
    }

    #[test]
    #[should_panic(expected = "gap after version 0")]
    fn gapless_rejects_a_gap() {
        assert_gapless(&[closed(10, 20), open(40)]);
    }

    #[test]
    #[should_panic(expected = "overlap")]
    fn rejects_overlapping_spans() {
        assert_version_partition(&[closed(10, 25), closed(20, 30)]);
    }

    #[test]
    #[should_panic(expected = "open but later versions follow")]
    fn rejects_an_open_version_in_the_middle() {
        assert_version_partition(&[open(10), closed(20, 30)]);
    }

    #[test]
    #[should_panic(expected = "empty or inverted span")]
    fn rejects_an_empty_span() {
        assert_version_partition(&[closed(10, 10)]);
    }
}
