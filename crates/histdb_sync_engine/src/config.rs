//! Configuration for the sync engine.

use std::time::Duration;

/// Configuration shared by all synchronizers.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Interval to the next attempt when the endpoint supplies no
    /// cache-expiry hint and the data type declares no interval of
    /// its own.
    pub default_interval: Duration,
    /// Interval to the next attempt after a failed fetch.
    pub error_interval: Duration,
    /// Maximum length of the detail string recorded on a sealed
    /// tracker. Longer messages are cut at a character boundary.
    pub detail_limit: usize,
}

impl SyncConfig {
    /// Creates a configuration with the stock intervals.
    pub fn new() -> Self {
        Self {
            default_interval: Duration::from_secs(30 * 60),
            error_interval: Duration::from_secs(5 * 60),
            detail_limit: 255,
        }
    }

    /// Sets the fallback scheduling interval.
    pub fn with_default_interval(mut self, interval: Duration) -> Self {
        self.default_interval = interval;
        self
    }

    /// Sets the post-failure scheduling interval.
    pub fn with_error_interval(mut self, interval: Duration) -> Self {
        self.error_interval = interval;
        self
    }

    /// Sets the tracker detail length limit.
    pub fn with_detail_limit(mut self, limit: usize) -> Self {
        self.detail_limit = limit;
        self
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self::new()
    }
}
