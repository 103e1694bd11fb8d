//! Per-attempt outcome reporting.

use std::fmt;

use histdb_core::Timestamp;

use crate::evolve::EvolveStats;

/// Why a synchronization attempt did not run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// The pending tracker is scheduled in the future.
    NotDue {
        /// When the attempt becomes due.
        due: Timestamp,
    },
    /// A data kind this one depends on has never finished a sync.
    PrerequisiteMissing {
        /// The kind that must finish first.
        kind: &'static str,
    },
    /// The attempt was cancelled between steps.
    Cancelled,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotDue { due } => write!(f, "not due until {due}"),
            Self::PrerequisiteMissing { kind } => {
                write!(f, "prerequisite {kind} has never finished")
            }
            Self::Cancelled => f.write_str("cancelled"),
        }
    }
}

/// What one synchronization attempt did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncOutcome {
    /// Nothing ran; the tracker was not touched.
    Skipped(SkipReason),
    /// The snapshot was fetched and applied; the tracker advanced.
    Completed {
        /// What reconciliation wrote.
        stats: EvolveStats,
        /// When the successor attempt is due.
        next_due: Timestamp,
        /// True when the snapshot digest matched the previous attempt
        /// and reconciliation was skipped outright.
        snapshot_unchanged: bool,
    },
    /// The fetch failed; the failure was recorded and a retry scheduled.
    Failed {
        /// Formatted fetch error, as recorded on the tracker.
        detail: String,
        /// When the retry is due.
        next_due: Timestamp,
    },
}

impl SyncOutcome {
    /// Returns true if the attempt did not run.
    pub fn is_skip(&self) -> bool {
        matches!(self, Self::Skipped(_))
    }

    /// When the next attempt for this kind is due, where known.
    pub fn next_due(&self) -> Option<Timestamp> {
        match self {
            Self::Skipped(SkipReason::NotDue { due }) => Some(*due),
            Self::Skipped(_) => None,
            Self::Completed { next_due, .. } | Self::Failed { next_due, .. } => Some(*next_due),
        }
    }
}
