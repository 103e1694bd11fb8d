//! Journal operations and frame checksums.

use crate::record::NaturalKey;
use crate::time::{Lifespan, Timestamp};
use crate::tracker::{SyncStatus, SyncTracker, TrackerId};
use crate::types::{AccountId, SequenceNo, TableId, UnitId};
use serde::{Deserialize, Serialize};

/// Magic bytes identifying a journal frame.
pub const JOURNAL_MAGIC: [u8; 4] = *b"HDBJ";

/// Current journal format version.
pub const JOURNAL_VERSION: u16 = 1;

/// One operation recorded in the journal.
///
/// Operations between a `Begin` and its matching `Commit` form an atomic
/// unit; replay drops any unit whose `Commit` never made it to disk.
/// Frame bodies are CBOR, so the enum tag travels inside the body rather
/// than in the frame header.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum JournalOp {
    /// Opens an atomic unit.
    Begin {
        /// Unit being opened.
        unit: UnitId,
    },

    /// Assigns a table ID to a payload kind.
    ///
    /// Written the first time a kind is used; replay rebuilds the table
    /// registry from these, so there is no separate manifest file.
    DefineTable {
        /// The assigned table ID.
        table: TableId,
        /// The payload kind the table holds.
        kind: String,
    },

    /// Inserts a new version of a record.
    CreateVersion {
        /// Table the version belongs to.
        table: TableId,
        /// Account the record belongs to.
        account: AccountId,
        /// Natural key within the account.
        key: NaturalKey,
        /// Validity interval of the version.
        life: Lifespan,
        /// Payload encoded as CBOR bytes.
        payload: Vec<u8>,
    },

    /// Sets the end of a previously open version.
    CloseVersion {
        /// Table the version belongs to.
        table: TableId,
        /// Account the record belongs to.
        account: AccountId,
        /// Natural key within the account.
        key: NaturalKey,
        /// Start of the version being closed.
        start: Timestamp,
        /// New exclusive end.
        end: Timestamp,
    },

    /// Records a new unfinished sync tracker.
    OpenTracker {
        /// The full tracker row.
        row: SyncTracker,
    },

    /// Moves a tracker to a terminal status.
    SealTracker {
        /// Tracker being sealed.
        id: TrackerId,
        /// Terminal status.
        status: SyncStatus,
        /// When the attempt began.
        started: Option<Timestamp>,
        /// When the attempt ended.
        ended: Option<Timestamp>,
        /// Human-readable outcome.
        detail: Option<String>,
    },

    /// Replaces an account's container document.
    PutContainer {
        /// Account the container belongs to.
        account: AccountId,
        /// Container encoded as CBOR bytes.
        payload: Vec<u8>,
    },

    /// Commits an atomic unit.
    Commit {
        /// Unit being committed.
        unit: UnitId,
        /// Sequence number assigned to the commit.
        seq: SequenceNo,
    },
}

impl JournalOp {
    /// Returns a short name for log and error messages.
    #[must_use]
    pub fn label(&self) -> &'static str {
        match self {
            Self::Begin { .. } => "Begin",
            Self::DefineTable { .. } => "DefineTable",
            Self::CreateVersion { .. } => "CreateVersion",
            Self::CloseVersion { .. } => "CloseVersion",
            Self::OpenTracker { .. } => "OpenTracker",
            Self::SealTracker { .. } => "SealTracker",
            Self::PutContainer { .. } => "PutContainer",
            Self::Commit { .. } => "Commit",
        }
    }
}

const fn build_crc_table() -> [u32; 256] {
    let mut table = [0u32; 256];
    let mut i = 0;
    while i < 256 {
        let mut crc = i as u32;
        let mut j = 0;
        while j < 8 {
            if crc & 1 != 0 {
                crc = (crc >> 1) ^ 0xEDB8_8320;
            } else {
                crc >>= 1;
            }
            j += 1;
        }
        table[i] = crc;
        i += 1;
    }
    table
}

/// IEEE CRC32 lookup table.
const CRC_TABLE: [u32; 256] = build_crc_table();

/// Computes the IEEE CRC32 checksum of `data`.
#[must_use]
pub fn compute_crc32(data: &[u8]) -> u32 {
    let mut crc = 0xFFFF_FFFF_u32;
    for &byte in data {
        let index = ((crc ^ u32::from(byte)) & 0xFF) as usize;
        crc = (crc >> 8) ^ CRC_TABLE[index];
    }
    !crc
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec;

    #[test]
    fn crc32_known_vector() {
        // "123456789" is the standard IEEE check value
        assert_eq!(compute_crc32(b"123456789"), 0xCBF4_3926);
    }

    #[test]
    fn crc32_empty() {
        assert_eq!(compute_crc32(b""), 0x0000_0000);
    }

    #[test]
    fn crc32_differs_on_bit_flip() {
        let a = compute_crc32(b"journal frame");
        let b = compute_crc32(b"journal frbme");
        assert_ne!(a, b);
    }

    #[test]
    fn begin_commit_round_trip() {
        let begin = JournalOp::Begin {
            unit: UnitId::new(7),
        };
        let commit = JournalOp::Commit {
            unit: UnitId::new(7),
            seq: SequenceNo::new(3),
        };

        for op in [begin, commit] {
            let bytes = codec::to_vec(&op).unwrap();
            let back: JournalOp = codec::from_slice(&bytes).unwrap();
            assert_eq!(back, op);
        }
    }

    #[test]
    fn create_version_round_trip() {
        let op = JournalOp::CreateVersion {
            table: TableId::new(2),
            account: AccountId::new(42),
            key: NaturalKey::int(1000),
            life: Lifespan::open(Timestamp::from_millis(5000)),
            payload: vec![0xCA, 0xFE],
        };

        let bytes = codec::to_vec(&op).unwrap();
        let back: JournalOp = codec::from_slice(&bytes).unwrap();
        assert_eq!(back, op);
    }

    #[test]
    fn close_version_round_trip() {
        let op = JournalOp::CloseVersion {
            table: TableId::new(2),
            account: AccountId::new(42),
            key: NaturalKey::text("alpha"),
            start: Timestamp::from_millis(5000),
            end: Timestamp::from_millis(9000),
        };

        let bytes = codec::to_vec(&op).unwrap();
        let back: JournalOp = codec::from_slice(&bytes).unwrap();
        assert_eq!(back, op);
    }

    #[test]
    fn tracker_ops_round_trip() {
        let row = SyncTracker::unfinished(
            AccountId::new(9),
            "wallet_balances",
            Timestamp::from_millis(100),
        );
        let seal = JournalOp::SealTracker {
            id: row.id,
            status: SyncStatus::Finished,
            started: Some(Timestamp::from_millis(150)),
            ended: Some(Timestamp::from_millis(160)),
            detail: Some("Updated successfully".into()),
        };
        let open = JournalOp::OpenTracker { row };

        for op in [open, seal] {
            let bytes = codec::to_vec(&op).unwrap();
            let back: JournalOp = codec::from_slice(&bytes).unwrap();
            assert_eq!(back, op);
        }
    }

    #[test]
    fn labels_are_stable() {
        let op = JournalOp::Begin {
            unit: UnitId::new(1),
        };
        assert_eq!(op.label(), "Begin");
    }
}
