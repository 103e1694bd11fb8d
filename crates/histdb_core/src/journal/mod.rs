//! Append-only journal: the store's single source of durable truth.
//!
//! Every mutation is framed and appended here before it becomes visible.
//! On open, the journal is replayed to rebuild the in-memory state, so
//! there are no separate table files to keep consistent.
//!
//! ## Frame Format
//!
//! ```text
//! | magic (4) | version (2) | body length (4) | CBOR body (N) | crc32 (4) |
//! ```
//!
//! The CRC covers everything before it. The operation tag lives inside
//! the CBOR body, not in the header.
//!
//! ## Recovery Policy
//!
//! Replay distinguishes tolerated from fatal conditions:
//!
//! - **Torn tail** (incomplete header or body at the end): the process
//!   died mid-write. Iteration ends cleanly, the tail is truncated, and
//!   any unit without its `Commit` frame is dropped.
//! - **Bad magic, future version, CRC mismatch, undecodable body**: real
//!   corruption. The store refuses to open rather than guess.
//!
//! ## Invariants
//!
//! - Frames are never modified after being written
//! - A unit's frames are flushed before its `Commit` is acknowledged
//! - Replay applies only committed units, in commit order
//! - Replaying twice produces the same state

mod log;
mod op;

pub use log::{JournalIter, JournalLog};
pub use op::{compute_crc32, JournalOp, JOURNAL_MAGIC, JOURNAL_VERSION};
