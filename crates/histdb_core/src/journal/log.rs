//! Journal frame writer and streaming reader.

use crate::codec;
use crate::error::{StoreError, StoreResult};
use crate::journal::op::{compute_crc32, JournalOp, JOURNAL_MAGIC, JOURNAL_VERSION};
use histdb_storage::StorageBackend;
use parking_lot::{Mutex, MutexGuard};

/// Frame header size: magic (4) + version (2) + body length (4).
const HEADER_SIZE: usize = 10;

/// CRC trailer size.
const CRC_SIZE: usize = 4;

/// Append-only journal over a storage backend.
///
/// Every mutation the store applies is framed and appended here first.
/// The log itself knows nothing about units; bracketing with `Begin` and
/// `Commit` is the store's job.
pub struct JournalLog {
    backend: Mutex<Box<dyn StorageBackend>>,
}

impl JournalLog {
    /// Creates a journal over the given backend.
    pub fn new(backend: Box<dyn StorageBackend>) -> Self {
        Self {
            backend: Mutex::new(backend),
        }
    }

    /// Appends one framed operation, returning the offset it landed at.
    ///
    /// The write is buffered; call [`flush`](Self::flush) or
    /// [`sync`](Self::sync) once per unit to make it durable.
    ///
    /// # Errors
    ///
    /// Returns an error if encoding fails or the backend write fails.
    pub fn append(&self, op: &JournalOp) -> StoreResult<u64> {
        let body = codec::to_vec(op)?;
        let len = u32::try_from(body.len())
            .map_err(|_| StoreError::invalid_format("journal frame body too large"))?;

        let mut data = Vec::with_capacity(HEADER_SIZE + body.len() + CRC_SIZE);
        data.extend_from_slice(&JOURNAL_MAGIC);
        data.extend_from_slice(&JOURNAL_VERSION.to_le_bytes());
        data.extend_from_slice(&len.to_le_bytes());
        data.extend_from_slice(&body);

        let crc = compute_crc32(&data);
        data.extend_from_slice(&crc.to_le_bytes());

        let mut backend = self.backend.lock();
        Ok(backend.append(&data)?)
    }

    /// Pushes pending writes down to the OS.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend flush fails.
    pub fn flush(&self) -> StoreResult<()> {
        self.backend.lock().flush()?;
        Ok(())
    }

    /// Makes the journal durable on disk.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend sync fails.
    pub fn sync(&self) -> StoreResult<()> {
        self.backend.lock().sync()?;
        Ok(())
    }

    /// Returns the journal length in bytes.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend length cannot be determined.
    pub fn len(&self) -> StoreResult<u64> {
        Ok(self.backend.lock().len()?)
    }

    /// Returns true if the journal holds no frames.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend length cannot be determined.
    pub fn is_empty(&self) -> StoreResult<bool> {
        Ok(self.len()? == 0)
    }

    /// Returns a streaming iterator over journal operations.
    ///
    /// The iterator holds the backend lock, so appends block until it is
    /// dropped. Replay runs before the store accepts writes, so nothing
    /// contends in practice.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot be accessed.
    pub fn iter(&self) -> StoreResult<JournalIter<'_>> {
        JournalIter::new(self.backend.lock())
    }

    /// Discards everything after `offset` bytes.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend truncate fails.
    pub fn truncate(&self, offset: u64) -> StoreResult<()> {
        self.backend.lock().truncate(offset)?;
        Ok(())
    }

    /// Empties the journal.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend truncate fails.
    pub fn clear(&self) -> StoreResult<()> {
        self.truncate(0)
    }

    #[cfg(test)]
    pub(crate) fn raw_snapshot(&self) -> Vec<u8> {
        let backend = self.backend.lock();
        let len = backend.len().unwrap() as usize;
        backend.read_at(0, len).unwrap()
    }
}

impl std::fmt::Debug for JournalLog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JournalLog").finish_non_exhaustive()
    }
}

/// Streaming iterator over journal frames.
///
/// Reads one frame per step, so memory stays constant however large the
/// journal grows. After the iterator stops, [`offset`](Self::offset)
/// reports the first byte it did not consume; on a torn tail that is the
/// truncation point.
pub struct JournalIter<'a> {
    backend: MutexGuard<'a, Box<dyn StorageBackend>>,
    total_len: u64,
    offset: u64,
    finished: bool,
}

impl<'a> JournalIter<'a> {
    fn new(backend: MutexGuard<'a, Box<dyn StorageBackend>>) -> StoreResult<Self> {
        let total_len = backend.len()?;
        Ok(Self {
            backend,
            total_len,
            offset: 0,
            finished: false,
        })
    }

    /// Returns the offset of the first byte not yet consumed.
    #[must_use]
    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// Reads the next frame.
    ///
    /// An incomplete header or body at the end of the journal is a torn
    /// tail from an interrupted write: iteration ends cleanly and the
    /// caller may truncate at [`offset`](Self::offset). Bad magic, a
    /// future format version, a CRC mismatch, or an undecodable body are
    /// real corruption and fail the read.
    fn read_next(&mut self) -> StoreResult<Option<(u64, JournalOp)>> {
        if self.finished {
            return Ok(None);
        }

        let frame_start = self.offset;
        let remaining = (self.total_len - self.offset) as usize;

        if remaining < HEADER_SIZE {
            self.finished = true;
            return Ok(None);
        }

        let header = self.backend.read_at(frame_start, HEADER_SIZE)?;

        if header[0..4] != JOURNAL_MAGIC {
            self.finished = true;
            return Err(StoreError::journal_corruption(format!(
                "bad magic at offset {frame_start}"
            )));
        }

        let version = u16::from_le_bytes([header[4], header[5]]);
        if version > JOURNAL_VERSION {
            self.finished = true;
            return Err(StoreError::journal_corruption(format!(
                "unsupported journal version {version} at offset {frame_start}"
            )));
        }

        let body_len = u32::from_le_bytes([header[6], header[7], header[8], header[9]]) as usize;
        let total = HEADER_SIZE + body_len + CRC_SIZE;

        if remaining < total {
            self.finished = true;
            return Ok(None);
        }

        let frame = self.backend.read_at(frame_start, total)?;
        let body_end = HEADER_SIZE + body_len;

        let stored_crc = u32::from_le_bytes([
            frame[body_end],
            frame[body_end + 1],
            frame[body_end + 2],
            frame[body_end + 3],
        ]);
        let computed_crc = compute_crc32(&frame[..body_end]);

        if stored_crc != computed_crc {
            self.finished = true;
            return Err(StoreError::ChecksumMismatch {
                expected: stored_crc,
                actual: computed_crc,
            });
        }

        let op: JournalOp = codec::from_slice(&frame[HEADER_SIZE..body_end]).map_err(|e| {
            self.finished = true;
            StoreError::journal_corruption(format!(
                "undecodable operation at offset {frame_start}: {e}"
            ))
        })?;

        self.offset += total as u64;
        Ok(Some((frame_start, op)))
    }
}

impl Iterator for JournalIter<'_> {
    type Item = StoreResult<(u64, JournalOp)>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }

        match self.read_next() {
            Ok(Some(item)) => Some(Ok(item)),
            Ok(None) => None,
            Err(e) => {
                self.finished = true;
                Some(Err(e))
            }
        }
    }
}
