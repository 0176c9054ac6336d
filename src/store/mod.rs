//! Store facade — the public entry point of the crate.
//!
//! Owns a [`crate::repository::Repository`], a single [`crate::writer::Writer`],
//! a one-row pending slot for bucket merging, and a periodic-flush
//! background thread. All mutating operations (`append`, `flush`, `close`,
//! and the initial `first_time` scan) are serialized behind a single mutex,
//! matching the teacher's `Arc<Mutex/RwLock<Inner>>` shape.

#[cfg(test)]
mod tests;

use std::ops::Bound;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::Duration;

use crossbeam::channel::{self, Sender};
use thiserror::Error;
use tracing::{debug, info, trace, warn};

use crate::codec::{CodecError, DecodeOutcome, Decoder};
use crate::repository::{Repository, RepositoryError};
use crate::row::{Row, Schema};
use crate::writer::{Writer, WriterError};

/// Sentinel returned by [`Store::first_time`] when the log holds no rows.
pub const NO_DATA: i64 = i64::MAX;

/// Default coarsen factor: on-disk timestamps are real timestamps divided
/// by this value.
pub const DEFAULT_COARSEN_FACTOR: u32 = 100;

/// Default interval, in seconds, between automatic background flushes.
pub const DEFAULT_FLUSH_INTERVAL_SECS: u64 = 20;

/// Errors surfaced by the store facade, aggregating every layer beneath it.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Error originating from the repository (file) layer.
    #[error("repository error: {0}")]
    Repository(#[from] RepositoryError),

    /// Error originating from the writer (emitter) layer.
    #[error("writer error: {0}")]
    Writer(#[from] WriterError),

    /// Error decoding a line while streaming.
    #[error("codec error: {0}")]
    Codec(#[from] CodecError),

    /// Internal invariant violation (poisoned mutex).
    #[error("internal error: {0}")]
    Internal(String),
}

/// Configuration for a [`Store`] instance, passed to [`Store::open`].
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Divides real timestamps into coarse on-disk units. Two rows whose
    /// coarsened timestamps are equal are merged into one on-disk record.
    pub coarsen_factor: u32,
    /// When true, an out-of-order `append` is clamped onto the previous
    /// coarse time instead of failing. See [`crate::writer`].
    pub force_ordering: bool,
    /// Interval between automatic background flushes. `None` disables the
    /// periodic-flush ticker entirely (the caller must call `flush`
    /// explicitly).
    pub flush_interval: Option<Duration>,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            coarsen_factor: DEFAULT_COARSEN_FACTOR,
            force_ordering: false,
            flush_interval: Some(Duration::from_secs(DEFAULT_FLUSH_INTERVAL_SECS)),
        }
    }
}

/// Point-in-time snapshot of a store's on-disk footprint, returned by
/// [`Store::stats`]. Purely observational.
#[derive(Debug, Clone)]
pub struct StoreStats {
    pub header_path: PathBuf,
    pub data_path: PathBuf,
    pub data_file_len_bytes: u64,
    pub pending_row_present: bool,
}

/// Inclusive timestamp range for [`Store::stream`]. Either bound may be
/// unbounded.
#[derive(Debug, Clone, Copy)]
pub struct TimeRange {
    pub from: Bound<i64>,
    pub to: Bound<i64>,
}

impl TimeRange {
    /// The unbounded range: every row in the log.
    pub fn all() -> Self {
        Self {
            from: Bound::Unbounded,
            to: Bound::Unbounded,
        }
    }

    /// An inclusive `[from, to]` range.
    pub fn inclusive(from: i64, to: i64) -> Self {
        Self {
            from: Bound::Included(from),
            to: Bound::Included(to),
        }
    }

    fn lower(&self) -> i64 {
        match self.from {
            Bound::Included(v) => v,
            Bound::Excluded(v) => v.saturating_add(1),
            Bound::Unbounded => i64::MIN,
        }
    }

    fn upper(&self) -> i64 {
        match self.to {
            Bound::Included(v) => v,
            Bound::Excluded(v) => v.saturating_sub(1),
            Bound::Unbounded => i64::MAX,
        }
    }
}

struct StoreInner {
    repository: Repository,
    writer: Writer,
    pending: Option<Row>,
    factor: i64,
}

impl StoreInner {
    fn emit_pending(&mut self) -> Result<(), StoreError> {
        let Some(row) = self.pending.as_ref() else {
            return Ok(());
        };
        // Peek before committing: on a writer failure (e.g. `OutOfOrder`),
        // the pending slot must be left exactly as it was (§7).
        let line = self.writer.emit(row)?;
        self.repository.append_line(&line)?;
        self.pending = None;
        Ok(())
    }

    fn flush_locked(&mut self) -> Result<(), StoreError> {
        self.emit_pending()?;
        self.repository.flush()?;
        Ok(())
    }

    fn append_locked(&mut self, row: Row) -> Result<(), StoreError> {
        match &mut self.pending {
            None => {
                self.pending = Some(row);
            }
            Some(pending) => {
                if row.timestamp / self.factor == pending.timestamp / self.factor {
                    pending.merge_from(&row);
                } else {
                    // Emit the finished bucket before replacing the slot: on
                    // an `OutOfOrder` failure, `self.pending` must still
                    // hold the original (unemitted) row, not `row` (§7).
                    let line = self.writer.emit(pending)?;
                    self.repository.append_line(&line)?;
                    self.pending = Some(row);
                }
            }
        }
        Ok(())
    }
}

/// The store facade: the public, embeddable entry point of the crate.
pub struct Store {
    inner: Arc<Mutex<StoreInner>>,
    ticker_stop: Option<Sender<()>>,
    ticker_handle: Option<JoinHandle<()>>,
    first_time: i64,
}

impl Store {
    /// Returns true iff a store already exists for `base` inside `container`.
    pub fn exists(container: &Path, base: &str) -> bool {
        crate::repository::exists(container, base)
    }

    /// Opens (creating as needed) a store for `base` inside `container`
    /// with the given `schema`. Schema growth (§3) happens automatically
    /// here if the on-disk header has fewer, prefix-compatible columns.
    pub fn open(
        container: &Path,
        base: &str,
        schema: Schema,
        config: StoreConfig,
    ) -> Result<Self, StoreError> {
        let repository = Repository::open(container, base, &schema)?;
        let factor = config.coarsen_factor as i64;
        let mut writer = Writer::new(factor, config.force_ordering);

        let mut first_time = NO_DATA;
        {
            let mut decoder = Decoder::new(repository.schema().len());
            let mut last_decoded: Option<Row> = None;
            for line in repository.reader()? {
                let line = line.map_err(RepositoryError::from)?;
                match decoder.decode_line(&line, factor, i64::MIN, i64::MAX) {
                    Ok(DecodeOutcome::Row(row)) => {
                        if first_time == NO_DATA {
                            first_time = row.timestamp;
                        }
                        last_decoded = Some(row);
                    }
                    Ok(DecodeOutcome::Comment | DecodeOutcome::BelowRange | DecodeOutcome::AboveRange) => {}
                    Err(e) => {
                        warn!(error = %e, line = %line, "skipping malformed line during open scan");
                    }
                }
            }
            if let Some(row) = last_decoded {
                writer.seed_last_emitted(row);
            }
        }

        let inner = Arc::new(Mutex::new(StoreInner {
            repository,
            writer,
            pending: None,
            factor,
        }));

        let (ticker_stop, ticker_handle) = match config.flush_interval {
            Some(interval) => {
                let (tx, rx) = channel::bounded::<()>(0);
                let weak = Arc::downgrade(&inner);
                let handle = std::thread::spawn(move || loop {
                    match rx.recv_timeout(interval) {
                        Ok(()) => {
                            trace!("periodic-flush ticker stopping");
                            return;
                        }
                        Err(channel::RecvTimeoutError::Timeout) => {
                            let Some(inner) = weak.upgrade() else {
                                return;
                            };
                            match inner.lock() {
                                Ok(mut guard) => {
                                    if let Err(e) = guard.flush_locked() {
                                        warn!(error = %e, "periodic flush failed");
                                    } else {
                                        trace!("periodic flush completed");
                                    }
                                }
                                Err(_) => {
                                    warn!("store mutex poisoned; periodic-flush ticker stopping");
                                    return;
                                }
                            }
                        }
                        Err(channel::RecvTimeoutError::Disconnected) => return,
                    }
                });
                (Some(tx), Some(handle))
            }
            None => (None, None),
        };

        info!(base, first_time, "store opened");

        Ok(Self {
            inner,
            ticker_stop,
            ticker_handle,
            first_time,
        })
    }

    /// Appends `row`, merging it into the pending bucket slot or emitting
    /// the previous pending row, per §4.4's bucket-merge rule.
    pub fn append(&self, row: Row) -> Result<(), StoreError> {
        let mut guard = self.lock()?;
        guard.append_locked(row)
    }

    /// Streams decoded rows in `range` to `sink`. `sink` returns `false` to
    /// stop iteration early.
    pub fn stream(
        &self,
        range: TimeRange,
        mut sink: impl FnMut(Row) -> bool,
    ) -> Result<(), StoreError> {
        let guard = self.lock()?;
        let factor = guard.factor;
        let num_columns = guard.repository.schema().len();
        let from = range.lower();
        let to = range.upper();

        let mut decoder = Decoder::new(num_columns);
        for line in guard.repository.reader()? {
            let line = line.map_err(RepositoryError::from)?;
            match decoder.decode_line(&line, factor, from, to) {
                Ok(DecodeOutcome::Row(row)) => {
                    if !sink(row) {
                        break;
                    }
                }
                Ok(DecodeOutcome::AboveRange) => break,
                Ok(DecodeOutcome::Comment | DecodeOutcome::BelowRange) => {}
                Err(e) => {
                    warn!(error = %e, line = %line, "skipping malformed line while streaming");
                }
            }
        }
        Ok(())
    }

    /// Emits the pending row (if any) and flushes the repository to the OS.
    /// Safe to call at any time; idempotent.
    pub fn flush(&self) -> Result<(), StoreError> {
        let mut guard = self.lock()?;
        guard.flush_locked()
    }

    /// Flushes, then releases resources and cancels the periodic-flush
    /// ticker. Idempotent — a second call is a no-op.
    pub fn close(&mut self) -> Result<(), StoreError> {
        self.flush()?;
        if let Some(stop) = self.ticker_stop.take() {
            let _ = stop.send(());
        }
        if let Some(handle) = self.ticker_handle.take() {
            let _ = handle.join();
        }
        debug!("store closed");
        Ok(())
    }

    /// The timestamp of the oldest decoded row, computed once at open, or
    /// [`NO_DATA`] if the log was empty at that time.
    pub fn first_time(&self) -> i64 {
        self.first_time
    }

    /// A point-in-time snapshot of this store's on-disk footprint.
    pub fn stats(&self) -> Result<StoreStats, StoreError> {
        let guard = self.lock()?;
        Ok(StoreStats {
            header_path: guard.repository.header_path().to_path_buf(),
            data_path: guard.repository.data_path().to_path_buf(),
            data_file_len_bytes: guard.repository.data_file_len()?,
            pending_row_present: guard.pending.is_some(),
        })
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, StoreInner>, StoreError> {
        self.inner
            .lock()
            .map_err(|_| StoreError::Internal("store mutex poisoned".into()))
    }
}

impl Drop for Store {
    fn drop(&mut self) {
        if self.ticker_stop.is_some() || self.ticker_handle.is_some() {
            if let Err(e) = self.close() {
                warn!(error = %e, "store flush-on-drop failed");
            }
        }
    }
}
