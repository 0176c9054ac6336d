//! Emits rows as record lines, owning timestamp adjustment and the
//! "last emitted row" needed for the codec's `*` token.
//!
//! The writer does not touch files directly — it hands finished lines to
//! whoever owns the [`crate::repository::Repository`] (the store facade).
//! It has no opinion about bucket merging either; by the time a row reaches
//! the writer it is already final.


use thiserror::Error;
use tracing::{debug, trace};

use crate::codec::encode_record;
use crate::row::Row;

/// Errors raised while preparing a row for emission.
#[derive(Debug, Error, PartialEq)]
pub enum WriterError {
    /// The incoming row's timestamp precedes the last emitted row's, and
    /// the writer is not configured to clamp out-of-order samples.
    #[error("out-of-order row: incoming timestamp {incoming} precedes last emitted {last}")]
    OutOfOrder { incoming: i64, last: i64 },
}

/// Stateful emitter: tracks the last row actually written so it can choose
/// delta vs. absolute timestamp fields and `*` tokens.
#[derive(Debug)]
pub struct Writer {
    factor: i64,
    force_ordering: bool,
    last_emitted: Option<Row>,
}

impl Writer {
    /// Creates a writer for the given coarsen `factor` and ordering policy.
    pub fn new(factor: i64, force_ordering: bool) -> Self {
        Self {
            factor,
            force_ordering,
            last_emitted: None,
        }
    }

    /// Seeds the writer's "last emitted row" from a prior run, e.g. after
    /// re-opening a store whose data file already holds records.
    pub fn seed_last_emitted(&mut self, row: Row) {
        self.last_emitted = Some(row);
    }

    /// The most recently emitted row, if any.
    pub fn last_emitted(&self) -> Option<&Row> {
        self.last_emitted.as_ref()
    }

    /// Encodes `row` into a record line, adjusting its timestamp field per
    /// the writer's delta/absolute and ordering policy, and advances
    /// `last_emitted` on success.
    ///
    /// Does not write anything to disk; the caller is responsible for
    /// appending the returned line to the repository.
    pub fn emit(&mut self, row: &Row) -> Result<String, WriterError> {
        let coarse = row.timestamp / self.factor;

        let t_field = match &self.last_emitted {
            None => -coarse,
            Some(last) => {
                let last_coarse = last.timestamp / self.factor;
                let delta = coarse - last_coarse;
                if delta >= 0 {
                    delta
                } else if self.force_ordering {
                    trace!(
                        incoming = row.timestamp,
                        last = last.timestamp,
                        "writer clamped out-of-order row onto previous coarse time"
                    );
                    0
                } else {
                    return Err(WriterError::OutOfOrder {
                        incoming: row.timestamp,
                        last: last.timestamp,
                    });
                }
            }
        };

        let line = encode_record(row, t_field, self.last_emitted.as_ref());
        debug!(t_field, bitvector = row.bitvector, "writer emitted record");
        self.last_emitted = Some(row.clone());
        Ok(line)
    }
}
