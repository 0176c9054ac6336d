//! Line-oriented text codec for the time-series log.
//!
//! This module owns the on-disk **record grammar** — the tab-separated,
//! delta-encoded, bitvector-tagged line format described in the crate's
//! design notes — and nothing else. It knows how to turn one [`Row`] plus
//! the previously emitted row into a line of text, and how to turn a
//! stream of lines back into a stream of rows while maintaining the
//! forward-fill accumulator. It has no opinion about files, locking, or
//! bucket merging; those live in [`crate::repository`], [`crate::writer`],
//! and [`crate::store`].
//!
//! # Wire format
//!
//! ```text
//! record  := timestamp TAB hexbitvec ( TAB token )*
//! token   := "*" | "!" | double
//! ```
//!
//! `timestamp` is a signed integer: negative (or zero) means "absolute
//! coarsened time `|T|`, reset the accumulator"; positive means "delta in
//! coarse units added to the previous coarsened time". `hexbitvec` is
//! lowercase hexadecimal, unpadded, no `0x` prefix on write (tolerated on
//! read). Token count always equals `popcount(hexbitvec)`.
//!
//! # Zero-panic guarantee
//!
//! No function in this module uses `unwrap()` or `expect()` on untrusted
//! input. Malformed lines are reported as [`CodecError`] values for the
//! caller to log and skip, per the store's malformed-line policy.

#[cfg(test)]
mod tests;

use thiserror::Error;
use tracing::trace;

use crate::row::Row;

/// Current header format version written by this implementation.
pub const CURRENT_VERSION: u32 = 1;

/// Prefix marking a data-file line as a comment, ignored on read.
pub const COMMENT_PREFIX: char = '#';

/// Errors raised while encoding or decoding a single record or header line.
#[derive(Debug, Error, PartialEq)]
pub enum CodecError {
    /// The timestamp field was not a parseable signed integer.
    #[error("malformed timestamp field: {0:?}")]
    BadTimestamp(String),

    /// The bitvector field was not parseable lowercase hexadecimal.
    #[error("malformed bitvector field: {0:?}")]
    BadBitvector(String),

    /// The number of value tokens did not equal `popcount(bitvector)`.
    #[error("token count mismatch: bitvector has {expected} bits set, found {found} tokens")]
    TokenCountMismatch { expected: usize, found: usize },

    /// A value token was neither `*`, `!`, nor a parseable finite double.
    #[error("malformed value token: {0:?}")]
    BadNumericToken(String),

    /// The header's version line was not a parseable unsigned integer.
    #[error("malformed header version: {0:?}")]
    BadHeaderVersion(String),
}

/// One decoded record, ready to be delivered to a stream sink.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedRow {
    /// Real (inflated) timestamp.
    pub row: Row,
}

/// Encodes one record line.
///
/// `row` is the (already bucket-merged) row being emitted; `t_field` is the
/// timestamp field computed by the writer (delta or absolute, per its
/// ordering policy) — the codec does not compute it, it only formats it.
/// `last_emitted` is the previous row written to this log, if any, used to
/// decide the `*` ("unchanged") token.
pub fn encode_record(row: &Row, t_field: i64, last_emitted: Option<&Row>) -> String {
    let mut line = format!("{t_field}\t{:x}", row.bitvector);

    for i in 0..64 {
        if !row.has(i) {
            continue;
        }
        let value = row.values.get(i).copied().unwrap_or(0.0);
        let token = if !value.is_finite() {
            "!".to_string()
        } else if let Some(prev) = last_emitted {
            if prev.has(i) && prev.values.get(i).copied().unwrap_or(0.0).to_bits() == value.to_bits()
            {
                "*".to_string()
            } else {
                format_double(value)
            }
        } else {
            format_double(value)
        };
        line.push('\t');
        line.push_str(&token);
    }

    line
}

/// Shortest round-trippable decimal representation of a finite double.
///
/// Uses Rust's default `f64` `Display`, which already produces the
/// shortest string that round-trips to the same bit pattern.
fn format_double(value: f64) -> String {
    format!("{value}")
}

/// Stateful decoder maintaining the forward-fill accumulator and the
/// coarsened-time delta base across a sequence of record lines.
///
/// One `Decoder` is created per read pass (per [`crate::repository`]
/// reader); it is never shared across passes.
#[derive(Debug)]
pub struct Decoder {
    prev_coarse_time: i64,
    has_prev: bool,
    accumulator: Vec<f64>,
}

/// Outcome of decoding a single line.
#[derive(Debug, PartialEq)]
pub enum DecodeOutcome {
    /// A comment line; nothing to deliver.
    Comment,
    /// A record whose coarsened time is strictly less than the requested
    /// lower bound — accumulator advanced, nothing delivered.
    BelowRange,
    /// A record whose coarsened time exceeds the requested upper bound —
    /// the caller should stop iterating (the accumulator was *not*
    /// advanced for this line).
    AboveRange,
    /// A record within range, decoded into a row.
    Row(Row),
}

impl Decoder {
    /// Creates a decoder for a schema with `num_columns` columns, all
    /// accumulator entries initialized to zero.
    pub fn new(num_columns: usize) -> Self {
        Self {
            prev_coarse_time: 0,
            has_prev: false,
            accumulator: vec![0.0; num_columns],
        }
    }

    /// Decodes one line, given the coarsen factor and the inclusive
    /// `[from, to]` real-timestamp range the caller is streaming.
    ///
    /// On a parse error, `self` is left exactly as it was before the call —
    /// a malformed line must not perturb the accumulator (§7:
    /// `MalformedLine` is "logged at warning; line skipped; accumulator
    /// preserved"). On any successful parse (including one below or above
    /// the requested range), `prev_coarse_time` and the accumulator are
    /// updated to reflect the record, matching the decoder contract's
    /// "the accumulator and `prev_coarse_time` still advance" note for
    /// skipped-but-valid rows.
    pub fn decode_line(
        &mut self,
        line: &str,
        factor: i64,
        from: i64,
        to: i64,
    ) -> Result<DecodeOutcome, CodecError> {
        let line = line.trim_end_matches(['\n', '\r']);
        if line.is_empty() || line.starts_with(COMMENT_PREFIX) {
            return Ok(DecodeOutcome::Comment);
        }

        let mut fields = line.split('\t');

        let t_field_str = fields.next().unwrap_or("");
        let t_field: i64 = t_field_str
            .parse()
            .map_err(|_| CodecError::BadTimestamp(t_field_str.to_string()))?;

        let bits_str = fields.next().unwrap_or("");
        let bits_digits = bits_str
            .strip_prefix("0x")
            .or_else(|| bits_str.strip_prefix("0X"))
            .unwrap_or(bits_str);
        let written_bitvector = u64::from_str_radix(bits_digits, 16)
            .map_err(|_| CodecError::BadBitvector(bits_str.to_string()))?;

        let expected_tokens = written_bitvector.count_ones() as usize;
        let tokens: Vec<&str> = fields.collect();
        if tokens.len() != expected_tokens {
            return Err(CodecError::TokenCountMismatch {
                expected: expected_tokens,
                found: tokens.len(),
            });
        }

        // A strictly negative field is an absolute reset. A non-negative
        // field is a delta against the running accumulator — including
        // `0`, which the writer uses to clamp an out-of-order sample onto
        // the previous coarsened time. Only the very first record in a
        // stream may legitimately carry `T = 0` with no predecessor to
        // delta against, in which case it is its own absolute baseline.
        let coarse_time = if t_field < 0 {
            t_field.unsigned_abs() as i64
        } else if self.has_prev {
            self.prev_coarse_time + t_field
        } else {
            t_field
        };
        let real_time = coarse_time * factor;
        trace!(t_field, coarse_time, real_time, "codec decoded timestamp");

        let mut decoded_bitvector = written_bitvector;
        let mut accumulator = self.accumulator.clone();
        let mut values = accumulator.clone();
        let mut token_iter = tokens.into_iter();

        for i in 0..64 {
            let bit_set = (written_bitvector & (1u64 << i)) != 0;
            if !bit_set {
                continue;
            }
            let token = token_iter.next().unwrap_or("");
            match token {
                "*" => {}
                "!" => {
                    decoded_bitvector &= !(1u64 << i);
                }
                numeric => {
                    let parsed: f64 = numeric
                        .parse()
                        .map_err(|_| CodecError::BadNumericToken(numeric.to_string()))?;
                    if i >= accumulator.len() {
                        accumulator.resize(i + 1, 0.0);
                        values.resize(i + 1, 0.0);
                    }
                    accumulator[i] = parsed;
                    values[i] = parsed;
                }
            }
        }

        // The line parsed cleanly — commit accumulator state now.
        self.prev_coarse_time = coarse_time;
        self.has_prev = true;
        self.accumulator = accumulator;

        if real_time < from {
            return Ok(DecodeOutcome::BelowRange);
        }
        if real_time > to {
            return Ok(DecodeOutcome::AboveRange);
        }

        let row = Row::new(real_time, decoded_bitvector, values);
        Ok(DecodeOutcome::Row(row))
    }
}

/// Encodes a header (version line + tab-joined column names).
pub fn encode_header(columns: &[String]) -> String {
    format!("{CURRENT_VERSION}\n{}\n", columns.join("\t"))
}

/// Parses a header's two lines into `(version, columns)`.
pub fn decode_header(version_line: &str, columns_line: &str) -> Result<(u32, Vec<String>), CodecError> {
    let version: u32 = version_line
        .trim()
        .parse()
        .map_err(|_| CodecError::BadHeaderVersion(version_line.to_string()))?;
    let columns_line = columns_line.trim_end_matches(['\n', '\r']);
    let columns = if columns_line.is_empty() {
        Vec::new()
    } else {
        columns_line.split('\t').map(str::to_string).collect()
    };
    Ok((version, columns))
}
