//! Row and schema model.
//!
//! This module defines the in-memory shape of a single time-series sample
//! ([`Row`]) and the ordered column list that gives its bitvector meaning
//! ([`Schema`]). Both types are pure data — encoding, merging, and ordering
//! rules live in [`crate::codec`], [`crate::writer`], and [`crate::store`]
//! respectively.

use thiserror::Error;

/// Hard cap on the number of columns a [`Schema`] may hold.
///
/// Imposed by the 64-bit bitvector used to mark which columns are present
/// in a given [`Row`]. A future on-disk format bump could widen this to a
/// variable-length bitset; this implementation does not.
pub const MAX_COLUMNS: usize = 64;

/// Errors raised while building or growing a [`Schema`].
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SchemaError {
    /// The caller tried to register more than [`MAX_COLUMNS`] columns.
    #[error("schema has {0} columns, exceeding the {MAX_COLUMNS}-column bitvector limit")]
    TooManyColumns(usize),

    /// The caller tried to shrink or reorder an existing schema.
    #[error("new schema column {index} (\"{found}\") does not match existing column \"{expected}\"")]
    NotAPrefix {
        index: usize,
        expected: String,
        found: String,
    },

    /// The caller's schema has fewer columns than the on-disk header —
    /// distinct from [`SchemaError::NotAPrefix`], which is a column-name
    /// mismatch rather than a missing column.
    #[error(
        "on-disk header has {on_disk_len} columns, caller's schema has only {schema_len}; schemas may only grow"
    )]
    HeaderLongerThanSchema { on_disk_len: usize, schema_len: usize },
}

/// Ordered list of column names.
///
/// Column order is fixed the first time a schema is written; a schema may
/// only **grow** by appending new names to the end. Shrinking or reordering
/// is always rejected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Schema {
    columns: Vec<String>,
}

impl Schema {
    /// Builds a schema from an ordered list of column names.
    pub fn new(columns: Vec<String>) -> Result<Self, SchemaError> {
        if columns.len() > MAX_COLUMNS {
            return Err(SchemaError::TooManyColumns(columns.len()));
        }
        Ok(Self { columns })
    }

    /// Number of columns in this schema.
    pub fn len(&self) -> usize {
        self.columns.len()
    }

    /// True when the schema has no columns.
    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Column names in schema order.
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Returns `true` if `other` is a prefix of `self`, column-name for
    /// column-name. An empty `other` is always a prefix.
    pub fn has_prefix(&self, other: &[String]) -> bool {
        other.len() <= self.columns.len() && self.columns[..other.len()] == *other
    }

    /// Returns a schema extended with `extra` columns appended to the end.
    ///
    /// Fails if the combined column count would exceed [`MAX_COLUMNS`], or
    /// if `extra` is empty (growth must add at least one column).
    pub fn grown(&self, extra: &[String]) -> Result<Self, SchemaError> {
        let mut columns = self.columns.clone();
        columns.extend(extra.iter().cloned());
        Self::new(columns)
    }

    /// Validates that `self` could legally follow `on_disk` as a schema
    /// growth (or be identical to it). `on_disk` must be a prefix of `self`.
    pub fn validate_growth_from(&self, on_disk: &Schema) -> Result<(), SchemaError> {
        if !self.has_prefix(&on_disk.columns) {
            let index = self
                .columns
                .iter()
                .zip(on_disk.columns.iter())
                .position(|(a, b)| a != b)
                .unwrap_or(self.columns.len().min(on_disk.columns.len()));
            return Err(SchemaError::NotAPrefix {
                index,
                expected: on_disk.columns.get(index).cloned().unwrap_or_default(),
                found: self.columns.get(index).cloned().unwrap_or_default(),
            });
        }
        Ok(())
    }
}

/// A single time-series sample.
///
/// `bitvector` bit *i* set means `values[i]` holds a present value for
/// column *i* at `timestamp`; when unset, `values[i]` is undefined (callers
/// should not read it, decoders forward-fill it from the accumulator).
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    /// Milliseconds from an agreed, caller-defined epoch.
    pub timestamp: i64,
    /// 64-bit mask; bit *i* set means column *i* is present in `values`.
    pub bitvector: u64,
    /// Per-column values, indexed by column position. Only entries whose
    /// bit is set in `bitvector` are meaningful.
    pub values: Vec<f64>,
}

impl Row {
    /// Builds a row, padding or truncating `values` is the caller's
    /// responsibility — this constructor stores exactly what it is given.
    pub fn new(timestamp: i64, bitvector: u64, values: Vec<f64>) -> Self {
        Self {
            timestamp,
            bitvector,
            values,
        }
    }

    /// Returns `true` if bit `i` is set in the bitvector.
    pub fn has(&self, i: usize) -> bool {
        i < 64 && (self.bitvector & (1u64 << i)) != 0
    }

    /// Sets bit `i` and stores `value` at column `i`, growing `values` if
    /// needed.
    pub fn set(&mut self, i: usize, value: f64) {
        if self.values.len() <= i {
            self.values.resize(i + 1, 0.0);
        }
        self.values[i] = value;
        self.bitvector |= 1u64 << i;
    }

    /// Clears bit `i`. The stored value, if any, is left untouched but is
    /// no longer meaningful.
    pub fn clear(&mut self, i: usize) {
        self.bitvector &= !(1u64 << i);
    }

    /// Merges `incoming` into `self` in place: every bit set in `incoming`
    /// is set in `self` with `incoming`'s value; bits only set in `self`
    /// are kept unchanged. The timestamp of `self` is left unchanged (the
    /// caller decides which timestamp the merged row keeps).
    pub fn merge_from(&mut self, incoming: &Row) {
        for i in 0..64 {
            if incoming.has(i) {
                let value = incoming.values.get(i).copied().unwrap_or(0.0);
                self.set(i, value);
            }
        }
    }
}
