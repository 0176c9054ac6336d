//! # ptstore
//!
//! An embeddable, append-only time-series log for wide, sparse, numerically
//! valued rows. Designed for workloads where a handful of columns out of a
//! much wider schema are present on any given sample, timestamps arrive in
//! roughly increasing order, and readers want a dense forward-filled view
//! over a physically sparse log.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────┐
//! │                       Store                          │
//! │  ┌────────────┐   ┌────────────┐   ┌───────────────┐ │
//! │  │  Pending    │   │  Writer    │   │  Repository   │ │
//! │  │  row slot   │──►│ (emitter)  │──►│ (hdr + data   │ │
//! │  │ (bucket     │   │            │   │   files)      │ │
//! │  │  merge)     │   │            │   │               │ │
//! │  └─────────────┘   └────────────┘   └───────┬───────┘ │
//! │                                              │         │
//! │  ┌───────────────────────────────────────────▼───────┐ │
//! │  │                     Codec                         │ │
//! │  │  line grammar, delta timestamps, forward-fill      │ │
//! │  └────────────────────────────────────────────────────┘ │
//! │                                                        │
//! │  ┌──────────────────────────────────────────────────┐  │
//! │  │      Periodic-flush ticker (background thread)    │  │
//! │  └──────────────────────────────────────────────────┘  │
//! └────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`row`] | In-memory row/schema model — the 64-bit bitvector, values, and column list |
//! | [`codec`] | Line-oriented text record grammar: encode/decode, forward-fill accumulator |
//! | [`repository`] | Owns the header/data file pair, schema validation and growth |
//! | [`writer`] | Timestamp adjustment (delta/absolute) and out-of-order ordering policy |
//! | [`store`] | Public facade: `open`, `append`, `stream`, `flush`, `close`, periodic flush |
//!
//! ## Key Features
//!
//! - **Wide, sparse schema** — up to 64 columns per store, each row carrying
//!   only the columns it actually set.
//! - **Delta-coarsened timestamps** — on-disk timestamps are divided by a
//!   configurable coarsen factor and stored as deltas, keeping the format
//!   compact for dense, nearly-monotonic timestamp streams.
//! - **Coarse-bucket merging** — rows landing in the same coarse time bucket
//!   are merged in memory before ever reaching disk.
//! - **Forward-fill reads** — `stream` always yields the most recently known
//!   value for every column, regardless of which row last set it.
//! - **Schema growth** — reopening with a longer, prefix-compatible column
//!   list rewrites the header in place; existing rows keep decoding.
//! - **Background periodic flush** — a cancellable ticker thread flushes on
//!   a configurable interval in addition to explicit `flush()` calls.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::path::Path;
//! use ptstore::{Row, Schema, Store, StoreConfig, TimeRange};
//!
//! let schema = Schema::new(vec!["temperature".into(), "humidity".into()]).unwrap();
//! let mut store = Store::open(Path::new("/tmp/sensor-log"), "room1", schema, StoreConfig::default())
//!     .unwrap();
//!
//! store.append(Row::new(1_000, 0b11, vec![21.5, 48.0])).unwrap();
//! store.append(Row::new(1_030, 0b01, vec![21.6, 0.0])).unwrap();
//! store.flush().unwrap();
//!
//! store.stream(TimeRange::all(), |row| {
//!     println!("{row:?}");
//!     true
//! }).unwrap();
//!
//! store.close().unwrap();
//! ```

#![allow(dead_code)]

pub mod codec;
pub mod repository;
pub mod row;
pub mod store;
pub mod writer;

pub use row::{Row, Schema};
pub use store::{Store, StoreConfig, StoreError, StoreStats, TimeRange};
