use std::time::Duration;

use tempfile::tempdir;

use crate::row::{Row, Schema};
use crate::store::{Store, StoreConfig, TimeRange, NO_DATA};

fn schema(names: &[&str]) -> Schema {
    Schema::new(names.iter().map(|s| s.to_string()).collect()).unwrap()
}

fn no_ticker() -> StoreConfig {
    StoreConfig {
        flush_interval: None,
        ..StoreConfig::default()
    }
}

fn collect(store: &Store, range: TimeRange) -> Vec<Row> {
    let mut out = Vec::new();
    store.stream(range, |row| {
        out.push(row);
        true
    }).unwrap();
    out
}

#[test]
fn empty_store_has_no_data_sentinel_and_empty_stream() {
    let dir = tempdir().unwrap();
    let mut store = Store::open(dir.path(), "base", schema(&["x", "y"]), no_ticker()).unwrap();
    assert_eq!(store.first_time(), NO_DATA);
    assert!(collect(&store, TimeRange::all()).is_empty());
    store.close().unwrap();
}

#[test]
fn single_row_round_trips_after_reopen() {
    let dir = tempdir().unwrap();
    {
        let mut store = Store::open(dir.path(), "base", schema(&["x", "y"]), no_ticker()).unwrap();
        store.append(Row::new(500, 0b11, vec![1.0, 2.0])).unwrap();
        store.flush().unwrap();
        store.close().unwrap();
    }
    let store = Store::open(dir.path(), "base", schema(&["x", "y"]), no_ticker()).unwrap();
    assert_eq!(store.first_time(), 500);
    let rows = collect(&store, TimeRange::all());
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].timestamp, 500);
    assert_eq!(rows[0].bitvector, 0b11);
    assert_eq!(rows[0].values, vec![1.0, 2.0]);
}

#[test]
fn bucket_merge_combines_two_rows_in_same_coarse_bucket() {
    let dir = tempdir().unwrap();
    let store = Store::open(dir.path(), "base", schema(&["x", "y"]), no_ticker()).unwrap();
    store.append(Row::new(500, 0b01, vec![1.0])).unwrap();
    store.append(Row::new(530, 0b10, vec![0.0, 2.0])).unwrap();
    store.flush().unwrap();
    let rows = collect(&store, TimeRange::all());
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].timestamp, 500);
    assert_eq!(rows[0].bitvector, 0b11);
    assert_eq!(rows[0].values, vec![1.0, 2.0]);
}

#[test]
fn unchanged_value_is_round_tripped_via_star_token() {
    let dir = tempdir().unwrap();
    let store = Store::open(dir.path(), "base", schema(&["x"]), no_ticker()).unwrap();
    store.append(Row::new(500, 0b01, vec![1.0])).unwrap();
    store.append(Row::new(1500, 0b01, vec![1.0])).unwrap();
    store.flush().unwrap();
    let rows = collect(&store, TimeRange::all());
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[1].values, vec![1.0]);
}

#[test]
fn non_finite_value_is_dropped_on_emit() {
    let dir = tempdir().unwrap();
    let store = Store::open(dir.path(), "base", schema(&["x"]), no_ticker()).unwrap();
    store.append(Row::new(500, 0b01, vec![f64::NAN])).unwrap();
    store.flush().unwrap();
    let rows = collect(&store, TimeRange::all());
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].bitvector, 0);
}

#[test]
fn out_of_order_strict_rejects_and_keeps_prior_row() {
    let dir = tempdir().unwrap();
    let store = Store::open(dir.path(), "base", schema(&["x"]), no_ticker()).unwrap();
    store.append(Row::new(1000, 0b01, vec![1.0])).unwrap();
    store.flush().unwrap();
    store.append(Row::new(900, 0b01, vec![2.0])).unwrap();
    let err = store.flush();
    assert!(err.is_err());
    let rows = collect(&store, TimeRange::all());
    assert_eq!(rows.len(), 1);
}

#[test]
fn out_of_order_failure_on_flush_leaves_pending_slot_intact() {
    let dir = tempdir().unwrap();
    let store = Store::open(dir.path(), "base", schema(&["x"]), no_ticker()).unwrap();
    store.append(Row::new(1000, 0b01, vec![1.0])).unwrap();
    store.flush().unwrap();

    store.append(Row::new(900, 0b01, vec![2.0])).unwrap();
    assert!(store.flush().is_err());
    // The rejected row must still be sitting in the pending slot, not lost.
    assert!(store.stats().unwrap().pending_row_present);

    // A same-bucket append merges into the still-pending (900) row rather
    // than being silently dropped, proving the slot survived the failure.
    store.append(Row::new(950, 0b01, vec![9.0])).unwrap();
    assert!(store.stats().unwrap().pending_row_present);

    // The slot is still the out-of-order bucket, so it keeps failing to
    // flush until the caller restarts with a fresh store or enables
    // `force_ordering` — but no data has been lost in the meantime.
    assert!(store.flush().is_err());
    let rows = collect(&store, TimeRange::all());
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].timestamp, 1000);
}

#[test]
fn out_of_order_failure_on_bucket_conflict_leaves_pending_slot_unchanged() {
    let dir = tempdir().unwrap();
    let store = Store::open(dir.path(), "base", schema(&["x"]), no_ticker()).unwrap();
    store.append(Row::new(1000, 0b01, vec![1.0])).unwrap();
    store.flush().unwrap();

    // Pending now holds (900, 2.0) — out of order relative to the already
    // flushed (1000) row, but merely sitting in the slot doesn't trigger
    // the writer's ordering check yet.
    store.append(Row::new(900, 0b01, vec![2.0])).unwrap();
    assert!(store.stats().unwrap().pending_row_present);

    // A different-bucket append forces an emit attempt of the pending
    // (900) row, which the writer rejects as out of order.
    let err = store.append(Row::new(800, 0b01, vec![5.0]));
    assert!(err.is_err());

    // The pending slot must still hold the original (900) row, not the
    // rejected (800) one — proven by a retried flush failing the same way
    // rather than succeeding with a different row's data.
    assert!(store.stats().unwrap().pending_row_present);
    assert!(store.flush().is_err());

    let rows = collect(&store, TimeRange::all());
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].timestamp, 1000);
}

#[test]
fn out_of_order_clamped_keeps_both_rows() {
    let dir = tempdir().unwrap();
    let mut cfg = no_ticker();
    cfg.force_ordering = true;
    let store = Store::open(dir.path(), "base", schema(&["x"]), cfg).unwrap();
    store.append(Row::new(1000, 0b01, vec![1.0])).unwrap();
    store.flush().unwrap();
    store.append(Row::new(900, 0b01, vec![2.0])).unwrap();
    store.flush().unwrap();
    let rows = collect(&store, TimeRange::all());
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0].timestamp, 1000);
    assert_eq!(rows[1].timestamp, 1000);
}

#[test]
fn range_stream_yields_only_rows_within_bounds() {
    let dir = tempdir().unwrap();
    let store = Store::open(dir.path(), "base", schema(&["x"]), no_ticker()).unwrap();
    for t in [100, 200, 300, 400, 500] {
        store.append(Row::new(t, 0b01, vec![t as f64])).unwrap();
    }
    store.flush().unwrap();
    let rows = collect(&store, TimeRange::inclusive(250, 450));
    assert_eq!(rows.iter().map(|r| r.timestamp).collect::<Vec<_>>(), vec![300, 400]);
}

#[test]
fn schema_growth_on_reopen_rewrites_header_and_preserves_rows() {
    let dir = tempdir().unwrap();
    {
        let store = Store::open(dir.path(), "base", schema(&["a", "b", "c"]), no_ticker()).unwrap();
        store.append(Row::new(500, 0b111, vec![1.0, 2.0, 3.0])).unwrap();
        store.flush().unwrap();
    }
    let store = Store::open(dir.path(), "base", schema(&["a", "b", "c", "d"]), no_ticker()).unwrap();
    let rows = collect(&store, TimeRange::all());
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].values, vec![1.0, 2.0, 3.0, 0.0]);
}

#[test]
fn idempotent_flush_and_close() {
    let dir = tempdir().unwrap();
    let mut store = Store::open(dir.path(), "base", schema(&["x"]), no_ticker()).unwrap();
    store.append(Row::new(500, 0b01, vec![1.0])).unwrap();
    store.flush().unwrap();
    store.flush().unwrap();
    store.close().unwrap();
    store.close().unwrap();
}

#[test]
fn periodic_flush_ticker_persists_pending_row() {
    let dir = tempdir().unwrap();
    let cfg = StoreConfig {
        flush_interval: Some(Duration::from_millis(50)),
        ..StoreConfig::default()
    };
    let mut store = Store::open(dir.path(), "base", schema(&["x"]), cfg).unwrap();
    store.append(Row::new(500, 0b01, vec![1.0])).unwrap();
    std::thread::sleep(Duration::from_millis(300));
    let stats = store.stats().unwrap();
    assert!(!stats.pending_row_present);
    store.close().unwrap();
}
