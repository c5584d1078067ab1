//! Integration tests for the on-disk price store.
//!
//! These run against a real SQLite file in a temp directory, so they cover
//! what the in-memory unit tests cannot: WAL mode, persistence across
//! handles, and duplicate handling across separate runs.

use chrono::NaiveDate;
use pricevault_core::data::{resolve_watermarks, BatchSink, PriceStore};
use pricevault_core::PriceRow;
use tempfile::TempDir;

fn d(y: i32, m: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, day).unwrap()
}

fn row(symbol: &str, date: NaiveDate, close: f64) -> PriceRow {
    PriceRow {
        symbol: symbol.into(),
        date,
        open: close,
        high: close + 1.0,
        low: close - 1.0,
        close,
        volume: 1_000.0,
    }
}

#[test]
fn file_store_runs_in_wal_mode() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("prices.db");
    let store = PriceStore::open(&path).unwrap();
    store.close().unwrap();

    let conn = rusqlite::Connection::open(&path).unwrap();
    let mode: String = conn
        .query_row("PRAGMA journal_mode", [], |r| r.get(0))
        .unwrap();
    assert_eq!(mode.to_lowercase(), "wal");
}

#[test]
fn rows_survive_reopen() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("prices.db");

    let mut store = PriceStore::open(&path).unwrap();
    let inserted = store
        .insert_batch(&[
            row("BTC-USD", d(2024, 1, 1), 42_000.0),
            row("BTC-USD", d(2024, 1, 2), 43_000.0),
        ])
        .unwrap();
    assert_eq!(inserted, 2);
    store.close().unwrap();

    let store = PriceStore::open(&path).unwrap();
    assert_eq!(store.row_count().unwrap(), 2);
    assert_eq!(store.watermark("BTC-USD").unwrap(), Some(d(2024, 1, 2)));
    assert_eq!(store.watermark("ETH-USD").unwrap(), None);
}

#[test]
fn first_write_wins_across_runs() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("prices.db");

    let mut first = PriceStore::open(&path).unwrap();
    first
        .insert_batch(&[row("ETH-USD", d(2024, 3, 1), 3_000.0)])
        .unwrap();
    first.close().unwrap();

    let mut second = PriceStore::open(&path).unwrap();
    let inserted = second
        .insert_batch(&[
            row("ETH-USD", d(2024, 3, 1), 9_999.0),
            row("ETH-USD", d(2024, 3, 2), 3_100.0),
        ])
        .unwrap();
    assert_eq!(inserted, 1);

    let kept = second.get("ETH-USD", d(2024, 3, 1)).unwrap().unwrap();
    assert_eq!(kept.close, 3_000.0);
    assert_eq!(second.row_count().unwrap(), 2);
}

#[test]
fn watermarks_and_snapshots_read_from_disk() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("nested").join("prices.db");
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();

    let mut store = PriceStore::open(&path).unwrap();
    store
        .insert_batch(&[
            row("BTC-USD", d(2024, 1, 1), 100.0),
            row("BTC-USD", d(2024, 1, 2), 110.0),
            row("SOL-USD", d(2024, 1, 2), 50.0),
        ])
        .unwrap();

    let marks = resolve_watermarks(&store, &["BTC-USD", "SOL-USD", "ADA-USD"]).unwrap();
    assert_eq!(marks[0].last_date, Some(d(2024, 1, 2)));
    assert_eq!(marks[1].last_date, Some(d(2024, 1, 2)));
    assert_eq!(marks[2].last_date, None);

    let snaps = store.snapshots().unwrap();
    assert_eq!(snaps.len(), 2);
    assert_eq!(snaps[0].symbol, "BTC-USD");
    assert_eq!(snaps[0].change_pct, Some(10.0));
    assert_eq!(snaps[1].prev_close, None);
}
