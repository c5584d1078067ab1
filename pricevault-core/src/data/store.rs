//! SQLite price store.
//!
//! Single relation `prices(symbol, date, open, high, low, close, volume)`
//! keyed on `(symbol, date)`. Inserts are `INSERT OR IGNORE`: an existing key
//! is left untouched, so the first ingestion of a row wins.
//!
//! The database runs in WAL mode with `synchronous = NORMAL`; during a sync
//! exactly one handle (owned by the persistence writer) mutates it.

use chrono::NaiveDate;
use rusqlite::{params, Connection, OpenFlags, OptionalExtension};
use serde::Serialize;
use std::path::Path;
use thiserror::Error;

use crate::domain::PriceRow;

const SCHEMA_SQL: &str = r#"
PRAGMA journal_mode = WAL;
PRAGMA synchronous = NORMAL;

CREATE TABLE IF NOT EXISTS prices (
    symbol TEXT NOT NULL,
    date   TEXT NOT NULL,
    open   REAL,
    high   REAL,
    low    REAL,
    close  REAL,
    volume REAL,
    PRIMARY KEY(symbol, date)
);
"#;

const INSERT_SQL: &str = "INSERT OR IGNORE INTO prices \
     (symbol, date, open, high, low, close, volume) \
     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("open store at {path}: {source}")]
    Open {
        path: String,
        #[source]
        source: rusqlite::Error,
    },

    #[error("sqlite: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

/// Latest state of one symbol, as served to readers.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SymbolSnapshot {
    pub symbol: String,
    pub first_date: NaiveDate,
    pub last_date: NaiveDate,
    pub row_count: u64,
    pub last_close: f64,
    pub last_volume: f64,
    pub prev_close: Option<f64>,
    /// One-day close change in percent, rounded to 2 dp.
    pub change_pct: Option<f64>,
}

/// Something that durably accepts row batches.
///
/// The persistence writer is generic over this so tests can substitute a
/// failing or slow sink.
pub trait BatchSink: Send {
    /// Insert one batch atomically. Returns the number of rows actually
    /// inserted (existing keys are skipped).
    fn insert_batch(&mut self, rows: &[PriceRow]) -> Result<usize, StoreError>;

    /// Flush and release resources.
    fn close(self) -> Result<(), StoreError>
    where
        Self: Sized;
}

pub struct PriceStore {
    conn: Connection,
}

impl PriceStore {
    /// Open (creating if needed) the store at `path`.
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        let flags = OpenFlags::SQLITE_OPEN_READ_WRITE | OpenFlags::SQLITE_OPEN_CREATE;
        let conn = Connection::open_with_flags(path, flags).map_err(|source| StoreError::Open {
            path: path.display().to_string(),
            source,
        })?;
        Self::init(conn, &path.display().to_string())
    }

    /// In-memory store, for tests and dry runs.
    pub fn open_in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory().map_err(|source| StoreError::Open {
            path: ":memory:".into(),
            source,
        })?;
        Self::init(conn, ":memory:")
    }

    fn init(conn: Connection, path: &str) -> Result<Self, StoreError> {
        conn.busy_timeout(std::time::Duration::from_secs(60))?;
        conn.execute_batch(SCHEMA_SQL)?;

        let journal_mode: String = conn.query_row("PRAGMA journal_mode", [], |row| row.get(0))?;
        if !journal_mode.eq_ignore_ascii_case("wal") && path != ":memory:" {
            tracing::warn!(path, journal_mode, "WAL mode not active");
        }
        tracing::debug!(path, "price store opened");

        Ok(Self { conn })
    }

    /// Newest stored date for `symbol`, or `None` if it was never ingested.
    pub fn watermark(&self, symbol: &str) -> Result<Option<NaiveDate>, StoreError> {
        let last: Option<NaiveDate> = self.conn.query_row(
            "SELECT MAX(date) FROM prices WHERE symbol = ?1",
            params![symbol],
            |row| row.get(0),
        )?;
        Ok(last)
    }

    /// Insert rows in one transaction, ignoring existing keys.
    pub fn insert_rows(&mut self, rows: &[PriceRow]) -> Result<usize, StoreError> {
        if rows.is_empty() {
            return Ok(0);
        }

        let tx = self.conn.transaction()?;
        let mut inserted = 0usize;
        {
            let mut stmt = tx.prepare_cached(INSERT_SQL)?;
            for row in rows {
                inserted += stmt.execute(params![
                    row.symbol,
                    row.date,
                    row.open,
                    row.high,
                    row.low,
                    row.close,
                    row.volume,
                ])?;
            }
        }
        tx.commit()?;
        Ok(inserted)
    }

    /// Full history for `symbol`, ascending by date.
    pub fn history(&self, symbol: &str) -> Result<Vec<PriceRow>, StoreError> {
        let mut stmt = self.conn.prepare(
            "SELECT symbol, date, open, high, low, close, volume \
             FROM prices WHERE symbol = ?1 ORDER BY date ASC",
        )?;
        let rows = stmt
            .query_map(params![symbol], |row| {
                Ok(PriceRow {
                    symbol: row.get(0)?,
                    date: row.get(1)?,
                    open: row.get(2)?,
                    high: row.get(3)?,
                    low: row.get(4)?,
                    close: row.get(5)?,
                    volume: row.get::<_, Option<f64>>(6)?.unwrap_or(0.0),
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// Latest close, one-day change, and coverage for every stored symbol.
    pub fn snapshots(&self) -> Result<Vec<SymbolSnapshot>, StoreError> {
        let mut stmt = self.conn.prepare(
            "SELECT p.symbol, s.first_date, s.last_date, s.row_count, p.close, p.volume, \
                    (SELECT q.close FROM prices q \
                      WHERE q.symbol = p.symbol AND q.date < p.date \
                      ORDER BY q.date DESC LIMIT 1) \
             FROM prices p \
             JOIN (SELECT symbol, MIN(date) AS first_date, MAX(date) AS last_date, \
                          COUNT(*) AS row_count \
                     FROM prices GROUP BY symbol) s \
               ON p.symbol = s.symbol AND p.date = s.last_date \
             ORDER BY p.symbol ASC",
        )?;
        let snapshots = stmt
            .query_map([], |row| {
                let last_close: f64 = row.get(4)?;
                let prev_close: Option<f64> = row.get(6)?;
                Ok(SymbolSnapshot {
                    symbol: row.get(0)?,
                    first_date: row.get(1)?,
                    last_date: row.get(2)?,
                    row_count: row.get::<_, i64>(3)?.max(0) as u64,
                    last_close,
                    last_volume: row.get::<_, Option<f64>>(5)?.unwrap_or(0.0),
                    prev_close,
                    change_pct: prev_close.and_then(|prev| change_pct(prev, last_close)),
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(snapshots)
    }

    /// Total number of stored rows.
    pub fn row_count(&self) -> Result<u64, StoreError> {
        let n: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM prices", [], |row| row.get(0))?;
        Ok(n.max(0) as u64)
    }

    /// Stored row for one key, if any.
    pub fn get(&self, symbol: &str, date: NaiveDate) -> Result<Option<PriceRow>, StoreError> {
        let row = self
            .conn
            .query_row(
                "SELECT symbol, date, open, high, low, close, volume \
                 FROM prices WHERE symbol = ?1 AND date = ?2",
                params![symbol, date],
                |row| {
                    Ok(PriceRow {
                        symbol: row.get(0)?,
                        date: row.get(1)?,
                        open: row.get(2)?,
                        high: row.get(3)?,
                        low: row.get(4)?,
                        close: row.get(5)?,
                        volume: row.get::<_, Option<f64>>(6)?.unwrap_or(0.0),
                    })
                },
            )
            .optional()?;
        Ok(row)
    }
}

impl BatchSink for PriceStore {
    fn insert_batch(&mut self, rows: &[PriceRow]) -> Result<usize, StoreError> {
        self.insert_rows(rows)
    }

    fn close(self) -> Result<(), StoreError> {
        self.conn
            .query_row("PRAGMA wal_checkpoint(TRUNCATE)", [], |_| Ok(()))?;
        self.conn.close().map_err(|(_, e)| StoreError::Sqlite(e))
    }
}

fn change_pct(prev: f64, last: f64) -> Option<f64> {
    if prev == 0.0 {
        return None;
    }
    Some((((last - prev) / prev) * 100.0 * 100.0).round() / 100.0)
}
