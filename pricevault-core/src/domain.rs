//! Core domain types shared by the fetch and persistence layers.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// One daily OHLCV row for a symbol.
///
/// `(symbol, date)` is the natural key of the store. Re-ingesting a row with
/// an existing key is a no-op.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceRow {
    pub symbol: String,
    pub date: NaiveDate,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    /// Zero when the source omitted it.
    pub volume: f64,
}

/// Split a `<base>-<quote>` symbol into its parts.
///
/// Returns `None` when there is no `-` separator.
pub fn split_symbol(symbol: &str) -> Option<(&str, &str)> {
    symbol.split_once('-')
}
