//! Watermark resolution: the newest stored date per symbol.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::store::{PriceStore, StoreError};

/// A symbol paired with its watermark (`None` = never ingested).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SymbolWatermark {
    pub symbol: String,
    pub last_date: Option<NaiveDate>,
}

/// Read the watermark of every symbol, preserving input order.
pub fn resolve_watermarks<S: AsRef<str>>(
    store: &PriceStore,
    symbols: &[S],
) -> Result<Vec<SymbolWatermark>, StoreError> {
    let mut out = Vec::with_capacity(symbols.len());
    for symbol in symbols {
        let symbol = symbol.as_ref();
        out.push(SymbolWatermark {
            symbol: symbol.to_string(),
            last_date: store.watermark(symbol)?,
        });
    }
    let known = out.iter().filter(|w| w.last_date.is_some()).count();
    tracing::info!(symbols = out.len(), known, "resolved watermarks");
    Ok(out)
}
