//! Price provider trait and structured error types.
//!
//! The PriceProvider trait abstracts over remote sources so the scheduler can
//! be driven by the Yahoo provider in production and by mocks in tests.
//! [`fetch_range`] is the boundary that turns provider errors into empty
//! results: one symbol's failure never aborts a run.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::PriceRow;
use crate::window::FetchWindow;

/// Structured error types for a single fetch.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("network error: {0}")]
    Network(String),

    #[error("request timed out: {0}")]
    Timeout(String),

    #[error("HTTP {status} for {symbol}")]
    HttpStatus { symbol: String, status: u16 },

    #[error("rate limited by provider")]
    RateLimited,

    #[error("undecodable response: {0}")]
    Decode(String),

    #[error("circuit breaker open: provider requests suspended")]
    CircuitBreakerOpen,
}

/// How a symbol's fetch ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FetchStatus {
    /// Degenerate window; no request was issued.
    Skipped,
    /// The request succeeded (possibly with zero rows).
    Fetched,
    /// The request failed and collapsed to zero rows.
    Degraded,
}

/// Result of one symbol's fetch. Handed to the writer as a single batch.
#[derive(Debug, Clone)]
pub struct FetchResult {
    pub symbol: String,
    pub rows: Vec<PriceRow>,
    pub status: FetchStatus,
}

impl FetchResult {
    pub fn skipped(symbol: &str) -> Self {
        Self {
            symbol: symbol.to_string(),
            rows: Vec::new(),
            status: FetchStatus::Skipped,
        }
    }
}

/// A remote source of daily OHLCV rows.
pub trait PriceProvider: Send + Sync {
    /// Human-readable name of this provider.
    fn name(&self) -> &str;

    /// Fetch rows for `symbol` over a non-degenerate window.
    ///
    /// Records with incomplete OHLC are already dropped. Missing payload keys
    /// are an empty `Ok`, not an error.
    fn fetch(&self, symbol: &str, window: &FetchWindow) -> Result<Vec<PriceRow>, FetchError>;
}

/// Fetch one symbol's window, degrading every failure to an empty result.
///
/// Degenerate windows never reach the provider.
pub fn fetch_range(
    provider: &dyn PriceProvider,
    symbol: &str,
    window: &FetchWindow,
) -> FetchResult {
    if window.is_degenerate() {
        tracing::debug!(symbol, %window, "window is current, skipping fetch");
        return FetchResult::skipped(symbol);
    }

    match provider.fetch(symbol, window) {
        Ok(rows) => {
            tracing::debug!(symbol, rows = rows.len(), %window, "fetched");
            FetchResult {
                symbol: symbol.to_string(),
                rows,
                status: FetchStatus::Fetched,
            }
        }
        Err(e) => {
            tracing::warn!(
                symbol,
                provider = provider.name(),
                error = %e,
                "fetch failed, treating as zero rows"
            );
            FetchResult {
                symbol: symbol.to_string(),
                rows: Vec::new(),
                status: FetchStatus::Degraded,
            }
        }
    }
}
