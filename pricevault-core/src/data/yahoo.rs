//! Yahoo Finance price provider.
//!
//! Fetches daily OHLCV rows from Yahoo's v8 chart API: one GET per symbol,
//! bounded by a hard timeout, no retries. A failed symbol is simply picked up
//! again by the next run because its watermark does not move.

use super::circuit_breaker::CircuitBreaker;
use super::provider::{FetchError, PriceProvider};
use crate::domain::PriceRow;
use crate::window::FetchWindow;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

/// Connection settings for the chart API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct YahooSettings {
    pub base_url: String,
    pub timeout_secs: u64,
    pub user_agent: String,
}

impl Default for YahooSettings {
    fn default() -> Self {
        Self {
            base_url: "https://query1.finance.yahoo.com".into(),
            timeout_secs: 10,
            user_agent: "Mozilla/5.0".into(),
        }
    }
}

// Every level is optional: a payload missing any of these keys is an empty
// result, not a protocol error.

#[derive(Debug, Deserialize)]
struct ChartResponse {
    chart: Option<ChartResult>,
}

#[derive(Debug, Deserialize)]
struct ChartResult {
    result: Option<Vec<ChartData>>,
}

#[derive(Debug, Deserialize)]
struct ChartData {
    timestamp: Option<Vec<Option<i64>>>,
    indicators: Option<Indicators>,
}

#[derive(Debug, Deserialize)]
struct Indicators {
    quote: Option<Vec<QuoteData>>,
}

#[derive(Debug, Default, Deserialize)]
struct QuoteData {
    open: Option<Vec<Option<f64>>>,
    high: Option<Vec<Option<f64>>>,
    low: Option<Vec<Option<f64>>>,
    close: Option<Vec<Option<f64>>>,
    volume: Option<Vec<Option<f64>>>,
}

/// Yahoo Finance provider. Owns its HTTP client.
pub struct YahooProvider {
    client: reqwest::blocking::Client,
    settings: YahooSettings,
    circuit_breaker: Arc<CircuitBreaker>,
}

impl YahooProvider {
    pub fn new(
        settings: YahooSettings,
        circuit_breaker: Arc<CircuitBreaker>,
    ) -> Result<Self, reqwest::Error> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(settings.timeout_secs))
            .user_agent(settings.user_agent.clone())
            .build()?;

        Ok(Self {
            client,
            settings,
            circuit_breaker,
        })
    }

    fn chart_url(&self, symbol: &str) -> String {
        format!(
            "{}/v8/finance/chart/{symbol}",
            self.settings.base_url.trim_end_matches('/')
        )
    }

    fn classify(symbol: &str, e: reqwest::Error) -> FetchError {
        if e.is_timeout() {
            FetchError::Timeout(format!("{symbol}: {e}"))
        } else {
            FetchError::Network(format!("{symbol}: {e}"))
        }
    }
}

impl PriceProvider for YahooProvider {
    fn name(&self) -> &str {
        "yahoo_finance"
    }

    fn fetch(&self, symbol: &str, window: &FetchWindow) -> Result<Vec<PriceRow>, FetchError> {
        if !self.circuit_breaker.is_allowed() {
            tracing::debug!(
                symbol,
                remaining_secs = self.circuit_breaker.remaining_cooldown().as_secs(),
                "circuit breaker open, request suppressed"
            );
            return Err(FetchError::CircuitBreakerOpen);
        }

        let (period1, period2) = window.epoch_bounds();
        let resp = self
            .client
            .get(self.chart_url(symbol))
            .header(reqwest::header::ACCEPT, "application/json")
            .query(&[
                ("interval", "1d".to_string()),
                ("period1", period1.to_string()),
                ("period2", period2.to_string()),
            ])
            .send()
            .map_err(|e| Self::classify(symbol, e))?;

        let status = resp.status();
        if status == reqwest::StatusCode::FORBIDDEN {
            self.circuit_breaker.trip();
            return Err(FetchError::HttpStatus {
                symbol: symbol.to_string(),
                status: status.as_u16(),
            });
        }
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            self.circuit_breaker.record_failure();
            return Err(FetchError::RateLimited);
        }
        if !status.is_success() {
            if status.is_server_error() {
                self.circuit_breaker.record_failure();
            }
            return Err(FetchError::HttpStatus {
                symbol: symbol.to_string(),
                status: status.as_u16(),
            });
        }

        let body = resp.text().map_err(|e| Self::classify(symbol, e))?;
        let rows = parse_chart(symbol, &body)?;
        self.circuit_breaker.record_success();
        Ok(rows)
    }
}

/// Parse a chart API body into rows.
///
/// The quote arrays are zipped positionally with the timestamps. A record
/// missing any of open/high/low/close is dropped; a missing volume becomes 0.
pub fn parse_chart(symbol: &str, body: &str) -> Result<Vec<PriceRow>, FetchError> {
    let resp: ChartResponse =
        serde_json::from_str(body).map_err(|e| FetchError::Decode(format!("{symbol}: {e}")))?;

    let Some(data) = resp
        .chart
        .and_then(|c| c.result)
        .and_then(|r| r.into_iter().next())
    else {
        return Ok(Vec::new());
    };

    let Some(timestamps) = data.timestamp else {
        return Ok(Vec::new());
    };
    let Some(quote) = data
        .indicators
        .and_then(|i| i.quote)
        .and_then(|q| q.into_iter().next())
    else {
        return Ok(Vec::new());
    };

    let opens = quote.open.unwrap_or_default();
    let highs = quote.high.unwrap_or_default();
    let lows = quote.low.unwrap_or_default();
    let closes = quote.close.unwrap_or_default();
    let volumes = quote.volume.unwrap_or_default();

    let at = |v: &[Option<f64>], i: usize| v.get(i).copied().flatten().filter(|x| x.is_finite());

    let mut rows = Vec::with_capacity(timestamps.len());
    for (i, ts) in timestamps.iter().enumerate() {
        let Some(ts) = *ts else { continue };
        let (Some(open), Some(high), Some(low), Some(close)) =
            (at(&opens, i), at(&highs, i), at(&lows, i), at(&closes, i))
        else {
            continue;
        };
        let Some(date) = chrono::DateTime::from_timestamp(ts, 0).map(|dt| dt.date_naive()) else {
            continue;
        };
        let volume = at(&volumes, i).filter(|v| *v >= 0.0).unwrap_or(0.0);

        rows.push(PriceRow {
            symbol: symbol.to_string(),
            date,
            open,
            high,
            low,
            close,
            volume,
        });
    }

    Ok(rows)
}
