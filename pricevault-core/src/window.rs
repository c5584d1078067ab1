//! Fetch window planning.
//!
//! A window is the half-open date range `[start, end_exclusive)` requested
//! from the provider for one symbol. It begins the day after the symbol's
//! watermark (its newest stored date), but never earlier than the lookback
//! horizon, and always ends after today.

use chrono::{Days, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

/// Days per lookback year. Leap days are not accounted for.
pub const DAYS_PER_YEAR: i64 = 365;

/// Half-open date range to request from a provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FetchWindow {
    pub start: NaiveDate,
    pub end_exclusive: NaiveDate,
}

impl FetchWindow {
    pub fn new(start: NaiveDate, end_exclusive: NaiveDate) -> Self {
        Self {
            start,
            end_exclusive,
        }
    }

    /// A degenerate window has nothing to fetch; no request may be issued for it.
    pub fn is_degenerate(&self) -> bool {
        self.start >= self.end_exclusive
    }

    /// Number of calendar days covered (zero when degenerate).
    pub fn days(&self) -> i64 {
        (self.end_exclusive - self.start).num_days().max(0)
    }

    /// `(period1, period2)` as UTC-midnight epoch seconds.
    pub fn epoch_bounds(&self) -> (i64, i64) {
        (utc_midnight_epoch(self.start), utc_midnight_epoch(self.end_exclusive))
    }
}

impl std::fmt::Display for FetchWindow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}, {})", self.start, self.end_exclusive)
    }
}

/// Plan the fetch window for a symbol.
///
/// `horizon = today - lookback_years * 365 days`. Without a watermark the
/// window starts at the horizon; otherwise at `max(watermark + 1, horizon)`.
/// The window always ends at `today + 1` (exclusive), so a watermark of
/// `today` or later yields a degenerate window. A horizon before the
/// earliest representable date is clamped to it.
pub fn plan_window(
    watermark: Option<NaiveDate>,
    lookback_years: u32,
    today: NaiveDate,
) -> FetchWindow {
    let lookback = Days::new(DAYS_PER_YEAR as u64 * u64::from(lookback_years));
    let horizon = today.checked_sub_days(lookback).unwrap_or(NaiveDate::MIN);
    let start = match watermark {
        Some(last) => last.succ_opt().unwrap_or(last).max(horizon),
        None => horizon,
    };
    FetchWindow::new(start, today.succ_opt().unwrap_or(today))
}

/// Normalize a raw watermark string from a plan file.
///
/// Blank and null-like markers (`none`, `null`, `nan`, `<NA>`) mean "never
/// ingested", as does anything that is not a date. A datetime is accepted and
/// truncated to its date.
pub fn parse_watermark(raw: &str) -> Option<NaiveDate> {
    let s = raw.trim();
    if s.is_empty() {
        return None;
    }
    let lowered = s.to_ascii_lowercase();
    if matches!(lowered.as_str(), "none" | "null" | "nan" | "<na>" | "nat") {
        return None;
    }
    if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        return Some(date);
    }
    NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S")
        .or_else(|_| NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S"))
        .map(|dt| dt.date())
        .ok()
}

fn utc_midnight_epoch(date: NaiveDate) -> i64 {
    date.and_time(chrono::NaiveTime::MIN).and_utc().timestamp()
}
