//! PriceVault Core: domain types, window planning, providers, and the price store.
//!
//! This crate contains the leaves of the incremental ingestion pipeline:
//! - Price rows and symbol helpers
//! - Window planning from per-symbol watermarks
//! - Universe loading with symbol validation and dedup
//! - The `PriceProvider` trait, the Yahoo chart provider, and its circuit breaker
//! - The SQLite price store with duplicate-safe inserts

pub mod data;
pub mod domain;
pub mod universe;
pub mod window;

pub use domain::PriceRow;
pub use universe::{Universe, UniverseError, UniverseRules};
pub use window::{parse_watermark, plan_window, FetchWindow};
