//! Price providers and the durable price store.

pub mod circuit_breaker;
pub mod provider;
pub mod store;
pub mod watermark;
pub mod yahoo;

pub use circuit_breaker::CircuitBreaker;
pub use provider::{fetch_range, FetchError, FetchResult, FetchStatus, PriceProvider};
pub use store::{BatchSink, PriceStore, StoreError, SymbolSnapshot};
pub use watermark::{resolve_watermarks, SymbolWatermark};
pub use yahoo::{YahooProvider, YahooSettings};
