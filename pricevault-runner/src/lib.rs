//! PriceVault Runner: incremental sync orchestration.
//!
//! This crate builds on `pricevault-core` to provide:
//! - Sync configuration (TOML + defaults)
//! - Download plan files (`symbol,last_date` CSV)
//! - The fetch scheduler: a bounded rayon pool, one task per symbol
//! - The persistence writer: a single thread owning the store, fed by a bounded channel
//! - Progress reporting and the end-to-end `run_sync` pipeline

pub mod config;
pub mod pipeline;
pub mod plan_file;
pub mod progress;
pub mod scheduler;
pub mod writer;

pub use config::{ConfigError, SyncConfig, YahooProviderConfig};
pub use pipeline::{
    build_provider, open_store, plan_jobs, resolve_plan, run_sync, RunReport, SyncError, SyncInput,
};
pub use plan_file::{read_plan, write_plan, PlanFileError};
pub use progress::{LogProgress, NoProgress, SyncProgress};
pub use scheduler::{Scheduler, SchedulerStats, SymbolJob};
pub use writer::{BatchSender, WriterHandle, WriterMessage, WriterReport};

#[cfg(test)]
mod send_sync_checks {
    use super::*;

    fn assert_send<T: Send>() {}
    fn assert_sync<T: Sync>() {}

    #[test]
    fn handoff_types_are_send() {
        assert_send::<WriterMessage>();
        assert_send::<BatchSender>();
        assert_sync::<BatchSender>();
    }

    #[test]
    fn report_types_are_send_sync() {
        assert_send::<RunReport>();
        assert_sync::<RunReport>();
        assert_send::<SyncConfig>();
        assert_sync::<SyncConfig>();
    }
}
