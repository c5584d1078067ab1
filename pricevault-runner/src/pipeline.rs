//! Sync pipeline orchestration.
//!
//! One run: open the store → read watermarks → plan windows → spawn the
//! writer (which takes ownership of the store) → run the scheduler → signal
//! end-of-stream once every task has finished → join the writer.
//!
//! Only setup failures abort a run. Per-symbol fetch failures, task crashes,
//! and failed batch inserts are logged and counted in the [`RunReport`].

use chrono::NaiveDate;
use pricevault_core::data::{
    resolve_watermarks, CircuitBreaker, PriceProvider, PriceStore, StoreError, SymbolWatermark,
    YahooProvider,
};
use pricevault_core::{plan_window, Universe, UniverseError};
use serde::Serialize;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;

use crate::config::{ConfigError, SyncConfig};
use crate::plan_file::PlanFileError;
use crate::progress::SyncProgress;
use crate::scheduler::{Scheduler, SchedulerError, SchedulerStats, SymbolJob};
use crate::writer::{WriterError, WriterHandle, WriterReport};

/// Fatal errors: the run stops before any work is dispatched.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Universe(#[from] UniverseError),

    #[error(transparent)]
    Plan(#[from] PlanFileError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("build provider: {0}")]
    Provider(String),

    #[error(transparent)]
    Writer(#[from] WriterError),

    #[error(transparent)]
    Scheduler(#[from] SchedulerError),

    #[error("prepare store directory: {0}")]
    Io(#[from] std::io::Error),
}

/// Where a run gets its symbols and watermarks from.
#[derive(Debug, Clone)]
pub enum SyncInput {
    /// Read each symbol's watermark from the store.
    Universe(Universe),
    /// Use a previously written download plan as-is.
    Plan(Vec<SymbolWatermark>),
}

/// Outcome of a completed run.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub symbols: usize,
    pub workers: usize,
    pub channel_capacity: usize,
    pub today: NaiveDate,
    pub scheduler: SchedulerStats,
    pub writer: WriterReport,
    pub elapsed: Duration,
}

impl RunReport {
    /// Rows that were new to the store.
    pub fn rows_inserted(&self) -> usize {
        self.writer.rows_inserted
    }
}

/// Build the production provider from config.
pub fn build_provider(config: &SyncConfig) -> Result<YahooProvider, SyncError> {
    let breaker = Arc::new(CircuitBreaker::new(Duration::from_secs(
        config.provider.breaker_cooldown_secs,
    )));
    YahooProvider::new(config.provider.settings.clone(), breaker)
        .map_err(|e| SyncError::Provider(e.to_string()))
}

/// Open the configured store, creating its directory if needed.
pub fn open_store(db_path: &Path) -> Result<PriceStore, SyncError> {
    if let Some(parent) = db_path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    Ok(PriceStore::open(db_path)?)
}

/// Current watermarks for every symbol in `universe`.
pub fn resolve_plan(
    db_path: &Path,
    universe: &Universe,
) -> Result<Vec<SymbolWatermark>, SyncError> {
    let store = open_store(db_path)?;
    Ok(resolve_watermarks(&store, universe.symbols())?)
}

/// Plan one job per symbol.
pub fn plan_jobs(
    marks: &[SymbolWatermark],
    lookback_years: u32,
    today: NaiveDate,
) -> Vec<SymbolJob> {
    marks
        .iter()
        .map(|mark| SymbolJob {
            symbol: mark.symbol.clone(),
            window: plan_window(mark.last_date, lookback_years, today),
        })
        .collect()
}

/// Run one incremental sync.
pub fn run_sync(
    config: &SyncConfig,
    input: SyncInput,
    provider: &dyn PriceProvider,
    progress: &dyn SyncProgress,
) -> Result<RunReport, SyncError> {
    let started = Instant::now();
    config.validate()?;

    let store = open_store(&config.db_path)?;
    let marks = match input {
        SyncInput::Universe(universe) => resolve_watermarks(&store, universe.symbols())?,
        SyncInput::Plan(marks) => marks,
    };

    let today = config.today();
    let jobs = plan_jobs(&marks, config.lookback_years, today);
    let current = jobs.iter().filter(|j| j.window.is_degenerate()).count();
    let workers = config.worker_count(jobs.len());
    let capacity = config.channel_capacity(workers);

    tracing::info!(
        symbols = jobs.len(),
        up_to_date = current,
        workers,
        capacity,
        lookback_years = config.lookback_years,
        %today,
        "starting incremental sync"
    );

    let writer = WriterHandle::spawn(store, capacity)?;
    let channel_capacity = writer.capacity();
    let scheduler = Scheduler::new(workers, config.progress_every);
    let sender = writer.sender();
    let scheduled = scheduler.run(provider, jobs, &sender, progress);
    drop(sender);

    // The writer is joined even when the pool could not be built, so the
    // store is always closed cleanly.
    let writer_report = writer.finish()?;
    let scheduler_stats = scheduled?;

    let report = RunReport {
        symbols: marks.len(),
        workers: scheduler.workers(),
        channel_capacity,
        today,
        scheduler: scheduler_stats,
        writer: writer_report,
        elapsed: started.elapsed(),
    };
    tracing::info!(
        rows_fetched = report.scheduler.rows_fetched,
        rows_inserted = report.writer.rows_inserted,
        elapsed_secs = report.elapsed.as_secs_f64(),
        "sync complete"
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plan_jobs_marks_current_symbols_degenerate() {
        let today = NaiveDate::from_ymd_opt(2024, 6, 1).unwrap();
        let marks = vec![
            SymbolWatermark {
                symbol: "BTC-USD".into(),
                last_date: Some(today),
            },
            SymbolWatermark {
                symbol: "ETH-USD".into(),
                last_date: NaiveDate::from_ymd_opt(2024, 5, 30),
            },
            SymbolWatermark {
                symbol: "SOL-USD".into(),
                last_date: None,
            },
        ];
        let jobs = plan_jobs(&marks, 10, today);
        assert!(jobs[0].window.is_degenerate());
        assert_eq!(
            jobs[1].window.start,
            NaiveDate::from_ymd_opt(2024, 5, 31).unwrap()
        );
        assert_eq!(jobs[2].window.days(), 3651);
    }

    #[test]
    fn build_provider_from_default_config() {
        assert!(build_provider(&SyncConfig::default()).is_ok());
    }
}
