//! Progress reporting for sync runs.
//!
//! Advisory only: nothing in the pipeline depends on it for correctness.

use crate::scheduler::SchedulerStats;

/// Callbacks for a multi-symbol sync.
///
/// Called from worker threads, so implementations must be `Sync`.
pub trait SyncProgress: Send + Sync {
    /// Called when the run starts dispatching.
    fn on_start(&self, total: usize, workers: usize);

    /// Called every `progress_every` completions and on the last one.
    fn on_progress(&self, completed: usize, total: usize, rows_fetched: usize);

    /// Called once every task has finished.
    fn on_fetch_complete(&self, stats: &SchedulerStats);
}

/// Reports through `tracing` at info level.
pub struct LogProgress;

impl SyncProgress for LogProgress {
    fn on_start(&self, total: usize, workers: usize) {
        tracing::info!(symbols = total, workers, "starting downloads");
    }

    fn on_progress(&self, completed: usize, total: usize, rows_fetched: usize) {
        tracing::info!(
            "progress: {completed}/{total} symbols done (total new rows fetched: {rows_fetched})"
        );
    }

    fn on_fetch_complete(&self, stats: &SchedulerStats) {
        tracing::info!(
            fetched = stats.fetched,
            skipped = stats.skipped,
            degraded = stats.degraded,
            crashed = stats.crashed,
            rows = stats.rows_fetched,
            "all fetch tasks finished"
        );
    }
}

/// Discards all progress.
pub struct NoProgress;

impl SyncProgress for NoProgress {
    fn on_start(&self, _total: usize, _workers: usize) {}
    fn on_progress(&self, _completed: usize, _total: usize, _rows_fetched: usize) {}
    fn on_fetch_complete(&self, _stats: &SchedulerStats) {}
}
