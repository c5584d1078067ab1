//! Fetch scheduler: one task per symbol on a bounded worker pool.
//!
//! The pool is a private rayon ThreadPool (never the global one) sized for
//! I/O-bound work. Each task plans nothing and shares nothing: it fetches its
//! symbol's window, hands a non-empty batch to the writer (blocking while the
//! channel is full), and updates the run counters. A panic inside a task is
//! caught at the task boundary and counted; it never reaches other tasks or
//! the writer. `run` returns only after every task has finished.

use pricevault_core::data::{fetch_range, FetchStatus, PriceProvider};
use pricevault_core::FetchWindow;
use serde::Serialize;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicUsize, Ordering};
use thiserror::Error;

use crate::progress::SyncProgress;
use crate::writer::BatchSender;

#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error("failed to build fetch pool: {0}")]
    Pool(#[from] rayon::ThreadPoolBuildError),
}

/// A symbol with its planned window.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SymbolJob {
    pub symbol: String,
    pub window: FetchWindow,
}

/// Aggregate counts for one scheduler run.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SchedulerStats {
    pub total: usize,
    pub fetched: usize,
    pub skipped: usize,
    pub degraded: usize,
    pub crashed: usize,
    pub rows_fetched: usize,
    pub batches_sent: usize,
    /// Batches that could not be handed off because the writer was gone.
    pub batches_dropped: usize,
}

#[derive(Default)]
struct Counters {
    completed: AtomicUsize,
    fetched: AtomicUsize,
    skipped: AtomicUsize,
    degraded: AtomicUsize,
    crashed: AtomicUsize,
    rows_fetched: AtomicUsize,
    batches_sent: AtomicUsize,
    batches_dropped: AtomicUsize,
}

pub struct Scheduler {
    workers: usize,
    progress_every: usize,
}

impl Scheduler {
    pub fn new(workers: usize, progress_every: usize) -> Self {
        Self {
            workers: workers.max(1),
            progress_every: progress_every.max(1),
        }
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Run every job to completion, handing batches to `sink`.
    pub fn run(
        &self,
        provider: &dyn PriceProvider,
        jobs: Vec<SymbolJob>,
        sink: &BatchSender,
        progress: &dyn SyncProgress,
    ) -> Result<SchedulerStats, SchedulerError> {
        let total = jobs.len();
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.workers)
            .thread_name(|i| format!("pricevault-fetch-{i}"))
            .build()?;

        progress.on_start(total, self.workers);
        let counters = Counters::default();

        pool.scope(|scope| {
            for job in jobs {
                let counters = &counters;
                scope.spawn(move |_| {
                    self.run_task(provider, job, sink, counters, progress, total);
                });
            }
        });

        let stats = SchedulerStats {
            total,
            fetched: counters.fetched.into_inner(),
            skipped: counters.skipped.into_inner(),
            degraded: counters.degraded.into_inner(),
            crashed: counters.crashed.into_inner(),
            rows_fetched: counters.rows_fetched.into_inner(),
            batches_sent: counters.batches_sent.into_inner(),
            batches_dropped: counters.batches_dropped.into_inner(),
        };
        progress.on_fetch_complete(&stats);
        Ok(stats)
    }

    fn run_task(
        &self,
        provider: &dyn PriceProvider,
        job: SymbolJob,
        sink: &BatchSender,
        counters: &Counters,
        progress: &dyn SyncProgress,
        total: usize,
    ) {
        let SymbolJob { symbol, window } = job;
        let outcome =
            panic::catch_unwind(AssertUnwindSafe(|| fetch_range(provider, &symbol, &window)));

        let rows = match outcome {
            Ok(result) => {
                let status_counter = match result.status {
                    FetchStatus::Fetched => &counters.fetched,
                    FetchStatus::Skipped => &counters.skipped,
                    FetchStatus::Degraded => &counters.degraded,
                };
                status_counter.fetch_add(1, Ordering::Relaxed);

                let n = result.rows.len();
                if n > 0 {
                    if sink.send(result) {
                        counters.batches_sent.fetch_add(1, Ordering::Relaxed);
                    } else {
                        counters.batches_dropped.fetch_add(1, Ordering::Relaxed);
                        tracing::error!(symbol = %symbol, rows = n, "writer gone, batch dropped");
                    }
                }
                n
            }
            Err(payload) => {
                counters.crashed.fetch_add(1, Ordering::Relaxed);
                tracing::error!(
                    symbol = %symbol,
                    reason = panic_message(&*payload),
                    "fetch task crashed"
                );
                0
            }
        };

        // Each task adds its rows before bumping `completed`; the AcqRel chain
        // on `completed` makes the last reporter see every task's rows.
        counters.rows_fetched.fetch_add(rows, Ordering::Relaxed);
        let completed = counters.completed.fetch_add(1, Ordering::AcqRel) + 1;
        if completed % self.progress_every == 0 || completed == total {
            let rows_so_far = counters.rows_fetched.load(Ordering::Acquire);
            progress.on_progress(completed, total, rows_so_far);
        }
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> &str {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.as_str()
    } else {
        "unknown panic"
    }
}
