//! Persistence writer, the single consumer that mutates the store.
//!
//! Fetch tasks hand their batches over a bounded channel; a full channel
//! blocks the sending task, which caps memory at `capacity` queued batches.
//! The writer commits each batch as one transaction and keeps going when a
//! batch fails. It stops only on an explicit [`WriterMessage::EndOfStream`],
//! which the pipeline sends after every fetch task has finished.

use crossbeam::channel::{self, Receiver, Sender};
use pricevault_core::data::{BatchSink, FetchResult};
use serde::Serialize;
use std::thread::{self, JoinHandle};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum WriterError {
    #[error("failed to spawn writer thread: {0}")]
    Spawn(#[from] std::io::Error),

    #[error("writer thread panicked")]
    Panicked,
}

/// Messages accepted by the writer.
#[derive(Debug)]
pub enum WriterMessage {
    Batch(FetchResult),
    EndOfStream,
}

/// What the writer did over a run.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct WriterReport {
    pub batches_committed: usize,
    pub batches_failed: usize,
    /// Rows handed to the store, including ones ignored as duplicates.
    pub rows_submitted: usize,
    /// Rows that were new to the store.
    pub rows_inserted: usize,
    /// Most batches ever observed waiting in the channel.
    pub peak_queue_depth: usize,
    /// False when the channel closed without an end-of-stream signal.
    pub clean_shutdown: bool,
    pub close_error: Option<String>,
}

/// Producer side of the hand-off channel. Cheap to clone.
#[derive(Clone)]
pub struct BatchSender {
    tx: Sender<WriterMessage>,
}

impl BatchSender {
    /// Hand a batch to the writer, blocking while the channel is full.
    ///
    /// Returns false if the writer is gone.
    pub fn send(&self, result: FetchResult) -> bool {
        self.tx.send(WriterMessage::Batch(result)).is_ok()
    }
}

/// A running writer thread.
pub struct WriterHandle {
    tx: Sender<WriterMessage>,
    join: JoinHandle<WriterReport>,
    capacity: usize,
}

impl WriterHandle {
    /// Move `sink` into a dedicated writer thread fed by a channel of `capacity` batches.
    pub fn spawn<S>(sink: S, capacity: usize) -> Result<Self, WriterError>
    where
        S: BatchSink + 'static,
    {
        let capacity = capacity.max(1);
        let (tx, rx) = channel::bounded(capacity);
        let join = thread::Builder::new()
            .name("pricevault-writer".into())
            .spawn(move || writer_loop(sink, rx))?;
        Ok(Self { tx, join, capacity })
    }

    pub fn sender(&self) -> BatchSender {
        BatchSender {
            tx: self.tx.clone(),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Signal end-of-stream and wait for the writer to flush and close.
    ///
    /// Call only after every producer has finished sending.
    pub fn finish(self) -> Result<WriterReport, WriterError> {
        // A send error means the writer already exited; join reports why.
        let _ = self.tx.send(WriterMessage::EndOfStream);
        drop(self.tx);
        self.join.join().map_err(|_| WriterError::Panicked)
    }
}

fn writer_loop<S: BatchSink>(mut sink: S, rx: Receiver<WriterMessage>) -> WriterReport {
    let mut report = WriterReport::default();

    loop {
        let msg = match rx.recv() {
            Ok(msg) => msg,
            Err(_) => {
                tracing::warn!("hand-off channel closed without end-of-stream");
                break;
            }
        };
        report.peak_queue_depth = report.peak_queue_depth.max(rx.len());

        let result = match msg {
            WriterMessage::EndOfStream => {
                report.clean_shutdown = true;
                break;
            }
            WriterMessage::Batch(result) => result,
        };
        if result.rows.is_empty() {
            continue;
        }

        let n = result.rows.len();
        report.rows_submitted += n;
        match sink.insert_batch(&result.rows) {
            Ok(inserted) => {
                report.batches_committed += 1;
                report.rows_inserted += inserted;
                tracing::debug!(
                    symbol = %result.symbol,
                    rows = n,
                    inserted,
                    "batch committed"
                );
            }
            Err(e) => {
                report.batches_failed += 1;
                tracing::error!(
                    symbol = %result.symbol,
                    rows = n,
                    error = %e,
                    "batch insert failed"
                );
            }
        }
    }

    if let Err(e) = sink.close() {
        tracing::error!(error = %e, "closing store failed");
        report.close_error = Some(e.to_string());
    }
    tracing::info!(
        rows_inserted = report.rows_inserted,
        rows_submitted = report.rows_submitted,
        batches_failed = report.batches_failed,
        "writer finished"
    );
    report
}
