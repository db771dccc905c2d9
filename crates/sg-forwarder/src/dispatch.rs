// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Bounded hand-off of ready batches to a single writer task.
//!
//! # Architecture
//!
//! ```text
//!   producers (bus delivery)          DispatchWorker (one per adapter)
//!        │                                    │
//!        ├─ push(batch) ─┐                    │
//!        ├─ push(batch) ─┼─> mpsc(100) ──> recv ──> BatchWriter::write
//!        └─ push(batch) ─┘                    │           │
//!                                             │     Err ─> log, discard
//!   CancellationToken ────────────────────> stop, drop queued batches
//! ```
//!
//! # Guarantees
//!
//! - Exactly one write is in flight per worker, so writes to a store are sequential.
//! - A full queue makes producers wait: a just-flushed batch is never silently dropped here.
//! - Failed writes are not retried; the store client owns its retry policy.
//! - Delivery is at-most-once: batches still queued at cancellation are dropped.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::buffer::Batch;
use crate::bus::MetricPublisher;
use crate::error::DispatchError;
use crate::event::{Metric, MetricKind};

/// Capacity of the queue between producers and the dispatch worker.
pub const DISPATCH_QUEUE_CAPACITY: usize = 100;

/// Names of the self-reported adapter counters, each labelled with the adapter name.
pub const RECORDS_FORMATTED: &str = "sg_records_formatted";
pub const FORMAT_ERRORS: &str = "sg_format_errors";
pub const BATCHES_WRITTEN: &str = "sg_batches_written";
pub const BATCHES_DISCARDED: &str = "sg_batches_discarded";

const REPORT_INTERVAL: Duration = Duration::from_secs(1);

/// Backing-store write operation performed by the dispatch worker.
#[async_trait]
pub trait BatchWriter: Send + Sync {
    /// Writes `records` under `destination_key`, as one bulk request when `bulk` is set.
    async fn write(
        &self,
        destination_key: &str,
        records: &[String],
        bulk: bool,
    ) -> Result<(), DispatchError>;
}

/// Self-reported counters of an output adapter. Shared between producers and the worker.
#[derive(Debug, Default)]
pub struct AdapterStats {
    records_formatted: AtomicU64,
    format_errors: AtomicU64,
    batches_written: AtomicU64,
    batches_discarded: AtomicU64,
}

impl AdapterStats {
    pub fn record_formatted(&self) {
        self.records_formatted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn format_error(&self) {
        self.format_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn batch_written(&self) {
        self.batches_written.fetch_add(1, Ordering::Relaxed);
    }

    pub fn batch_discarded(&self) {
        self.batches_discarded.fetch_add(1, Ordering::Relaxed);
    }

    #[must_use]
    pub fn records_formatted(&self) -> u64 {
        self.records_formatted.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn format_errors(&self) -> u64 {
        self.format_errors.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn batches_written(&self) -> u64 {
        self.batches_written.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn batches_discarded(&self) -> u64 {
        self.batches_discarded.load(Ordering::Relaxed)
    }

    /// Current counter values as metrics labelled `source=SG, plugin=<plugin>`.
    #[must_use]
    pub fn metrics(&self, plugin: &'static str) -> Vec<Metric> {
        [
            (RECORDS_FORMATTED, self.records_formatted()),
            (FORMAT_ERRORS, self.format_errors()),
            (BATCHES_WRITTEN, self.batches_written()),
            (BATCHES_DISCARDED, self.batches_discarded()),
        ]
        .into_iter()
        .map(|(name, value)| counter(name, plugin, value))
        .collect()
    }

    /// Publishes the counters every second until `cancel` fires.
    pub async fn run(
        &self,
        plugin: &'static str,
        publisher: &dyn MetricPublisher,
        cancel: CancellationToken,
    ) {
        let mut ticker = tokio::time::interval(REPORT_INTERVAL);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        // The first tick completes immediately.
        ticker.tick().await;

        loop {
            tokio::select! {
                () = cancel.cancelled() => break,
                _ = ticker.tick() => {
                    for metric in self.metrics(plugin) {
                        publisher.publish_metric(metric);
                    }
                }
            }
        }
        debug!(plugin, "stopped reporting");
    }
}

fn counter(name: &str, plugin: &'static str, value: u64) -> Metric {
    #[allow(clippy::cast_precision_loss)]
    let value = value as f64;
    Metric {
        name: name.to_string(),
        time: 0.0,
        kind: MetricKind::Counter,
        interval: Duration::ZERO,
        value,
        label_keys: vec!["source".to_string(), "plugin".to_string()],
        label_values: vec!["SG".to_string(), plugin.to_string()],
    }
}

/// Producer side of the dispatch queue. Cheap to clone.
#[derive(Clone, Debug)]
pub struct DispatchQueue {
    tx: mpsc::Sender<Batch>,
}

impl DispatchQueue {
    /// Enqueues `batch`, waiting for space when the queue is full.
    pub async fn push(&self, batch: Batch) -> Result<(), DispatchError> {
        match self.tx.try_send(batch) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(batch)) => {
                debug!(
                    index = %batch.destination_key,
                    "dispatch queue full, waiting for the writer"
                );
                self.tx
                    .send(batch)
                    .await
                    .map_err(|_| DispatchError::QueueClosed)
            }
            Err(TrySendError::Closed(_)) => Err(DispatchError::QueueClosed),
        }
    }
}

/// Single consumer draining the dispatch queue into a [`BatchWriter`].
pub struct DispatchWorker {
    plugin: &'static str,
    rx: mpsc::Receiver<Batch>,
    writer: Arc<dyn BatchWriter>,
    bulk: bool,
    stats: Arc<AdapterStats>,
}

/// Creates a connected queue/worker pair with [`DISPATCH_QUEUE_CAPACITY`].
#[must_use]
pub fn channel(
    plugin: &'static str,
    writer: Arc<dyn BatchWriter>,
    bulk: bool,
    stats: Arc<AdapterStats>,
) -> (DispatchQueue, DispatchWorker) {
    with_capacity(plugin, writer, bulk, stats, DISPATCH_QUEUE_CAPACITY)
}

#[must_use]
pub fn with_capacity(
    plugin: &'static str,
    writer: Arc<dyn BatchWriter>,
    bulk: bool,
    stats: Arc<AdapterStats>,
    capacity: usize,
) -> (DispatchQueue, DispatchWorker) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    let worker = DispatchWorker {
        plugin,
        rx,
        writer,
        bulk,
        stats,
    };
    (DispatchQueue { tx }, worker)
}

impl DispatchWorker {
    /// Drains the queue until `cancel` fires or every producer is gone.
    pub async fn run(mut self, cancel: CancellationToken) {
        debug!(plugin = self.plugin, "dispatch worker started");

        loop {
            tokio::select! {
                biased;
                () = cancel.cancelled() => {
                    let dropped = self.close_and_drop();
                    if dropped > 0 {
                        warn!(plugin = self.plugin, dropped, "discarded queued batches on shutdown");
                    }
                    break;
                }
                batch = self.rx.recv() => match batch {
                    Some(batch) => self.dispatch(batch).await,
                    None => {
                        debug!(plugin = self.plugin, "dispatch queue closed by producers");
                        break;
                    }
                },
            }
        }

        info!(plugin = self.plugin, "exited");
    }

    async fn dispatch(&self, batch: Batch) {
        match self
            .writer
            .write(&batch.destination_key, &batch.records, self.bulk)
            .await
        {
            Ok(()) => {
                self.stats.batch_written();
                debug!(
                    plugin = self.plugin,
                    index = %batch.destination_key,
                    records = batch.len(),
                    "successfully indexed document(s)"
                );
            }
            Err(e) => {
                self.stats.batch_discarded();
                error!(
                    plugin = self.plugin,
                    index = %batch.destination_key,
                    records = ?batch.records,
                    error = %e,
                    "failed to index event - disregarding"
                );
            }
        }
    }

    fn close_and_drop(&mut self) -> usize {
        self.rx.close();
        let mut dropped = 0;
        while self.rx.try_recv().is_ok() {
            dropped += 1;
        }
        dropped
    }
}
