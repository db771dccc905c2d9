// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! In-process bus between input handlers and output applications.
//!
//! # Architecture
//!
//! ```text
//! Handlers (many)           EventBus              Applications
//!     │                        │                        │
//!     ├─ publish_event ──────> │                        ├─ Elasticsearch
//!     ├─ publish_metric ─────> │ ──> mpsc(100) ──> run ─┼─ Loki
//!     └─ synthetic errors ───> │                        └─ ...
//! ```
//!
//! Publishing is fire-and-forget: a full bus drops the message and logs a warning, it never
//! stalls a handler. Delivery to applications is sequential, so an application that waits on
//! its own dispatch queue slows the whole bus down (backpressure stops here).

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

use crate::bus::constants::MAX_MESSAGES;
use crate::event::{Event, Metric};

mod constants;

/// Callback through which handlers emit events.
pub trait EventPublisher: Send + Sync {
    fn publish_event(&self, event: Event);
}

/// Callback through which handlers report their own counters.
pub trait MetricPublisher: Send + Sync {
    fn publish_metric(&self, metric: Metric);
}

/// An output adapter fed by the bus.
#[async_trait]
pub trait Application: Send + Sync {
    fn name(&self) -> &'static str;

    /// Consumes one event. May wait when the adapter's dispatch queue is full.
    async fn receive_event(&self, event: &Event);

    async fn receive_metric(&self, _metric: &Metric) {}
}

#[derive(Debug, Clone)]
pub enum BusMessage {
    Event(Event),
    Metric(Metric),
}

/// Cloneable publishing side of the bus.
#[derive(Clone, Debug)]
pub struct BusPublisher {
    tx: mpsc::Sender<BusMessage>,
}

impl BusPublisher {
    fn publish(&self, message: BusMessage) {
        match self.tx.try_send(message) {
            Ok(()) => {}
            Err(TrySendError::Full(message)) => {
                warn!(?message, "event bus full, dropping message");
            }
            Err(TrySendError::Closed(_)) => {
                debug!("event bus closed, dropping message");
            }
        }
    }
}

impl EventPublisher for BusPublisher {
    fn publish_event(&self, event: Event) {
        self.publish(BusMessage::Event(event));
    }
}

impl MetricPublisher for BusPublisher {
    fn publish_metric(&self, metric: Metric) {
        self.publish(BusMessage::Metric(metric));
    }
}

#[allow(clippy::module_name_repetitions)]
pub struct EventBus {
    rx: mpsc::Receiver<BusMessage>,
}

impl EventBus {
    /// Creates the bus and its publishing handle.
    #[must_use]
    #[allow(clippy::new_ret_no_self)]
    pub fn new() -> (EventBus, BusPublisher) {
        Self::with_capacity(MAX_MESSAGES)
    }

    #[must_use]
    pub fn with_capacity(capacity: usize) -> (EventBus, BusPublisher) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (EventBus { rx }, BusPublisher { tx })
    }

    /// Delivers every message to every application until cancelled or all publishers are gone.
    pub async fn run(mut self, applications: Vec<Arc<dyn Application>>, cancel: CancellationToken) {
        debug!(applications = applications.len(), "event bus started");

        loop {
            tokio::select! {
                biased;
                () = cancel.cancelled() => break,
                message = self.rx.recv() => match message {
                    Some(BusMessage::Event(event)) => {
                        trace!(index = %event.destination_key, kind = %event.kind, "delivering event");
                        for application in &applications {
                            application.receive_event(&event).await;
                        }
                    }
                    Some(BusMessage::Metric(metric)) => {
                        trace!(name = %metric.name, value = metric.value, "delivering metric");
                        for application in &applications {
                            application.receive_metric(&metric).await;
                        }
                    }
                    None => break,
                },
            }
        }

        debug!("event bus stopped");
    }
}
