// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Log-aggregation output adapter. Forwards [`EventKind::Log`] events only.

pub mod client;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{debug, error, info};

use crate::bus::Application;
use crate::dispatch::{AdapterStats, DISPATCH_QUEUE_CAPACITY};
use crate::error::StartupError;
use crate::event::{Event, EventKind};
use crate::format::{format_loki_entry, LokiEntry};

pub use client::{LokiClient, LokiWorker};

pub const APP_NAME: &str = "loki";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LokiConfig {
    pub connection: String,
    /// Entries per push.
    pub batch_size: usize,
    /// Milliseconds a non-empty batch may wait before it is pushed anyway.
    pub max_wait_time: u64,
}

impl Default for LokiConfig {
    fn default() -> Self {
        LokiConfig {
            connection: String::new(),
            batch_size: 20,
            max_wait_time: 100,
        }
    }
}

impl LokiConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.connection.trim().is_empty() {
            return Err("loki.connection must not be empty".to_string());
        }
        if self.batch_size == 0 {
            return Err("loki.batch_size must be at least 1".to_string());
        }
        Ok(())
    }

    #[must_use]
    pub fn max_wait(&self) -> Duration {
        Duration::from_millis(self.max_wait_time)
    }
}

pub struct Loki {
    tx: mpsc::Sender<LokiEntry>,
    stats: Arc<AdapterStats>,
}

impl Loki {
    /// Creates the application and the channel its worker drains.
    #[must_use]
    #[allow(clippy::new_ret_no_self)]
    pub fn new() -> (Self, mpsc::Receiver<LokiEntry>) {
        let (tx, rx) = mpsc::channel(DISPATCH_QUEUE_CAPACITY);
        let app = Loki {
            tx,
            stats: Arc::new(AdapterStats::default()),
        };
        (app, rx)
    }

    #[must_use]
    pub fn stats(&self) -> &Arc<AdapterStats> {
        &self.stats
    }
}

/// Connects to Loki and builds the adapter with its worker.
pub async fn start(config: &LokiConfig) -> Result<(Loki, LokiWorker), StartupError> {
    config.validate().map_err(StartupError::Config)?;
    let client = LokiClient::connect(&config.connection).await?;
    info!(plugin = APP_NAME, url = %config.connection, "connected to loki");

    let (app, rx) = Loki::new();
    let worker = LokiWorker::new(
        rx,
        client,
        config.batch_size,
        config.max_wait(),
        Arc::clone(app.stats()),
    );
    Ok((app, worker))
}

#[async_trait]
impl Application for Loki {
    fn name(&self) -> &'static str {
        APP_NAME
    }

    async fn receive_event(&self, event: &Event) {
        if event.kind != EventKind::Log {
            debug!(
                plugin = APP_NAME,
                kind = %event.kind,
                index = %event.destination_key,
                "received event data (instead of log data) in event bus - disregarding"
            );
            return;
        }

        self.stats.record_formatted();
        if self.tx.send(format_loki_entry(event)).await.is_err() {
            self.stats.batch_discarded();
            error!(plugin = APP_NAME, "loki worker is gone, dropping log");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_defaults() {
        let config = LokiConfig::default();
        assert_eq!(config.batch_size, 20);
        assert_eq!(config.max_wait(), Duration::from_millis(100));
        assert_eq!(
            config.validate().unwrap_err(),
            "loki.connection must not be empty"
        );
    }

    #[tokio::test]
    async fn test_only_logs_are_forwarded() {
        let (app, mut rx) = Loki::new();

        app.receive_event(&Event::new("collectd", EventKind::Event)).await;
        let mut log = Event::new("logs-h1-2024-1-2", EventKind::Log);
        log.message = "hello".to_string();
        app.receive_event(&log).await;
        drop(app);

        let entry = rx.recv().await.unwrap();
        assert_eq!(entry.line, "hello");
        assert!(rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_start_fails_on_invalid_config() {
        assert!(matches!(
            start(&LokiConfig::default()).await,
            Err(StartupError::Config(_))
        ));
    }
}
