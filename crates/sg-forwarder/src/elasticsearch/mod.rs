// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Document-store output adapter.
//!
//! ```text
//!   EventBus ─> receive_event ─> format_record ─> PerKeyBuffer ─(threshold)─> DispatchQueue
//!                                                                                  │
//!                                         ElasticClient::index <── DispatchWorker <┘
//! ```
//!
//! Only [`EventKind::Event`] and [`EventKind::Log`] events are stored; other kinds are ignored.

pub mod client;

use std::num::NonZeroUsize;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_aux::prelude::deserialize_bool_from_anything;
use tracing::{debug, error, info, warn};

use crate::buffer::PerKeyBuffer;
use crate::bus::Application;
use crate::dispatch::{self, AdapterStats, BatchWriter, DispatchQueue, DispatchWorker};
use crate::error::StartupError;
use crate::event::Event;
use crate::format::format_record;
use crate::http::TlsConfig;

pub use client::ElasticClient;

pub const APP_NAME: &str = "elasticsearch";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub host_url: String,
    #[serde(flatten)]
    pub tls: TlsConfig,
    #[serde(deserialize_with = "deserialize_bool_from_anything")]
    pub use_basic_auth: bool,
    pub user: String,
    pub password: String,
    /// Records accumulated per index before a write. 1 disables buffering.
    pub buffer_size: usize,
    #[serde(deserialize_with = "deserialize_bool_from_anything")]
    pub bulk_index: bool,
    /// Index patterns removed once at startup.
    pub reset_indices: Vec<String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        AppConfig {
            host_url: String::new(),
            tls: TlsConfig::default(),
            use_basic_auth: false,
            user: String::new(),
            password: String::new(),
            buffer_size: 1,
            bulk_index: false,
            reset_indices: Vec::new(),
        }
    }
}

impl AppConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.host_url.trim().is_empty() {
            return Err("elasticsearch.host_url must not be empty".to_string());
        }
        if self.buffer_size == 0 {
            return Err("elasticsearch.buffer_size must be at least 1".to_string());
        }
        Ok(())
    }

    /// True when credentials would travel in clear text.
    #[must_use]
    pub fn is_insecure(&self) -> bool {
        self.use_basic_auth && !self.tls.use_tls
    }
}

pub struct Elasticsearch {
    buffer: PerKeyBuffer,
    queue: DispatchQueue,
    stats: Arc<AdapterStats>,
}

impl Elasticsearch {
    /// Wires the application to `writer` through a fresh dispatch queue.
    ///
    /// The returned worker must be run for batches to reach the store.
    #[must_use]
    pub fn new(
        buffer_size: NonZeroUsize,
        bulk: bool,
        writer: Arc<dyn BatchWriter>,
    ) -> (Self, DispatchWorker) {
        let stats = Arc::new(AdapterStats::default());
        let (queue, worker) = dispatch::channel(APP_NAME, writer, bulk, Arc::clone(&stats));
        let app = Elasticsearch {
            buffer: PerKeyBuffer::new(buffer_size),
            queue,
            stats,
        };
        (app, worker)
    }

    #[must_use]
    pub fn stats(&self) -> &Arc<AdapterStats> {
        &self.stats
    }

    #[cfg(test)]
    fn pending_records(&self) -> usize {
        self.buffer.pending_records()
    }
}

/// Connects to the store, applies the optional index reset and builds the adapter.
///
/// Any error means the adapter must not run.
pub async fn start(config: &AppConfig) -> Result<(Elasticsearch, DispatchWorker), StartupError> {
    config.validate().map_err(StartupError::Config)?;
    let buffer_size = NonZeroUsize::new(config.buffer_size)
        .ok_or_else(|| StartupError::Config("buffer_size must be at least 1".to_string()))?;

    if config.is_insecure() {
        warn!(
            plugin = APP_NAME,
            "insecure: using basic authentication without TLS enabled"
        );
    }

    let client = ElasticClient::connect(config).await?;
    info!(
        plugin = APP_NAME,
        url = %config.host_url,
        "storing events and(or) logs to Elasticsearch."
    );

    if !config.reset_indices.is_empty() {
        client
            .delete_indices(&config.reset_indices)
            .await
            .map_err(|source| StartupError::ResetIndices {
                indices: config.reset_indices.clone(),
                source,
            })?;
        info!(plugin = APP_NAME, indices = ?config.reset_indices, "removed indices");
    }

    Ok(Elasticsearch::new(
        buffer_size,
        config.bulk_index,
        Arc::new(client),
    ))
}

#[async_trait]
impl Application for Elasticsearch {
    fn name(&self) -> &'static str {
        APP_NAME
    }

    async fn receive_event(&self, event: &Event) {
        let record = match format_record(event) {
            Ok(Some(record)) => record,
            Ok(None) => return,
            Err(e) => {
                self.stats.format_error();
                error!(plugin = APP_NAME, ?event, error = %e, "failed formatting record");
                return;
            }
        };
        self.stats.record_formatted();

        let Some(batch) = self.buffer.append(&event.destination_key, record) else {
            debug!(plugin = APP_NAME, index = %event.destination_key, "buffering record");
            return;
        };

        if let Err(e) = self.queue.push(batch).await {
            error!(
                plugin = APP_NAME,
                index = %event.destination_key,
                error = %e,
                "failed to queue batch - disregarding"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DispatchError;
    use crate::event::{EventKind, Severity};
    use std::sync::Mutex;
    use tokio_util::sync::CancellationToken;

    #[derive(Default)]
    struct Recorder {
        writes: Mutex<Vec<(String, usize)>>,
    }

    #[async_trait]
    impl BatchWriter for Recorder {
        async fn write(
            &self,
            destination_key: &str,
            records: &[String],
            _bulk: bool,
        ) -> Result<(), DispatchError> {
            self.writes
                .lock()
                .unwrap()
                .push((destination_key.to_string(), records.len()));
            Ok(())
        }
    }

    fn log(key: &str) -> Event {
        Event {
            severity: Severity::Info,
            message: "hello".to_string(),
            ..Event::new(key, EventKind::Log)
        }
    }

    #[test]
    fn test_config_defaults_and_validation() {
        let config = AppConfig::default();
        assert_eq!(config.buffer_size, 1);
        assert!(!config.bulk_index);
        assert!(config.validate().is_err());

        let config = AppConfig {
            host_url: "http://localhost:9200".to_string(),
            buffer_size: 0,
            ..AppConfig::default()
        };
        assert_eq!(
            config.validate().unwrap_err(),
            "elasticsearch.buffer_size must be at least 1"
        );
    }

    #[test]
    fn test_basic_auth_without_tls_is_insecure() {
        let mut config = AppConfig {
            use_basic_auth: true,
            ..AppConfig::default()
        };
        assert!(config.is_insecure());
        config.tls.use_tls = true;
        assert!(!config.is_insecure());
    }

    #[tokio::test]
    async fn test_buffers_until_threshold_then_dispatches() {
        let recorder = Arc::new(Recorder::default());
        let (app, worker) = Elasticsearch::new(NonZeroUsize::new(3).unwrap(), true, recorder.clone());

        for _ in 0..4 {
            app.receive_event(&log("logs-h1-2024-1-2")).await;
        }
        app.receive_event(&log("logs-h2-2024-1-2")).await;
        assert_eq!(app.pending_records(), 2);
        assert_eq!(app.stats().records_formatted(), 5);

        drop(app);
        worker.run(CancellationToken::new()).await;

        assert_eq!(
            *recorder.writes.lock().unwrap(),
            vec![("logs-h1-2024-1-2".to_string(), 3)]
        );
    }

    #[tokio::test]
    async fn test_ignores_kinds_that_are_not_stored() {
        let recorder = Arc::new(Recorder::default());
        let (app, worker) = Elasticsearch::new(NonZeroUsize::MIN, false, recorder.clone());

        for kind in [EventKind::Task, EventKind::Error, EventKind::Result] {
            app.receive_event(&Event::new("x", kind)).await;
        }
        app.receive_event(&Event::new("collectd", EventKind::Event)).await;
        assert_eq!(app.stats().records_formatted(), 1);

        drop(app);
        worker.run(CancellationToken::new()).await;
        assert_eq!(
            *recorder.writes.lock().unwrap(),
            vec![("collectd".to_string(), 1)]
        );
    }

    #[tokio::test]
    async fn test_start_fails_when_index_reset_fails() {
        let mut server = mockito::Server::new_async().await;
        server.mock("GET", "/").with_status(200).create_async().await;
        server
            .mock("DELETE", mockito::Matcher::Any)
            .with_status(500)
            .create_async()
            .await;

        let config = AppConfig {
            host_url: server.url(),
            reset_indices: vec!["logs-*".to_string()],
            ..AppConfig::default()
        };
        assert!(matches!(
            start(&config).await,
            Err(StartupError::ResetIndices { .. })
        ));
    }

    #[tokio::test]
    async fn test_start_fails_when_host_unreachable() {
        let config = AppConfig {
            host_url: "http://127.0.0.1:1".to_string(),
            ..AppConfig::default()
        };
        assert!(matches!(
            start(&config).await,
            Err(StartupError::Connection { .. })
        ));
    }
}
