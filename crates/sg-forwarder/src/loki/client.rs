// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Loki push API client and the batching worker in front of it.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::dispatch::AdapterStats;
use crate::error::{DispatchError, StartupError};
use crate::format::LokiEntry;
use crate::http::{build_endpoint, Endpoint, TlsConfig, DEFAULT_TIMEOUT};
use crate::loki::APP_NAME;

const PUSH_PATH: [&str; 4] = ["loki", "api", "v1", "push"];
const READY_PATH: [&str; 1] = ["ready"];

#[derive(Debug, Serialize)]
struct PushRequest<'a> {
    streams: Vec<Stream<'a>>,
}

#[derive(Debug, Serialize)]
struct Stream<'a> {
    stream: &'a BTreeMap<String, String>,
    /// `[timestamp_ns as string, line]` pairs.
    values: Vec<[String; 2]>,
}

#[derive(Debug, Clone)]
pub struct LokiClient {
    endpoint: Endpoint,
}

impl LokiClient {
    pub async fn connect(connection: &str) -> Result<Self, StartupError> {
        let endpoint = build_endpoint(connection, &TlsConfig::default(), DEFAULT_TIMEOUT).await?;
        let client = LokiClient { endpoint };

        let url = client.endpoint.url(&READY_PATH).map_err(|e| StartupError::Config(e.to_string()))?;
        let response = client
            .endpoint
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| StartupError::Connection {
                endpoint: connection.to_string(),
                reason: e.to_string(),
            })?;
        if !response.status().is_success() {
            return Err(StartupError::Connection {
                endpoint: connection.to_string(),
                reason: format!("not ready: {}", response.status()),
            });
        }
        Ok(client)
    }

    /// Pushes `entries`, grouped into one stream per distinct label set.
    pub async fn push(&self, entries: &[LokiEntry]) -> Result<(), DispatchError> {
        let body = push_body(entries);
        let response = self
            .endpoint
            .client
            .post(self.endpoint.url(&PUSH_PATH)?)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }
        let body = response.text().await?;
        Err(DispatchError::Status { status, body })
    }
}

fn push_body(entries: &[LokiEntry]) -> PushRequest<'_> {
    let mut streams: BTreeMap<&BTreeMap<String, String>, Vec<[String; 2]>> = BTreeMap::new();
    for entry in entries {
        streams
            .entry(&entry.labels)
            .or_default()
            .push([entry.timestamp_ns.to_string(), entry.line.clone()]);
    }
    PushRequest {
        streams: streams
            .into_iter()
            .map(|(stream, values)| Stream { stream, values })
            .collect(),
    }
}

/// Single consumer batching entries into pushes by size or age.
pub struct LokiWorker {
    rx: mpsc::Receiver<LokiEntry>,
    client: LokiClient,
    batch_size: usize,
    max_wait: Duration,
    stats: Arc<AdapterStats>,
}

impl LokiWorker {
    #[must_use]
    pub fn new(
        rx: mpsc::Receiver<LokiEntry>,
        client: LokiClient,
        batch_size: usize,
        max_wait: Duration,
        stats: Arc<AdapterStats>,
    ) -> Self {
        LokiWorker {
            rx,
            client,
            batch_size: batch_size.max(1),
            max_wait,
            stats,
        }
    }

    pub async fn run(mut self, cancel: CancellationToken) {
        debug!(plugin = APP_NAME, "storing logs to loki.");
        let mut pending: Vec<LokiEntry> = Vec::with_capacity(self.batch_size);
        let mut deadline = Instant::now() + self.max_wait;

        loop {
            tokio::select! {
                biased;
                () = cancel.cancelled() => {
                    self.rx.close();
                    while let Ok(entry) = self.rx.try_recv() {
                        pending.push(entry);
                    }
                    break;
                }
                entry = self.rx.recv() => match entry {
                    Some(entry) => {
                        if pending.is_empty() {
                            deadline = Instant::now() + self.max_wait;
                        }
                        pending.push(entry);
                        if pending.len() >= self.batch_size {
                            self.flush(&mut pending).await;
                        }
                    }
                    None => break,
                },
                () = tokio::time::sleep_until(deadline), if !pending.is_empty() => {
                    self.flush(&mut pending).await;
                }
            }
        }

        self.flush(&mut pending).await;
        info!(plugin = APP_NAME, "exited");
    }

    async fn flush(&self, pending: &mut Vec<LokiEntry>) {
        if pending.is_empty() {
            return;
        }
        let entries = std::mem::take(pending);
        match self.client.push(&entries).await {
            Ok(()) => {
                self.stats.batch_written();
                debug!(plugin = APP_NAME, entries = entries.len(), "pushed logs");
            }
            Err(e) => {
                self.stats.batch_discarded();
                error!(
                    plugin = APP_NAME,
                    entries = entries.len(),
                    error = %e,
                    "failed to push logs - disregarding"
                );
            }
        }
    }
}
