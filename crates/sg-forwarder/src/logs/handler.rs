// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Input adapter turning raw log payloads into bus events.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::bus::{EventPublisher, MetricPublisher};
use crate::error::ParseError;
use crate::event::{Event, EventKind, Fields, Metric, MetricKind, Severity};
use crate::logs::{LogConfig, LogParser};

/// Name of the self-reported counter of received payloads.
pub const TOTAL_LOGS_RECEIVED: &str = "sg_total_logs_received";

const REPORT_INTERVAL: Duration = Duration::from_secs(1);

#[derive(Debug)]
#[allow(clippy::module_name_repetitions)]
pub struct LogHandler {
    parser: LogParser,
    received: AtomicU64,
}

impl LogHandler {
    #[must_use]
    pub fn new(config: LogConfig) -> Self {
        LogHandler {
            parser: LogParser::new(config),
            received: AtomicU64::new(0),
        }
    }

    /// Destination key of the synthetic error events this handler emits.
    #[must_use]
    pub fn identify(&self) -> &'static str {
        "log"
    }

    #[must_use]
    pub fn total_received(&self) -> u64 {
        self.received.load(Ordering::Relaxed)
    }

    /// Parses `payload` and publishes the resulting event.
    ///
    /// Parse failures are returned to the caller. With `report_errors` they are also published as
    /// an [`EventKind::Error`] event so they end up next to the data they concern.
    pub fn handle(
        &self,
        payload: &[u8],
        report_errors: bool,
        publisher: &dyn EventPublisher,
    ) -> Result<(), ParseError> {
        self.received.fetch_add(1, Ordering::Relaxed);

        match self.parser.parse(payload) {
            Ok(event) => {
                publisher.publish_event(event);
                Ok(())
            }
            Err(e) => {
                warn!(
                    error = %e,
                    payload = %String::from_utf8_lossy(payload),
                    "failed to parse log - disregarding"
                );
                if report_errors {
                    publisher.publish_event(self.error_event(&e, payload));
                }
                Err(e)
            }
        }
    }

    /// Reports the received counter every second until cancelled.
    pub async fn run(&self, publisher: &dyn MetricPublisher, cancel: CancellationToken) {
        let mut ticker = tokio::time::interval(REPORT_INTERVAL);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        // The first tick completes immediately.
        ticker.tick().await;

        loop {
            tokio::select! {
                () = cancel.cancelled() => break,
                _ = ticker.tick() => publisher.publish_metric(self.received_metric()),
            }
        }
        debug!(handler = self.identify(), "stopped reporting");
    }

    fn received_metric(&self) -> Metric {
        #[allow(clippy::cast_precision_loss)]
        let value = self.total_received() as f64;
        Metric {
            name: TOTAL_LOGS_RECEIVED.to_string(),
            time: 0.0,
            kind: MetricKind::Counter,
            interval: Duration::ZERO,
            value,
            label_keys: vec!["source".to_string()],
            label_values: vec!["SG".to_string()],
        }
    }

    fn error_event(&self, error: &ParseError, payload: &[u8]) -> Event {
        let mut labels = Fields::new();
        labels.insert("error".to_string(), Value::from(error.to_string()));
        labels.insert(
            "context".to_string(),
            Value::from(String::from_utf8_lossy(payload).into_owned()),
        );
        labels.insert(
            "message".to_string(),
            Value::from("failed to parse log - disregarding"),
        );

        let mut annotations = Fields::new();
        annotations.insert(
            "description".to_string(),
            Value::from("internal log handler error"),
        );

        Event {
            severity: Severity::Critical,
            labels,
            annotations,
            ..Event::new(self.identify(), EventKind::Error)
        }
    }
}
