// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Normalized records exchanged over the bus.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Free-form key/value set carried by events as labels or annotations.
pub type Fields = Map<String, Value>;

/// What an [`Event`] describes. Output adapters pick their record shape from this.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventKind {
    /// Metric-like event (alarms, notifications, collectd events).
    Event,
    Log,
    Task,
    Error,
    Result,
}

impl EventKind {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::Event => "event",
            EventKind::Log => "log",
            EventKind::Task => "task",
            EventKind::Error => "error",
            EventKind::Result => "result",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Internal severity buckets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Severity {
    Critical,
    Warning,
    Info,
    #[default]
    Unknown,
}

impl Severity {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Critical => "CRITICAL",
            Severity::Warning => "WARNING",
            Severity::Info => "INFO",
            Severity::Unknown => "UNKNOWN",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A normalized unit of telemetry. Immutable once published.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    /// Logical target (index name) the formatted record is written under.
    pub destination_key: String,
    /// Seconds since the Unix epoch; `0.0` means "unknown, use now".
    pub timestamp_epoch: f64,
    pub kind: EventKind,
    pub publisher: String,
    pub severity: Severity,
    pub labels: Fields,
    pub annotations: Fields,
    pub message: String,
}

impl Event {
    #[must_use]
    pub fn new(destination_key: impl Into<String>, kind: EventKind) -> Self {
        Event {
            destination_key: destination_key.into(),
            timestamp_epoch: 0.0,
            kind,
            publisher: String::new(),
            severity: Severity::Unknown,
            labels: Fields::new(),
            annotations: Fields::new(),
            message: String::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetricKind {
    Counter,
    Gauge,
    Untyped,
}

/// Operational counter reported by an adapter about itself.
#[derive(Debug, Clone, PartialEq)]
pub struct Metric {
    pub name: String,
    /// Seconds since the Unix epoch; `0.0` lets the consumer stamp it.
    pub time: f64,
    pub kind: MetricKind,
    pub interval: Duration,
    pub value: f64,
    pub label_keys: Vec<String>,
    pub label_values: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_severity_strings() {
        assert_eq!(Severity::Critical.to_string(), "CRITICAL");
        assert_eq!(Severity::Warning.to_string(), "WARNING");
        assert_eq!(Severity::Info.to_string(), "INFO");
        assert_eq!(Severity::Unknown.to_string(), "UNKNOWN");
        assert_eq!(Severity::default(), Severity::Unknown);
    }

    #[test]
    fn test_event_kind_serializes_like_display() {
        for kind in [
            EventKind::Event,
            EventKind::Log,
            EventKind::Task,
            EventKind::Error,
            EventKind::Result,
        ] {
            let json = serde_json::to_string(&kind).unwrap();
            assert_eq!(json, format!("\"{kind}\""));
        }
    }

    #[test]
    fn test_new_event_defaults() {
        let event = Event::new("logs-h1-2024-1-2", EventKind::Log);
        assert_eq!(event.destination_key, "logs-h1-2024-1-2");
        assert_eq!(event.timestamp_epoch, 0.0);
        assert_eq!(event.severity, Severity::Unknown);
        assert!(event.labels.is_empty());
    }
}
