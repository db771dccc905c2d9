// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Serialization of events into backend records.
//!
//! One event type yields structurally different records depending on [`EventKind`]:
//!
//! ```text
//!   EventKind::Event ─> {"event_type", "generated", "severity", "labels", "annotations"}
//!   EventKind::Log   ─> {"@timestamp", "labels" (annotations + labels, flat strings), "message"}
//!   other kinds      ─> not forwarded
//! ```
//!
//! Either a complete record is produced or a [`FormatError`] is returned; there is no partial
//! output.

use std::collections::BTreeMap;

use serde::Serialize;
use serde_json::Value;

use crate::error::FormatError;
use crate::event::{Event, EventKind, Fields};
use crate::time::{nanos_from_epoch, time_from_epoch};

/// Label key overwritten with the event's own severity in log records.
pub const SEVERITY_LABEL: &str = "severity";

#[derive(Debug, Serialize)]
struct EventRecord<'a> {
    event_type: &'static str,
    generated: String,
    severity: &'static str,
    labels: &'a Fields,
    annotations: &'a Fields,
}

#[derive(Debug, Serialize)]
struct LogRecord<'a> {
    #[serde(rename = "@timestamp")]
    timestamp: String,
    labels: BTreeMap<String, String>,
    message: &'a str,
}

/// A log line ready to be grouped into a Loki stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LokiEntry {
    pub labels: BTreeMap<String, String>,
    pub line: String,
    pub timestamp_ns: i64,
}

/// Formats `event` for a document store, or `None` for kinds that are not forwarded.
pub fn format_record(event: &Event) -> Result<Option<String>, FormatError> {
    match event.kind {
        EventKind::Event => format_event_record(event).map(Some),
        EventKind::Log => format_log_record(event).map(Some),
        EventKind::Task | EventKind::Error | EventKind::Result => Ok(None),
    }
}

/// Metric/event shape: labels and annotations are copied verbatim.
pub fn format_event_record(event: &Event) -> Result<String, FormatError> {
    let record = EventRecord {
        event_type: event.kind.as_str(),
        generated: time_from_epoch(event.timestamp_epoch),
        severity: event.severity.as_str(),
        labels: &event.labels,
        annotations: &event.annotations,
    };
    Ok(serde_json::to_string(&record)?)
}

/// Log shape: annotations and labels flattened into one string map, severity corrected.
pub fn format_log_record(event: &Event) -> Result<String, FormatError> {
    let record = LogRecord {
        timestamp: time_from_epoch(event.timestamp_epoch),
        labels: merged_labels(event),
        message: &event.message,
    };
    Ok(serde_json::to_string(&record)?)
}

#[must_use]
pub fn format_loki_entry(event: &Event) -> LokiEntry {
    LokiEntry {
        labels: merged_labels(event),
        line: event.message.clone(),
        timestamp_ns: nanos_from_epoch(event.timestamp_epoch),
    }
}

/// Annotations merged with labels (labels win on collision), then `severity` overwritten.
#[must_use]
pub fn merged_labels(event: &Event) -> BTreeMap<String, String> {
    let mut merged: BTreeMap<String, String> = event
        .annotations
        .iter()
        .chain(event.labels.iter())
        .map(|(key, value)| (key.clone(), stringify(value)))
        .collect();
    merged.insert(
        SEVERITY_LABEL.to_string(),
        event.severity.as_str().to_string(),
    );
    merged
}

fn stringify(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}
