// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Raw JSON log line to [`Event`].
//!
//! Parsing is stateless per call. Required fields are looked up by their configured names and
//! removed from the field map (message and timestamp only); what remains becomes the label set.
//! The hostname stays in the labels.

use chrono::{DateTime, Datelike, NaiveDateTime, Utc};
use serde_json::Value;

use crate::error::ParseError;
use crate::event::{Event, EventKind, Fields};
use crate::logs::{severity, LogConfig};

/// Naive layouts tried when no explicit format is configured; read as UTC.
const NAIVE_FORMATS: [&str; 2] = ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"];

#[derive(Debug, Clone)]
pub struct LogParser {
    config: LogConfig,
}

impl LogParser {
    #[must_use]
    pub fn new(config: LogConfig) -> Self {
        LogParser { config }
    }

    #[must_use]
    pub fn config(&self) -> &LogConfig {
        &self.config
    }

    /// Parses one payload into a [`EventKind::Log`] event.
    pub fn parse(&self, payload: &[u8]) -> Result<Event, ParseError> {
        let mut fields: Fields = serde_json::from_slice(payload)
            .map_err(|e| ParseError::MalformedJson(e.to_string()))?;

        let message = string_field(&fields, &self.config.message_field)
            .ok_or_else(|| ParseError::MissingMessage(self.config.message_field.clone()))?
            .to_string();

        let severity = severity::from_field(
            string_field(&fields, &self.config.severity_field),
            self.config.correct_severity,
        );

        let hostname = string_field(&fields, &self.config.hostname_field)
            .ok_or_else(|| ParseError::MissingHostname(self.config.hostname_field.clone()))?
            .to_string();

        let raw_timestamp = string_field(&fields, &self.config.timestamp_field)
            .ok_or_else(|| ParseError::MissingTimestamp(self.config.timestamp_field.clone()))?;
        let timestamp = self.parse_timestamp(raw_timestamp).ok_or_else(|| {
            ParseError::InvalidTimestamp {
                field: self.config.timestamp_field.clone(),
                value: raw_timestamp.to_string(),
            }
        })?;

        let destination_key = format!(
            "{}-{}-{}-{}-{}",
            self.config.index_prefix,
            hostname,
            timestamp.year(),
            timestamp.month(),
            timestamp.day()
        );

        fields.remove(&self.config.message_field);
        fields.remove(&self.config.timestamp_field);

        #[allow(clippy::cast_precision_loss)]
        let timestamp_epoch = timestamp.timestamp() as f64;

        Ok(Event {
            destination_key,
            timestamp_epoch,
            kind: EventKind::Log,
            publisher: hostname,
            severity,
            labels: fields,
            annotations: Fields::new(),
            message,
        })
    }

    fn parse_timestamp(&self, raw: &str) -> Option<DateTime<Utc>> {
        let raw = raw.trim();
        if let Some(format) = &self.config.timestamp_format {
            return DateTime::parse_from_str(raw, format)
                .map(|t| t.with_timezone(&Utc))
                .ok()
                .or_else(|| {
                    NaiveDateTime::parse_from_str(raw, format)
                        .ok()
                        .map(|t| t.and_utc())
                });
        }

        DateTime::parse_from_rfc3339(raw)
            .or_else(|_| DateTime::parse_from_rfc2822(raw))
            .map(|t| t.with_timezone(&Utc))
            .ok()
            .or_else(|| {
                NAIVE_FORMATS
                    .iter()
                    .find_map(|format| NaiveDateTime::parse_from_str(raw, format).ok())
                    .map(|t| t.and_utc())
            })
    }
}

fn string_field<'a>(fields: &'a Fields, name: &str) -> Option<&'a str> {
    if name.is_empty() {
        return None;
    }
    match fields.get(name) {
        Some(Value::String(value)) => Some(value),
        _ => None,
    }
}
