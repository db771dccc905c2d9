// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! JSON log intake: field extraction, severity classification and destination-key derivation.

pub mod handler;
pub mod parser;
pub mod severity;

use serde::{Deserialize, Serialize};
use serde_aux::prelude::deserialize_bool_from_anything;

pub use handler::LogHandler;
pub use parser::LogParser;

/// Default prefix of the per-host, per-day destination key.
pub const DEFAULT_INDEX_PREFIX: &str = "logs";

fn default_index_prefix() -> String {
    DEFAULT_INDEX_PREFIX.to_string()
}

/// Names of the JSON fields the parser reads, plus parsing knobs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
#[allow(clippy::module_name_repetitions)]
pub struct LogConfig {
    pub message_field: String,
    pub timestamp_field: String,
    pub hostname_field: String,
    /// Optional; an empty name means every log is [`crate::event::Severity::Unknown`].
    pub severity_field: String,
    /// Accept syslog level names (`"err"`, `"warning"`, ...) in addition to numeric codes.
    #[serde(deserialize_with = "deserialize_bool_from_anything")]
    pub correct_severity: bool,
    pub index_prefix: String,
    /// chrono format string for the timestamp field. RFC 3339, RFC 2822 and naive UTC forms
    /// are tried when unset.
    pub timestamp_format: Option<String>,
}

impl Default for LogConfig {
    fn default() -> Self {
        LogConfig {
            message_field: String::new(),
            timestamp_field: String::new(),
            hostname_field: String::new(),
            severity_field: String::new(),
            correct_severity: false,
            index_prefix: default_index_prefix(),
            timestamp_format: None,
        }
    }
}

impl LogConfig {
    /// Checks that every required field name is configured.
    pub fn validate(&self) -> Result<(), String> {
        for (name, value) in [
            ("message_field", &self.message_field),
            ("timestamp_field", &self.timestamp_field),
            ("hostname_field", &self.hostname_field),
        ] {
            if value.trim().is_empty() {
                return Err(format!("logs.{name} must not be empty"));
            }
        }
        if self.index_prefix.trim().is_empty() {
            return Err("logs.index_prefix must not be empty".to_string());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn configured() -> LogConfig {
        LogConfig {
            message_field: "msg".to_string(),
            timestamp_field: "ts".to_string(),
            hostname_field: "host".to_string(),
            ..LogConfig::default()
        }
    }

    #[test]
    fn test_default_prefix() {
        assert_eq!(LogConfig::default().index_prefix, "logs");
    }

    #[test]
    fn test_validate_requires_field_names() {
        assert!(configured().validate().is_ok());

        let mut config = configured();
        config.hostname_field = " ".to_string();
        assert_eq!(
            config.validate().unwrap_err(),
            "logs.hostname_field must not be empty"
        );

        assert!(LogConfig::default().validate().is_err());
    }

    #[test]
    fn test_correct_severity_accepts_strings() {
        let config: LogConfig =
            serde_json::from_value(serde_json::json!({"correct_severity": "true"})).unwrap();
        assert!(config.correct_severity);
        assert_eq!(config.index_prefix, "logs");
    }
}
