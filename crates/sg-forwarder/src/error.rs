// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Error taxonomy shared by the input and output adapters.
//!
//! Per-record and per-batch failures ([`FormatError`], [`ParseError`], [`DispatchError`]) are
//! contained where they happen: they are logged with their context and the offending record or
//! batch is dropped. Only [`StartupError`] aborts an adapter, and only before its main loop runs.

/// A formatted record could not be produced from an event.
#[derive(Debug, thiserror::Error)]
pub enum FormatError {
    #[error("failed to serialize record: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// A raw log payload could not be turned into an event.
///
/// Missing-field variants carry the configured field name so operators can tell which mapping
/// is wrong.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ParseError {
    #[error("malformed JSON: {0}")]
    MalformedJson(String),

    #[error("unable to find a log message under field called: {0}")]
    MissingMessage(String),

    #[error("unable to find the hostname under field called: {0}")]
    MissingHostname(String),

    #[error("unable to find the timestamp under field called: {0}")]
    MissingTimestamp(String),

    #[error("unable to parse timestamp {value:?} under field called: {field}")]
    InvalidTimestamp { field: String, value: String },
}

impl ParseError {
    /// Configured name of the field the error is about, if any.
    #[must_use]
    pub fn field(&self) -> Option<&str> {
        match self {
            ParseError::MalformedJson(_) => None,
            ParseError::MissingMessage(field)
            | ParseError::MissingHostname(field)
            | ParseError::MissingTimestamp(field)
            | ParseError::InvalidTimestamp { field, .. } => Some(field),
        }
    }
}

/// A batch could not be written to (or handed towards) the backing store.
#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error("request to backing store failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("backing store answered {status}: {body}")]
    Status {
        status: reqwest::StatusCode,
        body: String,
    },

    #[error("backing store rejected {failed} of {total} records")]
    Rejected { failed: usize, total: usize },

    #[error("dispatch queue is closed")]
    QueueClosed,

    #[error("{0}")]
    Other(String),
}

/// An adapter could not be brought up; fatal to that adapter.
#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    #[error("failed to connect to {endpoint}: {reason}")]
    Connection { endpoint: String, reason: String },

    #[error("failed to build HTTP client: {0}")]
    Client(String),

    #[error("failed removing indices {indices:?}: {source}")]
    ResetIndices {
        indices: Vec<String>,
        #[source]
        source: DispatchError,
    },

    #[error("invalid configuration: {0}")]
    Config(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_error_names_configured_field() {
        let error = ParseError::MissingHostname("host".to_string());
        assert_eq!(error.field(), Some("host"));
        assert_eq!(
            error.to_string(),
            "unable to find the hostname under field called: host"
        );
    }

    #[test]
    fn test_malformed_json_has_no_field() {
        let error = ParseError::MalformedJson("EOF while parsing".to_string());
        assert_eq!(error.field(), None);
        assert!(error.to_string().starts_with("malformed JSON"));
    }

    #[test]
    fn test_startup_error_display() {
        let error = StartupError::ResetIndices {
            indices: vec!["logs-*".to_string()],
            source: DispatchError::Other("boom".to_string()),
        };
        assert_eq!(
            error.to_string(),
            "failed removing indices [\"logs-*\"]: boom"
        );
    }
}
