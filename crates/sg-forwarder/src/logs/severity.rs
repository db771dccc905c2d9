// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Syslog-style severity codes collapsed into the internal [`Severity`] buckets.

use crate::event::Severity;

/// Bucket for each syslog ordinal 0..=7 (emerg .. debug).
const SYSLOG_TO_SEVERITY: [Severity; 8] = [
    Severity::Critical, // emerg
    Severity::Critical, // alert
    Severity::Critical, // crit
    Severity::Critical, // err
    Severity::Warning,  // warning
    Severity::Info,     // notice
    Severity::Info,     // info
    Severity::Info,     // debug
];

/// Syslog level names in ordinal order, with common aliases resolved in [`ordinal_from_name`].
const SYSLOG_NAMES: [&str; 8] = [
    "emerg", "alert", "crit", "err", "warning", "notice", "info", "debug",
];

/// Maps a syslog ordinal to its bucket. Anything outside `0..=7` is [`Severity::Unknown`].
#[must_use]
pub fn from_syslog(code: i64) -> Severity {
    usize::try_from(code)
        .ok()
        .and_then(|index| SYSLOG_TO_SEVERITY.get(index).copied())
        .unwrap_or(Severity::Unknown)
}

/// Resolves a textual syslog level (case-insensitive) to its ordinal.
#[must_use]
pub fn ordinal_from_name(name: &str) -> Option<i64> {
    let name = name.trim().to_ascii_lowercase();
    let canonical = match name.as_str() {
        "emergency" | "panic" => "emerg",
        "critical" => "crit",
        "error" => "err",
        "warn" => "warning",
        "informational" | "information" => "info",
        other => other,
    };
    SYSLOG_NAMES
        .iter()
        .position(|candidate| *candidate == canonical)
        .and_then(|ordinal| i64::try_from(ordinal).ok())
}

/// Best-effort severity from the raw field value. Never fails.
///
/// Numeric strings are honored as syslog ordinals. With `correct_names`, level names such as
/// `"err"` or `"warning"` are corrected to their ordinal first.
#[must_use]
pub fn from_field(value: Option<&str>, correct_names: bool) -> Severity {
    let Some(value) = value else {
        return Severity::Unknown;
    };
    if let Ok(code) = value.trim().parse::<i64>() {
        return from_syslog(code);
    }
    if correct_names {
        if let Some(code) = ordinal_from_name(value) {
            return from_syslog(code);
        }
    }
    Severity::Unknown
}
