// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Epoch to RFC 3339 conversion used by every record shape.
//!
//! Upstream uses `0.0` to mean "timestamp unknown", so that exact value renders as the current
//! wall-clock time. An event genuinely stamped at the Unix epoch is indistinguishable from an
//! unstamped one.

use chrono::{DateTime, SecondsFormat, Utc};
use tracing::debug;

const NANOS_PER_SEC: i64 = 1_000_000_000;

/// Renders `epoch` (fractional seconds since the Unix epoch) as an RFC 3339 UTC timestamp.
///
/// Whole seconds render without a fraction; sub-second precision is kept when present, so a
/// rendered value parses back to within a millisecond of `epoch`. Do not truncate to seconds.
#[must_use]
#[allow(clippy::float_cmp)]
pub fn time_from_epoch(epoch: f64) -> String {
    if epoch == 0.0 {
        return Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true);
    }

    match datetime_from_epoch(epoch) {
        Some(time) => time.to_rfc3339_opts(SecondsFormat::AutoSi, true),
        None => {
            debug!("epoch {} is not representable, using current time", epoch);
            Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true)
        }
    }
}

/// Splits `epoch` into whole seconds and nanoseconds, keeping the nanosecond part positive.
#[allow(clippy::cast_possible_truncation)]
pub(crate) fn datetime_from_epoch(epoch: f64) -> Option<DateTime<Utc>> {
    if !epoch.is_finite() || epoch.abs() >= i64::MAX as f64 {
        return None;
    }
    let mut secs = epoch.trunc() as i64;
    let mut nanos = ((epoch - epoch.trunc()) * NANOS_PER_SEC as f64).round() as i64;
    if nanos < 0 {
        secs -= 1;
        nanos += NANOS_PER_SEC;
    }
    if nanos >= NANOS_PER_SEC {
        secs += 1;
        nanos -= NANOS_PER_SEC;
    }
    DateTime::from_timestamp(secs, u32::try_from(nanos).ok()?)
}

/// Nanoseconds since the Unix epoch, with the same `0.0` means "now" rule.
#[must_use]
#[allow(clippy::float_cmp)]
pub fn nanos_from_epoch(epoch: f64) -> i64 {
    let time = if epoch == 0.0 {
        None
    } else {
        datetime_from_epoch(epoch)
    };
    let time = time.unwrap_or_else(Utc::now);
    time.timestamp_nanos_opt()
        .unwrap_or_else(|| time.timestamp().saturating_mul(NANOS_PER_SEC))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(text: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(text)
            .expect("valid RFC 3339")
            .with_timezone(&Utc)
    }

    #[test]
    fn test_zero_means_now() {
        let before = Utc::now().timestamp();
        let rendered = time_from_epoch(0.0);
        let after = Utc::now().timestamp();

        let parsed = parse(&rendered).timestamp();
        assert!(parsed >= before && parsed <= after, "{rendered} not now");
        assert!(rendered.ends_with('Z'));
    }

    #[test]
    fn test_fractional_epoch_round_trips() {
        let rendered = time_from_epoch(1_700_000_000.5);
        let parsed = parse(&rendered);

        assert_eq!(parsed.timestamp(), 1_700_000_000);
        let millis = parsed.timestamp_millis();
        assert!((millis - 1_700_000_000_500).abs() <= 1, "{rendered}");
    }

    #[test]
    fn test_whole_epoch_has_second_precision() {
        assert_eq!(time_from_epoch(1_700_000_000.0), "2023-11-14T22:13:20Z");
    }

    #[test]
    fn test_negative_epoch_is_not_clamped() {
        let rendered = time_from_epoch(-1.25);
        let parsed = parse(&rendered);
        assert_eq!(parsed.timestamp_millis(), -1250);
        assert!(rendered.starts_with("1969-12-31T23:59:58"));
    }

    #[test]
    fn test_non_finite_epoch_falls_back_to_now() {
        let before = Utc::now().timestamp();
        let parsed = parse(&time_from_epoch(f64::NAN)).timestamp();
        assert!(parsed >= before);
    }

    #[test]
    fn test_nanos_from_epoch() {
        assert_eq!(nanos_from_epoch(1.5), 1_500_000_000);
        assert!(nanos_from_epoch(0.0) > 1_600_000_000 * NANOS_PER_SEC);
    }
}
