//! Time parsing and formatting utilities.

use crate::bytes::format_number;
use chrono::{DateTime, Duration, TimeZone, Utc};

/// Parse an epoch-milliseconds timestamp as sent by the job tracker.
///
/// The tracker reports `0` (or omits the field) for "not yet", so zero and
/// negative values map to None.
pub fn parse_epoch_millis(ms: i64) -> Option<DateTime<Utc>> {
    if ms <= 0 {
        return None;
    }
    Utc.timestamp_millis_opt(ms).single()
}

/// Drop the sub-second part of a timestamp.
pub fn truncate_to_second(dt: DateTime<Utc>) -> DateTime<Utc> {
    DateTime::from_timestamp(dt.timestamp(), 0).unwrap_or(dt)
}

/// Format a timestamp as weekday and wall-clock time (e.g. "Mon 10:30:00").
pub fn format_clock(dt: DateTime<Utc>) -> String {
    dt.format("%a %H:%M:%S").to_string()
}

/// Format a duration as H:MM:SS with a thousands-separated hour count.
///
/// Negative durations are clamped to zero.
pub fn format_duration(d: Duration) -> String {
    let secs = d.num_seconds().max(0);
    let hours = secs / 3600;
    let mins = (secs % 3600) / 60;
    let secs = secs % 60;
    format!("{}:{:02}:{:02}", format_number(hours), mins, secs)
}

/// Format a duration in words ("42 seconds", "5 minutes", "2 hours 1 minute").
pub fn format_human(d: Duration) -> String {
    let total = d.num_seconds().max(0);
    let hours = total / 3600;
    let mins = (total % 3600) / 60;
    let secs = total % 60;

    if total < 60 {
        format!("{} {}", secs, plural(secs, "second"))
    } else if total < 3600 {
        format!("{} {}", mins, plural(mins, "minute"))
    } else {
        format!(
            "{} {} {} {}",
            format_number(hours),
            plural(hours, "hour"),
            mins,
            plural(mins, "minute")
        )
    }
}

/// Pluralize a unit word for a count.
pub fn plural(n: i64, word: &str) -> String {
    if n == 1 {
        word.to_string()
    } else {
        format!("{}s", word)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Timelike;

    #[test]
    fn test_parse_epoch_millis() {
        let dt = parse_epoch_millis(1_700_000_000_123).unwrap();
        assert_eq!(dt.timestamp(), 1_700_000_000);
        assert_eq!(dt.timestamp_subsec_millis(), 123);

        assert!(parse_epoch_millis(0).is_none());
        assert!(parse_epoch_millis(-1).is_none());
    }

    #[test]
    fn test_truncate_to_second() {
        let dt = parse_epoch_millis(1_700_000_000_999).unwrap();
        let truncated = truncate_to_second(dt);
        assert_eq!(truncated.nanosecond(), 0);
        assert_eq!(truncated.timestamp(), 1_700_000_000);
    }

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(Duration::seconds(0)), "0:00:00");
        assert_eq!(format_duration(Duration::seconds(3723)), "1:02:03");
        assert_eq!(format_duration(Duration::hours(1234)), "1,234:00:00");
        assert_eq!(format_duration(Duration::seconds(-5)), "0:00:00");
    }

    #[test]
    fn test_format_human() {
        assert_eq!(format_human(Duration::seconds(1)), "1 second");
        assert_eq!(format_human(Duration::seconds(42)), "42 seconds");
        assert_eq!(format_human(Duration::seconds(300)), "5 minutes");
        assert_eq!(format_human(Duration::seconds(7260)), "2 hours 1 minute");
    }

    #[test]
    fn test_format_clock() {
        // 2023-11-14T22:13:20Z was a Tuesday
        let dt = parse_epoch_millis(1_700_000_000_000).unwrap();
        assert_eq!(format_clock(dt), "Tue 22:13:20");
    }
}
