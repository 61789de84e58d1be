//! Shared parsing utilities for job-tracker payloads.
//!
//! This crate provides the small helpers used both by timberlake-state when
//! normalizing raw records and by the timberlake binary when printing reports.

pub mod bytes;
pub mod paths;
pub mod time;

pub use bytes::{format_bytes, format_number};
pub use paths::{clean_job_path, split_paths};
pub use time::{
    format_clock, format_duration, format_human, parse_epoch_millis, plural, truncate_to_second,
};

/// Prefix the resource manager uses for application ids.
pub const APPLICATION_PREFIX: &str = "application_";

/// Prefix of canonical job ids.
pub const JOB_PREFIX: &str = "job_";

/// Filter helper for optional string fields.
/// Returns None if the string is empty or a placeholder value.
pub fn non_empty_string(s: &str) -> Option<String> {
    let trimmed = s.trim();
    if trimmed.is_empty() || trimmed == "-" || trimmed == "N/A" || trimmed == "undefined" {
        None
    } else {
        Some(trimmed.to_string())
    }
}

/// Canonical job id: the first `application_` becomes `job_`.
///
/// The list endpoint and the event stream may report the same job under
/// either prefix.
pub fn canonical_job_id(id: &str) -> String {
    id.trim().replacen(APPLICATION_PREFIX, JOB_PREFIX, 1)
}

/// Id with its leading `application`/`job` word removed.
///
/// Two ids that differ only in that word refer to the same job, so lookups
/// from user input compare loose ids.
pub fn loose_job_id(id: &str) -> String {
    let first = [("application", id.find("application")), ("job", id.find("job"))]
        .into_iter()
        .filter_map(|(word, pos)| pos.map(|p| (p, word.len())))
        .min_by_key(|(pos, _)| *pos);

    match first {
        Some((pos, len)) => format!("{}{}", &id[..pos], &id[pos + len..]),
        None => id.to_string(),
    }
}
