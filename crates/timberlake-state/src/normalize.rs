//! Normalization of raw tracker payloads into the typed job model.
//!
//! This is the only place untyped external data enters the model. Every
//! record, coarse or detailed, goes through [`normalize`], so derived fields
//! (display name, family, search string) are always recomputed.

use crate::error::MalformedRecordError;
use crate::types::{
    Counter, Counters, Job, JobConf, JobState, JobTasks, PhaseProgress, Progress, Task,
    TaskAttempt,
};
use once_cell::sync::Lazy;
use regex::Regex;
use timberlake_core::{RawConf, RawCounter, RawJob, RawTasks, parse_job};
use timberlake_parsers::{canonical_job_id, non_empty_string, parse_epoch_millis, truncate_to_second};

/// Leading `[FAMILY/STEP]` tag.
static FAMILY_TAG: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\[(\w+)/\w+\]").expect("valid regex"));

/// Name tag stripped from display names.
static NAME_TAG: Lazy<Regex> = Lazy::new(|| Regex::new(r"\[[A-Z0-9/]+\]\s+").expect("valid regex"));

/// Dotted package path; only its last two segments are kept.
static PACKAGE_PATH: Lazy<Regex> = Lazy::new(|| Regex::new(r"(\w+\.)+(\w+)").expect("valid regex"));

/// Start value marking a placeholder task.
const BOGUS_TASK_START: i64 = -1;

/// Normalize one untyped record.
pub fn normalize(raw: serde_json::Value) -> Result<Job, MalformedRecordError> {
    normalize_job(parse_job(raw)?)
}

/// Normalize one decoded record.
pub fn normalize_job(raw: RawJob) -> Result<Job, MalformedRecordError> {
    let details = raw.details.ok_or(MalformedRecordError::MissingField("details"))?;

    let id = canonical_job_id(&details.id);
    if id.is_empty() {
        return Err(MalformedRecordError::MissingField("id"));
    }

    let state: JobState = details
        .state
        .parse()
        .map_err(|_| MalformedRecordError::UnknownState(details.state.clone()))?;

    let name = clean_job_name(&details.name);
    let cluster = raw.cluster.as_deref().and_then(non_empty_string);
    let search_string = search_string(&name, &details.user, &id, cluster.as_deref());

    let maps = phase_progress(
        details.map_progress,
        [
            details.maps_total,
            details.maps_completed,
            details.maps_pending,
            details.maps_running,
            details.maps_failed,
            details.maps_killed,
        ],
        details.maps_total_time,
    );
    let reduces = phase_progress(
        details.reduce_progress,
        [
            details.reduces_total,
            details.reduces_completed,
            details.reduces_pending,
            details.reduces_running,
            details.reduces_failed,
            details.reduces_killed,
        ],
        details.reduces_total_time,
    );

    Ok(Job {
        task_family: task_family(&details.name),
        full_name: details.name,
        name,
        id,
        state,
        start_time: parse_epoch_millis(details.start_time).map(truncate_to_second),
        finish_time: parse_epoch_millis(details.finish_time),
        user: details.user,
        cluster,
        search_string,
        maps,
        reduces,
        counters: raw.counters.map(normalize_counters).unwrap_or_default(),
        tasks: raw.tasks.map(normalize_tasks).unwrap_or_default(),
        conf: raw.conf.map(normalize_conf_fields),
    })
}

/// Display name: tag removed, dotted package path shortened.
pub fn clean_job_name(name: &str) -> String {
    let untagged = NAME_TAG.replace(name, "");
    PACKAGE_PATH.replace(&untagged, "${1}${2}").into_owned()
}

/// Family part of a leading `[FAMILY/STEP]` tag.
pub fn task_family(name: &str) -> Option<String> {
    FAMILY_TAG
        .captures(name)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

fn search_string(name: &str, user: &str, id: &str, cluster: Option<&str>) -> String {
    format!("{} {} {} {}", name, user, id, cluster.unwrap_or("")).to_lowercase()
}

/// `counts` is total, completed, pending, running, failed, killed.
fn phase_progress(server_progress: f64, counts: [i64; 6], total_time_ms: i64) -> PhaseProgress {
    let [total, completed, pending, running, failed, killed] = counts;

    let progress = if server_progress.is_finite() && server_progress != 0.0 {
        Progress::Percent(server_progress)
    } else if total == 0 {
        Progress::NotApplicable
    } else {
        Progress::Percent(100.0 * completed as f64 / total as f64)
    };

    PhaseProgress {
        progress,
        total,
        completed,
        pending,
        running,
        failed,
        killed,
        total_time_ms,
    }
}

pub(crate) fn normalize_counters(raw: Vec<RawCounter>) -> Counters {
    Counters::new(
        raw.into_iter()
            .filter(|c| !c.name.is_empty())
            .map(|c| Counter {
                name: c.name,
                map: c.map,
                reduce: c.reduce,
                total: c.total,
            }),
    )
}

fn normalize_task(pair: &[i64]) -> Task {
    let start = pair.first().copied().unwrap_or(0);
    let finish = pair.get(1).copied().unwrap_or(0);
    Task {
        start_time: parse_epoch_millis(start).map(truncate_to_second),
        finish_time: parse_epoch_millis(finish),
        bogus: start == BOGUS_TASK_START,
    }
}

fn normalize_tasks(raw: RawTasks) -> JobTasks {
    JobTasks {
        maps: raw.maps.iter().map(|p| normalize_task(p)).collect(),
        reduces: raw.reduces.iter().map(|p| normalize_task(p)).collect(),
        errors: raw
            .errors
            .into_iter()
            .map(|(message, attempts)| {
                let attempts = attempts
                    .into_iter()
                    .map(|a| TaskAttempt {
                        id: a.id,
                        hostname: a.hostname,
                        kind: a.kind,
                    })
                    .collect();
                (message, attempts)
            })
            .collect(),
    }
}

pub(crate) fn normalize_conf_fields(raw: RawConf) -> JobConf {
    JobConf {
        flags: raw.flags.into_iter().collect(),
        input: non_empty_string(&raw.input),
        output: non_empty_string(&raw.output),
        scalding_steps: non_empty_string(&raw.scalding_steps),
    }
}
