//! Job-tracker payload types and decoding.

use serde::{Deserialize, Deserializer, Serialize};
use std::collections::HashMap;
use thiserror::Error;

/// Deserialize a field that may be null, defaulting to the type's default.
fn deserialize_nullable<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(|opt| opt.unwrap_or_default())
}

fn default_true() -> bool {
    true
}

/// One job as served by `/jobs/`, `/jobs/{id}` and the event stream.
///
/// The list endpoint only fills `details` (and sometimes `conf`); the
/// per-job endpoint and the stream also carry counters and tasks.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct RawJob {
    /// Cluster the job ran on (absent for single-cluster trackers)
    #[serde(default)]
    pub cluster: Option<String>,

    /// Job summary
    #[serde(default)]
    pub details: Option<RawJobDetail>,

    /// Named counters
    #[serde(default)]
    pub counters: Option<Vec<RawCounter>>,

    /// Task timings and error log
    #[serde(default)]
    pub tasks: Option<RawTasks>,

    /// Job configuration
    #[serde(default)]
    pub conf: Option<RawConf>,
}

/// Job summary fields.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RawJobDetail {
    #[serde(default, deserialize_with = "deserialize_nullable")]
    pub id: String,
    #[serde(default, deserialize_with = "deserialize_nullable")]
    pub name: String,
    #[serde(default, deserialize_with = "deserialize_nullable")]
    pub user: String,
    #[serde(default, deserialize_with = "deserialize_nullable")]
    pub state: String,

    /// Epoch milliseconds, 0 when unknown
    #[serde(default, deserialize_with = "deserialize_nullable")]
    pub start_time: i64,
    /// Epoch milliseconds, 0 while the job is active
    #[serde(default, deserialize_with = "deserialize_nullable")]
    pub finish_time: i64,

    #[serde(default, deserialize_with = "deserialize_nullable")]
    pub maps_total: i64,
    #[serde(default, deserialize_with = "deserialize_nullable")]
    pub map_progress: f64,
    #[serde(default, deserialize_with = "deserialize_nullable")]
    pub maps_completed: i64,
    #[serde(default, deserialize_with = "deserialize_nullable")]
    pub maps_pending: i64,
    #[serde(default, deserialize_with = "deserialize_nullable")]
    pub maps_running: i64,
    #[serde(default, rename = "failedMapAttempts", deserialize_with = "deserialize_nullable")]
    pub maps_failed: i64,
    #[serde(default, rename = "killedMapAttempts", deserialize_with = "deserialize_nullable")]
    pub maps_killed: i64,
    /// Cumulative map compute time in milliseconds
    #[serde(default, deserialize_with = "deserialize_nullable")]
    pub maps_total_time: i64,

    #[serde(default, deserialize_with = "deserialize_nullable")]
    pub reduces_total: i64,
    #[serde(default, deserialize_with = "deserialize_nullable")]
    pub reduce_progress: f64,
    #[serde(default, deserialize_with = "deserialize_nullable")]
    pub reduces_completed: i64,
    #[serde(default, deserialize_with = "deserialize_nullable")]
    pub reduces_pending: i64,
    #[serde(default, deserialize_with = "deserialize_nullable")]
    pub reduces_running: i64,
    #[serde(
        default,
        rename = "failedReduceAttempts",
        deserialize_with = "deserialize_nullable"
    )]
    pub reduces_failed: i64,
    #[serde(
        default,
        rename = "killedReduceAttempts",
        deserialize_with = "deserialize_nullable"
    )]
    pub reduces_killed: i64,
    /// Cumulative reduce compute time in milliseconds
    #[serde(default, deserialize_with = "deserialize_nullable")]
    pub reduces_total_time: i64,
}

/// A named counter split by phase.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct RawCounter {
    #[serde(default, deserialize_with = "deserialize_nullable")]
    pub name: String,
    #[serde(default)]
    pub total: Option<i64>,
    #[serde(default)]
    pub map: Option<i64>,
    #[serde(default)]
    pub reduce: Option<i64>,
}

/// Task timings as `[start, finish]` epoch-millisecond pairs.
///
/// A start of `-1` marks a placeholder task.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct RawTasks {
    #[serde(default, deserialize_with = "deserialize_nullable")]
    pub maps: Vec<Vec<i64>>,
    #[serde(default, deserialize_with = "deserialize_nullable")]
    pub reduces: Vec<Vec<i64>>,
    /// Error message to the attempts that failed with it
    #[serde(default, deserialize_with = "deserialize_nullable")]
    pub errors: HashMap<String, Vec<RawTaskAttempt>>,
}

/// A failed task attempt.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct RawTaskAttempt {
    #[serde(default, deserialize_with = "deserialize_nullable")]
    pub id: String,
    #[serde(default, deserialize_with = "deserialize_nullable")]
    pub hostname: String,
    #[serde(default, rename = "type", deserialize_with = "deserialize_nullable")]
    pub kind: String,
}

/// Job configuration as summarized by the tracker.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RawConf {
    #[serde(default, deserialize_with = "deserialize_nullable")]
    pub flags: HashMap<String, String>,
    /// Comma-separated input paths
    #[serde(default, deserialize_with = "deserialize_nullable")]
    pub input: String,
    /// Comma-separated output paths
    #[serde(default, deserialize_with = "deserialize_nullable")]
    pub output: String,
    #[serde(default, deserialize_with = "deserialize_nullable")]
    pub scalding_steps: String,
}

/// Response of the supplementary conf endpoint.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct RawJobConf {
    #[serde(default, deserialize_with = "deserialize_nullable")]
    pub id: String,
    #[serde(default, deserialize_with = "deserialize_nullable")]
    pub name: String,
    #[serde(default)]
    pub conf: RawConf,
}

/// Response of the supplementary conf + counters endpoint.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct RawConfCounters {
    #[serde(default, deserialize_with = "deserialize_nullable")]
    pub id: String,
    #[serde(default, deserialize_with = "deserialize_nullable")]
    pub name: String,
    #[serde(default)]
    pub conf: RawConf,
    #[serde(default, deserialize_with = "deserialize_nullable")]
    pub counters: Vec<RawCounter>,
}

/// Response of the kill endpoint.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RawKillResponse {
    #[serde(default = "default_true")]
    pub ok: bool,
    #[serde(default)]
    pub stderr: Option<String>,
}

#[derive(Error, Debug)]
pub enum PayloadError {
    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Expected a JSON array of jobs, got {0}")]
    NotAnArray(&'static str),
}

/// Decode one job record.
pub fn parse_job(value: serde_json::Value) -> Result<RawJob, PayloadError> {
    Ok(serde_json::from_value(value)?)
}

/// Split a list response body into individual untyped records.
///
/// Records are decoded one at a time later so a single bad entry cannot
/// fail the whole list.
pub fn decode_records(body: &str) -> Result<Vec<serde_json::Value>, PayloadError> {
    match serde_json::from_str(body)? {
        serde_json::Value::Array(records) => Ok(records),
        serde_json::Value::Null => Ok(vec![]),
        serde_json::Value::Object(_) => Err(PayloadError::NotAnArray("object")),
        serde_json::Value::String(_) => Err(PayloadError::NotAnArray("string")),
        serde_json::Value::Number(_) => Err(PayloadError::NotAnArray("number")),
        serde_json::Value::Bool(_) => Err(PayloadError::NotAnArray("bool")),
    }
}
