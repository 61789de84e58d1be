//! Cache for the supplementary conf and conf+counters records.
//!
//! These are fetched lazily, one job at a time, and never change once a job
//! has been submitted, so each is kept per canonical id.

use crate::error::MalformedRecordError;
use crate::normalize::{normalize_conf_fields, normalize_counters};
use crate::types::{Counters, JobConf};
use std::collections::HashMap;
use timberlake_core::{RawConfCounters, RawJobConf};
use timberlake_parsers::canonical_job_id;

/// Configuration of one job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobConfRecord {
    pub id: String,
    pub name: String,
    pub conf: JobConf,
}

/// Configuration and counters of one job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfCountersRecord {
    pub id: String,
    pub name: String,
    pub conf: JobConf,
    pub counters: Counters,
}

pub fn normalize_conf(raw: serde_json::Value) -> Result<JobConfRecord, MalformedRecordError> {
    let raw: RawJobConf = serde_json::from_value(raw).map_err(timberlake_core::PayloadError::from)?;
    let id = canonical_job_id(&raw.id);
    if id.is_empty() {
        return Err(MalformedRecordError::MissingField("id"));
    }
    Ok(JobConfRecord {
        id,
        name: raw.name,
        conf: normalize_conf_fields(raw.conf),
    })
}

pub fn normalize_conf_counters(
    raw: serde_json::Value,
) -> Result<ConfCountersRecord, MalformedRecordError> {
    let raw: RawConfCounters =
        serde_json::from_value(raw).map_err(timberlake_core::PayloadError::from)?;
    let id = canonical_job_id(&raw.id);
    if id.is_empty() {
        return Err(MalformedRecordError::MissingField("id"));
    }
    Ok(ConfCountersRecord {
        id,
        name: raw.name,
        conf: normalize_conf_fields(raw.conf),
        counters: normalize_counters(raw.counters),
    })
}

/// Independent per-id caches for the two supplementary records.
#[derive(Debug, Default)]
pub struct ConfCache {
    confs: HashMap<String, JobConfRecord>,
    conf_counters: HashMap<String, ConfCountersRecord>,
}

impl ConfCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn conf(&self, id: &str) -> Option<&JobConfRecord> {
        self.confs.get(&canonical_job_id(id))
    }

    pub fn conf_counters(&self, id: &str) -> Option<&ConfCountersRecord> {
        self.conf_counters.get(&canonical_job_id(id))
    }

    /// Cache a conf record under `id`, the id it was requested with.
    pub fn insert_conf(&mut self, id: &str, record: JobConfRecord) {
        self.confs.insert(canonical_job_id(id), record);
    }

    pub fn insert_conf_counters(&mut self, id: &str, record: ConfCountersRecord) {
        self.conf_counters.insert(canonical_job_id(id), record);
    }

    pub fn len(&self) -> usize {
        self.confs.len() + self.conf_counters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.confs.is_empty() && self.conf_counters.is_empty()
    }
}
