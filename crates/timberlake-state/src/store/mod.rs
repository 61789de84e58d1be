//! Update reconciliation store.
//!
//! Three unordered sources feed the store: a one-shot bulk snapshot, a
//! stream of per-job updates and a periodic tick. Stream updates are
//! buffered per job id (last write wins) and only become visible on the next
//! [`JobStore::tick`], which also runs retention and compaction and then
//! notifies subscribers. Bulk snapshots merge immediately but never replace
//! jobs the store already knows.

mod merge;
mod retention;

pub use merge::{BulkOutcome, merge_bulk_jobs, merge_streamed_jobs};
pub use retention::{compact_unfocused, evict_finished};

use crate::detail::{DetailLimits, JobDetailView, derive_detail};
use crate::linkage::find_job_loose;
use crate::normalize::normalize;
use crate::types::Job;
use crate::view::{ClusterSummary, JobView, ViewSpec, derive_view};
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, HashMap};
use timberlake_parsers::canonical_job_id;

/// Store settings.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Finished jobs kept after each tick
    pub retained_finished: usize,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            retained_finished: 5000,
        }
    }
}

/// Handle returned by [`JobStore::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

/// Callback receiving the committed model after every change.
pub type ModelListener = Box<dyn FnMut(&[Job]) + Send>;

/// What one tick did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickReport {
    pub merged: usize,
    pub evicted: usize,
    pub compacted: usize,
}

/// Committed job model plus the buffer of not-yet-flushed stream updates.
pub struct JobStore {
    config: StoreConfig,
    committed: BTreeMap<String, Job>,
    pending: HashMap<String, Job>,
    focused: Option<String>,
    listeners: Vec<(SubscriptionId, ModelListener)>,
    next_subscription: u64,
}

impl Default for JobStore {
    fn default() -> Self {
        Self::new(StoreConfig::default())
    }
}

impl std::fmt::Debug for JobStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JobStore")
            .field("config", &self.config)
            .field("committed", &self.committed.len())
            .field("pending", &self.pending.len())
            .field("focused", &self.focused)
            .field("listeners", &self.listeners.len())
            .finish()
    }
}

impl JobStore {
    pub fn new(config: StoreConfig) -> Self {
        Self {
            config,
            committed: BTreeMap::new(),
            pending: HashMap::new(),
            focused: None,
            listeners: Vec::new(),
            next_subscription: 0,
        }
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// Buffer one raw stream record. Malformed records are logged and
    /// dropped; returns whether the record was buffered.
    pub fn ingest_streamed(&mut self, raw: serde_json::Value) -> bool {
        match normalize(raw) {
            Ok(job) => {
                self.buffer_update(job);
                true
            }
            Err(e) => {
                tracing::warn!("Dropping malformed job update: {}", e);
                false
            }
        }
    }

    /// Buffer a normalized update, replacing any earlier one for the same id.
    pub fn buffer_update(&mut self, job: Job) {
        self.pending.insert(job.id.clone(), job);
    }

    /// Merge a raw bulk snapshot. Malformed entries are dropped one by one.
    pub fn ingest_bulk(&mut self, records: Vec<serde_json::Value>) -> BulkOutcome {
        let mut dropped = 0;
        let jobs: Vec<Job> = records
            .into_iter()
            .filter_map(|raw| match normalize(raw) {
                Ok(job) => Some(job),
                Err(e) => {
                    tracing::warn!("Dropping malformed job in bulk list: {}", e);
                    dropped += 1;
                    None
                }
            })
            .collect();

        let mut outcome = self.apply_bulk(jobs);
        outcome.dropped = dropped;
        outcome
    }

    /// Merge normalized bulk jobs and notify subscribers.
    pub fn apply_bulk(&mut self, jobs: Vec<Job>) -> BulkOutcome {
        let outcome = merge_bulk_jobs(&mut self.committed, jobs);
        tracing::debug!(
            "Bulk merge: {} added, {} already known",
            outcome.added,
            outcome.kept
        );
        self.notify();
        outcome
    }

    /// Flush buffered updates, then evict, compact and notify.
    pub fn tick(&mut self) -> TickReport {
        let pending = std::mem::take(&mut self.pending);
        let merged = merge_streamed_jobs(&mut self.committed, pending);

        let focused = self.focused.as_deref();
        let evicted = evict_finished(&mut self.committed, self.config.retained_finished, focused);
        let compacted = compact_unfocused(&mut self.committed, focused);

        let report = TickReport {
            merged,
            evicted,
            compacted,
        };
        if report != TickReport::default() {
            tracing::debug!(
                "Tick: {} merged, {} evicted, {} compacted",
                merged,
                evicted,
                compacted
            );
        }
        self.notify();
        report
    }

    /// Exempt a job from compaction and eviction. Only one job is focused.
    pub fn focus(&mut self, id: &str) {
        self.focused = Some(canonical_job_id(id));
    }

    pub fn unfocus(&mut self) {
        self.focused = None;
    }

    pub fn focused(&self) -> Option<&str> {
        self.focused.as_deref()
    }

    pub fn subscribe(&mut self, listener: ModelListener) -> SubscriptionId {
        let id = SubscriptionId(self.next_subscription);
        self.next_subscription += 1;
        self.listeners.push((id, listener));
        id
    }

    /// Returns false if the subscription was already gone.
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.listeners.len();
        self.listeners.retain(|(sid, _)| *sid != id);
        self.listeners.len() != before
    }

    fn notify(&mut self) {
        if self.listeners.is_empty() {
            return;
        }
        let snapshot = self.snapshot();
        for (_, listener) in self.listeners.iter_mut() {
            listener(&snapshot);
        }
    }

    /// Committed jobs in id order.
    pub fn snapshot(&self) -> Vec<Job> {
        self.committed.values().cloned().collect()
    }

    pub fn jobs(&self) -> impl Iterator<Item = &Job> {
        self.committed.values()
    }

    /// Look up a committed job by canonical id.
    pub fn get(&self, id: &str) -> Option<&Job> {
        self.committed.get(&canonical_job_id(id))
    }

    /// Look up a committed job ignoring the `application`/`job` prefix.
    pub fn find(&self, id: &str) -> Option<&Job> {
        self.get(id).or_else(|| find_job_loose(id, self.committed.values()))
    }

    pub fn len(&self) -> usize {
        self.committed.len()
    }

    pub fn is_empty(&self) -> bool {
        self.committed.is_empty()
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    pub fn view(&self, spec: &ViewSpec, now: DateTime<Utc>) -> JobView {
        derive_view(self.committed.values(), spec, now)
    }

    /// Filtered, sorted and capped list for one table.
    pub fn get_view(&self, spec: &ViewSpec) -> JobView {
        self.view(spec, Utc::now())
    }

    pub fn cluster_summary(&self) -> ClusterSummary {
        ClusterSummary::from_jobs(self.committed.values())
    }

    /// Detail page data for one job, if it is committed.
    pub fn detail(&self, id: &str, limits: &DetailLimits, now: DateTime<Utc>) -> Option<JobDetailView> {
        let job = self.find(id)?;
        Some(derive_detail(job, self.committed.values(), now, limits))
    }
}
