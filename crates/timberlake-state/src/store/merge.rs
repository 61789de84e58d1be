//! Merging bulk snapshots and buffered stream updates into the committed model.

use crate::types::Job;
use std::collections::{BTreeMap, HashMap};

/// Counts from one bulk merge.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BulkOutcome {
    /// Jobs the model did not know yet
    pub added: usize,
    /// Jobs already committed; the committed version was kept
    pub kept: usize,
    /// Records that failed normalization
    pub dropped: usize,
}

/// Merge a coarse bulk snapshot into the committed model.
///
/// Only unknown jobs are added. A job already committed may hold more detail
/// than the snapshot, so it keeps every field it has and only picks up
/// fields it lacks.
pub fn merge_bulk_jobs(committed: &mut BTreeMap<String, Job>, jobs: Vec<Job>) -> BulkOutcome {
    let mut outcome = BulkOutcome::default();
    for job in jobs {
        match committed.get_mut(&job.id) {
            Some(existing) => {
                existing.absorb_coarse(job);
                outcome.kept += 1;
            }
            None => {
                committed.insert(job.id.clone(), job);
                outcome.added += 1;
            }
        }
    }
    outcome
}

/// Flush buffered stream updates into the committed model.
///
/// Buffered updates are the most recent data and replace committed jobs
/// wholesale, except that an update without a conf keeps the committed one.
/// Returns the number of jobs written.
pub fn merge_streamed_jobs(
    committed: &mut BTreeMap<String, Job>,
    pending: HashMap<String, Job>,
) -> usize {
    let count = pending.len();
    for (id, mut update) in pending {
        if update.conf.is_none() {
            update.conf = committed.get_mut(&id).and_then(|previous| previous.conf.take());
        }
        committed.insert(id, update);
    }
    count
}
