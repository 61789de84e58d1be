//! Memory bounds for the committed model: eviction of old finished jobs and
//! compaction of jobs nobody is looking at.

use crate::types::Job;
use std::collections::BTreeMap;

/// Keep at most `cap` finished jobs, dropping the oldest finishers first.
///
/// Active jobs and the focused job are never evicted, so the model may hold
/// more than `cap` finished jobs when the focused one is old. Returns the
/// number of jobs removed.
pub fn evict_finished(
    committed: &mut BTreeMap<String, Job>,
    cap: usize,
    focused: Option<&str>,
) -> usize {
    let mut finished: Vec<(chrono::DateTime<chrono::Utc>, String)> = committed
        .values()
        .filter(|j| Some(j.id.as_str()) != focused)
        .filter_map(|j| j.finish_time.map(|t| (t, j.id.clone())))
        .collect();

    if finished.len() <= cap {
        return 0;
    }

    finished.sort();
    let excess = finished.len() - cap;
    for (_, id) in finished.into_iter().take(excess) {
        committed.remove(&id);
    }
    excess
}

/// Compact every job except the focused one. Returns how many jobs shrank.
pub fn compact_unfocused(committed: &mut BTreeMap<String, Job>, focused: Option<&str>) -> usize {
    let mut compacted = 0;
    for job in committed.values_mut() {
        if Some(job.id.as_str()) == focused || job.is_compact() {
            continue;
        }
        job.compact();
        compacted += 1;
    }
    compacted
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Counters, JobState, JobTasks, PhaseProgress, Task};
    use chrono::{TimeZone, Utc};

    fn job(id: &str, finished_at: Option<i64>) -> Job {
        Job {
            id: id.to_string(),
            full_name: id.to_string(),
            name: id.to_string(),
            task_family: None,
            state: if finished_at.is_some() {
                JobState::Succeeded
            } else {
                JobState::Running
            },
            start_time: Some(Utc.timestamp_opt(0, 0).unwrap()),
            finish_time: finished_at.map(|s| Utc.timestamp_opt(s, 0).unwrap()),
            user: "alice".to_string(),
            cluster: None,
            search_string: id.to_string(),
            maps: PhaseProgress::default(),
            reduces: PhaseProgress::default(),
            counters: Counters::default(),
            tasks: JobTasks {
                maps: vec![Task {
                    start_time: None,
                    finish_time: None,
                    bogus: false,
                }],
                ..Default::default()
            },
            conf: None,
        }
    }

    fn model(jobs: Vec<Job>) -> BTreeMap<String, Job> {
        jobs.into_iter().map(|j| (j.id.clone(), j)).collect()
    }

    #[test]
    fn test_evict_keeps_most_recent_finished() {
        let mut committed = model(vec![
            job("job_a", Some(30)),
            job("job_b", Some(10)),
            job("job_c", Some(20)),
            job("job_d", Some(40)),
            job("job_run", None),
        ]);

        assert_eq!(evict_finished(&mut committed, 2, None), 2);

        let ids: Vec<&str> = committed.keys().map(String::as_str).collect();
        assert_eq!(ids, vec!["job_a", "job_d", "job_run"]);
    }

    #[test]
    fn test_evict_under_cap_is_noop() {
        let mut committed = model(vec![job("job_a", Some(1)), job("job_b", None)]);
        assert_eq!(evict_finished(&mut committed, 5, None), 0);
        assert_eq!(committed.len(), 2);
    }

    #[test]
    fn test_evict_never_removes_focused() {
        let mut committed = model(vec![
            job("job_old", Some(1)),
            job("job_a", Some(10)),
            job("job_b", Some(20)),
        ]);

        evict_finished(&mut committed, 1, Some("job_old"));

        let ids: Vec<&str> = committed.keys().map(String::as_str).collect();
        assert_eq!(ids, vec!["job_b", "job_old"]);
    }

    #[test]
    fn test_evict_bound_with_many_finished() {
        let cap = 50;
        let mut jobs: Vec<Job> = (0..cap as i64 + 7)
            .map(|i| job(&format!("job_{:04}", i), Some(i)))
            .collect();
        jobs.push(job("job_active", None));
        let mut committed = model(jobs);

        assert_eq!(evict_finished(&mut committed, cap, None), 7);
        assert_eq!(committed.values().filter(|j| j.is_finished()).count(), cap);
        assert!(committed.contains_key("job_active"));
        assert!(!committed.contains_key("job_0006"));
        assert!(committed.contains_key("job_0007"));
    }

    #[test]
    fn test_compact_unfocused() {
        let mut committed = model(vec![job("job_a", None), job("job_b", Some(5))]);

        assert_eq!(compact_unfocused(&mut committed, Some("job_a")), 1);
        assert_eq!(committed["job_a"].tasks.maps.len(), 1);
        assert!(committed["job_b"].tasks.maps.is_empty());

        // Already compact jobs are not counted again.
        assert_eq!(compact_unfocused(&mut committed, Some("job_a")), 0);
    }
}
