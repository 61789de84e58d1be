//! Typed job model shared by the store and the view layer.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use timberlake_parsers::split_paths;

/// Job lifecycle state as reported by the tracker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobState {
    /// Created in the resource manager, not yet submitted
    New,
    /// Being persisted by the resource manager
    NewSaving,
    /// Submitted, waiting to be accepted
    Submitted,
    /// Accepted by the resource manager, not yet running
    Accepted,
    /// Currently running
    Running,
    /// Finished successfully
    Succeeded,
    /// Killed by a user or admin
    Killed,
    /// Failed
    Failed,
    /// Tracker-side error
    Error,
    /// No longer known to the tracker
    Gone,
}

impl JobState {
    /// States shown in the running table.
    pub const ACTIVE: [JobState; 2] = [JobState::Running, JobState::Accepted];

    /// States shown in the finished table.
    pub const FINISHED: [JobState; 4] = [
        JobState::Succeeded,
        JobState::Killed,
        JobState::Failed,
        JobState::Error,
    ];

    /// States before the resource manager accepts the job.
    pub const PENDING: [JobState; 3] = [JobState::New, JobState::NewSaving, JobState::Submitted];

    /// Finished states that did not succeed.
    pub const FAILED: [JobState; 3] = [JobState::Failed, JobState::Killed, JobState::Error];

    pub fn is_active(&self) -> bool {
        Self::ACTIVE.contains(self)
    }

    pub fn is_finished(&self) -> bool {
        Self::FINISHED.contains(self)
    }

    pub fn is_failed(&self) -> bool {
        Self::FAILED.contains(self)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::New => "NEW",
            Self::NewSaving => "NEW_SAVING",
            Self::Submitted => "SUBMITTED",
            Self::Accepted => "ACCEPTED",
            Self::Running => "RUNNING",
            Self::Succeeded => "SUCCEEDED",
            Self::Killed => "KILLED",
            Self::Failed => "FAILED",
            Self::Error => "ERROR",
            Self::Gone => "GONE",
        }
    }

    pub fn symbol(&self) -> &'static str {
        match self {
            Self::New | Self::NewSaving | Self::Submitted => "○",
            Self::Accepted => "◐",
            Self::Running => "●",
            Self::Succeeded => "✓",
            Self::Killed => "⊘",
            Self::Failed | Self::Error => "✗",
            Self::Gone => "?",
        }
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when a state label is not one the dashboard knows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownJobState(pub String);

impl fmt::Display for UnknownJobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown job state {:?}", self.0)
    }
}

impl std::error::Error for UnknownJobState {}

impl FromStr for JobState {
    type Err = UnknownJobState;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "NEW" => Ok(Self::New),
            "NEW_SAVING" => Ok(Self::NewSaving),
            "SUBMITTED" => Ok(Self::Submitted),
            "ACCEPTED" => Ok(Self::Accepted),
            "RUNNING" => Ok(Self::Running),
            "SUCCEEDED" => Ok(Self::Succeeded),
            "KILLED" => Ok(Self::Killed),
            "FAILED" => Ok(Self::Failed),
            "ERROR" => Ok(Self::Error),
            "GONE" => Ok(Self::Gone),
            _ => Err(UnknownJobState(s.to_string())),
        }
    }
}

/// Phase completion, distinguishing "no tasks in this phase" from 0%.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Progress {
    Percent(f64),
    NotApplicable,
}

impl Progress {
    pub fn percent(&self) -> Option<f64> {
        match self {
            Self::Percent(p) => Some(*p),
            Self::NotApplicable => None,
        }
    }

    /// Total order used for sorting; not-applicable sorts first.
    pub fn sort_cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Self::NotApplicable, Self::NotApplicable) => Ordering::Equal,
            (Self::NotApplicable, Self::Percent(_)) => Ordering::Less,
            (Self::Percent(_), Self::NotApplicable) => Ordering::Greater,
            (Self::Percent(a), Self::Percent(b)) => a.total_cmp(b),
        }
    }
}

impl fmt::Display for Progress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Percent(p) => write!(f, "{:.0}%", p),
            Self::NotApplicable => f.write_str("n/a"),
        }
    }
}

/// Progress summary for the map or reduce phase.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhaseProgress {
    pub progress: Progress,
    pub total: i64,
    pub completed: i64,
    pub pending: i64,
    pub running: i64,
    pub failed: i64,
    pub killed: i64,
    /// Cumulative compute time in milliseconds
    pub total_time_ms: i64,
}

impl PhaseProgress {
    pub fn total_time(&self) -> Duration {
        Duration::milliseconds(self.total_time_ms)
    }
}

impl Default for PhaseProgress {
    fn default() -> Self {
        Self {
            progress: Progress::NotApplicable,
            total: 0,
            completed: 0,
            pending: 0,
            running: 0,
            failed: 0,
            killed: 0,
            total_time_ms: 0,
        }
    }
}

/// A named counter broken down by phase.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Counter {
    pub name: String,
    pub map: Option<i64>,
    pub reduce: Option<i64>,
    pub total: Option<i64>,
}

static EMPTY_COUNTER: Counter = Counter {
    name: String::new(),
    map: None,
    reduce: None,
    total: None,
};

/// Sparse counter map. Missing counters read as an empty record.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Counters(BTreeMap<String, Counter>);

impl Counters {
    pub fn new(counters: impl IntoIterator<Item = Counter>) -> Self {
        Self(counters.into_iter().map(|c| (c.name.clone(), c)).collect())
    }

    pub fn get(&self, name: &str) -> &Counter {
        self.0.get(name).unwrap_or(&EMPTY_COUNTER)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Counters in name order.
    pub fn iter(&self) -> impl Iterator<Item = &Counter> {
        self.0.values()
    }

    pub fn clear(&mut self) {
        self.0.clear();
    }
}

/// Which phase a task belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskKind {
    Map,
    Reduce,
}

/// One map or reduce task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    pub start_time: Option<DateTime<Utc>>,
    pub finish_time: Option<DateTime<Utc>>,
    /// Placeholder reported by the tracker; never shown in aggregates
    pub bogus: bool,
}

impl Task {
    /// Elapsed time, measured to `now` while the task is running.
    pub fn duration(&self, now: DateTime<Utc>) -> Duration {
        let start = self.start_time.unwrap_or(now);
        let finish = self.finish_time.unwrap_or(now);
        (finish - start).max(Duration::zero())
    }
}

/// A failed task attempt from the error log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskAttempt {
    pub id: String,
    pub hostname: String,
    pub kind: String,
}

/// Per-task detail of a job.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobTasks {
    pub maps: Vec<Task>,
    pub reduces: Vec<Task>,
    /// Error message to the attempts that failed with it
    pub errors: BTreeMap<String, Vec<TaskAttempt>>,
}

impl JobTasks {
    pub fn is_empty(&self) -> bool {
        self.maps.is_empty() && self.reduces.is_empty() && self.errors.is_empty()
    }
}

/// Job configuration summary.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobConf {
    pub flags: BTreeMap<String, String>,
    /// Comma-separated input paths
    pub input: Option<String>,
    /// Comma-separated output paths
    pub output: Option<String>,
    pub scalding_steps: Option<String>,
}

impl JobConf {
    pub fn inputs(&self) -> Vec<String> {
        self.input.as_deref().map(split_paths).unwrap_or_default()
    }

    pub fn outputs(&self) -> Vec<String> {
        self.output.as_deref().map(split_paths).unwrap_or_default()
    }
}

/// Canonical in-memory job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    /// Canonical id (`job_...`)
    pub id: String,

    /// Name exactly as reported
    pub full_name: String,

    /// Display name with the family tag and package prefix removed
    pub name: String,

    /// Pipeline step family parsed from the name tag
    pub task_family: Option<String>,

    pub state: JobState,

    pub start_time: Option<DateTime<Utc>>,

    /// None while the job is active
    pub finish_time: Option<DateTime<Utc>>,

    pub user: String,

    pub cluster: Option<String>,

    /// Lower-cased "name user id cluster", used by text filters
    pub search_string: String,

    pub maps: PhaseProgress,

    pub reduces: PhaseProgress,

    pub counters: Counters,

    pub tasks: JobTasks,

    /// Absent until the tracker sends it
    pub conf: Option<JobConf>,
}

impl Job {
    /// Elapsed time, measured to `now` while the job is active.
    pub fn duration(&self, now: DateTime<Utc>) -> Duration {
        let start = self.start_time.unwrap_or(now);
        let finish = self.finish_time.unwrap_or(now);
        (finish - start).max(Duration::zero())
    }

    pub fn is_finished(&self) -> bool {
        self.finish_time.is_some()
    }

    /// Drop per-task arrays, counters and conf flags.
    ///
    /// Identity, state, timing, progress summaries and the conf input/output
    /// paths survive so list views and the related-job graph still work.
    pub fn compact(&mut self) {
        self.tasks = JobTasks::default();
        self.counters.clear();
        if let Some(conf) = self.conf.as_mut() {
            conf.flags.clear();
        }
    }

    /// True if there is nothing left for `compact` to drop.
    pub fn is_compact(&self) -> bool {
        self.tasks.is_empty()
            && self.counters.is_empty()
            && self.conf.as_ref().is_none_or(|c| c.flags.is_empty())
    }

    /// Fill fields this job lacks from a coarser record of the same job.
    ///
    /// Fields already present are never overwritten.
    pub fn absorb_coarse(&mut self, coarse: Job) {
        if self.conf.is_none() {
            self.conf = coarse.conf;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn ts(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(secs, 0).unwrap()
    }

    fn job() -> Job {
        Job {
            id: "job_1".to_string(),
            full_name: "step".to_string(),
            name: "step".to_string(),
            task_family: None,
            state: JobState::Running,
            start_time: Some(ts(100)),
            finish_time: None,
            user: "alice".to_string(),
            cluster: None,
            search_string: "step alice job_1 ".to_string(),
            maps: PhaseProgress::default(),
            reduces: PhaseProgress::default(),
            counters: Counters::new([Counter {
                name: "task.map_records".to_string(),
                map: Some(5),
                reduce: None,
                total: Some(5),
            }]),
            tasks: JobTasks {
                maps: vec![Task {
                    start_time: Some(ts(100)),
                    finish_time: Some(ts(110)),
                    bogus: false,
                }],
                reduces: vec![],
                errors: BTreeMap::new(),
            },
            conf: Some(JobConf {
                flags: BTreeMap::from([("a".to_string(), "b".to_string())]),
                input: Some("/in".to_string()),
                output: Some("/out".to_string()),
                scalding_steps: None,
            }),
        }
    }

    #[test]
    fn test_state_classes() {
        assert!(JobState::Running.is_active());
        assert!(JobState::Accepted.is_active());
        assert!(JobState::Succeeded.is_finished());
        assert!(JobState::Killed.is_failed());
        assert!(!JobState::Succeeded.is_failed());
        assert!(!JobState::Gone.is_active());
        assert!(!JobState::Gone.is_finished());
        for state in JobState::PENDING {
            assert!(!state.is_active());
            assert!(!state.is_finished());
        }
    }

    #[test]
    fn test_state_from_str() {
        assert_eq!("RUNNING".parse::<JobState>(), Ok(JobState::Running));
        assert_eq!("succeeded".parse::<JobState>(), Ok(JobState::Succeeded));
        assert_eq!("NEW_SAVING".parse::<JobState>(), Ok(JobState::NewSaving));
        assert_eq!("submitted".parse::<JobState>(), Ok(JobState::Submitted));
        assert_eq!(JobState::NewSaving.as_str(), "NEW_SAVING");
        assert!("SLEEPING".parse::<JobState>().is_err());
    }

    #[test]
    fn test_missing_counter_is_empty() {
        let job = job();
        assert_eq!(job.counters.get("task.map_records").map, Some(5));
        let missing = job.counters.get("nope");
        assert_eq!(missing.map, None);
        assert_eq!(missing.total, None);
    }

    #[test]
    fn test_duration() {
        let mut job = job();
        assert_eq!(job.duration(ts(160)), Duration::seconds(60));
        job.finish_time = Some(ts(130));
        assert_eq!(job.duration(ts(1000)), Duration::seconds(30));
        assert!(job.is_finished());
    }

    #[test]
    fn test_task_duration_clamped() {
        let task = Task {
            start_time: Some(ts(200)),
            finish_time: Some(ts(100)),
            bogus: false,
        };
        assert_eq!(task.duration(ts(300)), Duration::zero());
    }

    #[test]
    fn test_compact_keeps_summary_fields() {
        let mut job = job();
        job.maps.running = 3;
        assert!(!job.is_compact());

        job.compact();

        assert!(job.is_compact());
        assert!(job.tasks.maps.is_empty());
        assert!(job.counters.is_empty());
        assert_eq!(job.id, "job_1");
        assert_eq!(job.state, JobState::Running);
        assert_eq!(job.start_time, Some(ts(100)));
        assert_eq!(job.maps.running, 3);
        let conf = job.conf.unwrap();
        assert!(conf.flags.is_empty());
        assert_eq!(conf.inputs(), vec!["/in"]);
        assert_eq!(conf.outputs(), vec!["/out"]);
    }

    #[test]
    fn test_absorb_coarse_never_overwrites() {
        let mut detailed = job();
        let mut coarse = job();
        coarse.tasks = JobTasks::default();
        coarse.conf = Some(JobConf::default());
        detailed.absorb_coarse(coarse.clone());
        assert_eq!(detailed.tasks.maps.len(), 1);
        assert_eq!(detailed.conf.as_ref().unwrap().inputs(), vec!["/in"]);

        detailed.conf = None;
        detailed.absorb_coarse(coarse);
        assert_eq!(detailed.conf, Some(JobConf::default()));
    }

    #[test]
    fn test_progress_sort_order() {
        let na = Progress::NotApplicable;
        let zero = Progress::Percent(0.0);
        let half = Progress::Percent(50.0);
        assert_eq!(na.sort_cmp(&zero), Ordering::Less);
        assert_eq!(half.sort_cmp(&zero), Ordering::Greater);
        assert_eq!(na.sort_cmp(&na), Ordering::Equal);
        assert_eq!(zero.percent(), Some(0.0));
        assert_eq!(na.percent(), None);
    }
}
