//! Running/finished table derivation: state filter, text filter, sort, cap.

use crate::types::{Job, JobState};
use chrono::{DateTime, Utc};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Rows rendered per table.
pub const DISPLAY_LIMIT: usize = 150;

/// Column a table is sorted by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SortKey {
    User,
    Name,
    Started,
    Finished,
    Duration,
    MapProgress,
    ReduceProgress,
    State,
    Cluster,
}

impl SortKey {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Name => "name",
            Self::Started => "started",
            Self::Finished => "finished",
            Self::Duration => "duration",
            Self::MapProgress => "map",
            Self::ReduceProgress => "reduce",
            Self::State => "state",
            Self::Cluster => "cluster",
        }
    }

    /// Compare two jobs on this column. Missing values sort first.
    pub fn compare(&self, a: &Job, b: &Job, now: DateTime<Utc>) -> Ordering {
        match self {
            Self::User => a.user.cmp(&b.user),
            Self::Name => a.name.cmp(&b.name),
            Self::Started => a.start_time.cmp(&b.start_time),
            Self::Finished => a.finish_time.cmp(&b.finish_time),
            Self::Duration => a.duration(now).cmp(&b.duration(now)),
            Self::MapProgress => a.maps.progress.sort_cmp(&b.maps.progress),
            Self::ReduceProgress => a.reduces.progress.sort_cmp(&b.reduces.progress),
            Self::State => a.state.as_str().cmp(b.state.as_str()),
            Self::Cluster => a.cluster.cmp(&b.cluster),
        }
    }
}

impl fmt::Display for SortKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Unknown sort column: {0}")]
pub struct UnknownSortKey(pub String);

impl FromStr for SortKey {
    type Err = UnknownSortKey;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "user" => Ok(Self::User),
            "name" => Ok(Self::Name),
            "started" | "start" => Ok(Self::Started),
            "finished" | "finish" => Ok(Self::Finished),
            "duration" => Ok(Self::Duration),
            "map" | "maps" => Ok(Self::MapProgress),
            "reduce" | "reduces" => Ok(Self::ReduceProgress),
            "state" => Ok(Self::State),
            "cluster" => Ok(Self::Cluster),
            _ => Err(UnknownSortKey(s.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SortDirection {
    Ascending,
    Descending,
}

/// Sort column and direction, written `"started"` or `"-started"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SortSpec {
    pub key: SortKey,
    pub direction: SortDirection,
}

impl SortSpec {
    pub fn ascending(key: SortKey) -> Self {
        Self {
            key,
            direction: SortDirection::Ascending,
        }
    }

    pub fn descending(key: SortKey) -> Self {
        Self {
            key,
            direction: SortDirection::Descending,
        }
    }

    fn compare(&self, a: &Job, b: &Job, now: DateTime<Utc>) -> Ordering {
        let ord = self.key.compare(a, b, now);
        match self.direction {
            SortDirection::Ascending => ord,
            SortDirection::Descending => ord.reverse(),
        }
    }
}

impl fmt::Display for SortSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.direction {
            SortDirection::Ascending => write!(f, "{}", self.key),
            SortDirection::Descending => write!(f, "-{}", self.key),
        }
    }
}

impl FromStr for SortSpec {
    type Err = UnknownSortKey;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        match s.strip_prefix('-') {
            Some(key) => Ok(Self::descending(key.parse()?)),
            None => Ok(Self::ascending(s.parse()?)),
        }
    }
}

/// What one table shows.
#[derive(Debug, Clone, PartialEq)]
pub struct ViewSpec {
    pub states: Vec<JobState>,
    /// Whitespace-separated tokens, all of which must match
    pub text_filter: Option<String>,
    pub sort: SortSpec,
    /// Rows returned; the total count ignores it
    pub limit: usize,
}

impl ViewSpec {
    pub fn new(states: impl Into<Vec<JobState>>) -> Self {
        Self {
            states: states.into(),
            text_filter: None,
            sort: SortSpec::descending(SortKey::Started),
            limit: DISPLAY_LIMIT,
        }
    }

    /// Active jobs, newest first.
    pub fn running() -> Self {
        Self::new(JobState::ACTIVE)
    }

    /// Finished jobs, most recently finished first.
    pub fn finished() -> Self {
        Self::new(JobState::FINISHED).with_sort(SortSpec::descending(SortKey::Finished))
    }

    pub fn with_filter(mut self, filter: impl Into<String>) -> Self {
        let filter = filter.into();
        self.text_filter = if filter.trim().is_empty() {
            None
        } else {
            Some(filter)
        };
        self
    }

    pub fn with_sort(mut self, sort: SortSpec) -> Self {
        self.sort = sort;
        self
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }
}

/// Rows for one table plus the untruncated match count.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct JobView {
    pub jobs: Vec<Job>,
    pub total_count: usize,
}

/// True if `search_string` contains every whitespace token of `filter`.
pub fn matches_text(search_string: &str, filter: &str) -> bool {
    let filter = filter.to_lowercase();
    filter
        .split_whitespace()
        .all(|token| search_string.contains(token))
}

/// Filter, sort and cap `jobs` for one table.
///
/// The sort is stable in both directions: descending order reverses the
/// comparator, so rows with equal keys keep their input order.
pub fn derive_view<'a>(
    jobs: impl IntoIterator<Item = &'a Job>,
    spec: &ViewSpec,
    now: DateTime<Utc>,
) -> JobView {
    let filter = spec.text_filter.as_deref().unwrap_or("");
    let mut rows: Vec<&Job> = jobs
        .into_iter()
        .filter(|j| spec.states.contains(&j.state))
        .filter(|j| matches_text(&j.search_string, filter))
        .collect();

    rows.sort_by(|a, b| spec.sort.compare(a, b, now));

    let total_count = rows.len();
    JobView {
        jobs: rows.into_iter().take(spec.limit).cloned().collect(),
        total_count,
    }
}

/// Totals shown in the navigation bar.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ClusterSummary {
    pub running_jobs: usize,
    pub running_maps: i64,
    pub running_reduces: i64,
}

impl ClusterSummary {
    /// Sum running tasks over jobs in the RUNNING state.
    pub fn from_jobs<'a>(jobs: impl IntoIterator<Item = &'a Job>) -> Self {
        jobs.into_iter()
            .filter(|j| j.state == JobState::Running)
            .fold(Self::default(), |acc, j| Self {
                running_jobs: acc.running_jobs + 1,
                running_maps: acc.running_maps + j.maps.running,
                running_reduces: acc.running_reduces + j.reduces.running,
            })
    }
}
