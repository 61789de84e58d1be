//! Detail page derivation for one job: task charts, related-job graph and
//! timeline, error log groups and counter summaries.

use crate::linkage::{InputSource, link_by_file, previous_run, related_jobs, resolve_inputs};
use crate::sample::sample;
use crate::types::{Job, PhaseProgress, Task, TaskAttempt, TaskKind};
use chrono::{DateTime, Duration, Utc};
use once_cell::sync::Lazy;
use regex::Regex;

/// Step number right after the step name, as in `"join (3/7)"`.
static STEP_LABEL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[^(]+\(([0-9]+)").expect("valid regex"));

static ANY_PAREN_NUMBER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\(([0-9]+)").expect("valid regex"));

/// Source position in a scalding step description.
static STEP_POSITION: Lazy<Regex> = Lazy::new(|| Regex::new(r"[\w.]+:\d+").expect("valid regex"));

/// Sample sizes for detail charts.
#[derive(Debug, Clone)]
pub struct DetailLimits {
    pub waterfall: usize,
    pub box_plot: usize,
}

impl Default for DetailLimits {
    fn default() -> Self {
        Self {
            waterfall: 400,
            box_plot: 100,
        }
    }
}

/// One bar of the task waterfall.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WaterfallBar {
    pub start: DateTime<Utc>,
    /// `now` for tasks still running
    pub finish: DateTime<Utc>,
    pub kind: TaskKind,
}

impl WaterfallBar {
    pub fn duration(&self) -> Duration {
        self.finish - self.start
    }
}

/// Map and reduce tasks as waterfall bars, sorted by start and sampled
/// down to `limit` keeping the longest task of each bucket.
pub fn task_waterfall(
    maps: &[Task],
    reduces: &[Task],
    now: DateTime<Utc>,
    limit: usize,
) -> Vec<WaterfallBar> {
    let tagged = maps
        .iter()
        .map(|t| (t, TaskKind::Map))
        .chain(reduces.iter().map(|t| (t, TaskKind::Reduce)));

    let mut bars: Vec<WaterfallBar> = tagged
        .filter(|(t, _)| !t.bogus)
        .filter_map(|(t, kind)| {
            Some(WaterfallBar {
                start: t.start_time?,
                finish: t.finish_time.unwrap_or(now),
                kind,
            })
        })
        .collect();

    bars.sort_by_key(|b| b.start);
    sample(&bars, limit, WaterfallBar::duration)
}

/// Sorted task durations for a box plot, sampled down to `limit`.
pub fn duration_series(tasks: &[Task], now: DateTime<Utc>, limit: usize) -> Vec<Duration> {
    let mut durations: Vec<Duration> = tasks
        .iter()
        .filter(|t| !t.bogus)
        .map(|t| t.duration(now))
        .collect();
    durations.sort();
    sample(&durations, limit, |d| *d)
}

/// Short label for a job in the related-job graph.
pub fn job_label(name: &str) -> String {
    STEP_LABEL
        .captures(name)
        .or_else(|| ANY_PAREN_NUMBER.captures(name))
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
        .unwrap_or_else(|| name.to_string())
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DagNode {
    pub id: String,
    pub label: String,
    /// The job the detail page is about
    pub selected: bool,
}

/// Sibling jobs linked by the files they share.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RelatedGraph {
    pub nodes: Vec<DagNode>,
    /// (producer id, consumer id)
    pub edges: Vec<(String, String)>,
}

pub fn related_graph(job: &Job, relatives: &[&Job]) -> RelatedGraph {
    RelatedGraph {
        nodes: relatives
            .iter()
            .map(|r| DagNode {
                id: r.id.clone(),
                label: job_label(&r.name),
                selected: r.id == job.id,
            })
            .collect(),
        edges: link_by_file(relatives.iter().copied()),
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimelineBar {
    pub id: String,
    pub name: String,
    pub start: DateTime<Utc>,
    /// `now` for jobs still running
    pub finish: DateTime<Utc>,
    pub selected: bool,
}

/// Start-ordered bars for the related-jobs chart; empty unless the job has
/// at least two relatives.
pub fn related_timeline(job: &Job, relatives: &[&Job], now: DateTime<Utc>) -> Vec<TimelineBar> {
    if relatives.len() < 2 {
        return Vec::new();
    }
    let mut bars: Vec<TimelineBar> = relatives
        .iter()
        .filter_map(|r| {
            Some(TimelineBar {
                id: r.id.clone(),
                name: r.name.clone(),
                start: r.start_time?,
                finish: r.finish_time.unwrap_or(now),
                selected: r.id == job.id,
            })
        })
        .collect();
    bars.sort_by_key(|b| b.start);
    bars
}

/// Task failures sharing one error message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorGroup {
    /// First line of the message
    pub headline: String,
    /// Remaining lines, usually a stack trace
    pub body: String,
    pub attempts: Vec<TaskAttempt>,
}

/// Error log grouped by message, most frequent first.
pub fn error_groups<'a>(
    errors: impl IntoIterator<Item = (&'a String, &'a Vec<TaskAttempt>)>,
) -> Vec<ErrorGroup> {
    let mut groups: Vec<ErrorGroup> = errors
        .into_iter()
        .map(|(message, attempts)| {
            let (headline, body) = message.split_once('\n').unwrap_or((message.as_str(), ""));
            ErrorGroup {
                headline: headline.to_string(),
                body: body.to_string(),
                attempts: attempts.clone(),
            }
        })
        .collect();
    groups.sort_by(|a, b| b.attempts.len().cmp(&a.attempts.len()));
    groups
}

/// Progress and throughput of one phase.
#[derive(Debug, Clone, PartialEq)]
pub struct PhaseSummary {
    pub progress: PhaseProgress,
    pub records: Option<i64>,
    /// Records over cumulative compute time
    pub records_per_sec: Option<i64>,
}

impl PhaseSummary {
    pub fn new(progress: &PhaseProgress, records: Option<i64>) -> Self {
        let secs = progress.total_time_ms as f64 / 1000.0;
        let records_per_sec = records
            .filter(|_| progress.total_time_ms > 0)
            .map(|r| (r as f64 / secs).floor() as i64);
        Self {
            progress: progress.clone(),
            records,
            records_per_sec,
        }
    }
}

/// Bytes moved by a job, from filesystem counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BytesSummary {
    pub hdfs_read: i64,
    pub s3_read: i64,
    pub file_read: i64,
    pub hdfs_written: i64,
    pub s3_written: i64,
    pub file_written: i64,
    pub shuffled: i64,
}

impl BytesSummary {
    pub fn from_job(job: &Job) -> Self {
        let c = &job.counters;
        Self {
            hdfs_read: c.get("hdfs.bytes_read").map.unwrap_or(0),
            s3_read: c.get("s3.bytes_read").map.unwrap_or(0),
            file_read: c.get("file.bytes_read").map.unwrap_or(0),
            hdfs_written: c.get("hdfs.bytes_written").total.unwrap_or(0),
            s3_written: c.get("s3.bytes_written").total.unwrap_or(0),
            file_written: c.get("file.bytes_written").total.unwrap_or(0),
            shuffled: c.get("hdfs.bytes_shuffled").reduce.unwrap_or(0),
        }
    }

    pub fn total_read(&self) -> i64 {
        self.hdfs_read + self.s3_read + self.file_read
    }

    pub fn total_written(&self) -> i64 {
        self.hdfs_written + self.s3_written + self.file_written
    }
}

/// One scalding step description.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScaldingStep {
    pub full: String,
    /// `file:line` position, or the full text if there is none
    pub short: String,
}

/// Split a comma-separated step description list, dropping duplicates.
pub fn scalding_steps(descriptions: &str) -> Vec<ScaldingStep> {
    let mut steps: Vec<ScaldingStep> = Vec::new();
    for part in descriptions.split(',') {
        let full = part.trim();
        if full.is_empty() {
            continue;
        }
        let short = STEP_POSITION
            .find(full)
            .map(|m| m.as_str())
            .unwrap_or(full);
        let step = ScaldingStep {
            full: full.to_string(),
            short: short.to_string(),
        };
        if !steps.contains(&step) {
            steps.push(step);
        }
    }
    steps
}

/// Earlier run of the same job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreviousRun {
    pub id: String,
    pub duration: Duration,
}

/// Everything the detail page shows beyond the job record itself.
#[derive(Debug, Clone, PartialEq)]
pub struct JobDetailView {
    pub job: Job,
    pub waterfall: Vec<WaterfallBar>,
    pub map_durations: Vec<Duration>,
    pub reduce_durations: Vec<Duration>,
    pub graph: RelatedGraph,
    pub timeline: Vec<TimelineBar>,
    pub inputs: Vec<InputSource>,
    pub previous: Option<PreviousRun>,
    pub errors: Vec<ErrorGroup>,
    pub map_summary: PhaseSummary,
    pub reduce_summary: PhaseSummary,
    pub bytes: BytesSummary,
    pub scalding_steps: Vec<ScaldingStep>,
}

/// Derive the detail page for `job` against the rest of the model.
pub fn derive_detail<'a>(
    job: &Job,
    all: impl IntoIterator<Item = &'a Job> + Clone,
    now: DateTime<Utc>,
    limits: &DetailLimits,
) -> JobDetailView {
    let relatives = related_jobs(job, all.clone());
    let tasks = &job.tasks;

    JobDetailView {
        waterfall: task_waterfall(&tasks.maps, &tasks.reduces, now, limits.waterfall),
        map_durations: duration_series(&tasks.maps, now, limits.box_plot),
        reduce_durations: duration_series(&tasks.reduces, now, limits.box_plot),
        graph: related_graph(job, &relatives),
        timeline: related_timeline(job, &relatives, now),
        inputs: resolve_inputs(job, relatives.iter().copied()),
        previous: previous_run(job, all).map(|p| PreviousRun {
            id: p.id.clone(),
            duration: p.duration(now),
        }),
        errors: error_groups(&tasks.errors),
        map_summary: PhaseSummary::new(&job.maps, job.counters.get("task.map_records").map),
        reduce_summary: PhaseSummary::new(
            &job.reduces,
            job.counters.get("task.reduce_records").reduce,
        ),
        bytes: BytesSummary::from_job(job),
        scalding_steps: job
            .conf
            .as_ref()
            .and_then(|c| c.scalding_steps.as_deref())
            .map(scalding_steps)
            .unwrap_or_default(),
        job: job.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::normalize::normalize;
    use chrono::TimeZone;
    use serde_json::json;

    fn ts(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(secs, 0).unwrap()
    }

    fn task(start: i64, finish: Option<i64>) -> Task {
        Task {
            start_time: Some(ts(start)),
            finish_time: finish.map(ts),
            bogus: false,
        }
    }

    fn bogus() -> Task {
        Task {
            start_time: None,
            finish_time: None,
            bogus: true,
        }
    }

    #[test]
    fn test_task_waterfall() {
        let maps = vec![task(30, Some(40)), bogus(), task(10, Some(20))];
        let reduces = vec![task(20, None)];
        let bars = task_waterfall(&maps, &reduces, ts(100), 400);

        assert_eq!(bars.len(), 3);
        assert_eq!(bars[0].start, ts(10));
        assert_eq!(bars[0].kind, TaskKind::Map);
        assert_eq!(bars[1].kind, TaskKind::Reduce);
        assert_eq!(bars[1].finish, ts(100));
        assert_eq!(bars[2].start, ts(30));
    }

    #[test]
    fn test_task_waterfall_sampled() {
        let maps: Vec<Task> = (0..1000).map(|i| task(i, Some(i + 1 + i % 7))).collect();
        let bars = task_waterfall(&maps, &[], ts(5000), 400);
        assert!(bars.len() <= 400);
        assert!(bars.windows(2).all(|w| w[0].start <= w[1].start));
    }

    #[test]
    fn test_duration_series_numeric_order() {
        let tasks = vec![task(0, Some(100)), task(0, Some(9)), bogus(), task(0, Some(20))];
        let durations = duration_series(&tasks, ts(1000), 100);
        assert_eq!(
            durations,
            vec![Duration::seconds(9), Duration::seconds(20), Duration::seconds(100)]
        );
    }

    #[test]
    fn test_job_label() {
        assert_eq!(job_label("join (3/7)"), "3");
        assert_eq!(job_label("(12/20) step"), "12");
        assert_eq!(job_label("wordcount"), "wordcount");
    }

    #[test]
    fn test_error_groups_most_frequent_first() {
        let attempt = |id: &str| TaskAttempt {
            id: id.to_string(),
            hostname: "h".to_string(),
            kind: "MAP".to_string(),
        };
        let errors = std::collections::BTreeMap::from([
            ("A rare error".to_string(), vec![attempt("1")]),
            (
                "B common\nat Foo.bar\nat Baz.qux".to_string(),
                vec![attempt("2"), attempt("3")],
            ),
        ]);

        let groups = error_groups(&errors);
        assert_eq!(groups[0].headline, "B common");
        assert_eq!(groups[0].body, "at Foo.bar\nat Baz.qux");
        assert_eq!(groups[0].attempts.len(), 2);
        assert_eq!(groups[1].headline, "A rare error");
        assert_eq!(groups[1].body, "");
    }

    #[test]
    fn test_phase_summary_records_per_sec() {
        let progress = PhaseProgress {
            total_time_ms: 4000,
            ..Default::default()
        };
        let summary = PhaseSummary::new(&progress, Some(10));
        assert_eq!(summary.records_per_sec, Some(2));

        let idle = PhaseSummary::new(&PhaseProgress::default(), Some(10));
        assert_eq!(idle.records_per_sec, None);
        assert_eq!(PhaseSummary::new(&progress, None).records_per_sec, None);
    }

    #[test]
    fn test_scalding_steps() {
        let steps = scalding_steps("Job.scala:12 map, Job.scala:40 join,Job.scala:12 map, plain step");
        assert_eq!(
            steps,
            vec![
                ScaldingStep {
                    full: "Job.scala:12 map".to_string(),
                    short: "Job.scala:12".to_string(),
                },
                ScaldingStep {
                    full: "Job.scala:40 join".to_string(),
                    short: "Job.scala:40".to_string(),
                },
                ScaldingStep {
                    full: "plain step".to_string(),
                    short: "plain step".to_string(),
                },
            ]
        );
    }

    fn pipeline_job(id: &str, step: &str, start: i64, input: &str, output: &str) -> Job {
        normalize(json!({
            "details": {
                "id": id,
                "name": format!("[PIPE/{}] com.example.Daily ({}/3)", step, step),
                "user": "alice",
                "state": "SUCCEEDED",
                "startTime": start * 1000,
                "finishTime": (start + 60) * 1000,
                "mapsTotal": 2,
                "mapsCompleted": 2,
                "mapsTotalTime": 2000
            },
            "counters": [
                {"name": "task.map_records", "map": 50},
                {"name": "hdfs.bytes_read", "map": 1024},
                {"name": "hdfs.bytes_written", "total": 2048},
                {"name": "hdfs.bytes_shuffled", "reduce": 512}
            ],
            "tasks": {"maps": [[start * 1000, (start + 5) * 1000], [-1, 0]], "reduces": []},
            "conf": {"input": input, "output": output, "scaldingSteps": "Daily.scala:3 read"}
        }))
        .unwrap()
    }

    #[test]
    fn test_derive_detail() {
        let one = pipeline_job("job_1", "1", 100, "/raw", "/stage");
        let two = pipeline_job("job_2", "2", 200, "/stage", "/final");
        let other = normalize(json!({
            "details": {"id": "job_9", "name": "unrelated", "user": "bob", "state": "RUNNING", "startTime": 50000}
        }))
        .unwrap();
        let mut rerun = pipeline_job("job_0", "2", 10, "", "");
        rerun.task_family = Some("OLD".to_string());
        rerun.full_name = "[OLD/2] com.example.Daily (2/3)".to_string();
        let all = vec![rerun, one.clone(), two.clone(), other];

        let detail = derive_detail(&two, &all, ts(1000), &DetailLimits::default());

        assert_eq!(detail.job.id, "job_2");
        assert_eq!(detail.waterfall.len(), 1);
        assert_eq!(detail.map_durations, vec![Duration::seconds(5)]);
        assert!(detail.reduce_durations.is_empty());

        let labels: Vec<&str> = detail.graph.nodes.iter().map(|n| n.label.as_str()).collect();
        assert_eq!(labels, vec!["1", "2"]);
        assert!(detail.graph.nodes[1].selected);
        assert_eq!(
            detail.graph.edges,
            vec![("job_1".to_string(), "job_2".to_string())]
        );

        assert_eq!(detail.timeline.len(), 2);
        assert_eq!(detail.timeline[0].id, "job_1");

        assert_eq!(
            detail.inputs,
            vec![InputSource::Job {
                id: "job_1".to_string(),
                name: one.name.clone(),
            }]
        );
        assert_eq!(
            detail.previous,
            Some(PreviousRun {
                id: "job_0".to_string(),
                duration: Duration::seconds(60),
            })
        );

        assert_eq!(detail.map_summary.records, Some(50));
        assert_eq!(detail.map_summary.records_per_sec, Some(25));
        assert_eq!(detail.reduce_summary.records, None);
        assert_eq!(detail.bytes.total_read(), 1024);
        assert_eq!(detail.bytes.total_written(), 2048);
        assert_eq!(detail.bytes.shuffled, 512);
        assert_eq!(detail.scalding_steps[0].short, "Daily.scala:3");
        assert!(detail.errors.is_empty());
    }

    #[test]
    fn test_timeline_needs_two_relatives() {
        let one = pipeline_job("job_1", "1", 100, "", "");
        assert!(related_timeline(&one, &[&one], ts(1000)).is_empty());
    }
}
