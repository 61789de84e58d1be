//! Plain-text rendering of job tables and the job detail page.

use chrono::{DateTime, Utc};
use timberlake_parsers::{
    clean_job_path, format_bytes, format_clock, format_duration, format_human, format_number,
};
use timberlake_state::{
    ClusterSummary, InputSource, Job, JobDetailView, JobView, PhaseSummary, SortSpec,
};

const NAME_WIDTH: usize = 60;

/// Cluster summary line shown above the tables. `waiting` counts jobs the
/// resource manager has not accepted yet.
pub fn summary_line(summary: &ClusterSummary, waiting: usize) -> String {
    let mut line = format!(
        "{} running jobs, {} maps, {} reduces",
        format_number(summary.running_jobs as i64),
        format_number(summary.running_maps),
        format_number(summary.running_reduces)
    );
    if waiting > 0 {
        line.push_str(&format!(", {} waiting", format_number(waiting as i64)));
    }
    line
}

/// One table row.
pub fn job_row(job: &Job, now: DateTime<Utc>) -> String {
    let started = job.start_time.map(format_clock).unwrap_or_else(|| "-".into());
    let cluster = job.cluster.as_deref().unwrap_or("-");
    format!(
        "{} {:<28} {:<12} {:<10} {:<12} {:>10} {:>5} {:>5}  {}",
        job.state.symbol(),
        job.id,
        truncate(&job.user, 12),
        truncate(cluster, 10),
        started,
        format_duration(job.duration(now)),
        job.maps.progress.to_string(),
        job.reduces.progress.to_string(),
        truncate(&job.name, NAME_WIDTH)
    )
}

/// A titled table of jobs with its "showing N of M" footer.
pub fn render_table(title: &str, sort: SortSpec, view: &JobView, now: DateTime<Utc>) -> String {
    let mut lines = vec![format!("{} (sorted by {})", title, sort)];
    if view.jobs.is_empty() {
        lines.push("  no jobs".to_string());
    }
    lines.extend(view.jobs.iter().map(|job| job_row(job, now)));
    let failed = view.jobs.iter().filter(|job| job.state.is_failed()).count();
    if failed > 0 {
        lines.push(format!(
            "  {} failed, see `timberlake --job <id>` for task errors",
            failed
        ));
    }
    if view.total_count > view.jobs.len() {
        lines.push(format!(
            "  showing {} of {}",
            view.jobs.len(),
            format_number(view.total_count as i64)
        ));
    }
    lines.join("\n")
}

/// Running and finished tables under the cluster summary.
pub fn render_tables(
    summary: (&ClusterSummary, usize),
    running: (SortSpec, &JobView),
    finished: (SortSpec, &JobView),
    now: DateTime<Utc>,
) -> String {
    [
        summary_line(summary.0, summary.1),
        render_table("Running", running.0, running.1, now),
        render_table("Finished", finished.0, finished.1, now),
    ]
    .join("\n\n")
}

fn phase_line(label: &str, phase: &PhaseSummary) -> String {
    let p = &phase.progress;
    let mut line = format!(
        "{:<8} {:>5}  {}/{} complete, {} running, {} pending, {} failed, {} killed",
        label,
        p.progress.to_string(),
        format_number(p.completed),
        format_number(p.total),
        format_number(p.running),
        format_number(p.pending),
        format_number(p.failed),
        format_number(p.killed)
    );
    if let Some(records) = phase.records {
        line.push_str(&format!(", {} records", format_number(records)));
    }
    if let Some(rate) = phase.records_per_sec {
        line.push_str(&format!(" ({}/s)", format_number(rate)));
    }
    line
}

fn bytes_or_dash(n: i64) -> String {
    format_bytes(n).unwrap_or_else(|| "-".into())
}

/// The detail page as text.
pub fn render_detail(detail: &JobDetailView, now: DateTime<Utc>) -> String {
    let job = &detail.job;
    let mut lines = vec![
        format!("{} {}", job.state.symbol(), job.full_name),
        format!("  id       {}", job.id),
        format!("  user     {}", job.user),
        format!("  state    {}", job.state),
    ];
    if let Some(cluster) = &job.cluster {
        lines.push(format!("  cluster  {}", cluster));
    }
    if let Some(start) = job.start_time {
        lines.push(format!("  started  {}", format_clock(start)));
    }
    if let Some(finish) = job.finish_time {
        lines.push(format!("  finished {}", format_clock(finish)));
    }
    lines.push(format!("  duration {}", format_human(job.duration(now))));
    if let Some(previous) = &detail.previous {
        lines.push(format!(
            "  previous {} took {}",
            previous.id,
            format_human(previous.duration)
        ));
    }

    lines.push(String::new());
    lines.push(phase_line("maps", &detail.map_summary));
    lines.push(phase_line("reduces", &detail.reduce_summary));

    let b = &detail.bytes;
    lines.push(format!(
        "bytes    read {} (hdfs {}, s3 {}, file {}), written {} (hdfs {}, s3 {}, file {}), shuffled {}",
        bytes_or_dash(b.total_read()),
        bytes_or_dash(b.hdfs_read),
        bytes_or_dash(b.s3_read),
        bytes_or_dash(b.file_read),
        bytes_or_dash(b.total_written()),
        bytes_or_dash(b.hdfs_written),
        bytes_or_dash(b.s3_written),
        bytes_or_dash(b.file_written),
        bytes_or_dash(b.shuffled)
    ));

    if !detail.inputs.is_empty() {
        lines.push(String::new());
        lines.push("Inputs".to_string());
        for input in &detail.inputs {
            lines.push(match input {
                InputSource::Job { id, name } => format!("  {} ({})", name, id),
                InputSource::Path(path) => format!("  {}", clean_job_path(path)),
            });
        }
    }
    if let Some(output) = job.conf.as_ref().and_then(|c| c.output.as_deref()) {
        lines.push(format!("Output   {}", clean_job_path(output)));
    }

    if detail.graph.nodes.len() > 1 {
        lines.push(String::new());
        lines.push(format!("Related jobs ({})", detail.graph.nodes.len()));
        for node in &detail.graph.nodes {
            let marker = if node.selected { "*" } else { " " };
            lines.push(format!(" {} {} {}", marker, node.label, node.id));
        }
        for (from, to) in &detail.graph.edges {
            lines.push(format!("   {} -> {}", from, to));
        }
    }

    if !detail.scalding_steps.is_empty() {
        lines.push(String::new());
        lines.push("Scalding steps".to_string());
        for step in &detail.scalding_steps {
            lines.push(format!("  {}", step.short));
        }
    }

    if !detail.errors.is_empty() {
        lines.push(String::new());
        lines.push("Errors".to_string());
        for group in &detail.errors {
            lines.push(format!("  {}x {}", group.attempts.len(), group.headline));
            for attempt in group.attempts.iter().take(3) {
                lines.push(format!("     {} on {}", attempt.id, attempt.hostname));
            }
        }
    }

    lines.join("\n")
}

fn truncate(s: &str, width: usize) -> String {
    if s.chars().count() <= width {
        s.to_string()
    } else {
        let mut out: String = s.chars().take(width.saturating_sub(1)).collect();
        out.push('…');
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use timberlake_state::{DetailLimits, JobState, SortKey, derive_detail, normalize};

    fn running_job() -> Job {
        normalize(json!({
            "cluster": "prod",
            "details": {
                "id": "job_1_0001",
                "name": "[ETL/A1] com.example.Daily (1/2)",
                "user": "alice",
                "state": "RUNNING",
                "startTime": 1700000000000i64,
                "finishTime": 0,
                "mapsTotal": 4,
                "mapsCompleted": 2,
                "mapsRunning": 2,
                "reducesTotal": 0,
                "mapsTotalTime": 4000
            },
            "counters": [
                {"name": "task.map_records", "map": 8000, "total": 8000},
                {"name": "hdfs.bytes_read", "map": 2097152, "total": 2097152}
            ],
            "tasks": {
                "maps": [[1700000000000i64, 1700000002000i64]],
                "reduces": [],
                "errors": {"java.io.IOException: lost\n\tat Foo": [
                    {"id": "attempt_1", "hostname": "node7", "type": "MAP"}
                ]}
            },
            "conf": {"input": "hdfs://nn.example:8020/in/a", "output": "/out/b", "flags": {}}
        }))
        .unwrap()
    }

    fn now() -> DateTime<Utc> {
        DateTime::from_timestamp(1_700_000_090, 0).unwrap()
    }

    #[test]
    fn test_summary_line() {
        let summary = ClusterSummary {
            running_jobs: 3,
            running_maps: 1200,
            running_reduces: 1,
        };
        assert_eq!(summary_line(&summary, 0), "3 running jobs, 1,200 maps, 1 reduces");
        assert_eq!(
            summary_line(&summary, 2),
            "3 running jobs, 1,200 maps, 1 reduces, 2 waiting"
        );
    }

    #[test]
    fn test_job_row() {
        let row = job_row(&running_job(), now());
        assert!(row.starts_with("● job_1_0001"));
        assert!(row.contains("alice"));
        assert!(row.contains("0:01:30"));
        assert!(row.contains("50%"));
        assert!(row.contains("n/a"));
        assert!(row.ends_with("Daily (1/2)"));
    }

    #[test]
    fn test_render_table_footer() {
        let job = running_job();
        let view = JobView {
            jobs: vec![job],
            total_count: 1500,
        };
        let text = render_table("Running", SortSpec::descending(SortKey::Started), &view, now());
        assert!(text.starts_with("Running (sorted by -started)"));
        assert!(text.ends_with("showing 1 of 1,500"));
        assert!(!text.contains("failed"));

        let mut failed = running_job();
        failed.state = JobState::Failed;
        let view = JobView {
            jobs: vec![failed, running_job()],
            total_count: 2,
        };
        let text = render_table("Finished", SortSpec::descending(SortKey::Finished), &view, now());
        assert!(text.ends_with("1 failed, see `timberlake --job <id>` for task errors"));

        let empty = JobView::default();
        let text = render_table("Finished", SortSpec::ascending(SortKey::User), &empty, now());
        assert!(text.contains("no jobs"));
        assert!(!text.contains("showing"));
    }

    #[test]
    fn test_render_detail() {
        let job = running_job();
        let detail = derive_detail(&job, [&job], now(), &DetailLimits::default());
        let text = render_detail(&detail, now());

        assert!(text.contains("duration 1 minute"));
        assert!(text.contains("2/4 complete"));
        assert!(text.contains("8,000 records (2,000/s)"));
        assert!(text.contains("read 2.0M"));
        assert!(text.contains("  /in/a"));
        assert!(text.contains("Output   /out/b"));
        assert!(text.contains("1x java.io.IOException: lost"));
        assert!(text.contains("attempt_1 on node7"));
        assert!(!text.contains("Related jobs"));
    }

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("abcdefghij", 5), "abcd…");
    }
}
