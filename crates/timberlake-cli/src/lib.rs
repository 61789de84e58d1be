//! CLI argument parsing for timberlake.

use clap::Parser;
use std::time::Duration;
use timberlake_state::{DetailLimits, SortSpec, StoreConfig, SyncConfig, ViewSpec};

#[derive(Parser, Debug)]
#[command(name = "timberlake")]
#[command(about = "Follow MapReduce jobs from a job-tracker dashboard server")]
pub struct Args {
    /// Dashboard server base URL
    #[arg(long, default_value = "http://localhost:9090")]
    pub url: String,

    /// Flush interval for streamed updates, in milliseconds
    #[arg(long, default_value = "1000")]
    pub flush_interval: u64,

    /// Finished jobs kept in memory
    #[arg(long, default_value = "5000")]
    pub retained: usize,

    /// Rows shown per table
    #[arg(long, default_value = "150")]
    pub display_limit: usize,

    /// Seconds to wait before reconnecting the update stream
    #[arg(long, default_value = "5")]
    pub retry_delay: u64,

    /// Only show jobs matching every word (name, user, id or cluster)
    #[arg(long, short)]
    pub filter: Option<String>,

    /// Running table sort, e.g. "-started" or "user"
    #[arg(long, default_value = "-started", allow_hyphen_values = true)]
    pub running_sort: SortSpec,

    /// Finished table sort
    #[arg(long, default_value = "-finished", allow_hyphen_values = true)]
    pub finished_sort: SortSpec,

    /// Show one job in detail instead of the tables
    #[arg(long, conflicts_with = "kill")]
    pub job: Option<String>,

    /// Ask the server to kill a job and exit
    #[arg(long)]
    pub kill: Option<String>,

    /// Print once after the job list loads and exit
    #[arg(long, conflicts_with = "watch_ticks")]
    pub once: bool,

    /// Number of flushes to follow before exiting (runs until Ctrl-C if unset)
    #[arg(long)]
    pub watch_ticks: Option<u64>,

    /// Debug logging
    #[arg(long, short)]
    pub verbose: bool,
}

impl Args {
    pub fn sync_config(&self) -> SyncConfig {
        SyncConfig {
            flush_interval: Duration::from_millis(self.flush_interval.max(1)),
            stream_retry_delay: Duration::from_secs(self.retry_delay),
            store: StoreConfig {
                retained_finished: self.retained,
            },
            display_limit: self.display_limit,
            detail_limits: DetailLimits::default(),
        }
    }

    pub fn running_view(&self) -> ViewSpec {
        self.with_filter(ViewSpec::running().with_sort(self.running_sort))
    }

    pub fn finished_view(&self) -> ViewSpec {
        self.with_filter(ViewSpec::finished().with_sort(self.finished_sort))
    }

    fn with_filter(&self, spec: ViewSpec) -> ViewSpec {
        let spec = spec.with_limit(self.display_limit);
        match &self.filter {
            Some(filter) => spec.with_filter(filter.as_str()),
            None => spec,
        }
    }

    /// Default log filter when `RUST_LOG` is unset.
    pub fn log_level(&self) -> &'static str {
        if self.verbose { "debug" } else { "info" }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use timberlake_state::{JobState, SortKey};

    #[test]
    fn test_defaults() {
        let args = Args::parse_from(["timberlake"]);
        let config = args.sync_config();
        assert_eq!(config.flush_interval, Duration::from_secs(1));
        assert_eq!(config.store.retained_finished, 5000);
        assert_eq!(config.display_limit, 150);

        let running = args.running_view();
        assert_eq!(running.states, JobState::ACTIVE.to_vec());
        assert_eq!(running.sort, SortSpec::descending(SortKey::Started));
        assert!(running.text_filter.is_none());

        let finished = args.finished_view();
        assert_eq!(finished.sort, SortSpec::descending(SortKey::Finished));
        assert_eq!(args.log_level(), "info");
    }

    #[test]
    fn test_overrides() {
        let args = Args::parse_from([
            "timberlake",
            "--url",
            "http://tracker:8080",
            "--filter",
            "alice prod",
            "--running-sort",
            "user",
            "--finished-sort",
            "-duration",
            "--display-limit",
            "20",
            "--verbose",
        ]);
        let running = args.running_view();
        assert_eq!(running.text_filter.as_deref(), Some("alice prod"));
        assert_eq!(running.sort, SortSpec::ascending(SortKey::User));
        assert_eq!(running.limit, 20);
        assert_eq!(
            args.finished_view().sort,
            SortSpec::descending(SortKey::Duration)
        );
        assert_eq!(args.log_level(), "debug");
    }

    #[test]
    fn test_rejects_bad_sort() {
        assert!(Args::try_parse_from(["timberlake", "--running-sort", "-bogus"]).is_err());
    }
}
