//! Client-side job state for timberlake.
//!
//! Normalizes tracker payloads into typed jobs, reconciles bulk snapshots
//! with streamed updates, and derives the list and detail views.

pub mod conf_cache;
pub mod detail;
pub mod error;
pub mod linkage;
pub mod normalize;
pub mod sample;
pub mod service;
pub mod source;
pub mod store;
pub mod types;
pub mod view;

pub use conf_cache::{
    ConfCache, ConfCountersRecord, JobConfRecord, normalize_conf, normalize_conf_counters,
};
pub use detail::{
    BytesSummary, DagNode, DetailLimits, ErrorGroup, JobDetailView, PhaseSummary, PreviousRun,
    RelatedGraph, ScaldingStep, TimelineBar, WaterfallBar, derive_detail, duration_series,
    error_groups, job_label, related_graph, related_timeline, scalding_steps, task_waterfall,
};
pub use error::{ActionError, FetchError, MalformedRecordError, TransportError};
pub use linkage::{
    InputSource, find_job_loose, link_by_file, previous_run, related_jobs, resolve_inputs,
};
pub use normalize::{clean_job_name, normalize, normalize_job, task_family};
pub use sample::sample;
pub use service::{SyncConfig, SyncService};
pub use source::{JobSource, JobStream};
pub use store::{BulkOutcome, JobStore, ModelListener, StoreConfig, SubscriptionId, TickReport};
pub use types::{
    Counter, Counters, Job, JobConf, JobState, JobTasks, PhaseProgress, Progress, Task,
    TaskAttempt, TaskKind, UnknownJobState,
};
pub use view::{
    ClusterSummary, DISPLAY_LIMIT, JobView, SortDirection, SortKey, SortSpec, UnknownSortKey,
    ViewSpec, derive_view, matches_text,
};
