//! Where job data comes from.
//!
//! The sync service only talks to the tracker through [`JobSource`]; the
//! HTTP implementation lives in timberlake-http.

use crate::error::TransportError;
use std::future::Future;
use timberlake_core::RawKillResponse;

/// Push channel of untyped job records.
pub trait JobStream: Send {
    /// Next record, or `None` once the server closes the stream.
    fn next_record(
        &mut self,
    ) -> impl Future<Output = Result<Option<serde_json::Value>, TransportError>> + Send;
}

/// Job-tracker endpoints the dashboard consumes.
pub trait JobSource: Send + Sync + 'static {
    type Stream: JobStream + 'static;

    /// Coarse snapshot of every known job.
    fn fetch_job_list(
        &self,
    ) -> impl Future<Output = Result<Vec<serde_json::Value>, TransportError>> + Send;

    /// Full record of one job, with tasks, counters and conf.
    fn fetch_job_detail(
        &self,
        id: &str,
    ) -> impl Future<Output = Result<serde_json::Value, TransportError>> + Send;

    fn fetch_job_conf(
        &self,
        id: &str,
    ) -> impl Future<Output = Result<serde_json::Value, TransportError>> + Send;

    fn fetch_job_conf_counters(
        &self,
        id: &str,
    ) -> impl Future<Output = Result<serde_json::Value, TransportError>> + Send;

    fn kill_job(
        &self,
        id: &str,
    ) -> impl Future<Output = Result<RawKillResponse, TransportError>> + Send;

    /// Open the per-job update stream.
    fn subscribe_job_stream(
        &self,
    ) -> impl Future<Output = Result<Self::Stream, TransportError>> + Send;
}
