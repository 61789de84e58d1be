//! Raw job-tracker payloads for timberlake.
//!
//! This crate holds the wire shapes served by the job-tracker API, exactly as
//! they arrive. Nothing here is validated; timberlake-state normalizes these
//! into its typed model.

pub mod payload;

pub use payload::{
    PayloadError, RawConf, RawConfCounters, RawCounter, RawJob, RawJobConf, RawJobDetail,
    RawKillResponse, RawTaskAttempt, RawTasks, decode_records, parse_job,
};
