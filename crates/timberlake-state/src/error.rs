//! Error taxonomy for the sync engine.
//!
//! None of these are fatal to the store: transport errors leave the model
//! stale, malformed records are dropped, action errors are shown to the user.

use thiserror::Error;
use timberlake_core::PayloadError;

/// A raw record that cannot be turned into a [`crate::Job`].
#[derive(Error, Debug)]
pub enum MalformedRecordError {
    #[error("Payload error: {0}")]
    Payload(#[from] PayloadError),
    #[error("Missing required field: {0}")]
    MissingField(&'static str),
    #[error("Unknown job state: {0}")]
    UnknownState(String),
}

/// Network or HTTP failure on one of the update channels.
#[derive(Error, Debug)]
pub enum TransportError {
    #[error("Request to {endpoint} failed: {message}")]
    Request { endpoint: String, message: String },
    #[error("{endpoint} returned HTTP {status}")]
    Status { endpoint: String, status: u16 },
    #[error("Failed to decode {endpoint} response: {message}")]
    Decode { endpoint: String, message: String },
    #[error("Event stream closed")]
    StreamClosed,
}

/// A user-triggered action that did not go through.
#[derive(Error, Debug)]
pub enum ActionError {
    #[error("Could not send kill request for {id}: {source}")]
    Transport {
        id: String,
        #[source]
        source: TransportError,
    },
    #[error("Kill request for {id} was rejected: {}", .stderr.as_deref().unwrap_or("no output"))]
    Rejected { id: String, stderr: Option<String> },
    #[error("Job is not active: {0}")]
    NotActive(String),
}

/// Failure to load a supplementary record (conf, counters, detail).
#[derive(Error, Debug)]
pub enum FetchError {
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error(transparent)]
    Malformed(#[from] MalformedRecordError),
}
