//! HTTP transport for timberlake.
//!
//! Talks to the dashboard server's JSON endpoints and reads its
//! server-sent-events stream of job updates.

pub mod client;
pub mod sse;

pub use client::{HttpJobSource, SseStream};
pub use sse::SseDecoder;
