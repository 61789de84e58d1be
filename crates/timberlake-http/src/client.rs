//! [`JobSource`] over the dashboard server's HTTP API.

use crate::sse::SseDecoder;
use reqwest::{Client, Response};
use std::collections::VecDeque;
use std::time::Duration;
use timberlake_core::{RawKillResponse, decode_records};
use timberlake_state::{JobSource, JobStream, TransportError};

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Job source backed by `/jobs/`, `/jobs/{id}` and `/sse`.
#[derive(Debug, Clone)]
pub struct HttpJobSource {
    client: Client,
    base_url: String,
}

impl HttpJobSource {
    /// Source for the server at `base_url` (e.g. `http://localhost:9090`).
    pub fn new(base_url: impl Into<String>) -> Result<Self, TransportError> {
        let base_url = base_url.into();
        let client = Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .build()
            .map_err(|e| request_error(&base_url, e))?;
        Ok(Self::with_client(client, base_url))
    }

    pub fn with_client(client: Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn get(&self, path: &str) -> Result<Response, TransportError> {
        let response = self
            .client
            .get(self.url(path))
            .send()
            .await
            .map_err(|e| request_error(path, e))?;
        check_status(path, response)
    }

    async fn get_text(&self, path: &str) -> Result<String, TransportError> {
        self.get(path)
            .await?
            .text()
            .await
            .map_err(|e| request_error(path, e))
    }

    async fn get_json(&self, path: &str) -> Result<serde_json::Value, TransportError> {
        let body = self.get_text(path).await?;
        serde_json::from_str(&body).map_err(|e| TransportError::Decode {
            endpoint: path.to_string(),
            message: e.to_string(),
        })
    }
}

pub fn job_list_path() -> &'static str {
    "/jobs/"
}

pub fn job_path(id: &str) -> String {
    format!("/jobs/{}", id)
}

pub fn job_conf_path(id: &str) -> String {
    format!("/jobs/{}/conf", id)
}

pub fn job_counters_path(id: &str) -> String {
    format!("/jobs/{}/counters", id)
}

pub fn kill_path(id: &str) -> String {
    format!("/jobs/{}/kill", id)
}

pub fn stream_path() -> &'static str {
    "/sse"
}

fn request_error(endpoint: &str, e: reqwest::Error) -> TransportError {
    TransportError::Request {
        endpoint: endpoint.to_string(),
        message: e.to_string(),
    }
}

fn check_status(endpoint: &str, response: Response) -> Result<Response, TransportError> {
    let status = response.status();
    if status.is_success() {
        Ok(response)
    } else {
        Err(TransportError::Status {
            endpoint: endpoint.to_string(),
            status: status.as_u16(),
        })
    }
}

/// Interpret the kill endpoint's reply.
///
/// The server answers an accepted kill with an empty 2xx body and a failed
/// one with an error status; a JSON body, when present, is taken as is.
fn kill_response(status: u16, body: &str) -> RawKillResponse {
    let body = body.trim();
    if let Ok(parsed) = serde_json::from_str::<RawKillResponse>(body) {
        return parsed;
    }
    let ok = (200..300).contains(&status);
    let stderr = if ok {
        None
    } else if body.is_empty() {
        Some(format!("HTTP {}", status))
    } else {
        Some(body.to_string())
    };
    RawKillResponse { ok, stderr }
}

impl JobSource for HttpJobSource {
    type Stream = SseStream;

    async fn fetch_job_list(&self) -> Result<Vec<serde_json::Value>, TransportError> {
        let path = job_list_path();
        let body = self.get_text(path).await?;
        decode_records(&body).map_err(|e| TransportError::Decode {
            endpoint: path.to_string(),
            message: e.to_string(),
        })
    }

    async fn fetch_job_detail(&self, id: &str) -> Result<serde_json::Value, TransportError> {
        self.get_json(&job_path(id)).await
    }

    async fn fetch_job_conf(&self, id: &str) -> Result<serde_json::Value, TransportError> {
        self.get_json(&job_conf_path(id)).await
    }

    async fn fetch_job_conf_counters(&self, id: &str) -> Result<serde_json::Value, TransportError> {
        self.get_json(&job_counters_path(id)).await
    }

    async fn kill_job(&self, id: &str) -> Result<RawKillResponse, TransportError> {
        let path = kill_path(id);
        let response = self
            .client
            .post(self.url(&path))
            .send()
            .await
            .map_err(|e| request_error(&path, e))?;
        let status = response.status().as_u16();
        let body = response.text().await.map_err(|e| request_error(&path, e))?;
        tracing::debug!("Kill {} returned HTTP {}", id, status);
        Ok(kill_response(status, &body))
    }

    async fn subscribe_job_stream(&self) -> Result<SseStream, TransportError> {
        let path = stream_path();
        let response = self
            .client
            .get(self.url(path))
            .header(reqwest::header::ACCEPT, "text/event-stream")
            .send()
            .await
            .map_err(|e| request_error(path, e))?;
        Ok(SseStream::new(check_status(path, response)?))
    }
}

/// Job records read from an open `/sse` response.
#[derive(Debug)]
pub struct SseStream {
    response: Response,
    decoder: SseDecoder,
    ready: VecDeque<String>,
}

impl SseStream {
    fn new(response: Response) -> Self {
        Self {
            response,
            decoder: SseDecoder::new(),
            ready: VecDeque::new(),
        }
    }
}

impl JobStream for SseStream {
    async fn next_record(&mut self) -> Result<Option<serde_json::Value>, TransportError> {
        loop {
            while let Some(data) = self.ready.pop_front() {
                match serde_json::from_str(&data) {
                    Ok(record) => return Ok(Some(record)),
                    Err(e) => tracing::warn!("Skipping undecodable stream event: {}", e),
                }
            }

            let chunk = self
                .response
                .chunk()
                .await
                .map_err(|e| request_error(stream_path(), e))?;
            match chunk {
                Some(bytes) => self.ready.extend(self.decoder.push(&bytes)),
                None => return Ok(None),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_urls() {
        let source = HttpJobSource::with_client(Client::new(), "http://tracker:9090/");
        assert_eq!(source.base_url(), "http://tracker:9090");
        assert_eq!(source.url(job_list_path()), "http://tracker:9090/jobs/");
        assert_eq!(source.url(&job_path("job_1")), "http://tracker:9090/jobs/job_1");
        assert_eq!(source.url(&kill_path("job_1")), "http://tracker:9090/jobs/job_1/kill");
        assert_eq!(source.url(stream_path()), "http://tracker:9090/sse");
        assert_eq!(job_conf_path("job_1"), "/jobs/job_1/conf");
        assert_eq!(job_counters_path("job_1"), "/jobs/job_1/counters");
    }

    #[test]
    fn test_kill_response() {
        let accepted = kill_response(200, "");
        assert!(accepted.ok);
        assert!(accepted.stderr.is_none());

        let failed = kill_response(500, "");
        assert!(!failed.ok);
        assert_eq!(failed.stderr.as_deref(), Some("HTTP 500"));

        let with_text = kill_response(500, "user is not allowed\n");
        assert_eq!(with_text.stderr.as_deref(), Some("user is not allowed"));

        let json = kill_response(200, r#"{"ok": false, "stderr": "boom"}"#);
        assert!(!json.ok);
        assert_eq!(json.stderr.as_deref(), Some("boom"));
    }

    #[tokio::test]
    async fn test_unreachable_server_is_transport_error() {
        let source = HttpJobSource::new("http://127.0.0.1:1").unwrap();
        assert!(matches!(
            source.fetch_job_list().await,
            Err(TransportError::Request { .. })
        ));
    }
}
