//! Client for a running sitereports server.
//!
//! Follows the NDJSON progress stream chunk by chunk, reassembling lines
//! that are split across reads.

use std::time::Duration;

use reqwest::StatusCode;
use thiserror::Error;
use tracing::{debug, warn};
use url::Url;

use crate::progress::{DecodeError, ProgressEvent, StatusLineDecoder};
use crate::scheduler::BulkRequest;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("Invalid server URL '{0}': {1}")]
    InvalidUrl(String, url::ParseError),
    #[error("Request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Server rejected the request ({status}): {message}")]
    Rejected { status: StatusCode, message: String },
}

/// Calls the download endpoints and reports each progress line.
pub struct ProgressClient {
    base: Url,
    http: reqwest::Client,
}

impl ProgressClient {
    pub fn new(base_url: &str) -> Result<Self, ClientError> {
        // Url::join drops the last path segment unless it ends with '/'
        let normalized = format!("{}/", base_url.trim_end_matches('/'));
        let base = Url::parse(&normalized)
            .map_err(|e| ClientError::InvalidUrl(base_url.to_string(), e))?;
        let http = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .build()?;
        Ok(Self { base, http })
    }

    fn endpoint(&self, path: &str) -> Result<Url, ClientError> {
        self.base
            .join(path)
            .map_err(|e| ClientError::InvalidUrl(path.to_string(), e))
    }

    /// Download one domain's report. Returns every status line received.
    pub async fn download<F>(&self, domain: &str, on_event: F) -> Result<Vec<ProgressEvent>, ClientError>
    where
        F: FnMut(&ProgressEvent),
    {
        let url = self.endpoint(&format!(
            "api/sites/{}/download-report",
            urlencoding::encode(domain)
        ))?;
        let response = self.http.get(url).send().await?;
        self.follow(response, on_event).await
    }

    /// Start a bulk download. Returns every status line received.
    pub async fn bulk<F>(&self, request: &BulkRequest, on_event: F) -> Result<Vec<ProgressEvent>, ClientError>
    where
        F: FnMut(&ProgressEvent),
    {
        let url = self.endpoint("api/sites/bulk-download")?;
        let response = self.http.post(url).json(request).send().await?;
        self.follow(response, on_event).await
    }

    async fn follow<F>(
        &self,
        mut response: reqwest::Response,
        mut on_event: F,
    ) -> Result<Vec<ProgressEvent>, ClientError>
    where
        F: FnMut(&ProgressEvent),
    {
        let status = response.status();
        if !status.is_success() {
            let message = response
                .json::<serde_json::Value>()
                .await
                .ok()
                .and_then(|v| v.get("error").and_then(|e| e.as_str()).map(String::from))
                .unwrap_or_else(|| status.to_string());
            return Err(ClientError::Rejected { status, message });
        }

        let mut decoder = StatusLineDecoder::new();
        let mut events = Vec::new();
        let mut handle = |result: Result<ProgressEvent, DecodeError>, events: &mut Vec<ProgressEvent>| match result {
            Ok(event) => {
                on_event(&event);
                events.push(event);
            }
            Err(e) => warn!("Skipping malformed progress line: {}", e),
        };

        while let Some(chunk) = response.chunk().await? {
            debug!("Received {} bytes of progress", chunk.len());
            for result in decoder.push(&chunk) {
                handle(result, &mut events);
            }
        }
        if let Some(result) = decoder.finish() {
            handle(result, &mut events);
        }

        Ok(events)
    }
}
