//! Minimal JSON client for the OpenAI REST API.
//!
//! Shared by the embedding and completion providers. Every request goes
//! through [`OpenAIClient::post_json`], which applies the retry policy:
//!
//! - HTTP 429 (rate limited) and 5xx → retry with exponential backoff
//! - HTTP 429 with `insufficient_quota` → fail immediately (retrying cannot help)
//! - other HTTP 4xx → fail immediately
//! - network errors → retry
//! - backoff: 1s, 2s, 4s, 8s, 16s, 32s (capped at 2^5)

use anyhow::Result;
use reqwest::StatusCode;
use std::fmt;
use std::time::Duration;

/// Error raised when the OpenAI API (or access to it) is the problem:
/// missing or rejected key, exhausted quota, or exhausted retries.
#[derive(Debug)]
pub struct UpstreamError {
    message: String,
}

impl UpstreamError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl fmt::Display for UpstreamError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for UpstreamError {}

/// True if `err` or anything in its cause chain is an [`UpstreamError`].
pub fn is_upstream(err: &anyhow::Error) -> bool {
    err.chain().any(|cause| cause.is::<UpstreamError>())
}

fn upstream(message: String) -> anyhow::Error {
    anyhow::Error::new(UpstreamError::new(message))
}

pub struct OpenAIClient {
    http: reqwest::Client,
    api_base: String,
    api_key: String,
    max_retries: u32,
}

/// How a failed HTTP response should be handled.
#[derive(Debug)]
pub enum Failure {
    Retry(anyhow::Error),
    Fatal(anyhow::Error),
}

impl OpenAIClient {
    pub fn new(api_base: &str, api_key: &str, timeout_secs: u64, max_retries: u32) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()?;
        Ok(Self {
            http,
            api_base: api_base.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            max_retries,
        })
    }

    /// POST `body` to `{api_base}/{path}` and return the parsed JSON response.
    pub async fn post_json(&self, path: &str, body: &serde_json::Value) -> Result<serde_json::Value> {
        let url = format!("{}/{}", self.api_base, path.trim_start_matches('/'));
        let mut last_err = None;

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                let delay = Duration::from_secs(1 << (attempt - 1).min(5));
                tracing::debug!(attempt, ?delay, %url, "retrying OpenAI request");
                tokio::time::sleep(delay).await;
            }

            let resp = self
                .http
                .post(&url)
                .bearer_auth(&self.api_key)
                .json(body)
                .send()
                .await;

            match resp {
                Ok(response) => {
                    let status = response.status();
                    if status.is_success() {
                        return Ok(response.json().await?);
                    }

                    let body_text = response.text().await.unwrap_or_default();
                    match classify_failure(status, &body_text) {
                        Failure::Retry(e) => {
                            tracing::warn!(%status, "OpenAI request failed, will retry");
                            last_err = Some(e);
                        }
                        Failure::Fatal(e) => return Err(e),
                    }
                }
                Err(e) => {
                    tracing::warn!(error = %e, "OpenAI request could not be sent");
                    last_err = Some(upstream(format!("OpenAI request to {} failed: {}", url, e)));
                }
            }
        }

        Err(last_err.unwrap_or_else(|| upstream("OpenAI request failed after retries".to_string())))
    }
}

/// Decide whether a non-success response is worth retrying.
pub fn classify_failure(status: StatusCode, body: &str) -> Failure {
    let detail = error_message(body).unwrap_or_else(|| body.to_string());

    if status == StatusCode::TOO_MANY_REQUESTS {
        if error_code(body).as_deref() == Some("insufficient_quota") {
            return Failure::Fatal(upstream(format!("OpenAI API quota exhausted: {}", detail)));
        }
        return Failure::Retry(upstream(format!("OpenAI API error {}: {}", status, detail)));
    }
    if status.is_server_error() {
        return Failure::Retry(upstream(format!("OpenAI API error {}: {}", status, detail)));
    }
    if status == StatusCode::UNAUTHORIZED {
        return Failure::Fatal(upstream(format!(
            "OpenAI API rejected the API key (401): {}",
            detail
        )));
    }
    Failure::Fatal(upstream(format!("OpenAI API error {}: {}", status, detail)))
}

fn error_field(body: &str, field: &str) -> Option<String> {
    let json: serde_json::Value = serde_json::from_str(body).ok()?;
    json.get("error")?
        .get(field)?
        .as_str()
        .map(|s| s.to_string())
}

fn error_code(body: &str) -> Option<String> {
    error_field(body, "code")
}

fn error_message(body: &str) -> Option<String> {
    error_field(body, "message")
}
