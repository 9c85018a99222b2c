//! Shared blocking HTTP plumbing for the remote services
//!
//! Every call has an explicit timeout. Retries are opt-in: the default policy
//! makes exactly one attempt, since the rerank and chat APIs bill per call.

use std::thread;
use std::time::{Duration, Instant};

use reqwest::blocking::Client;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::{Error, Result};

/// Longest response body excerpt kept in error messages
const BODY_EXCERPT_CHARS: usize = 300;

/// Why a single remote call failed
#[derive(Debug, thiserror::Error)]
pub enum CallError {
    #[error("request timed out")]
    Timeout,

    #[error("transport error: {0}")]
    Transport(String),

    #[error("HTTP {status}: {body}")]
    Status { status: StatusCode, body: String },

    #[error("malformed response: {0}")]
    Decode(String),
}

impl CallError {
    fn from_reqwest(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            CallError::Timeout
        } else if err.is_decode() {
            CallError::Decode(err.to_string())
        } else {
            CallError::Transport(err.to_string())
        }
    }

    /// Transport failures, timeouts, 429 and 5xx are worth another attempt
    pub fn is_retryable(&self) -> bool {
        match self {
            CallError::Timeout | CallError::Transport(_) => true,
            CallError::Status { status, .. } => {
                *status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
            }
            CallError::Decode(_) => false,
        }
    }
}

/// Bounded retry with exponential backoff
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Attempts after the first one
    pub max_retries: u32,
    /// Delay before the first retry; doubled for each further retry
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::none()
    }
}

impl RetryPolicy {
    /// Fail fast: a single attempt
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            backoff: Duration::from_millis(500),
        }
    }

    pub fn new(max_retries: u32, backoff: Duration) -> Self {
        Self {
            max_retries,
            backoff,
        }
    }

    /// Delay before retry number `attempt` (1-based), with up to 25% jitter
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exp = attempt.saturating_sub(1).min(16);
        let base = self.backoff.saturating_mul(1u32 << exp);
        let jitter_ms = (base.as_millis() as u64) / 4;
        if jitter_ms == 0 {
            base
        } else {
            base.saturating_add(Duration::from_millis(fastrand::u64(0..=jitter_ms)))
        }
    }

    /// Run `op` until it succeeds, fails permanently, or retries run out
    pub fn run<T>(
        &self,
        service: &str,
        mut op: impl FnMut() -> std::result::Result<T, CallError>,
    ) -> std::result::Result<T, CallError> {
        let mut attempt = 0u32;
        loop {
            match op() {
                Ok(value) => return Ok(value),
                Err(err) if err.is_retryable() && attempt < self.max_retries => {
                    attempt += 1;
                    let delay = self.delay_for(attempt);
                    tracing::warn!(
                        service,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %err,
                        "retrying remote call"
                    );
                    thread::sleep(delay);
                }
                Err(err) => return Err(err),
            }
        }
    }
}

/// Build a JSON client with a timeout and optional bearer token
pub fn build_client(timeout: Duration, bearer: Option<&str>) -> Result<Client> {
    let mut headers = HeaderMap::new();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    if let Some(token) = bearer {
        let auth = format!("Bearer {}", token.trim());
        let value = HeaderValue::from_str(&auth)
            .map_err(|_| Error::Config("API key contains invalid header characters".to_string()))?;
        headers.insert(AUTHORIZATION, value);
    }

    Client::builder()
        .timeout(timeout)
        .default_headers(headers)
        .build()
        .map_err(|e| Error::Config(format!("failed to build HTTP client: {}", e)))
}

/// POST a JSON body and decode a JSON response
pub fn post_json<B, R>(client: &Client, url: &str, body: &B) -> std::result::Result<R, CallError>
where
    B: Serialize + ?Sized,
    R: DeserializeOwned,
{
    let response = client
        .post(url)
        .json(body)
        .send()
        .map_err(CallError::from_reqwest)?;

    let status = response.status();
    if !status.is_success() {
        let body = response
            .text()
            .unwrap_or_else(|_| "<body unavailable>".to_string());
        return Err(CallError::Status {
            status,
            body: excerpt(&body),
        });
    }

    let text = response.text().map_err(CallError::from_reqwest)?;
    serde_json::from_str(&text).map_err(|e| CallError::Decode(e.to_string()))
}

/// Log the duration of a remote call under a stable message
pub(crate) fn log_elapsed(service: &'static str, started: Instant) {
    tracing::info!(
        service,
        elapsed_ms = started.elapsed().as_millis() as u64,
        "{} service answered",
        service
    );
}

fn excerpt(body: &str) -> String {
    let collapsed = body.replace('\n', " ");
    let trimmed = collapsed.trim();
    if trimmed.chars().count() <= BODY_EXCERPT_CHARS {
        trimmed.to_string()
    } else {
        let truncated: String = trimmed.chars().take(BODY_EXCERPT_CHARS).collect();
        format!("{}...", truncated)
    }
}
