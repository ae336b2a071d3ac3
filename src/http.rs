//! Shared HTTP plumbing for provider clients.
//!
//! All provider calls go through [`send_with_retry`]:
//!
//! - HTTP 429 (rate limited) and 5xx (server error) → retry
//! - HTTP 4xx (client error, not 429) → fail immediately
//! - Network errors, including timeouts → retry
//! - Backoff: 1s, 2s, 4s, 8s, 16s, 32s (capped at 2^5)
//!
//! `max_retries = 0` (the default everywhere) means a single attempt.

use std::time::Duration;

use docchat_core::error::Error;
use reqwest::{RequestBuilder, Response, StatusCode};

/// Build a client with the configured per-request timeout.
pub fn client(timeout_secs: u64) -> anyhow::Result<reqwest::Client> {
    Ok(reqwest::Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .build()?)
}

/// Why a provider call did not produce a success response.
#[derive(Debug)]
pub enum CallFailure {
    /// Non-retryable response.
    Rejected { status: StatusCode, message: String },
    /// Every attempt failed with a retryable error.
    Exhausted { attempts: u32, last_error: String },
}

impl CallFailure {
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            CallFailure::Rejected { status, .. } => Some(*status),
            CallFailure::Exhausted { .. } => None,
        }
    }

    /// Map into the core taxonomy. A single failed attempt is reported as
    /// the provider's own error; only real retry exhaustion is
    /// [`Error::Exhausted`].
    pub fn into_error(self, operation: &str, provider_err: fn(String) -> Error) -> Error {
        match self {
            CallFailure::Rejected { message, .. } => provider_err(message),
            CallFailure::Exhausted {
                attempts,
                last_error,
            } if attempts <= 1 => provider_err(last_error),
            CallFailure::Exhausted {
                attempts,
                last_error,
            } => Error::Exhausted {
                operation: operation.to_string(),
                attempts,
                last_error,
            },
        }
    }
}

/// Delay before retry number `attempt` (1-based).
pub fn backoff_delay(attempt: u32) -> Duration {
    Duration::from_secs(1 << (attempt.saturating_sub(1)).min(5))
}

/// Send the request built by `build` until it succeeds, is rejected, or
/// `max_retries` retries are used up.
///
/// `label` prefixes error messages (e.g. `"Gemini API"`).
pub async fn send_with_retry<F>(
    label: &str,
    max_retries: u32,
    build: F,
) -> Result<Response, CallFailure>
where
    F: Fn() -> RequestBuilder,
{
    let mut last_error = String::new();

    for attempt in 0..=max_retries {
        if attempt > 0 {
            let delay = backoff_delay(attempt);
            tracing::warn!(label, attempt, ?delay, error = %last_error, "retrying provider call");
            tokio::time::sleep(delay).await;
        }

        match build().send().await {
            Ok(response) => {
                let status = response.status();
                if status.is_success() {
                    return Ok(response);
                }

                let body_text = response.text().await.unwrap_or_default();
                let message = format!("{} error {}: {}", label, status, body_text);

                // Rate limited or server error: retry
                if status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
                    last_error = message;
                    continue;
                }

                return Err(CallFailure::Rejected { status, message });
            }
            Err(e) => {
                last_error = format!("{} request failed: {}", label, e);
                continue;
            }
        }
    }

    Err(CallFailure::Exhausted {
        attempts: max_retries + 1,
        last_error,
    })
}

/// Read a success response body as JSON.
pub async fn read_json(
    label: &str,
    response: Response,
    provider_err: fn(String) -> Error,
) -> Result<serde_json::Value, Error> {
    response
        .json::<serde_json::Value>()
        .await
        .map_err(|e| provider_err(format!("{} returned invalid JSON: {}", label, e)))
}
