//! Bounded retry with a hard timeout around every call.

use std::time::Duration;

use super::client::{AiClient, AiError};
use super::config::{AiConfig, DEFAULT_BACKOFF_MS, DEFAULT_MAX_ATTEMPTS, DEFAULT_TIMEOUT_SECS};
use super::types::{ChatRequest, ChatResponse};

#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Total attempts, including the first.
    pub max_attempts: u32,
    /// Hard limit per attempt.
    pub timeout: Duration,
    /// Delay before the first retry, doubled afterwards.
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            backoff: Duration::from_millis(DEFAULT_BACKOFF_MS),
        }
    }
}

impl From<&AiConfig> for RetryPolicy {
    fn from(config: &AiConfig) -> Self {
        Self {
            max_attempts: config.max_attempts,
            timeout: config.timeout,
            backoff: config.backoff,
        }
    }
}

/// Call the client, retrying transient failures up to the policy's bound.
///
/// Each attempt is wrapped in `tokio::time::timeout`, so a client that never
/// answers still fails with [`AiError::Timeout`].
pub async fn complete_with_retry(
    client: &dyn AiClient,
    prompt_name: &str,
    request: &ChatRequest,
    policy: &RetryPolicy,
) -> Result<ChatResponse, AiError> {
    let max_attempts = policy.max_attempts.max(1);
    let mut delay = policy.backoff;
    let mut attempt = 1;

    loop {
        let result =
            match tokio::time::timeout(policy.timeout, client.complete(prompt_name, request.clone()))
                .await
            {
                Ok(result) => result,
                Err(_) => Err(AiError::Timeout(policy.timeout)),
            };

        match result {
            Ok(response) => return Ok(response),
            Err(e) if e.is_retryable() && attempt < max_attempts => {
                let wait = match &e {
                    AiError::RateLimited {
                        retry_after_secs: Some(secs),
                    } => Duration::from_secs(*secs).clamp(delay, policy.timeout.max(delay)),
                    _ => delay,
                };
                tracing::warn!(
                    prompt_name = prompt_name,
                    attempt = attempt,
                    max_attempts = max_attempts,
                    error = %e,
                    wait_ms = wait.as_millis() as u64,
                    "AI call failed, retrying"
                );
                tokio::time::sleep(wait).await;
                delay = delay.saturating_mul(2);
                attempt += 1;
            }
            Err(e) => {
                tracing::warn!(
                    prompt_name = prompt_name,
                    attempt = attempt,
                    error = %e,
                    "AI call failed"
                );
                return Err(e);
            }
        }
    }
}
