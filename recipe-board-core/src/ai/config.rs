//! AI configuration from environment variables.

use std::env;
use std::time::Duration;

use thiserror::Error;

/// Default OpenAI-compatible base URL.
pub const DEFAULT_BASE_URL: &str = "https://openrouter.ai/api/v1";

/// Default model to use.
pub const DEFAULT_MODEL: &str = "openai/gpt-4o-mini";

pub const DEFAULT_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_MAX_ATTEMPTS: u32 = 2;
pub const DEFAULT_BACKOFF_MS: u64 = 500;
pub const DEFAULT_RATE_LIMIT_MS: u64 = 0;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),
}

/// AI client configuration.
#[derive(Debug, Clone)]
pub struct AiConfig {
    /// Inference endpoint credential.
    pub api_key: String,
    /// Model identifier (e.g., "openai/gpt-4o-mini").
    pub model: String,
    /// Base URL of an OpenAI-compatible chat completions API.
    pub base_url: String,
    /// Hard limit for a single call.
    pub timeout: Duration,
    /// Attempts per call for transient failures, including the first.
    pub max_attempts: u32,
    /// Delay before the first retry; doubled for each further retry.
    pub backoff: Duration,
    /// Milliseconds to wait between requests.
    pub rate_limit_ms: u64,
}

impl AiConfig {
    /// Load configuration from environment variables.
    ///
    /// Required:
    /// - `RB_API_KEY` (or `HF_TOKEN`): API key
    ///
    /// Optional:
    /// - `RB_MODEL` (or `HF_MODEL`): model name (default: "openai/gpt-4o-mini")
    /// - `RB_BASE_URL`: API base URL (default: "https://openrouter.ai/api/v1")
    /// - `RB_AI_TIMEOUT_SECS`: per-call timeout (default: 30)
    /// - `RB_AI_MAX_ATTEMPTS`: attempts for transient failures (default: 2)
    /// - `RB_AI_BACKOFF_MS`: initial retry backoff (default: 500)
    /// - `RB_AI_RATE_LIMIT_MS`: delay between requests (default: 0)
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration through an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let api_key = non_empty("RB_API_KEY")
            .or_else(|| non_empty("HF_TOKEN"))
            .ok_or_else(|| ConfigError::MissingEnvVar("RB_API_KEY".to_string()))?;

        let model = non_empty("RB_MODEL")
            .or_else(|| non_empty("HF_MODEL"))
            .unwrap_or_else(|| DEFAULT_MODEL.to_string());

        let base_url = non_empty("RB_BASE_URL")
            .map(|url| url.trim_end_matches('/').to_string())
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());

        let number = |key: &str, default: u64| -> u64 {
            non_empty(key)
                .and_then(|v| v.trim().parse().ok())
                .unwrap_or(default)
        };

        Ok(Self {
            api_key,
            model,
            base_url,
            timeout: Duration::from_secs(number("RB_AI_TIMEOUT_SECS", DEFAULT_TIMEOUT_SECS).max(1)),
            max_attempts: number("RB_AI_MAX_ATTEMPTS", DEFAULT_MAX_ATTEMPTS as u64).clamp(1, 10)
                as u32,
            backoff: Duration::from_millis(number("RB_AI_BACKOFF_MS", DEFAULT_BACKOFF_MS)),
            rate_limit_ms: number("RB_AI_RATE_LIMIT_MS", DEFAULT_RATE_LIMIT_MS),
        })
    }
}
