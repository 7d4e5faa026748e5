//! AI client module for LLM integration.
//!
//! This module provides:
//! - `AiClient` trait for abstracting AI providers
//! - `HttpAiClient` for OpenAI-compatible chat completion endpoints
//! - `FakeClient` for tests and offline runs
//! - Bounded retry with a hard per-call timeout
//! - Prompt templates for extraction, repair and dependency inference
//!
//! # Configuration
//!
//! - `RB_API_KEY` (required, or `HF_TOKEN`): inference endpoint credential
//! - `RB_MODEL` (optional, or `HF_MODEL`): model name
//! - `RB_BASE_URL` (optional): API base URL
//! - `RB_AI_TIMEOUT_SECS`, `RB_AI_MAX_ATTEMPTS`, `RB_AI_BACKOFF_MS` (optional):
//!   per-call timeout and retry bound
//! - `RB_AI_RATE_LIMIT_MS` (optional): delay between requests in ms
//!
//! # Example
//!
//! ```ignore
//! use recipe_board_core::ai::{complete_with_retry, ChatMessage, ChatRequest, HttpAiClient, RetryPolicy};
//!
//! let client = HttpAiClient::from_env()?;
//! let request = ChatRequest::json(vec![ChatMessage::user("Hello!")]);
//! let policy = RetryPolicy::from(client.config());
//! let response = complete_with_retry(&client, "test", &request, &policy).await?;
//! println!("Response: {}", response.content);
//! ```

mod client;
mod config;
mod fake;
pub mod json;
pub mod prompts;
mod retry;
mod types;

pub use client::{AiClient, AiError, HttpAiClient};
pub use config::{AiConfig, ConfigError};
pub use fake::{FakeClient, FakeReply};
pub use retry::{complete_with_retry, RetryPolicy};
pub use types::{ChatMessage, ChatRequest, ChatResponse, Role, Usage};
