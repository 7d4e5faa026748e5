//! Fake AI client for testing.
//!
//! Returns deterministic responses, either from a scripted queue or by
//! matching a registered substring against the request transcript, so tests
//! run without network access or API costs.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, RwLock};

use async_trait::async_trait;

use super::client::{AiClient, AiError};
use super::types::{ChatRequest, ChatResponse, Usage};

/// One scripted reply.
#[derive(Debug)]
pub enum FakeReply {
    Text(String),
    Fail(AiError),
    /// Never completes; the caller's timeout has to fire.
    Hang,
}

/// A fake AI client for testing.
///
/// Scripted replies are consumed first, in order. After that, responses are
/// matched by checking whether the transcript contains a registered substring
/// (case-insensitive, first registered wins). If nothing matches, the default
/// response is returned, or an error when there is none.
#[derive(Debug, Default)]
pub struct FakeClient {
    script: Mutex<VecDeque<FakeReply>>,
    responses: RwLock<Vec<(String, String)>>,
    default_response: Option<String>,
    hang: bool,
    calls: AtomicUsize,
    prompt_names: Mutex<Vec<String>>,
}

impl FakeClient {
    /// Create a new FakeClient with no registered responses.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a FakeClient that returns a specific response for transcripts
    /// containing a substring.
    pub fn with_response(contains: &str, response: &str) -> Self {
        let client = Self::new();
        client.add_response(contains, response);
        client
    }

    /// A client whose every call hangs until the caller gives up.
    pub fn hanging() -> Self {
        Self {
            hang: true,
            ..Self::default()
        }
    }

    /// Add a response for transcripts containing a specific substring.
    pub fn add_response(&self, contains: &str, response: &str) {
        self.responses
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .push((contains.to_lowercase(), response.to_string()));
    }

    /// Set the default response when no pattern matches.
    pub fn with_default_response(mut self, response: &str) -> Self {
        self.default_response = Some(response.to_string());
        self
    }

    /// Queue a reply to be returned before any substring matching.
    pub fn then(self, reply: FakeReply) -> Self {
        self.script
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push_back(reply);
        self
    }

    pub fn then_reply(self, text: &str) -> Self {
        self.then(FakeReply::Text(text.to_string()))
    }

    pub fn then_fail(self, error: AiError) -> Self {
        self.then(FakeReply::Fail(error))
    }

    /// Number of `complete` calls made so far.
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Prompt names of all calls so far, in order.
    pub fn prompt_names(&self) -> Vec<String> {
        self.prompt_names
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    fn next_reply(&self, transcript: &str) -> FakeReply {
        if self.hang {
            return FakeReply::Hang;
        }

        if let Some(reply) = self
            .script
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .pop_front()
        {
            return reply;
        }

        let transcript = transcript.to_lowercase();
        let responses = self.responses.read().unwrap_or_else(|e| e.into_inner());
        if let Some((_, response)) = responses.iter().find(|(p, _)| transcript.contains(p)) {
            return FakeReply::Text(response.clone());
        }

        match &self.default_response {
            Some(response) => FakeReply::Text(response.clone()),
            None => FakeReply::Fail(AiError::Api {
                status: 404,
                message: format!(
                    "FakeClient: no response configured (first 100 chars): {}",
                    transcript.chars().take(100).collect::<String>()
                ),
            }),
        }
    }
}

#[async_trait]
impl AiClient for FakeClient {
    async fn complete(
        &self,
        prompt_name: &str,
        request: ChatRequest,
    ) -> Result<ChatResponse, AiError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.prompt_names
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(prompt_name.to_string());

        match self.next_reply(&request.transcript()) {
            FakeReply::Text(content) => Ok(ChatResponse {
                content,
                usage: Usage::default(),
            }),
            FakeReply::Fail(error) => Err(error),
            FakeReply::Hang => std::future::pending().await,
        }
    }

    fn model_name(&self) -> &str {
        "fake-model"
    }
}
