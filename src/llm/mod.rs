//! Language-model completion clients.
//!
//! The pipeline only needs one shape of call: a system prompt plus a user
//! prompt in, text out. [`CompletionClient`] is that seam; [`OpenAiClient`]
//! speaks any OpenAI-compatible `/chat/completions` endpoint and [`MockLlm`]
//! scripts responses for tests.

pub mod mock;
mod openai;

pub use mock::MockLlm;
pub use openai::OpenAiClient;

use async_trait::async_trait;
use std::time::Duration;

use crate::utils::{Retryable, TransientError};

/// A single chat completion request
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionRequest {
    /// Model or deployment name
    pub model: String,
    /// System instruction
    pub system: String,
    /// User message
    pub user: String,
}

impl CompletionRequest {
    pub fn new(model: impl Into<String>, system: impl Into<String>, user: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            system: system.into(),
            user: user.into(),
        }
    }
}

/// A text completion backend
#[async_trait]
pub trait CompletionClient: Send + Sync + std::fmt::Debug {
    /// Send the request and return the assistant's text
    async fn complete(&self, request: &CompletionRequest) -> Result<String, LlmError>;
}

/// Errors from a completion call
#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Completion timed out after {0:?}")]
    Timeout(Duration),

    #[error("Rate limited by completion API")]
    RateLimit,

    #[error("Completion API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("Completion API returned no content")]
    EmptyResponse,

    #[error("Malformed completion response: {0}")]
    Parse(String),
}

impl Retryable for LlmError {
    fn transient(&self) -> Option<TransientError> {
        match self {
            LlmError::Network(_) => Some(TransientError::Network),
            LlmError::Timeout(_) => Some(TransientError::Timeout),
            LlmError::RateLimit => Some(TransientError::RateLimit(None)),
            LlmError::Api { status, .. } => reqwest::StatusCode::from_u16(*status)
                .ok()
                .and_then(TransientError::from_status),
            LlmError::EmptyResponse | LlmError::Parse(_) => None,
        }
    }

    fn timed_out(after: Duration) -> Self {
        LlmError::Timeout(after)
    }
}

impl From<reqwest::Error> for LlmError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            LlmError::Timeout(crate::utils::DEFAULT_TIMEOUT)
        } else if err.is_decode() {
            LlmError::Parse(err.to_string())
        } else {
            LlmError::Network(err.to_string())
        }
    }
}
