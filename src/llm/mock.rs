//! Scripted completion client for testing purposes.

use async_trait::async_trait;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use super::{CompletionClient, CompletionRequest, LlmError};

type Responder = dyn Fn(&CompletionRequest) -> Result<String, LlmError> + Send + Sync;

/// A completion client whose answers come from a closure.
///
/// Every request is recorded so tests can assert on prompts and models.
#[derive(Clone)]
pub struct MockLlm {
    responder: Arc<Responder>,
    requests: Arc<Mutex<Vec<CompletionRequest>>>,
}

impl MockLlm {
    /// Answer every request with `responder`.
    pub fn new<F>(responder: F) -> Self
    where
        F: Fn(&CompletionRequest) -> Result<String, LlmError> + Send + Sync + 'static,
    {
        Self {
            responder: Arc::new(responder),
            requests: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Fail every request with a network error.
    pub fn unreachable() -> Self {
        Self::new(|_| Err(LlmError::Network("connection refused".to_string())))
    }

    /// All requests received so far.
    pub fn requests(&self) -> Vec<CompletionRequest> {
        self.recorded().clone()
    }

    /// Number of requests received so far.
    pub fn call_count(&self) -> usize {
        self.recorded().len()
    }

    /// Request log, recovered if a holder panicked
    fn recorded(&self) -> MutexGuard<'_, Vec<CompletionRequest>> {
        self.requests.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl std::fmt::Debug for MockLlm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockLlm")
            .field("calls", &self.call_count())
            .finish()
    }
}

#[async_trait]
impl CompletionClient for MockLlm {
    async fn complete(&self, request: &CompletionRequest) -> Result<String, LlmError> {
        self.recorded().push(request.clone());
        (self.responder)(request)
    }
}
