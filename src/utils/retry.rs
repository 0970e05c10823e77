//! Retry utilities with exponential backoff for resilient API calls.
//!
//! Every external collaborator (arXiv, the completion API, web search, PDF
//! download, notification channels) goes through [`with_retry`]. Errors opt in
//! by implementing [`Retryable`], which decides whether a failure is worth a
//! second attempt.

use std::time::Duration;
use tokio::time::{sleep, timeout};

/// Configuration for retry behavior
#[derive(Debug, Clone, Copy)]
pub struct RetryConfig {
    /// Maximum number of attempts, including the first one
    pub max_attempts: u32,
    /// Initial delay between retries
    pub initial_delay: Duration,
    /// Maximum delay between retries
    pub max_delay: Duration,
    /// Multiplier for exponential backoff
    pub backoff_multiplier: f64,
    /// Timeout applied to each individual attempt
    pub attempt_timeout: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(60),
            backoff_multiplier: 2.0,
            attempt_timeout: Duration::from_secs(120),
        }
    }
}

impl RetryConfig {
    /// Set the maximum number of attempts
    pub fn max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts.max(1);
        self
    }

    /// Set the per-attempt timeout
    pub fn attempt_timeout(mut self, timeout: Duration) -> Self {
        self.attempt_timeout = timeout;
        self
    }

    /// Set both the initial and maximum backoff delay
    pub fn delays(mut self, initial: Duration, max: Duration) -> Self {
        self.initial_delay = initial;
        self.max_delay = max;
        self
    }

    /// Backoff delay before the attempt following `attempt`
    fn backoff(&self, attempt: u32) -> Duration {
        if attempt <= 1 {
            return self.initial_delay.min(self.max_delay);
        }
        let exp_delay =
            self.initial_delay.as_secs_f64() * self.backoff_multiplier.powf(attempt as f64 - 1.0);
        Duration::from_secs_f64(exp_delay.min(self.max_delay.as_secs_f64()))
    }
}

/// Transient errors that should trigger a retry
#[derive(Debug, Clone, PartialEq)]
pub enum TransientError {
    /// Network connectivity issues
    Network,
    /// Rate limit exceeded (with optional retry-after seconds)
    RateLimit(Option<u64>),
    /// Server error (5xx)
    ServerError,
    /// Service unavailable (503)
    ServiceUnavailable,
    /// Gateway timeout (504)
    GatewayTimeout,
    /// Request timeout
    Timeout,
}

impl TransientError {
    /// Check if a reqwest error represents a transient error
    pub fn from_reqwest_error(err: &reqwest::Error) -> Option<Self> {
        if err.is_timeout() {
            return Some(TransientError::Timeout);
        }
        if err.is_connect() || err.is_request() {
            return Some(TransientError::Network);
        }

        err.status().and_then(Self::from_status)
    }

    /// Classify an HTTP status code
    pub fn from_status(status: reqwest::StatusCode) -> Option<Self> {
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Some(TransientError::RateLimit(None));
        }

        if status == reqwest::StatusCode::SERVICE_UNAVAILABLE {
            return Some(TransientError::ServiceUnavailable);
        }

        if status == reqwest::StatusCode::GATEWAY_TIMEOUT {
            return Some(TransientError::GatewayTimeout);
        }

        if status.is_server_error() {
            return Some(TransientError::ServerError);
        }

        None
    }

    /// Get the recommended delay for this error
    pub fn recommended_delay(&self) -> Duration {
        match self {
            TransientError::RateLimit(Some(seconds)) => Duration::from_secs(*seconds + 1),
            TransientError::RateLimit(None) => Duration::from_secs(61),
            TransientError::ServiceUnavailable => Duration::from_secs(10),
            TransientError::GatewayTimeout => Duration::from_secs(5),
            TransientError::Timeout => Duration::from_secs(2),
            TransientError::Network => Duration::from_secs(2),
            TransientError::ServerError => Duration::from_secs(2),
        }
    }
}

/// An error that knows whether it is worth retrying.
pub trait Retryable: std::fmt::Display + Sized {
    /// `Some` when the failure is transient and another attempt may succeed
    fn transient(&self) -> Option<TransientError>;

    /// The error produced when a single attempt exceeds its timeout
    fn timed_out(after: Duration) -> Self;
}

/// Execute an async operation with retry logic
///
/// Each attempt is bounded by [`RetryConfig::attempt_timeout`]. Permanent
/// errors are returned immediately; transient errors are retried until
/// `max_attempts` is reached, sleeping for the larger of the exponential
/// backoff and the error's recommended delay, capped at `max_delay`.
pub async fn with_retry<T, E, F, Fut>(config: RetryConfig, operation: F) -> Result<T, E>
where
    E: Retryable,
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T, E>>,
{
    let mut attempts = 0;
    let mut operation = operation;

    loop {
        attempts += 1;

        let error = match timeout(config.attempt_timeout, operation()).await {
            Ok(Ok(result)) => {
                if attempts > 1 {
                    tracing::info!(
                        "Operation succeeded on attempt {} after {} transient failures",
                        attempts,
                        attempts - 1
                    );
                }
                return Ok(result);
            }
            Ok(Err(error)) => error,
            Err(_) => E::timed_out(config.attempt_timeout),
        };

        let Some(transient) = error.transient() else {
            // Permanent error - return immediately
            return Err(error);
        };

        if attempts >= config.max_attempts {
            tracing::warn!("Operation failed after {} attempts: {}", attempts, error);
            return Err(error);
        }

        let delay = std::cmp::max(config.backoff(attempts), transient.recommended_delay())
            .min(config.max_delay);

        tracing::debug!(
            "Transient error on attempt {}: {:?}, retrying in {:?}",
            attempts,
            transient,
            delay
        );

        sleep(delay).await;
    }
}

/// Retry policy for the preprint source: patient, since nothing can run without it
pub fn source_retry_config() -> RetryConfig {
    RetryConfig {
        max_attempts: 4,
        initial_delay: Duration::from_secs(3),
        max_delay: Duration::from_secs(30),
        backoff_multiplier: 2.0,
        attempt_timeout: Duration::from_secs(120),
    }
}

/// Retry policy for completion calls; failed batches fall back to stage policy
pub fn llm_retry_config() -> RetryConfig {
    RetryConfig {
        max_attempts: 2,
        initial_delay: Duration::from_secs(2),
        max_delay: Duration::from_secs(20),
        backoff_multiplier: 2.0,
        attempt_timeout: Duration::from_secs(180),
    }
}

/// Best-effort enrichment: one retry on transient network errors
pub fn enrichment_retry_config() -> RetryConfig {
    RetryConfig {
        max_attempts: 2,
        initial_delay: Duration::from_secs(1),
        max_delay: Duration::from_secs(5),
        backoff_multiplier: 2.0,
        attempt_timeout: Duration::from_secs(60),
    }
}

/// Notification delivery: two attempts, then surfaced as a warning
pub fn delivery_retry_config() -> RetryConfig {
    RetryConfig {
        max_attempts: 2,
        initial_delay: Duration::from_secs(2),
        max_delay: Duration::from_secs(10),
        backoff_multiplier: 2.0,
        attempt_timeout: Duration::from_secs(30),
    }
}
