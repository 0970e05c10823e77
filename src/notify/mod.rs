//! Digest delivery.
//!
//! A [`Dispatcher`] fans one [`Notification`] out to every configured
//! [`Notifier`] concurrently. Channels fail independently: the dispatch report
//! records each outcome, and delivery counts as successful when at least one
//! channel accepted the message.

mod email;
pub mod format;
pub mod mock;
mod webhook;

pub use email::BrevoEmail;
pub use mock::MockNotifier;
pub use webhook::WebhookNotifier;

use async_trait::async_trait;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;

use crate::config::NotifyConfig;
use crate::models::DigestEntry;
use crate::utils::{delivery_retry_config, with_retry, HttpClient, RetryConfig, Retryable, TransientError};

/// Delivery channel kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Channel {
    Email,
    Webhook,
}

impl std::fmt::Display for Channel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Channel::Email => write!(f, "email"),
            Channel::Webhook => write!(f, "webhook"),
        }
    }
}

/// What gets delivered
#[derive(Debug, Clone, PartialEq)]
pub enum Notification {
    /// Analyzed papers, in selection order
    Digest(Vec<DigestEntry>),
    /// Human-readable explanation of a run that produced nothing to digest
    Status(String),
}

/// A delivery channel
#[async_trait]
pub trait Notifier: Send + Sync + std::fmt::Debug {
    fn channel(&self) -> Channel;

    async fn send(&self, notification: &Notification) -> Result<(), NotifyError>;
}

/// Errors from a delivery channel
#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Delivery timed out after {0:?}")]
    Timeout(Duration),

    #[error("Delivery rejected (status {status}): {message}")]
    Api { status: u16, message: String },
}

impl Retryable for NotifyError {
    fn transient(&self) -> Option<TransientError> {
        match self {
            NotifyError::Network(_) => Some(TransientError::Network),
            NotifyError::Timeout(_) => Some(TransientError::Timeout),
            NotifyError::Api { status, .. } => reqwest::StatusCode::from_u16(*status)
                .ok()
                .and_then(TransientError::from_status),
        }
    }

    fn timed_out(after: Duration) -> Self {
        NotifyError::Timeout(after)
    }
}

impl From<reqwest::Error> for NotifyError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            NotifyError::Timeout(crate::utils::DEFAULT_TIMEOUT)
        } else {
            NotifyError::Network(err.to_string())
        }
    }
}

/// Outcome of delivery on one channel
#[derive(Debug, Clone, Serialize)]
pub struct ChannelResult {
    pub channel: Channel,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ChannelResult {
    pub fn succeeded(&self) -> bool {
        self.error.is_none()
    }
}

/// Per-channel outcomes of one dispatch
#[derive(Debug, Clone, Default, Serialize)]
pub struct DispatchReport {
    pub results: Vec<ChannelResult>,
}

impl DispatchReport {
    pub fn any_succeeded(&self) -> bool {
        self.results.iter().any(ChannelResult::succeeded)
    }

    pub fn failures(&self) -> impl Iterator<Item = &ChannelResult> {
        self.results.iter().filter(|r| !r.succeeded())
    }

    /// One-line description, e.g. `email: ok, webhook: failed (...)`
    pub fn summary(&self) -> String {
        self.results
            .iter()
            .map(|r| match &r.error {
                None => format!("{}: ok", r.channel),
                Some(e) => format!("{}: failed ({})", r.channel, e),
            })
            .collect::<Vec<_>>()
            .join(", ")
    }
}

/// Sends notifications to every configured channel
#[derive(Debug, Clone)]
pub struct Dispatcher {
    notifiers: Vec<Arc<dyn Notifier>>,
    retry: RetryConfig,
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl Dispatcher {
    /// Dispatcher with no channels
    pub fn new() -> Self {
        Self {
            notifiers: Vec::new(),
            retry: delivery_retry_config(),
        }
    }

    /// Build notifiers for every fully configured channel
    pub fn from_config(config: &NotifyConfig) -> Result<Self, reqwest::Error> {
        let timeout = Duration::from_secs(config.timeout_secs);
        let client = HttpClient::with_timeout(timeout)?;
        let mut dispatcher =
            Self::new().with_retry_config(delivery_retry_config().attempt_timeout(timeout));

        let email = &config.email;
        if let (true, Some(key), Some(sender)) =
            (email.is_configured(), &email.brevo_api_key, &email.sender_email)
        {
            let notifier = BrevoEmail::new(client.clone(), key.clone(), sender.clone(), email.recipients.clone())
                .with_endpoint(email.endpoint.clone())
                .with_sender_name(email.sender_name.clone());
            dispatcher = dispatcher.with_notifier(Arc::new(notifier));
        }

        if let Some(url) = &config.webhook.url {
            dispatcher = dispatcher.with_notifier(Arc::new(WebhookNotifier::new(client, url.clone())));
        }

        Ok(dispatcher)
    }

    pub fn with_notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifiers.push(notifier);
        self
    }

    pub fn with_retry_config(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    pub fn is_empty(&self) -> bool {
        self.notifiers.is_empty()
    }

    pub fn channels(&self) -> Vec<Channel> {
        self.notifiers.iter().map(|n| n.channel()).collect()
    }

    /// Deliver on every channel concurrently; one channel's failure never blocks another
    pub async fn dispatch(&self, notification: &Notification) -> DispatchReport {
        let sends = self.notifiers.iter().map(|notifier| async move {
            let result = with_retry(self.retry, || notifier.send(notification)).await;
            if let Err(e) = &result {
                tracing::warn!("Delivery via {} failed: {}", notifier.channel(), e);
            }
            ChannelResult {
                channel: notifier.channel(),
                error: result.err().map(|e| e.to_string()),
            }
        });

        let report = DispatchReport {
            results: futures_util::future::join_all(sends).await,
        };
        tracing::info!("Dispatch finished: {}", report.summary());
        report
    }
}
