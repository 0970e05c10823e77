//! Generic JSON webhook delivery.

use async_trait::async_trait;

use super::{format, Channel, Notification, Notifier, NotifyError};
use crate::utils::{truncate_chars, HttpClient};

/// POSTs a JSON payload to a single URL
#[derive(Debug, Clone)]
pub struct WebhookNotifier {
    client: HttpClient,
    url: String,
}

impl WebhookNotifier {
    pub fn new(client: HttpClient, url: impl Into<String>) -> Self {
        Self {
            client,
            url: url.into(),
        }
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    fn channel(&self) -> Channel {
        Channel::Webhook
    }

    async fn send(&self, notification: &Notification) -> Result<(), NotifyError> {
        let response = self
            .client
            .post(&self.url)
            .json(&format::webhook_payload(notification))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(NotifyError::Api {
                status: status.as_u16(),
                message: truncate_chars(&message, 300).to_string(),
            });
        }

        tracing::info!("Webhook delivered ({})", status);
        Ok(())
    }
}
