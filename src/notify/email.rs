//! Email delivery through the Brevo transactional email API.

use async_trait::async_trait;
use serde::Serialize;

use super::{format, Channel, Notification, Notifier, NotifyError};
use crate::utils::{truncate_chars, HttpClient};

#[derive(Debug, Serialize)]
struct Contact<'a> {
    email: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    name: Option<&'a str>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SendEmail<'a> {
    sender: Contact<'a>,
    to: Vec<Contact<'a>>,
    subject: String,
    html_content: String,
    text_content: String,
}

/// Sends notifications to a fixed recipient list
#[derive(Debug, Clone)]
pub struct BrevoEmail {
    client: HttpClient,
    endpoint: String,
    api_key: String,
    sender_email: String,
    sender_name: String,
    recipients: Vec<String>,
}

impl BrevoEmail {
    pub fn new(
        client: HttpClient,
        api_key: impl Into<String>,
        sender_email: impl Into<String>,
        recipients: Vec<String>,
    ) -> Self {
        Self {
            client,
            endpoint: "https://api.brevo.com/v3/smtp/email".to_string(),
            api_key: api_key.into(),
            sender_email: sender_email.into(),
            sender_name: "Paper Digest".to_string(),
            recipients,
        }
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    pub fn with_sender_name(mut self, name: impl Into<String>) -> Self {
        self.sender_name = name.into();
        self
    }
}

#[async_trait]
impl Notifier for BrevoEmail {
    fn channel(&self) -> Channel {
        Channel::Email
    }

    async fn send(&self, notification: &Notification) -> Result<(), NotifyError> {
        let body = SendEmail {
            sender: Contact {
                email: self.sender_email.as_str(),
                name: Some(self.sender_name.as_str()),
            },
            to: self
                .recipients
                .iter()
                .map(|email| Contact {
                    email: email.as_str(),
                    name: None,
                })
                .collect(),
            subject: format::subject(notification),
            html_content: format::render_html(notification),
            text_content: format::render_text(notification),
        };

        let response = self
            .client
            .post(&self.endpoint)
            .header("api-key", &self.api_key)
            .header("accept", "application/json")
            .json(&body)
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

        tracing::info!("Email sent to {} recipient(s)", self.recipients.len());
        Ok(())
    }
}
