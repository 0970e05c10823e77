//! Recording notifier for testing purposes.

use async_trait::async_trait;
use std::sync::{Arc, Mutex, PoisonError};

use super::{Channel, Notification, Notifier, NotifyError};

/// Records every notification; optionally fails every send
#[derive(Debug, Clone)]
pub struct MockNotifier {
    channel: Channel,
    fail: bool,
    sent: Arc<Mutex<Vec<Notification>>>,
}

impl MockNotifier {
    pub fn new(channel: Channel) -> Self {
        Self {
            channel,
            fail: false,
            sent: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Reject every send with a server error
    pub fn failing(mut self) -> Self {
        self.fail = true;
        self
    }

    /// Notifications accepted or attempted so far
    pub fn sent(&self) -> Vec<Notification> {
        self.sent.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }
}

#[async_trait]
impl Notifier for MockNotifier {
    fn channel(&self) -> Channel {
        self.channel
    }

    async fn send(&self, notification: &Notification) -> Result<(), NotifyError> {
        self.sent.lock().unwrap_or_else(PoisonError::into_inner).push(notification.clone());
        if self.fail {
            return Err(NotifyError::Api {
                status: 500,
                message: "mock failure".to_string(),
            });
        }
        Ok(())
    }
}
