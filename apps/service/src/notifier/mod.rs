//! Outbound messaging.
//!
//! Delivery is best-effort: failures are logged by [`AlertDispatcher`] and
//! never reach the monitor loop.

pub mod telegram;

use std::sync::Arc;
use thiserror::Error;

pub use telegram::TelegramClient;

/// Conversation identifier of a recipient
pub type ChatId = i64;

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("API rejected the request: {0}")]
    Api(String),
}

/// Sends a text message to a single recipient
#[async_trait::async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, recipient: ChatId, text: &str) -> Result<(), NotifyError>;
}

/// Fans alerts out to every configured recipient
#[derive(Clone)]
pub struct AlertDispatcher {
    notifier: Arc<dyn Notifier>,
    recipients: Vec<ChatId>,
}

impl AlertDispatcher {
    pub fn new(notifier: Arc<dyn Notifier>, recipients: Vec<ChatId>) -> Self {
        Self { notifier, recipients }
    }

    /// Send `text` to all recipients, returning how many deliveries succeeded
    pub async fn broadcast(&self, text: &str) -> usize {
        let mut delivered = 0;
        for &recipient in &self.recipients {
            match self.notifier.send(recipient, text).await {
                Ok(()) => delivered += 1,
                Err(e) => tracing::warn!(recipient, error = %e, "Failed to deliver alert"),
            }
        }
        delivered
    }
}
