use async_trait::async_trait;
use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::info;

use super::types::ErrorKind;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeadLetterError {
    pub kind: ErrorKind,
    pub message: String,
}

/// Original payload plus the failure, for replay.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeadLetterMessage {
    pub original_message: String,
    pub error: DeadLetterError,
    pub timestamp: DateTime<Utc>,
}

impl DeadLetterMessage {
    pub fn new(original_message: &str, kind: ErrorKind, message: &str) -> Self {
        Self {
            original_message: original_message.to_string(),
            error: DeadLetterError {
                kind,
                message: message.to_string(),
            },
            timestamp: Utc::now(),
        }
    }
}

#[async_trait]
pub trait DeadLetterSink: Send + Sync {
    async fn send(&self, message: &DeadLetterMessage) -> Result<()>;
}

pub struct HttpDeadLetter {
    client: reqwest::Client,
    url: String,
}

impl HttpDeadLetter {
    pub fn new(url: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            url,
        }
    }
}

#[async_trait]
impl DeadLetterSink for HttpDeadLetter {
    async fn send(&self, message: &DeadLetterMessage) -> Result<()> {
        self.client
            .post(&self.url)
            .header("x-error-type", message.error.kind.as_str())
            .json(message)
            .send()
            .await?
            .error_for_status()?;
        info!("Message sent to DLQ");
        Ok(())
    }
}

#[derive(Clone)]
pub struct EventDeadLetter {
    pub sender: broadcast::Sender<DeadLetterMessage>,
}

impl EventDeadLetter {
    pub fn new(capacity: usize) -> (Self, broadcast::Receiver<DeadLetterMessage>) {
        let (sender, receiver) = broadcast::channel(capacity);
        (Self { sender }, receiver)
    }
}

#[async_trait]
impl DeadLetterSink for EventDeadLetter {
    async fn send(&self, message: &DeadLetterMessage) -> Result<()> {
        self.sender.send(message.clone())?;
        Ok(())
    }
}
