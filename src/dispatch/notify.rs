use async_trait::async_trait;
use anyhow::Result;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::info;

use super::types::{ErrorKind, ErrorOutcome, OutcomeRecord, SuccessOutcome};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationKind {
    Success,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub subject: String,
    pub message: String,
    pub kind: NotificationKind,
}

impl Notification {
    pub fn new(subject: impl Into<String>, message: impl Into<String>, kind: NotificationKind) -> Self {
        Self {
            subject: subject.into(),
            message: message.into(),
            kind,
        }
    }

    /// Notification for a dispatch outcome. Unexpected errors produce none.
    pub fn for_outcome(outcome: &OutcomeRecord) -> Option<Self> {
        match outcome {
            OutcomeRecord::Success(success) => Some(Self::new(
                format!("ML Trigger Success: {}", success.trigger_type),
                format_success(success),
                NotificationKind::Success,
            )),
            OutcomeRecord::Error(error) => {
                let subject = match error.error_type {
                    ErrorKind::Validation => "ML Trigger Validation Error",
                    ErrorKind::Execution => "ML Trigger Execution Error",
                    ErrorKind::Unexpected => return None,
                };
                Some(Self::new(subject, format_failure(error), NotificationKind::Error))
            }
        }
    }
}

fn format_success(success: &SuccessOutcome) -> String {
    let submission = &success.submission;
    let mut lines = vec![
        "✔ TRIGGER EXECUTION SUCCESSFUL\n".to_string(),
        format!("Trigger Type: {}", success.trigger_type),
        format!("Job ID: {}", submission.job_id),
        format!("Job Name: {}", submission.job_name),
        format!(
            "Resources: {} vCPU, {} MB, {} GPU",
            submission.resources.vcpus, submission.resources.memory, submission.resources.gpus
        ),
    ];

    let attribution = &submission.attribution;
    let details: Vec<String> = [
        ("user", &attribution.user),
        ("project", &attribution.project),
        ("experiment", &attribution.experiment),
    ]
    .into_iter()
    .filter(|(_, value)| !value.is_empty())
    .map(|(key, value)| format!("  {}: {}", key, value))
    .collect();
    if !details.is_empty() {
        lines.push("\nDetails:".to_string());
        lines.extend(details);
    }

    lines.push(format!("\nTimestamp: {}", success.timestamp.to_rfc3339()));
    lines.join("\n")
}

fn format_failure(error: &ErrorOutcome) -> String {
    [
        "✗ TRIGGER EXECUTION FAILED\n".to_string(),
        format!("Error Type: {}", error.error_type),
        format!("Error: {}", error.error_message),
        format!("\nTimestamp: {}", error.timestamp.to_rfc3339()),
    ]
    .join("\n")
}

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, notification: &Notification) -> Result<()>;
}

/// Posts notifications as JSON to a webhook.
pub struct HttpNotifier {
    client: reqwest::Client,
    url: String,
}

impl HttpNotifier {
    pub fn new(url: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            url,
        }
    }
}

#[async_trait]
impl Notifier for HttpNotifier {
    async fn notify(&self, notification: &Notification) -> Result<()> {
        self.client
            .post(&self.url)
            .json(notification)
            .send()
            .await?
            .error_for_status()?;
        info!("Notification sent: {}", notification.subject);
        Ok(())
    }
}

// 进程内通知，供订阅者和测试使用
#[derive(Clone)]
pub struct EventNotifier {
    pub sender: broadcast::Sender<Notification>,
}

impl EventNotifier {
    pub fn new(capacity: usize) -> (Self, broadcast::Receiver<Notification>) {
        let (sender, receiver) = broadcast::channel(capacity);
        (Self { sender }, receiver)
    }
}

#[async_trait]
impl Notifier for EventNotifier {
    async fn notify(&self, notification: &Notification) -> Result<()> {
        self.sender.send(notification.clone())?;
        Ok(())
    }
}
