//! Batch job state-change handling. Terminal states are turned into
//! operator notifications and a JSON summary in the output bucket;
//! everything else is only acknowledged.

pub mod summary;

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{error, info};

use crate::dispatch::{Notification, NotificationKind, Notifier};

pub use summary::{EventJobSummarySink, HttpJobSummarySink, JobSummary, JobSummarySink, WrittenSummary};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobStateChangeEvent {
    pub detail: JobDetail,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobDetail {
    pub job_name: String,
    pub job_id: String,
    pub status: String,
    // epoch millis
    #[serde(default)]
    pub started_at: Option<i64>,
    #[serde(default)]
    pub stopped_at: Option<i64>,
    #[serde(default)]
    pub status_reason: Option<String>,
    #[serde(default)]
    pub container: Option<ContainerDetail>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContainerDetail {
    #[serde(default)]
    pub exit_code: Option<i64>,
    #[serde(default)]
    pub reason: Option<String>,
    #[serde(default)]
    pub log_stream_name: Option<String>,
    #[serde(default)]
    pub environment: Vec<EnvironmentEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnvironmentEntry {
    pub name: String,
    pub value: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    Succeeded,
    Failed,
    Other,
}

impl JobState {
    fn parse(status: &str) -> Self {
        match status {
            "SUCCEEDED" => JobState::Succeeded,
            "FAILED" => JobState::Failed,
            _ => JobState::Other,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitorReport {
    pub message: String,
    pub state: JobState,
    pub notified: bool,
    pub summary_key: Option<String>,
}

pub struct JobMonitor {
    output_bucket: String,
    notifier: Option<Arc<dyn Notifier>>,
    summary_sink: Option<Arc<dyn JobSummarySink>>,
}

impl JobMonitor {
    pub fn new(output_bucket: String, notifier: Option<Arc<dyn Notifier>>) -> Self {
        Self { output_bucket, notifier, summary_sink: None }
    }

    pub fn with_summary_sink(mut self, sink: Arc<dyn JobSummarySink>) -> Self {
        self.summary_sink = Some(sink);
        self
    }

    pub async fn handle(&self, event: &JobStateChangeEvent) -> MonitorReport {
        let detail = &event.detail;
        info!("Job {} (ID: {}) changed to status: {}", detail.job_name, detail.job_id, detail.status);

        let state = JobState::parse(&detail.status);
        let notification = match state {
            JobState::Succeeded => Some(self.success_notification(detail)),
            JobState::Failed => Some(failure_notification(detail)),
            JobState::Other => None,
        };

        let notified = match (notification, &self.notifier) {
            (Some(notification), Some(notifier)) => match notifier.notify(&notification).await {
                Ok(()) => true,
                Err(e) => {
                    error!("Error sending notification: {}", e);
                    false
                }
            },
            _ => false,
        };

        let summary_key = match state {
            JobState::Succeeded | JobState::Failed => self.write_summary(detail).await,
            JobState::Other => None,
        };

        MonitorReport {
            message: format!("Processed job {} with status {}", detail.job_name, detail.status),
            state,
            notified,
            summary_key,
        }
    }

    /// Key of the written summary, `None` without a sink or on failure.
    async fn write_summary(&self, detail: &JobDetail) -> Option<String> {
        let sink = self.summary_sink.as_ref()?;
        let summary = JobSummary::new(detail, Utc::now());
        let key = summary.key();

        match sink.write(&self.output_bucket, &key, &summary).await {
            Ok(()) => Some(key),
            Err(e) => {
                error!("Error creating job summary: {}", e);
                None
            }
        }
    }

    fn success_notification(&self, detail: &JobDetail) -> Notification {
        info!("Job {} completed successfully", detail.job_name);

        let container = detail.container.clone().unwrap_or_default();
        let env: HashMap<&str, &str> = container
            .environment
            .iter()
            .map(|e| (e.name.as_str(), e.value.as_str()))
            .collect();
        let output_prefix = env
            .get("OUTPUT_PREFIX")
            .map(|p| p.to_string())
            .unwrap_or_else(|| format!("results/{}/", detail.job_name));

        let message = format!(
            "ML Job Completed Successfully\n\n\
             Job Name: {}\n\
             Job ID: {}\n\
             Duration: {:.2} seconds\n\
             Exit Code: {}\n\n\
             Output Location: s3://{}/{}\n\n\
             Logs: {}\n\n\
             Check the output bucket for results.",
            detail.job_name,
            detail.job_id,
            duration_seconds(detail),
            exit_code(&container),
            self.output_bucket,
            output_prefix,
            container.log_stream_name.as_deref().unwrap_or(""),
        );

        Notification::new(
            format!("ML Job Succeeded: {}", detail.job_name),
            message,
            NotificationKind::Success,
        )
    }
}

fn failure_notification(detail: &JobDetail) -> Notification {
    info!("Job {} failed", detail.job_name);

    let container = detail.container.clone().unwrap_or_default();
    let message = format!(
        "ML Job Failed\n\n\
         Job Name: {}\n\
         Job ID: {}\n\
         Exit Code: {}\n\
         Reason: {}\n\
         Status Reason: {}\n\n\
         Logs: {}\n\n\
         Please check the logs for detailed error information.",
        detail.job_name,
        detail.job_id,
        exit_code(&container),
        container.reason.as_deref().unwrap_or("Unknown"),
        detail.status_reason.as_deref().unwrap_or("No reason provided"),
        container.log_stream_name.as_deref().unwrap_or(""),
    );

    Notification::new(
        format!("ML Job Failed: {}", detail.job_name),
        message,
        NotificationKind::Error,
    )
}

fn duration_seconds(detail: &JobDetail) -> f64 {
    match (detail.started_at, detail.stopped_at) {
        (Some(start), Some(stop)) if start > 0 && stop > 0 => (stop - start) as f64 / 1000.0,
        _ => 0.0,
    }
}

fn exit_code(container: &ContainerDetail) -> String {
    container
        .exit_code
        .map(|c| c.to_string())
        .unwrap_or_else(|| "Unknown".to_string())
}
