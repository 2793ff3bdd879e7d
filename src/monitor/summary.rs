use async_trait::async_trait;
use anyhow::Result;
use chrono::{DateTime, Utc};
use reqwest::header::CONTENT_TYPE;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::info;

use super::JobDetail;

/// JSON record written to the output bucket when a job reaches a terminal state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobSummary {
    pub job_name: String,
    pub job_id: String,
    pub status: String,
    pub timestamp: DateTime<Utc>,
    pub details: JobDetail,
}

impl JobSummary {
    pub fn new(detail: &JobDetail, timestamp: DateTime<Utc>) -> Self {
        Self {
            job_name: detail.job_name.clone(),
            job_id: detail.job_id.clone(),
            status: detail.status.clone(),
            timestamp,
            details: detail.clone(),
        }
    }

    /// `job-summaries/{YYYY-MM-DD}/{job_name}-{job_id}.json`
    pub fn key(&self) -> String {
        format!(
            "job-summaries/{}/{}-{}.json",
            self.timestamp.format("%Y-%m-%d"),
            self.job_name,
            self.job_id
        )
    }
}

#[async_trait]
pub trait JobSummarySink: Send + Sync {
    async fn write(&self, bucket: &str, key: &str, summary: &JobSummary) -> Result<()>;
}

/// PUTs the summary to `{base_url}/{bucket}/{key}` on an object-store gateway.
pub struct HttpJobSummarySink {
    client: reqwest::Client,
    base_url: String,
}

impl HttpJobSummarySink {
    pub fn new(base_url: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl JobSummarySink for HttpJobSummarySink {
    async fn write(&self, bucket: &str, key: &str, summary: &JobSummary) -> Result<()> {
        self.client
            .put(format!("{}/{}/{}", self.base_url, bucket, key))
            .header(CONTENT_TYPE, "application/json")
            .body(serde_json::to_string_pretty(summary)?)
            .send()
            .await?
            .error_for_status()?;
        info!("Created job summary: s3://{}/{}", bucket, key);
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct WrittenSummary {
    pub bucket: String,
    pub key: String,
    pub summary: JobSummary,
}

#[derive(Clone)]
pub struct EventJobSummarySink {
    pub sender: broadcast::Sender<WrittenSummary>,
}

impl EventJobSummarySink {
    pub fn new(capacity: usize) -> (Self, broadcast::Receiver<WrittenSummary>) {
        let (sender, receiver) = broadcast::channel(capacity);
        (Self { sender }, receiver)
    }
}

#[async_trait]
impl JobSummarySink for EventJobSummarySink {
    async fn write(&self, bucket: &str, key: &str, summary: &JobSummary) -> Result<()> {
        self.sender.send(WrittenSummary {
            bucket: bucket.to_string(),
            key: key.to_string(),
            summary: summary.clone(),
        })?;
        Ok(())
    }
}
