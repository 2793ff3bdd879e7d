use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, error};

use super::{BackendError, BatchBackend, SubmissionRequest, SubmitJobOutput};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Posts `SubmitJob` bodies to a batch service endpoint.
#[derive(Clone)]
pub struct HttpBatchBackend {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpBatchBackend {
    pub fn new(endpoint: impl Into<String>) -> Result<Self, BackendError> {
        let client = reqwest::Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self {
            client,
            endpoint: endpoint.into(),
        })
    }
}

#[async_trait]
impl BatchBackend for HttpBatchBackend {
    async fn submit_job(&self, request: &SubmissionRequest) -> Result<String, BackendError> {
        let body = request.to_wire();
        debug!("POST {} jobName={}", self.endpoint, body.job_name);

        let response = self.client.post(&self.endpoint).json(&body).send().await?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            error!("Batch service rejected {}: {} {}", body.job_name, status, text);
            return Err(BackendError::Rejected {
                status: status.as_u16(),
                body: text,
            });
        }

        let output: SubmitJobOutput = response
            .json()
            .await
            .map_err(|e| BackendError::InvalidResponse(e.to_string()))?;

        if output.job_id.is_empty() {
            return Err(BackendError::InvalidResponse("empty jobId".to_string()));
        }
        Ok(output.job_id)
    }
}
