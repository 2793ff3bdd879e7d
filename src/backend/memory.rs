use std::sync::RwLock;

use async_trait::async_trait;
use tracing::info;
use uuid::Uuid;

use super::{BackendError, BatchBackend, SubmissionRequest};

/// Records every submission for inspection in tests.
#[derive(Default)]
pub struct InMemoryBatchBackend {
    submissions: RwLock<Vec<SubmissionRequest>>,
    failure: RwLock<Option<String>>,
}

impl InMemoryBatchBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every later submission fails with `message`.
    pub fn fail_with(&self, message: impl Into<String>) {
        if let Ok(mut failure) = self.failure.write() {
            *failure = Some(message.into());
        }
    }

    pub fn submissions(&self) -> Vec<SubmissionRequest> {
        self.submissions.read().map(|s| s.clone()).unwrap_or_default()
    }

    pub fn submission_count(&self) -> usize {
        self.submissions.read().map(|s| s.len()).unwrap_or(0)
    }
}

#[async_trait]
impl BatchBackend for InMemoryBatchBackend {
    async fn submit_job(&self, request: &SubmissionRequest) -> Result<String, BackendError> {
        let failure = self
            .failure
            .read()
            .map_err(|e| BackendError::Transport(e.to_string()))?
            .clone();
        if let Some(message) = failure {
            return Err(BackendError::Transport(message));
        }

        let job_id = Uuid::new_v4().to_string();
        self.submissions
            .write()
            .map_err(|e| BackendError::Transport(e.to_string()))?
            .push(request.clone());

        info!("Recorded job {} as {} (dry run)", request.job_name, job_id);
        Ok(job_id)
    }
}
