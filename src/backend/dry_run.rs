use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use tracing::info;
use uuid::Uuid;

use super::{BackendError, BatchBackend, SubmissionRequest};

/// Accepts every job without sending it anywhere. Only a counter is kept.
#[derive(Default)]
pub struct DryRunBatchBackend {
    accepted: AtomicU64,
}

impl DryRunBatchBackend {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl BatchBackend for DryRunBatchBackend {
    async fn submit_job(&self, request: &SubmissionRequest) -> Result<String, BackendError> {
        let job_id = Uuid::new_v4().to_string();
        let accepted = self.accepted.fetch_add(1, Ordering::Relaxed) + 1;
        info!(
            "Dry run: job {} on {} accepted as {} ({} so far)",
            request.job_name, request.queue_id, job_id, accepted
        );
        Ok(job_id)
    }
}
