pub mod batch_job;
pub mod error;
pub mod naming;
pub mod registry;
pub mod resources;
pub mod types;

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::backend::BatchBackend;
use crate::config::TriggerConfig;

pub use batch_job::BatchJobTrigger;
pub use error::TriggerError;
pub use registry::{TriggerFactory, TriggerRegistry};
pub use resources::{ResourceOverrides, ResourceRequest};
pub use types::{
    Attribution, ComputeType, JobSubmission, MessageEnvelope, ResourceSummary,
    WorkerJobData, WorkerJobDefinition,
};

/// Collaborators handed to every trigger at construction time.
pub struct TriggerContext {
    pub config: TriggerConfig,
    pub backend: Arc<dyn BatchBackend>,
}

impl TriggerContext {
    pub fn new(config: TriggerConfig, backend: Arc<dyn BatchBackend>) -> Self {
        Self { config, backend }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TriggerSchema {
    pub trigger_type: String,
    pub required_fields: Vec<String>,
    pub optional_fields: Map<String, Value>,
}

/// One class of submittable work.
///
/// Construction performs no I/O. `validate` must reject a message before
/// `execute` touches the backend, and `execute` reports every failure as
/// [`TriggerError::Execution`].
#[async_trait]
pub trait Trigger: Send + Sync {
    fn name(&self) -> &'static str;
    fn required_fields(&self) -> &'static [&'static str];
    fn optional_fields(&self) -> Map<String, Value>;
    fn envelope(&self) -> &MessageEnvelope;

    fn validate(&self) -> Result<(), TriggerError> {
        let data = &self.envelope().data;
        let missing: Vec<&str> = self
            .required_fields()
            .iter()
            .copied()
            .filter(|field| !data.contains_key(*field))
            .collect();

        if !missing.is_empty() {
            return Err(TriggerError::Validation(format!(
                "{}: Missing required fields: {}",
                self.name(),
                missing.join(", ")
            )));
        }

        self.validate_custom()
    }

    /// Variant-specific structural checks; only run once required fields are present.
    fn validate_custom(&self) -> Result<(), TriggerError> {
        Ok(())
    }

    async fn execute(&self) -> Result<JobSubmission, TriggerError>;

    fn schema(&self) -> TriggerSchema {
        TriggerSchema {
            trigger_type: self.name().to_string(),
            required_fields: self.required_fields().iter().map(|f| f.to_string()).collect(),
            optional_fields: self.optional_fields(),
        }
    }
}
