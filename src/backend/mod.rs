pub mod dry_run;
pub mod http;
#[cfg(test)]
pub mod memory;

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::trigger::{ComputeType, ResourceRequest};

pub use dry_run::DryRunBatchBackend;
pub use http::HttpBatchBackend;

#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    #[error("transport error: {0}")]
    Transport(String),
    #[error("backend rejected the job ({status}): {body}")]
    Rejected { status: u16, body: String },
    #[error("invalid backend response: {0}")]
    InvalidResponse(String),
}

impl From<reqwest::Error> for BackendError {
    fn from(e: reqwest::Error) -> Self {
        BackendError::Transport(e.to_string())
    }
}

/// Everything the batch service needs to start one job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubmissionRequest {
    pub job_name: String,
    pub queue_id: String,
    pub definition_id: String,
    pub compute_type: ComputeType,
    pub resources: ResourceRequest,
    pub environment: BTreeMap<String, String>,
    pub timeout_seconds: i64,
}

/// The external batch compute service.
#[async_trait]
pub trait BatchBackend: Send + Sync {
    /// Returns the backend-assigned job id.
    async fn submit_job(&self, request: &SubmissionRequest) -> Result<String, BackendError>;
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitJobInput {
    pub job_name: String,
    pub job_queue: String,
    pub job_definition: String,
    pub container_overrides: ContainerOverrides,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout: Option<JobTimeout>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContainerOverrides {
    pub resource_requirements: Vec<ResourceRequirement>,
    pub environment: Vec<KeyValuePair>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceRequirement {
    #[serde(rename = "type")]
    pub kind: String,
    pub value: String,
}

impl ResourceRequirement {
    fn new(kind: &str, value: i64) -> Self {
        Self { kind: kind.to_string(), value: value.to_string() }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyValuePair {
    pub name: String,
    pub value: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobTimeout {
    pub attempt_duration_seconds: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitJobOutput {
    pub job_id: String,
    #[serde(default)]
    pub job_name: Option<String>,
}

impl SubmissionRequest {
    /// Wire body for the batch service. GPU requirements are only sent for
    /// the GPU profile; the timeout only when positive.
    pub fn to_wire(&self) -> SubmitJobInput {
        let mut resource_requirements = vec![
            ResourceRequirement::new("VCPU", self.resources.vcpus),
            ResourceRequirement::new("MEMORY", self.resources.memory_mb),
        ];
        if self.compute_type == ComputeType::Gpu && self.resources.gpu_count > 0 {
            resource_requirements.push(ResourceRequirement::new("GPU", self.resources.gpu_count));
        }

        let environment = self
            .environment
            .iter()
            .map(|(name, value)| KeyValuePair { name: name.clone(), value: value.clone() })
            .collect();

        SubmitJobInput {
            job_name: self.job_name.clone(),
            job_queue: self.queue_id.clone(),
            job_definition: self.definition_id.clone(),
            container_overrides: ContainerOverrides { resource_requirements, environment },
            timeout: (self.timeout_seconds > 0)
                .then_some(JobTimeout { attempt_duration_seconds: self.timeout_seconds }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn request(compute_type: ComputeType, gpu_count: i64, timeout_seconds: i64) -> SubmissionRequest {
        SubmissionRequest {
            job_name: "clip-20240301-101530".to_string(),
            queue_id: "queue".to_string(),
            definition_id: "def".to_string(),
            compute_type,
            resources: ResourceRequest { vcpus: 4, memory_mb: 16384, gpu_count, timeout_seconds },
            environment: BTreeMap::from([("INPUT_KEY".to_string(), "jobs/clip.py".to_string())]),
            timeout_seconds,
        }
    }

    #[test]
    fn test_gpu_wire_shape() {
        let wire = serde_json::to_value(request(ComputeType::Gpu, 1, 3600).to_wire()).unwrap();
        assert_eq!(
            wire,
            json!({
                "jobName": "clip-20240301-101530",
                "jobQueue": "queue",
                "jobDefinition": "def",
                "containerOverrides": {
                    "resourceRequirements": [
                        {"type": "VCPU", "value": "4"},
                        {"type": "MEMORY", "value": "16384"},
                        {"type": "GPU", "value": "1"}
                    ],
                    "environment": [{"name": "INPUT_KEY", "value": "jobs/clip.py"}]
                },
                "timeout": {"attemptDurationSeconds": 3600}
            })
        );
    }

    #[test]
    fn test_cpu_wire_has_no_gpu_requirement() {
        let wire = request(ComputeType::Cpu, 2, 3600).to_wire();
        let kinds: Vec<&str> = wire
            .container_overrides
            .resource_requirements
            .iter()
            .map(|r| r.kind.as_str())
            .collect();
        assert_eq!(kinds, vec!["VCPU", "MEMORY"]);
    }

    #[test]
    fn test_zero_timeout_omitted() {
        let wire = serde_json::to_value(request(ComputeType::Cpu, 0, 0).to_wire()).unwrap();
        assert!(wire.get("timeout").is_none());
    }

    #[test]
    fn test_output_parse() {
        let output: SubmitJobOutput =
            serde_json::from_str(r#"{"jobId":"abc-123","jobName":"clip"}"#).unwrap();
        assert_eq!(output.job_id, "abc-123");
    }
}
