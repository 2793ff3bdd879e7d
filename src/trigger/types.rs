use std::fmt::Display;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Inbound message body: `{trigger_type, data, metadata}`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MessageEnvelope {
    // any JSON value; the dispatcher rejects non-strings
    #[serde(default)]
    pub trigger_type: Option<Value>,
    #[serde(default)]
    pub data: Map<String, Value>,
    // attribution only, never validated
    #[serde(default)]
    pub metadata: Map<String, Value>,
}

impl MessageEnvelope {
    pub fn parse(raw: &str) -> serde_json::Result<Self> {
        serde_json::from_str(raw)
    }

    /// Envelope with no data, used for schema introspection.
    pub fn empty(trigger_type: &str) -> Self {
        Self {
            trigger_type: Some(Value::String(trigger_type.to_string())),
            data: Map::new(),
            metadata: Map::new(),
        }
    }

    /// A data field, treating an explicit `null` as absent.
    pub fn get_optional(&self, key: &str) -> Option<&Value> {
        self.data.get(key).filter(|v| !v.is_null())
    }

    pub fn get_metadata(&self, key: &str, default: &str) -> String {
        match self.metadata.get(key) {
            Some(Value::String(s)) => s.clone(),
            Some(Value::Null) | None => default.to_string(),
            Some(other) => other.to_string(),
        }
    }

    pub fn attribution(&self) -> Attribution {
        Attribution {
            user: self.get_metadata("user", "unknown"),
            project: self.get_metadata("project", "unknown"),
            experiment: self.get_metadata("experiment", ""),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ComputeType {
    #[default]
    Gpu,
    Cpu,
}

impl ComputeType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ComputeType::Gpu => "gpu",
            ComputeType::Cpu => "cpu",
        }
    }
}

impl Display for ComputeType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ComputeType {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "gpu" => Ok(ComputeType::Gpu),
            "cpu" => Ok(ComputeType::Cpu),
            _ => Err(format!("Invalid compute type: {}", s)),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attribution {
    pub user: String,
    pub project: String,
    pub experiment: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceSummary {
    pub vcpus: i64,
    pub memory: i64,
    pub gpus: i64,
}

/// Success shape returned by a trigger after the backend accepted the job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobSubmission {
    pub job_id: String,
    pub job_name: String,
    pub script_key: String,
    pub compute_type: ComputeType,
    pub resources: ResourceSummary,
    pub output_prefix: String,
    pub submission_time: DateTime<Utc>,
    #[serde(rename = "details")]
    pub attribution: Attribution,
}

/// Job definition the worker process reads from `JOB_DEFINITION`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkerJobDefinition {
    pub data: WorkerJobData,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkerJobData {
    pub script_key: String,
    pub compute_type: ComputeType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub operation: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_key: Option<String>,
    #[serde(default)]
    pub args: Map<String, Value>,
}
