use std::env;
use std::fmt::Display;
use std::net::SocketAddr;
use std::str::FromStr;

use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};

use crate::trigger::ComputeType;

/// Per-profile resource defaults applied when a message omits a value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileDefaults {
    pub vcpus: i64,
    pub memory_mb: i64,
    pub gpu_count: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceDefaults {
    pub gpu: ProfileDefaults,
    pub cpu: ProfileDefaults,
    pub timeout_seconds: i64,
}

impl Default for ResourceDefaults {
    fn default() -> Self {
        Self {
            gpu: ProfileDefaults { vcpus: 4, memory_mb: 16384, gpu_count: 1 },
            cpu: ProfileDefaults { vcpus: 2, memory_mb: 4096, gpu_count: 0 },
            timeout_seconds: 3600,
        }
    }
}

impl ResourceDefaults {
    pub fn for_profile(&self, compute_type: ComputeType) -> &ProfileDefaults {
        match compute_type {
            ComputeType::Gpu => &self.gpu,
            ComputeType::Cpu => &self.cpu,
        }
    }
}

/// Everything a trigger needs to know about the deployment it submits into.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TriggerConfig {
    pub gpu_job_queue: String,
    pub gpu_job_definition: String,
    pub cpu_job_queue: String,
    pub cpu_job_definition: String,
    pub input_bucket: String,
    pub output_bucket: String,
    pub resource_defaults: ResourceDefaults,
    // accepted work-reference suffixes, e.g. ".py"
    pub script_suffixes: Vec<String>,
}

impl Default for TriggerConfig {
    fn default() -> Self {
        Self {
            gpu_job_queue: String::new(),
            gpu_job_definition: String::new(),
            cpu_job_queue: String::new(),
            cpu_job_definition: String::new(),
            input_bucket: String::new(),
            output_bucket: String::new(),
            resource_defaults: ResourceDefaults::default(),
            script_suffixes: vec![".py".to_string()],
        }
    }
}

impl TriggerConfig {
    /// Returns `(queue, definition)` for the profile.
    pub fn queue_for(&self, compute_type: ComputeType) -> (&str, &str) {
        match compute_type {
            ComputeType::Gpu => (&self.gpu_job_queue, &self.gpu_job_definition),
            ComputeType::Cpu => (&self.cpu_job_queue, &self.cpu_job_definition),
        }
    }

    fn from_lookup(lookup: &impl Fn(&str) -> Option<String>) -> Result<Self> {
        let defaults = ResourceDefaults::default();
        let resource_defaults = ResourceDefaults {
            gpu: ProfileDefaults {
                vcpus: parsed(lookup, "DEFAULT_GPU_VCPUS", defaults.gpu.vcpus)?,
                memory_mb: parsed(lookup, "DEFAULT_GPU_MEMORY", defaults.gpu.memory_mb)?,
                gpu_count: parsed(lookup, "DEFAULT_GPU_GPUS", defaults.gpu.gpu_count)?,
            },
            cpu: ProfileDefaults {
                vcpus: parsed(lookup, "DEFAULT_CPU_VCPUS", defaults.cpu.vcpus)?,
                memory_mb: parsed(lookup, "DEFAULT_CPU_MEMORY", defaults.cpu.memory_mb)?,
                gpu_count: 0,
            },
            timeout_seconds: parsed(lookup, "DEFAULT_JOB_TIMEOUT", defaults.timeout_seconds)?,
        };

        let script_suffixes = match optional(lookup, "SCRIPT_SUFFIXES") {
            Some(raw) => raw
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect(),
            None => vec![".py".to_string()],
        };

        Ok(Self {
            gpu_job_queue: required(lookup, "BATCH_JOB_QUEUE")?,
            gpu_job_definition: required(lookup, "ML_PYTHON_JOB_DEFINITION")?,
            cpu_job_queue: optional(lookup, "CPU_JOB_QUEUE").unwrap_or_default(),
            cpu_job_definition: optional(lookup, "ML_PYTHON_CPU_JOB_DEFINITION").unwrap_or_default(),
            input_bucket: optional(lookup, "ML_INPUT_BUCKET").unwrap_or_default(),
            output_bucket: required(lookup, "ML_OUTPUT_BUCKET")?,
            resource_defaults,
            script_suffixes,
        })
    }
}

/// Side-channel switches for the dispatcher.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DispatchSettings {
    pub enable_notifications: bool,
    pub notification_url: Option<String>,
    pub dlq_url: Option<String>,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub trigger: TriggerConfig,
    pub dispatch: DispatchSettings,
    pub batch_api_url: Option<String>,
    pub job_summary_url: Option<String>,
    pub listen_addr: SocketAddr,
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let trigger = TriggerConfig::from_lookup(&lookup)?;
        let dispatch = DispatchSettings {
            enable_notifications: optional(&lookup, "ENABLE_NOTIFICATIONS")
                .map(|v| v.eq_ignore_ascii_case("true"))
                .unwrap_or(false),
            notification_url: optional(&lookup, "NOTIFICATION_URL"),
            dlq_url: optional(&lookup, "DLQ_URL"),
        };

        Ok(Self {
            trigger,
            dispatch,
            batch_api_url: optional(&lookup, "BATCH_API_URL"),
            job_summary_url: optional(&lookup, "JOB_SUMMARY_URL"),
            listen_addr: parsed(&lookup, "LISTEN_ADDR", SocketAddr::from(([127, 0, 0, 1], 7200)))?,
        })
    }
}

fn optional(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<String> {
    lookup(key).filter(|v| !v.trim().is_empty())
}

fn required(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Result<String> {
    optional(lookup, key).ok_or_else(|| anyhow!("Missing required environment variable: {}", key))
}

fn parsed<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: Display,
{
    match optional(lookup, key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|e| anyhow!("Invalid value for {}: {} ({})", key, raw, e)),
        None => Ok(default),
    }
}
