use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::config::ResourceDefaults;
use super::types::{ComputeType, ResourceSummary};

pub const MIN_VCPUS: i64 = 1;
pub const MIN_MEMORY_MB: i64 = 256;

/// Fully resolved compute request for one job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceRequest {
    pub vcpus: i64,
    pub memory_mb: i64,
    pub gpu_count: i64,
    pub timeout_seconds: i64,
}

/// Values taken from the message; `None` falls back to the profile default.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ResourceOverrides {
    pub vcpus: Option<i64>,
    pub memory_mb: Option<i64>,
    pub gpu_count: Option<i64>,
    pub timeout_seconds: Option<i64>,
}

impl From<ResourceRequest> for ResourceOverrides {
    fn from(request: ResourceRequest) -> Self {
        Self {
            vcpus: Some(request.vcpus),
            memory_mb: Some(request.memory_mb),
            gpu_count: Some(request.gpu_count),
            timeout_seconds: Some(request.timeout_seconds),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum ResourceViolation {
    #[error("vcpus must be a positive integer")]
    Vcpus,
    #[error("memory must be >= {} MB", MIN_MEMORY_MB)]
    Memory,
    #[error("gpus must be >= 1 for GPU compute")]
    GpuRequired,
    #[error("timeout must be a positive integer")]
    Timeout,
}

/// Explicit values win; anything missing comes from the profile defaults.
pub fn resolve(
    compute_type: ComputeType,
    overrides: &ResourceOverrides,
    defaults: &ResourceDefaults,
) -> ResourceRequest {
    let profile = defaults.for_profile(compute_type);
    ResourceRequest {
        vcpus: overrides.vcpus.unwrap_or(profile.vcpus),
        memory_mb: overrides.memory_mb.unwrap_or(profile.memory_mb),
        gpu_count: overrides.gpu_count.unwrap_or(profile.gpu_count),
        timeout_seconds: overrides.timeout_seconds.unwrap_or(defaults.timeout_seconds),
    }
}

impl ResourceRequest {
    /// Checks profile floors. A CPU job asking for GPUs is logged, not rejected.
    pub fn check_bounds(&self, compute_type: ComputeType) -> Result<(), ResourceViolation> {
        if self.vcpus < MIN_VCPUS {
            return Err(ResourceViolation::Vcpus);
        }
        if self.memory_mb < MIN_MEMORY_MB {
            return Err(ResourceViolation::Memory);
        }
        if self.timeout_seconds <= 0 {
            return Err(ResourceViolation::Timeout);
        }

        match compute_type {
            ComputeType::Gpu if self.gpu_count < 1 => Err(ResourceViolation::GpuRequired),
            ComputeType::Cpu if self.gpu_count != 0 => {
                warn!("{} gpus requested for CPU compute, ignoring", self.gpu_count);
                Ok(())
            }
            _ => Ok(()),
        }
    }

    /// What is actually sent to the backend: CPU jobs never carry GPUs.
    pub fn effective(&self, compute_type: ComputeType) -> ResourceRequest {
        match compute_type {
            ComputeType::Gpu => *self,
            ComputeType::Cpu => ResourceRequest { gpu_count: 0, ..*self },
        }
    }

    pub fn summary(&self) -> ResourceSummary {
        ResourceSummary {
            vcpus: self.vcpus,
            memory: self.memory_mb,
            gpus: self.gpu_count,
        }
    }
}
