use std::collections::BTreeMap;
use std::fmt::Display;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use once_cell::sync::OnceCell;
use serde_json::{json, Map, Value};
use tracing::{debug, error, info};

use crate::backend::SubmissionRequest;
use super::naming::{generate_job_name, output_prefix};
use super::resources::{self, ResourceOverrides, ResourceRequest, ResourceViolation};
use super::types::{
    Attribution, ComputeType, JobSubmission, MessageEnvelope, WorkerJobData, WorkerJobDefinition,
};
use super::{Trigger, TriggerContext, TriggerError};

/// Submits one batch job per message.
///
/// Required: `script_key`. Optional: `compute_type` (`gpu`|`cpu`, default
/// `gpu`), `vcpus`, `memory`, `gpus`, `timeout`, `additional_env`,
/// `job_name`, plus the worker fields `operation`, `input_key`,
/// `output_key`, `args` which are forwarded in `JOB_DEFINITION`.
pub struct BatchJobTrigger {
    envelope: MessageEnvelope,
    ctx: Arc<TriggerContext>,
    plan: OnceCell<JobPlan>,
}

/// Everything derived from the message. Built once by
/// [`BatchJobTrigger::plan`] and shared by validation and execution.
#[derive(Debug, Clone, PartialEq)]
struct JobPlan {
    script_key: String,
    compute_type: ComputeType,
    resources: ResourceRequest,
    additional_env: BTreeMap<String, String>,
    job_name: Option<String>,
    operation: Option<String>,
    input_key: Option<String>,
    output_key: Option<String>,
    args: Map<String, Value>,
}

impl BatchJobTrigger {
    pub const NAME: &'static str = "batch_job";
    const REQUIRED_FIELDS: &'static [&'static str] = &["script_key"];

    pub fn new(envelope: MessageEnvelope, ctx: Arc<TriggerContext>) -> Self {
        debug!("Initializing {} trigger", Self::NAME);
        Self { envelope, ctx, plan: OnceCell::new() }
    }

    pub fn boxed(envelope: MessageEnvelope, ctx: Arc<TriggerContext>) -> Box<dyn Trigger> {
        Box::new(Self::new(envelope, ctx))
    }

    fn invalid(reason: impl Display) -> TriggerError {
        TriggerError::Validation(format!("{}: {}", Self::NAME, reason))
    }

    fn script_key(&self) -> Result<String, TriggerError> {
        let script_key = match self.envelope.data.get("script_key") {
            Some(Value::String(s)) => s.clone(),
            Some(other) => return Err(Self::invalid(format!("script_key must be a string, got: {}", other))),
            None => return Err(Self::invalid("Missing required fields: script_key")),
        };

        let suffixes = &self.ctx.config.script_suffixes;
        if !suffixes.iter().any(|suffix| script_key.ends_with(suffix.as_str())) {
            return Err(Self::invalid(format!(
                "script_key must be a {} file, got: {}",
                suffixes.join(" or "),
                script_key
            )));
        }

        Ok(script_key)
    }

    fn compute_type(&self) -> Result<ComputeType, TriggerError> {
        match self.envelope.data.get("compute_type") {
            None => Ok(ComputeType::default()),
            Some(Value::String(s)) => s
                .parse()
                .map_err(|_| Self::invalid(format!("compute_type must be 'gpu' or 'cpu', got: {}", s))),
            Some(other) => Err(Self::invalid(format!(
                "compute_type must be 'gpu' or 'cpu', got: {}",
                other
            ))),
        }
    }

    fn integer_field(&self, key: &str, violation: impl Display) -> Result<Option<i64>, TriggerError> {
        match self.envelope.get_optional(key) {
            None => Ok(None),
            Some(value) => value.as_i64().map(Some).ok_or_else(|| Self::invalid(violation)),
        }
    }

    fn overrides(&self) -> Result<ResourceOverrides, TriggerError> {
        Ok(ResourceOverrides {
            vcpus: self.integer_field("vcpus", ResourceViolation::Vcpus)?,
            memory_mb: self.integer_field("memory", ResourceViolation::Memory)?,
            gpu_count: self.integer_field("gpus", "gpus must be an integer")?,
            timeout_seconds: self.integer_field("timeout", ResourceViolation::Timeout)?,
        })
    }

    fn string_field(&self, key: &str) -> Result<Option<String>, TriggerError> {
        match self.envelope.get_optional(key) {
            None => Ok(None),
            Some(Value::String(s)) => Ok(Some(s.clone())),
            Some(other) => Err(Self::invalid(format!("{} must be a string, got: {}", key, other))),
        }
    }

    fn object_field(&self, key: &str) -> Result<Map<String, Value>, TriggerError> {
        match self.envelope.get_optional(key) {
            None => Ok(Map::new()),
            Some(Value::Object(map)) => Ok(map.clone()),
            Some(other) => Err(Self::invalid(format!("{} must be an object, got: {}", key, other))),
        }
    }

    /// Failed plans are not cached; the next call re-reads the message.
    fn plan(&self) -> Result<&JobPlan, TriggerError> {
        self.plan.get_or_try_init(|| self.build_plan())
    }

    fn build_plan(&self) -> Result<JobPlan, TriggerError> {
        let script_key = self.script_key()?;
        let compute_type = self.compute_type()?;

        let resources = resources::resolve(
            compute_type,
            &self.overrides()?,
            &self.ctx.config.resource_defaults,
        );
        resources.check_bounds(compute_type).map_err(Self::invalid)?;

        let additional_env = self
            .object_field("additional_env")?
            .into_iter()
            .map(|(key, value)| {
                let value = match value {
                    Value::String(s) => s,
                    other => other.to_string(),
                };
                (key, value)
            })
            .collect();

        Ok(JobPlan {
            script_key,
            compute_type,
            resources,
            additional_env,
            // an empty override still means "generate one"
            job_name: self.string_field("job_name")?.filter(|name| !name.is_empty()),
            operation: self.string_field("operation")?,
            input_key: self.string_field("input_key")?,
            output_key: self.string_field("output_key")?,
            args: self.object_field("args")?,
        })
    }

    fn environment(
        &self,
        plan: &JobPlan,
        output_prefix: &str,
        attribution: &Attribution,
        now: DateTime<Utc>,
    ) -> Result<BTreeMap<String, String>, TriggerError> {
        let config = &self.ctx.config;
        let job_definition = WorkerJobDefinition {
            data: WorkerJobData {
                script_key: plan.script_key.clone(),
                compute_type: plan.compute_type,
                operation: plan.operation.clone(),
                input_key: plan.input_key.clone(),
                output_key: plan.output_key.clone(),
                args: plan.args.clone(),
            },
        };
        let job_definition = serde_json::to_string(&job_definition)
            .map_err(|e| TriggerError::execution(format!("Failed to encode job definition: {}", e)))?;

        let mut env = BTreeMap::from([
            ("INPUT_BUCKET".to_string(), config.input_bucket.clone()),
            ("INPUT_KEY".to_string(), plan.script_key.clone()),
            ("OUTPUT_BUCKET".to_string(), config.output_bucket.clone()),
            ("OUTPUT_PREFIX".to_string(), output_prefix.to_string()),
            ("TIMESTAMP".to_string(), now.to_rfc3339()),
            ("TRIGGER_USER".to_string(), attribution.user.clone()),
            ("TRIGGER_PROJECT".to_string(), attribution.project.clone()),
            ("TRIGGER_EXPERIMENT".to_string(), attribution.experiment.clone()),
            ("COMPUTE_TYPE".to_string(), plan.compute_type.to_string()),
            ("JOB_DEFINITION".to_string(), job_definition),
        ]);

        // additional keys win
        env.extend(plan.additional_env.clone());
        env.retain(|_, value| !value.is_empty());

        Ok(env)
    }
}

#[async_trait]
impl Trigger for BatchJobTrigger {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn required_fields(&self) -> &'static [&'static str] {
        Self::REQUIRED_FIELDS
    }

    fn optional_fields(&self) -> Map<String, Value> {
        let defaults = &self.ctx.config.resource_defaults;
        match json!({
            "compute_type": ComputeType::default().as_str(),
            "vcpus": null,
            "memory": null,
            "gpus": null,
            "timeout": defaults.timeout_seconds,
            "additional_env": {},
            "job_name": null,
        }) {
            Value::Object(map) => map,
            _ => Map::new(),
        }
    }

    fn envelope(&self) -> &MessageEnvelope {
        &self.envelope
    }

    fn validate_custom(&self) -> Result<(), TriggerError> {
        self.plan().map(|_| ())
    }

    async fn execute(&self) -> Result<JobSubmission, TriggerError> {
        let plan = self
            .plan()
            .map_err(|e| TriggerError::execution(format!("Batch job validation failed: {}", e)))?;

        let (queue_id, definition_id) = self.ctx.config.queue_for(plan.compute_type);
        if queue_id.is_empty() || definition_id.is_empty() {
            return Err(TriggerError::execution(format!(
                "Failed to submit Batch job: no job queue or definition configured for {} compute",
                plan.compute_type
            )));
        }

        let now = Utc::now();
        let job_name = plan
            .job_name
            .clone()
            .unwrap_or_else(|| generate_job_name(&plan.script_key, now));
        let output_prefix = output_prefix(&job_name, now.date_naive());
        let attribution = self.envelope.attribution();
        let resources = plan.resources.effective(plan.compute_type);

        info!("Submitting Batch job: {}", job_name);
        info!("  Compute Type: {}", plan.compute_type);
        info!("  Script: {}", plan.script_key);
        info!(
            "  Resources: {} vCPU, {} MB, {} GPU",
            resources.vcpus, resources.memory_mb, resources.gpu_count
        );

        let request = SubmissionRequest {
            job_name: job_name.clone(),
            queue_id: queue_id.to_string(),
            definition_id: definition_id.to_string(),
            compute_type: plan.compute_type,
            resources,
            environment: self.environment(plan, &output_prefix, &attribution, now)?,
            timeout_seconds: resources.timeout_seconds,
        };

        let job_id = self.ctx.backend.submit_job(&request).await.map_err(|e| {
            error!("Error submitting Batch job {}: {}", job_name, e);
            TriggerError::execution(format!("Failed to submit Batch job: {}", e))
        })?;

        info!("Successfully submitted job {} with ID {}", job_name, job_id);

        Ok(JobSubmission {
            job_id,
            job_name,
            script_key: plan.script_key.clone(),
            compute_type: plan.compute_type,
            resources: resources.summary(),
            output_prefix,
            submission_time: now,
            attribution,
        })
    }
}
