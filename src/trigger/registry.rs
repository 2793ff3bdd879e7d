use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use tracing::info;

use super::{BatchJobTrigger, MessageEnvelope, Trigger, TriggerContext, TriggerError, TriggerSchema};

pub type TriggerFactory = fn(MessageEnvelope, Arc<TriggerContext>) -> Box<dyn Trigger>;

/// Discriminator → constructor. Filled once at startup, read-only afterwards.
#[derive(Clone, Default)]
pub struct TriggerRegistry {
    factories: BTreeMap<String, TriggerFactory>,
}

impl TriggerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding every trigger this crate ships.
    pub fn builtin() -> Self {
        let mut registry = Self::new();
        registry.register(BatchJobTrigger::NAME, BatchJobTrigger::boxed);
        registry
    }

    pub fn register(&mut self, trigger_type: &str, factory: TriggerFactory) {
        info!("Registering trigger: {}", trigger_type);
        self.factories.insert(trigger_type.to_string(), factory);
    }

    pub fn names(&self) -> Vec<&str> {
        self.factories.keys().map(String::as_str).collect()
    }

    pub fn create(
        &self,
        trigger_type: &str,
        envelope: MessageEnvelope,
        ctx: Arc<TriggerContext>,
    ) -> Result<Box<dyn Trigger>, TriggerError> {
        let factory = self
            .factories
            .get(trigger_type)
            .ok_or_else(|| self.unknown(trigger_type))?;

        Ok(factory(envelope, ctx))
    }

    /// Validation error naming `trigger_type` and every registered trigger.
    pub fn unknown(&self, trigger_type: impl fmt::Display) -> TriggerError {
        TriggerError::Validation(format!(
            "Unknown trigger type: {}. Available triggers: {}",
            trigger_type,
            self.names().join(", ")
        ))
    }

    /// Schema of every registered trigger, each built over an empty envelope.
    pub fn describe_all(&self, ctx: &Arc<TriggerContext>) -> Vec<TriggerSchema> {
        self.factories
            .iter()
            .map(|(name, factory)| factory(MessageEnvelope::empty(name), ctx.clone()).schema())
            .collect()
    }
}

impl fmt::Debug for TriggerRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TriggerRegistry")
            .field("triggers", &self.names())
            .finish()
    }
}
