pub mod dead_letter;
pub mod error;
pub mod notify;
pub mod types;

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use anyhow::anyhow;
use chrono::Utc;
use futures::FutureExt;
use serde_json::Value;
use tracing::{error, info, warn};

use crate::storage::history::HistoryStore;
use crate::trigger::{JobSubmission, MessageEnvelope, TriggerContext, TriggerError, TriggerRegistry, TriggerSchema};

pub use dead_letter::{DeadLetterMessage, DeadLetterSink, EventDeadLetter, HttpDeadLetter};
pub use error::DispatchError;
pub use notify::{EventNotifier, HttpNotifier, Notification, NotificationKind, Notifier};
pub use types::{
    BatchReport, BatchStatus, DispatchEvent, ErrorKind, ErrorOutcome, OutcomeRecord,
    SuccessOutcome, TransportRecord, UNKNOWN_MESSAGE_ID,
};

/// Routes delivered records to triggers and turns every attempt into one
/// [`OutcomeRecord`]. Side channels are best effort: their failures are
/// logged and never change the outcome.
pub struct Dispatcher {
    registry: Arc<TriggerRegistry>,
    context: Arc<TriggerContext>,
    notifier: Option<Arc<dyn Notifier>>,
    notifications_enabled: bool,
    dead_letter: Option<Arc<dyn DeadLetterSink>>,
    history: Option<Arc<dyn HistoryStore>>,
}

impl Dispatcher {
    pub fn new(registry: Arc<TriggerRegistry>, context: Arc<TriggerContext>) -> Self {
        Self {
            registry,
            context,
            notifier: None,
            notifications_enabled: false,
            dead_letter: None,
            history: None,
        }
    }

    pub fn with_notifier(mut self, notifier: Arc<dyn Notifier>, enabled: bool) -> Self {
        self.notifier = Some(notifier);
        self.notifications_enabled = enabled;
        self
    }

    pub fn with_dead_letter(mut self, sink: Arc<dyn DeadLetterSink>) -> Self {
        self.dead_letter = Some(sink);
        self
    }

    pub fn with_history(mut self, history: Arc<dyn HistoryStore>) -> Self {
        self.history = Some(history);
        self
    }

    pub fn available_triggers(&self) -> Vec<TriggerSchema> {
        self.registry.describe_all(&self.context)
    }

    /// Handles a raw delivery; each record is decoded on its own.
    pub async fn process_event(&self, event: &DispatchEvent) -> BatchReport {
        info!("Received event with {} records", event.records.len());

        let mut results = Vec::with_capacity(event.records.len());
        for raw in &event.records {
            let outcome = match serde_json::from_value::<TransportRecord>(raw.clone()) {
                Ok(record) => self.process_record(&record).await,
                Err(e) => {
                    let message_id = raw_message_id(raw);
                    error!("Error processing record {}: {}", message_id, e);
                    let outcome = error_outcome(
                        &message_id,
                        &DispatchError::unexpected(anyhow!("Malformed transport record: {}", e)),
                    );
                    self.record_history(&outcome).await;
                    outcome
                }
            };
            results.push(outcome);
        }

        self.summarize(results)
    }

    pub async fn process_batch(&self, records: &[TransportRecord]) -> BatchReport {
        info!("Received batch with {} records", records.len());

        let mut results = Vec::with_capacity(records.len());
        for record in records {
            results.push(self.process_record(record).await);
        }

        self.summarize(results)
    }

    /// Never fails: parse errors, trigger errors and panics all become an
    /// error outcome.
    pub async fn process_record(&self, record: &TransportRecord) -> OutcomeRecord {
        let message_id = record.message_id().to_string();

        let result = match AssertUnwindSafe(self.run_record(record)).catch_unwind().await {
            Ok(result) => result,
            Err(panic) => Err(DispatchError::unexpected(anyhow!(
                "Trigger panicked: {}",
                panic_message(panic.as_ref())
            ))),
        };

        let outcome = match result {
            Ok((trigger_type, submission)) => {
                info!("Trigger {} completed successfully: job {}", trigger_type, submission.job_id);
                OutcomeRecord::Success(SuccessOutcome {
                    trigger_type,
                    message_id,
                    timestamp: Utc::now(),
                    submission,
                })
            }
            Err(e) => {
                match e.kind() {
                    ErrorKind::Validation => warn!("Validation error: {}", e),
                    ErrorKind::Execution => error!("Execution error: {}", e),
                    ErrorKind::Unexpected => error!("Unexpected error: {}", e),
                }
                error_outcome(&message_id, &e)
            }
        };

        if outcome.error_kind() == Some(ErrorKind::Execution) {
            self.send_dead_letter(&record.message_body, &outcome).await;
        }
        self.send_notification(&outcome).await;
        self.record_history(&outcome).await;

        outcome
    }

    async fn run_record(&self, record: &TransportRecord) -> Result<(String, JobSubmission), DispatchError> {
        let envelope = MessageEnvelope::parse(&record.message_body)
            .map_err(|e| DispatchError::unexpected(anyhow!("Malformed message body: {}", e)))?;

        info!("Processing message {}", record.message_id());

        let trigger_type = match envelope.trigger_type.as_ref() {
            Some(Value::String(t)) if !t.is_empty() => t.clone(),
            None | Some(Value::Null) | Some(Value::String(_)) => {
                return Err(TriggerError::validation("Message must include 'trigger_type' field").into())
            }
            Some(other) => return Err(self.registry.unknown(other).into()),
        };

        info!("Executing {} trigger", trigger_type);
        let trigger = self.registry.create(&trigger_type, envelope, self.context.clone())?;
        trigger.validate()?;
        let submission = trigger.execute().await?;

        Ok((trigger_type, submission))
    }

    fn summarize(&self, results: Vec<OutcomeRecord>) -> BatchReport {
        let report = BatchReport::from_outcomes(results);
        info!(
            "Processed {} records: {} succeeded, {} failed",
            report.processed_count, report.success_count, report.error_count
        );
        report
    }

    async fn send_notification(&self, outcome: &OutcomeRecord) {
        if !self.notifications_enabled {
            return;
        }
        let Some(notifier) = &self.notifier else {
            return;
        };
        let Some(notification) = Notification::for_outcome(outcome) else {
            return;
        };

        if let Err(e) = notifier.notify(&notification).await {
            error!("Failed to send notification: {}", e);
        }
    }

    async fn send_dead_letter(&self, original_message: &str, outcome: &OutcomeRecord) {
        let (Some(sink), OutcomeRecord::Error(error)) = (&self.dead_letter, outcome) else {
            return;
        };

        let message = DeadLetterMessage::new(original_message, error.error_type, &error.error_message);
        if let Err(e) = sink.send(&message).await {
            error!("Failed to send message to DLQ: {}", e);
        }
    }

    async fn record_history(&self, outcome: &OutcomeRecord) {
        if let Some(history) = &self.history {
            if let Err(e) = history.append(outcome).await {
                error!("Failed to record outcome for {}: {}", outcome.message_id(), e);
            }
        }
    }
}

fn error_outcome(message_id: &str, error: &DispatchError) -> OutcomeRecord {
    OutcomeRecord::Error(ErrorOutcome {
        error_type: error.kind(),
        error_message: error.to_string(),
        message_id: message_id.to_string(),
        timestamp: Utc::now(),
    })
}

fn raw_message_id(raw: &Value) -> String {
    raw.pointer("/Sns/MessageId")
        .or_else(|| raw.get("message_id"))
        .and_then(Value::as_str)
        .unwrap_or(UNKNOWN_MESSAGE_ID)
        .to_string()
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests;
