use super::*;
use crate::backend::memory::InMemoryBatchBackend;
use crate::config::{ResourceDefaults, TriggerConfig};
use crate::trigger::{BatchJobTrigger, ComputeType, Trigger};
use crate::web::Pagination;
use crate::storage::history::entity::Model as HistoryModel;
use async_trait::async_trait;
use serde_json::{json, Map};
use std::sync::Mutex;
use tokio::sync::broadcast::Receiver;

// 测试辅助函数：创建调度环境
struct Harness {
    dispatcher: Dispatcher,
    backend: Arc<InMemoryBatchBackend>,
    notifications: Receiver<Notification>,
    dead_letters: Receiver<DeadLetterMessage>,
    history: Arc<RecordingHistory>,
}

fn trigger_config(resource_defaults: ResourceDefaults) -> TriggerConfig {
    TriggerConfig {
        gpu_job_queue: "gpu-queue".to_string(),
        gpu_job_definition: "gpu-def".to_string(),
        cpu_job_queue: "cpu-queue".to_string(),
        cpu_job_definition: "cpu-def".to_string(),
        input_bucket: "media-input".to_string(),
        output_bucket: "media-output".to_string(),
        resource_defaults,
        ..TriggerConfig::default()
    }
}

fn harness_with(registry: TriggerRegistry, notifications_enabled: bool) -> Harness {
    let backend = Arc::new(InMemoryBatchBackend::new());
    let context = Arc::new(TriggerContext::new(
        trigger_config(ResourceDefaults::default()),
        backend.clone(),
    ));
    let (notifier, notifications) = EventNotifier::new(16);
    let (dead_letter, dead_letters) = EventDeadLetter::new(16);
    let history = Arc::new(RecordingHistory::default());

    let dispatcher = Dispatcher::new(Arc::new(registry), context)
        .with_notifier(Arc::new(notifier), notifications_enabled)
        .with_dead_letter(Arc::new(dead_letter))
        .with_history(history.clone());

    Harness { dispatcher, backend, notifications, dead_letters, history }
}

fn harness() -> Harness {
    harness_with(TriggerRegistry::builtin(), true)
}

fn record(message_id: &str, body: serde_json::Value) -> TransportRecord {
    TransportRecord::new(message_id, body.to_string())
}

fn drain<T: Clone>(receiver: &mut Receiver<T>) -> Vec<T> {
    let mut items = Vec::new();
    while let Ok(item) = receiver.try_recv() {
        items.push(item);
    }
    items
}

fn expect_error(outcome: &OutcomeRecord) -> &ErrorOutcome {
    match outcome {
        OutcomeRecord::Error(error) => error,
        OutcomeRecord::Success(success) => panic!("expected error, got success {:?}", success),
    }
}

fn expect_success(outcome: &OutcomeRecord) -> &SuccessOutcome {
    match outcome {
        OutcomeRecord::Success(success) => success,
        OutcomeRecord::Error(error) => panic!("expected success, got {:?}", error),
    }
}

#[derive(Default)]
struct RecordingHistory {
    outcomes: Mutex<Vec<OutcomeRecord>>,
}

#[async_trait]
impl HistoryStore for RecordingHistory {
    async fn append(&self, outcome: &OutcomeRecord) -> anyhow::Result<()> {
        self.outcomes.lock().unwrap().push(outcome.clone());
        Ok(())
    }

    async fn list(&self, _pagination: &Pagination) -> anyhow::Result<Vec<HistoryModel>> {
        Ok(Vec::new())
    }

    async fn get_by_message_id(&self, _message_id: &str) -> anyhow::Result<Vec<HistoryModel>> {
        Ok(Vec::new())
    }

    async fn count(&self) -> anyhow::Result<u64> {
        Ok(self.outcomes.lock().unwrap().len() as u64)
    }
}

struct BrokenHistory;

#[async_trait]
impl HistoryStore for BrokenHistory {
    async fn append(&self, _outcome: &OutcomeRecord) -> anyhow::Result<()> {
        Err(anyhow!("disk full"))
    }

    async fn list(&self, _pagination: &Pagination) -> anyhow::Result<Vec<HistoryModel>> {
        Err(anyhow!("disk full"))
    }

    async fn get_by_message_id(&self, _message_id: &str) -> anyhow::Result<Vec<HistoryModel>> {
        Err(anyhow!("disk full"))
    }

    async fn count(&self) -> anyhow::Result<u64> {
        Err(anyhow!("disk full"))
    }
}

struct PanickingTrigger {
    envelope: MessageEnvelope,
}

#[async_trait]
impl Trigger for PanickingTrigger {
    fn name(&self) -> &'static str {
        "panicking"
    }

    fn required_fields(&self) -> &'static [&'static str] {
        &[]
    }

    fn optional_fields(&self) -> Map<String, Value> {
        Map::new()
    }

    fn envelope(&self) -> &MessageEnvelope {
        &self.envelope
    }

    async fn execute(&self) -> Result<JobSubmission, TriggerError> {
        panic!("worker contract violated");
    }
}

fn panicking(envelope: MessageEnvelope, _ctx: Arc<TriggerContext>) -> Box<dyn Trigger> {
    Box::new(PanickingTrigger { envelope })
}

#[tokio::test]
async fn test_missing_trigger_type_is_validation_error() {
    let mut h = harness();
    let outcome = h
        .dispatcher
        .process_record(&record("m-1", json!({"data": {"script_key": "jobs/a.py"}})))
        .await;

    let error = expect_error(&outcome);
    assert_eq!(error.error_type, ErrorKind::Validation);
    assert_eq!(error.error_message, "Message must include 'trigger_type' field");
    assert_eq!(error.message_id, "m-1");
    assert_eq!(h.backend.submission_count(), 0);
    assert!(drain(&mut h.dead_letters).is_empty());
}

#[tokio::test]
async fn test_unknown_trigger_type_lists_registered() {
    let mut registry = TriggerRegistry::builtin();
    registry.register("batch_job_v2", BatchJobTrigger::boxed);
    let h = harness_with(registry, false);

    let outcome = h
        .dispatcher
        .process_record(&record("m-1", json!({"trigger_type": "model_eval", "data": {}})))
        .await;

    let error = expect_error(&outcome);
    assert_eq!(error.error_type, ErrorKind::Validation);
    assert_eq!(
        error.error_message,
        "Unknown trigger type: model_eval. Available triggers: batch_job, batch_job_v2"
    );
}

#[tokio::test]
async fn test_non_string_trigger_type_is_validation_error() {
    let mut h = harness();
    let outcome = h
        .dispatcher
        .process_record(&record("m-1", json!({"trigger_type": 5, "data": {"script_key": "jobs/a.py"}})))
        .await;

    let error = expect_error(&outcome);
    assert_eq!(error.error_type, ErrorKind::Validation);
    assert_eq!(error.error_message, "Unknown trigger type: 5. Available triggers: batch_job");
    assert_eq!(h.backend.submission_count(), 0);
    assert!(drain(&mut h.dead_letters).is_empty());

    let outcome = h
        .dispatcher
        .process_record(&record("m-2", json!({"trigger_type": null, "data": {}})))
        .await;
    assert_eq!(expect_error(&outcome).error_message, "Message must include 'trigger_type' field");
}

#[tokio::test]
async fn test_missing_script_key_never_reaches_backend() {
    let mut h = harness();
    let outcome = h
        .dispatcher
        .process_record(&record("m-1", json!({"trigger_type": "batch_job", "data": {"compute_type": "cpu"}})))
        .await;

    let error = expect_error(&outcome);
    assert_eq!(error.error_type, ErrorKind::Validation);
    assert_eq!(error.error_message, "batch_job: Missing required fields: script_key");
    assert_eq!(h.backend.submission_count(), 0);

    let notifications = drain(&mut h.notifications);
    assert_eq!(notifications.len(), 1);
    assert_eq!(notifications[0].subject, "ML Trigger Validation Error");
    assert!(drain(&mut h.dead_letters).is_empty());
}

#[tokio::test]
async fn test_end_to_end_default_gpu_submission() {
    let mut h = harness();
    let outcome = h
        .dispatcher
        .process_record(&record(
            "m-42",
            json!({
                "trigger_type": "batch_job",
                "data": {
                    "script_key": "jobs/video_processor.py",
                    "input_key": "media/a.mp4",
                    "output_key": "media/a.wav"
                }
            }),
        ))
        .await;

    let success = expect_success(&outcome);
    assert_eq!(success.trigger_type, "batch_job");
    assert_eq!(success.message_id, "m-42");

    let submission = &success.submission;
    assert_eq!(submission.compute_type, ComputeType::Gpu);
    assert_eq!(
        (submission.resources.vcpus, submission.resources.memory, submission.resources.gpus),
        (4, 16384, 1)
    );
    assert!(submission.job_name.starts_with("video_processor-"));
    assert_eq!(
        submission.output_prefix,
        format!(
            "results/{}/{}/",
            submission.submission_time.format("%Y-%m-%d"),
            submission.job_name
        )
    );
    assert_eq!(submission.attribution.user, "unknown");
    assert_eq!(submission.attribution.project, "unknown");

    assert_eq!(h.backend.submission_count(), 1);
    assert_eq!(h.backend.submissions()[0].job_name, submission.job_name);

    let notifications = drain(&mut h.notifications);
    assert_eq!(notifications.len(), 1);
    assert_eq!(notifications[0].subject, "ML Trigger Success: batch_job");
    assert!(drain(&mut h.dead_letters).is_empty());

    let recorded = h.history.outcomes.lock().unwrap().clone();
    assert_eq!(recorded, vec![outcome.clone()]);

    let value = serde_json::to_value(&outcome).unwrap();
    assert_eq!(value["status"], "success");
    assert_eq!(value["job_id"], Value::from(submission.job_id.clone()));
    assert_eq!(value["details"]["user"], "unknown");
}

#[tokio::test]
async fn test_reconfigured_gpu_defaults() {
    let backend = Arc::new(InMemoryBatchBackend::new());
    let mut defaults = ResourceDefaults::default();
    defaults.gpu.vcpus = 8;
    defaults.gpu.memory_mb = 32768;
    let context = Arc::new(TriggerContext::new(trigger_config(defaults), backend.clone()));
    let dispatcher = Dispatcher::new(Arc::new(TriggerRegistry::builtin()), context);

    let outcome = dispatcher
        .process_record(&record("m-1", json!({"trigger_type": "batch_job", "data": {"script_key": "jobs/a.py"}})))
        .await;

    let resources = expect_success(&outcome).submission.resources;
    assert_eq!((resources.vcpus, resources.memory, resources.gpus), (8, 32768, 1));
}

#[tokio::test]
async fn test_dead_letter_only_on_execution_error() {
    let mut h = harness();
    h.backend.fail_with("service unavailable");

    let body = json!({"trigger_type": "batch_job", "data": {"script_key": "jobs/a.py"}});
    let report = h
        .dispatcher
        .process_batch(&[
            record("m-1", body.clone()),
            record("m-2", json!({"trigger_type": "batch_job", "data": {"script_key": "jobs/a.sh"}})),
            record("m-3", json!({"trigger_type": "batch_job", "data": {"script_key": "jobs/b.py", "gpus": 0}})),
        ])
        .await;

    let kinds: Vec<Option<ErrorKind>> = report.results.iter().map(OutcomeRecord::error_kind).collect();
    assert_eq!(
        kinds,
        vec![Some(ErrorKind::Execution), Some(ErrorKind::Validation), Some(ErrorKind::Validation)]
    );

    let dead_letters = drain(&mut h.dead_letters);
    assert_eq!(dead_letters.len(), 1);
    assert_eq!(dead_letters[0].original_message, body.to_string());
    assert_eq!(dead_letters[0].error.kind, ErrorKind::Execution);
    assert_eq!(
        dead_letters[0].error.message,
        "Failed to submit Batch job: transport error: service unavailable"
    );

    let subjects: Vec<String> = drain(&mut h.notifications).into_iter().map(|n| n.subject).collect();
    assert_eq!(
        subjects,
        vec!["ML Trigger Execution Error", "ML Trigger Validation Error", "ML Trigger Validation Error"]
    );
}

#[tokio::test]
async fn test_notifications_gated() {
    let mut h = harness_with(TriggerRegistry::builtin(), false);
    h.dispatcher
        .process_record(&record("m-1", json!({"trigger_type": "batch_job", "data": {"script_key": "jobs/a.py"}})))
        .await;
    h.dispatcher
        .process_record(&record("m-2", json!({"trigger_type": "batch_job", "data": {}})))
        .await;

    assert!(drain(&mut h.notifications).is_empty());
}

#[tokio::test]
async fn test_malformed_body_is_unexpected() {
    let mut h = harness();
    let outcome = h
        .dispatcher
        .process_record(&TransportRecord::new("m-1", "not json"))
        .await;

    let error = expect_error(&outcome);
    assert_eq!(error.error_type, ErrorKind::Unexpected);
    assert!(error.error_message.starts_with("Malformed message body"));
    assert!(drain(&mut h.notifications).is_empty());
    assert!(drain(&mut h.dead_letters).is_empty());
    assert_eq!(h.history.outcomes.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn test_panicking_trigger_does_not_block_siblings() {
    let mut registry = TriggerRegistry::builtin();
    registry.register("panicking", panicking);
    let h = harness_with(registry, false);

    let report = h
        .dispatcher
        .process_batch(&[
            record("m-1", json!({"trigger_type": "panicking", "data": {}})),
            record("m-2", json!({"trigger_type": "batch_job", "data": {"script_key": "jobs/a.py"}})),
        ])
        .await;

    let error = expect_error(&report.results[0]);
    assert_eq!(error.error_type, ErrorKind::Unexpected);
    assert!(error.error_message.contains("worker contract violated"));
    expect_success(&report.results[1]);

    assert_eq!(report.status, BatchStatus::PartialFailure);
    assert_eq!((report.processed_count, report.success_count, report.error_count), (2, 1, 1));
}

#[tokio::test]
async fn test_process_event_isolates_bad_records() {
    let h = harness();
    let good = json!({"trigger_type": "batch_job", "data": {"script_key": "jobs/a.py"}}).to_string();
    let event: DispatchEvent = serde_json::from_value(json!({
        "Records": [
            {"Sns": {"MessageId": "m-1"}},
            {"Sns": {"MessageId": "m-2", "Message": good}},
        ]
    }))
    .unwrap();

    let report = h.dispatcher.process_event(&event).await;

    let error = expect_error(&report.results[0]);
    assert_eq!(error.error_type, ErrorKind::Unexpected);
    assert_eq!(error.message_id, "m-1");
    assert_eq!(expect_success(&report.results[1]).message_id, "m-2");
    assert!(!report.all_succeeded());
    assert_eq!(h.history.outcomes.lock().unwrap().len(), 2);
}

#[tokio::test]
async fn test_all_success_report() {
    let h = harness();
    let report = h
        .dispatcher
        .process_batch(&[
            record("m-1", json!({"trigger_type": "batch_job", "data": {"script_key": "jobs/a.py"}})),
            record("m-2", json!({"trigger_type": "batch_job", "data": {"script_key": "jobs/b.py", "compute_type": "cpu"}})),
        ])
        .await;

    assert!(report.all_succeeded());
    assert_eq!(report.success_count, 2);
    assert_eq!(h.backend.submission_count(), 2);
}

#[tokio::test]
async fn test_history_failure_does_not_change_outcome() {
    let backend = Arc::new(InMemoryBatchBackend::new());
    let context = Arc::new(TriggerContext::new(trigger_config(ResourceDefaults::default()), backend));
    let dispatcher = Dispatcher::new(Arc::new(TriggerRegistry::builtin()), context)
        .with_history(Arc::new(BrokenHistory));

    let outcome = dispatcher
        .process_record(&record("m-1", json!({"trigger_type": "batch_job", "data": {"script_key": "jobs/a.py"}})))
        .await;
    assert!(outcome.is_success());
}

#[test]
fn test_available_triggers() {
    let h = harness();
    let schemas = h.dispatcher.available_triggers();
    assert_eq!(schemas.len(), 1);
    assert_eq!(schemas[0].trigger_type, "batch_job");
    assert_eq!(schemas[0].required_fields, vec!["script_key"]);
    assert_eq!(h.backend.submission_count(), 0);
}
