use crate::dispatch::OutcomeRecord;
use crate::storage::history::entity::Model as HistoryModel;

impl TryFrom<&OutcomeRecord> for HistoryModel {
    type Error = serde_json::Error;

    /// `id` is left at 0; the store assigns it on insert.
    fn try_from(outcome: &OutcomeRecord) -> Result<Self, Self::Error> {
        let record = serde_json::to_string(outcome)?;
        let model = match outcome {
            OutcomeRecord::Success(success) => HistoryModel {
                id: 0,
                message_id: success.message_id.clone(),
                status: "success".to_string(),
                trigger_type: Some(success.trigger_type.clone()),
                job_id: Some(success.submission.job_id.clone()),
                job_name: Some(success.submission.job_name.clone()),
                error_type: None,
                error_message: None,
                record,
                recorded_at: success.timestamp,
            },
            OutcomeRecord::Error(error) => HistoryModel {
                id: 0,
                message_id: error.message_id.clone(),
                status: "error".to_string(),
                trigger_type: None,
                job_id: None,
                job_name: None,
                error_type: Some(error.error_type.to_string()),
                error_message: Some(error.error_message.clone()),
                record,
                recorded_at: error.timestamp,
            },
        };
        Ok(model)
    }
}

impl TryFrom<&HistoryModel> for OutcomeRecord {
    type Error = serde_json::Error;

    fn try_from(model: &HistoryModel) -> Result<Self, serde_json::Error> {
        serde_json::from_str(&model.record)
    }
}
