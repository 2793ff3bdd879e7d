use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::trigger::JobSubmission;

pub const UNKNOWN_MESSAGE_ID: &str = "unknown";

/// One delivered message: `{message_id, message_body}` or the SNS record
/// shape `{"Sns": {"MessageId", "Message"}}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "RawRecord")]
pub struct TransportRecord {
    pub message_id: Option<String>,
    pub message_body: String,
}

impl TransportRecord {
    pub fn new(message_id: impl Into<String>, message_body: impl Into<String>) -> Self {
        Self {
            message_id: Some(message_id.into()),
            message_body: message_body.into(),
        }
    }

    pub fn message_id(&self) -> &str {
        self.message_id.as_deref().unwrap_or(UNKNOWN_MESSAGE_ID)
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawRecord {
    Sns {
        #[serde(rename = "Sns")]
        sns: SnsMessage,
    },
    Direct {
        #[serde(default)]
        message_id: Option<String>,
        message_body: String,
    },
}

#[derive(Deserialize)]
struct SnsMessage {
    #[serde(rename = "MessageId", default)]
    message_id: Option<String>,
    #[serde(rename = "Message")]
    message: String,
}

impl From<RawRecord> for TransportRecord {
    fn from(raw: RawRecord) -> Self {
        match raw {
            RawRecord::Sns { sns } => Self {
                message_id: sns.message_id,
                message_body: sns.message,
            },
            RawRecord::Direct { message_id, message_body } => Self { message_id, message_body },
        }
    }
}

/// A delivery batch. Records stay raw so one malformed record only fails itself.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DispatchEvent {
    #[serde(default, alias = "Records")]
    pub records: Vec<Value>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Validation,
    Execution,
    Unexpected,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Validation => "validation",
            ErrorKind::Execution => "execution",
            ErrorKind::Unexpected => "unexpected",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SuccessOutcome {
    pub trigger_type: String,
    pub message_id: String,
    pub timestamp: DateTime<Utc>,
    #[serde(flatten)]
    pub submission: JobSubmission,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorOutcome {
    pub error_type: ErrorKind,
    pub error_message: String,
    pub message_id: String,
    pub timestamp: DateTime<Utc>,
}

/// Exactly one per dispatched record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum OutcomeRecord {
    Success(SuccessOutcome),
    Error(ErrorOutcome),
}

impl OutcomeRecord {
    pub fn is_success(&self) -> bool {
        matches!(self, OutcomeRecord::Success(_))
    }

    pub fn message_id(&self) -> &str {
        match self {
            OutcomeRecord::Success(s) => &s.message_id,
            OutcomeRecord::Error(e) => &e.message_id,
        }
    }

    pub fn error_kind(&self) -> Option<ErrorKind> {
        match self {
            OutcomeRecord::Success(_) => None,
            OutcomeRecord::Error(e) => Some(e.error_type),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchStatus {
    Success,
    PartialFailure,
}

/// Per-batch summary with the itemized outcomes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchReport {
    pub status: BatchStatus,
    pub results: Vec<OutcomeRecord>,
    pub processed_count: usize,
    pub success_count: usize,
    pub error_count: usize,
    pub timestamp: DateTime<Utc>,
}

impl BatchReport {
    pub fn from_outcomes(results: Vec<OutcomeRecord>) -> Self {
        let success_count = results.iter().filter(|r| r.is_success()).count();
        let error_count = results.len() - success_count;
        Self {
            status: if error_count == 0 { BatchStatus::Success } else { BatchStatus::PartialFailure },
            processed_count: results.len(),
            success_count,
            error_count,
            results,
            timestamp: Utc::now(),
        }
    }

    pub fn all_succeeded(&self) -> bool {
        self.status == BatchStatus::Success
    }
}
