use crate::trigger::TriggerError;
use super::types::ErrorKind;

#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error(transparent)]
    Trigger(#[from] TriggerError),
    #[error("{0}")]
    Unexpected(anyhow::Error),
}

impl DispatchError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            DispatchError::Trigger(TriggerError::Validation(_)) => ErrorKind::Validation,
            DispatchError::Trigger(TriggerError::Execution(_)) => ErrorKind::Execution,
            DispatchError::Unexpected(_) => ErrorKind::Unexpected,
        }
    }

    pub fn unexpected(e: impl Into<anyhow::Error>) -> Self {
        DispatchError::Unexpected(e.into())
    }
}
