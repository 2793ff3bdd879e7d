/// The only error kinds a trigger may hand back to the dispatcher.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TriggerError {
    /// Malformed or incomplete input. Never retried.
    #[error("{0}")]
    Validation(String),

    /// Well-formed input, but the side effect failed.
    #[error("{0}")]
    Execution(String),
}

impl TriggerError {
    pub fn validation(message: impl Into<String>) -> Self {
        TriggerError::Validation(message.into())
    }

    pub fn execution(message: impl Into<String>) -> Self {
        TriggerError::Execution(message.into())
    }
}
