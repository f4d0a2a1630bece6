use flashsale_domain::error::DomainError;

#[non_exhaustive]
#[derive(thiserror::Error, Debug)]
pub enum AppError {
    #[error("domain: {0}")]
    Domain(#[from] DomainError),

    #[error("retry exhausted after {attempts} attempts: {last}")]
    RetryExhausted {
        attempts: u32,
        #[source]
        last: DomainError,
    },

    #[error("validation: {0}")]
    Validation(String),

    #[error("config: {0}")]
    Config(String),

    #[error("worker task failed: {0}")]
    TaskFailed(String),

    #[error("handler not found: {0}")]
    HandlerNotFound(&'static str),

    #[error("handler already registered: command={command}")]
    AlreadyRegisteredCommand { command: &'static str },

    #[error("type mismatch: expected={expected}, found={found}")]
    TypeMismatch {
        expected: &'static str,
        found: &'static str,
    },
}

impl AppError {
    /// 底层领域错误（若有）
    pub fn domain(&self) -> Option<&DomainError> {
        match self {
            AppError::Domain(err) | AppError::RetryExhausted { last: err, .. } => Some(err),
            _ => None,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self.domain(), Some(DomainError::Cancelled))
    }
}
