use super::value::Value;
use thiserror::Error;

/// Abrupt completion of script evaluation
#[derive(Error, Debug)]
pub enum RuntimeError {
    /// A value thrown by `throw`
    #[error("{}", .0.error_message())]
    Thrown(Value),

    #[error("{0}")]
    Type(String),

    #[error("{0}")]
    Reference(String),

    #[error("{0}")]
    Range(String),

    #[error("execution exceeded the step limit of {limit}")]
    StepLimit { limit: u64 },

    #[error("output exceeded the limit of {limit} lines")]
    OutputLimit { limit: usize },

    #[error("execution was interrupted")]
    Interrupted,
}

impl RuntimeError {
    pub fn type_error(message: impl Into<String>) -> Self {
        RuntimeError::Type(message.into())
    }

    pub fn reference_error(message: impl Into<String>) -> Self {
        RuntimeError::Reference(message.into())
    }

    /// Limit violations and interruption cannot be intercepted by `catch`
    pub fn is_catchable(&self) -> bool {
        matches!(
            self,
            RuntimeError::Thrown(_)
                | RuntimeError::Type(_)
                | RuntimeError::Reference(_)
                | RuntimeError::Range(_)
        )
    }

    /// The value bound to a `catch` parameter
    pub fn into_value(self) -> Value {
        match self {
            RuntimeError::Thrown(value) => value,
            RuntimeError::Type(message) => Value::error("TypeError", &message),
            RuntimeError::Reference(message) => Value::error("ReferenceError", &message),
            RuntimeError::Range(message) => Value::error("RangeError", &message),
            other => Value::error("Error", &other.to_string()),
        }
    }
}
