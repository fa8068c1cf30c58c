use std::time::Duration;
use thiserror::Error;

/// Signal pipeline error types.
#[derive(Error, Debug)]
pub enum SignalError {
    #[error("Insufficient data: need {required} values, got {actual}")]
    InsufficientData { required: usize, actual: usize },

    #[error("Invalid value: {0}")]
    InvalidValue(String),

    #[error("Optimization timed out after {0:?}")]
    OptimizationTimeout(Duration),

    #[error("Optimization failed: {0}")]
    OptimizationFailed(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl SignalError {
    /// Shorthand for an insufficient-data failure.
    pub fn insufficient(required: usize, actual: usize) -> Self {
        SignalError::InsufficientData { required, actual }
    }

    /// Whether this error only means "not enough bars yet".
    pub fn is_insufficient_data(&self) -> bool {
        matches!(self, SignalError::InsufficientData { .. })
    }
}

pub type Result<T> = std::result::Result<T, SignalError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insufficient_data_message() {
        let err = SignalError::insufficient(15, 4);
        assert!(err.is_insufficient_data());
        assert_eq!(err.to_string(), "Insufficient data: need 15 values, got 4");
    }

    #[test]
    fn test_invalid_value_is_not_insufficient() {
        let err = SignalError::InvalidValue("close[3] is NaN".to_string());
        assert!(!err.is_insufficient_data());
        assert!(err.to_string().contains("close[3]"));
    }

    #[test]
    fn test_timeout_message() {
        let err = SignalError::OptimizationTimeout(Duration::from_millis(250));
        assert!(err.to_string().contains("250ms"));
    }
}
