//! Error types for tiergate
//!
//! Configuration problems are the only fatal errors. Budget exhaustion is a
//! terminal outcome carried in the run result and never appears here.

use thiserror::Error;

/// Main error type for the tiergate engine
#[derive(Error, Debug)]
pub enum TierGateError {
    /// A tier name that does not match any configured tier
    #[error("Unknown complexity tier: {0}")]
    UnknownTier(String),

    /// Envelope values out of range or an empty step list
    #[error("Invalid resource envelope for tier {tier}: {reason}")]
    InvalidEnvelope { tier: String, reason: String },

    /// A pipeline step with no registered executor
    #[error("No executor registered for pipeline step {step}")]
    MissingExecutor { step: String },

    /// Run state machine transition errors
    #[error("Invalid state transition from {from} to {to}: {reason}")]
    InvalidTransition {
        from: String,
        to: String,
        reason: String,
    },

    /// Configuration errors
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Run history storage errors
    #[error("History error: {0}")]
    HistoryError(String),

    /// Serialization errors
    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    /// I/O errors
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// Generic errors with context
    #[error("tiergate error: {0}")]
    Generic(String),
}

/// Result type alias for tiergate operations
pub type Result<T> = std::result::Result<T, TierGateError>;

/// Convert anyhow errors to TierGateError
impl From<anyhow::Error> for TierGateError {
    fn from(err: anyhow::Error) -> Self {
        TierGateError::Generic(format!("{:#}", err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = TierGateError::InvalidEnvelope {
            tier: "simple".to_string(),
            reason: "max_cost must be greater than 0".to_string(),
        };
        assert!(err.to_string().contains("simple"));
        assert!(err.to_string().contains("max_cost"));
    }

    #[test]
    fn test_missing_executor_error() {
        let err = TierGateError::MissingExecutor {
            step: "backend".to_string(),
        };
        assert!(err.to_string().contains("backend"));
    }

    #[test]
    fn test_anyhow_conversion_keeps_context() {
        let err: TierGateError = anyhow::anyhow!("disk full")
            .context("writing report")
            .into();
        let text = err.to_string();
        assert!(text.contains("writing report"));
        assert!(text.contains("disk full"));
    }
}
