//! Engine error types.

/// Top-level error type for edgebook.
///
/// `UndefinedMetric` is deliberately an error, not a sentinel value: a ratio
/// with a zero denominator and no stated zero-policy must reach the caller
/// as "not computable", never as 0 or infinity.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("undefined metric {metric}: {reason}")]
    UndefinedMetric { metric: String, reason: String },

    #[error("invalid trade {id}: {reason}")]
    InvalidTrade { id: String, reason: String },

    #[error("storage error: {reason}")]
    Storage { reason: String },

    #[error("storage query error: {reason}")]
    StorageQuery { reason: String },

    #[error("config parse error in {file}: {reason}")]
    ConfigParse { file: String, reason: String },

    #[error("missing config key [{section}] {key}")]
    ConfigMissing { section: String, key: String },

    #[error("invalid config value [{section}] {key}: {reason}")]
    ConfigInvalid {
        section: String,
        key: String,
        reason: String,
    },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl EngineError {
    pub fn undefined(metric: &str, reason: impl Into<String>) -> Self {
        EngineError::UndefinedMetric {
            metric: metric.to_string(),
            reason: reason.into(),
        }
    }

    pub fn invalid_trade(id: &str, reason: impl Into<String>) -> Self {
        EngineError::InvalidTrade {
            id: id.to_string(),
            reason: reason.into(),
        }
    }
}

impl From<&EngineError> for std::process::ExitCode {
    fn from(err: &EngineError) -> Self {
        let code: u8 = match err {
            EngineError::Io(_) => 1,
            EngineError::ConfigParse { .. }
            | EngineError::ConfigMissing { .. }
            | EngineError::ConfigInvalid { .. } => 2,
            EngineError::Storage { .. } | EngineError::StorageQuery { .. } => 3,
            EngineError::InvalidTrade { .. } => 4,
            EngineError::UndefinedMetric { .. } => 5,
        };
        std::process::ExitCode::from(code)
    }
}
