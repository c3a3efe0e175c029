//! Errors surfaced by the drift engine.
//! Malformed records are tallied, not raised; see [`crate::models::MalformedRecord`].

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("Issue record source unavailable: {0}")]
    SourceUnavailable(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error("Analysis timed out after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    #[error("Analysis task failed: {0}")]
    TaskFailed(String),
}

impl From<sqlx::Error> for EngineError {
    fn from(err: sqlx::Error) -> Self {
        EngineError::SourceUnavailable(err.to_string())
    }
}

impl From<sqlx::migrate::MigrateError> for EngineError {
    fn from(err: sqlx::migrate::MigrateError) -> Self {
        EngineError::SourceUnavailable(err.to_string())
    }
}

impl From<csv::Error> for EngineError {
    fn from(err: csv::Error) -> Self {
        EngineError::SourceUnavailable(err.to_string())
    }
}

impl From<std::io::Error> for EngineError {
    fn from(err: std::io::Error) -> Self {
        EngineError::SourceUnavailable(err.to_string())
    }
}

pub type EngineResult<T> = Result<T, EngineError>;
