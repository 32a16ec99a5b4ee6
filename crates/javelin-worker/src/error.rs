//! Worker error types.

use thiserror::Error;

pub type WorkerResult<T> = Result<T, WorkerError>;

#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Unsupported input: {0}")]
    Unsupported(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Analysis task failed: {0}")]
    TaskFailed(String),

    #[error("Metrics exporter error: {0}")]
    Metrics(String),

    #[error("Media error: {0}")]
    Media(#[from] javelin_media::MediaError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl WorkerError {
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    pub fn unsupported(msg: impl Into<String>) -> Self {
        Self::Unsupported(msg.into())
    }

    pub fn config_error(msg: impl Into<String>) -> Self {
        Self::ConfigError(msg.into())
    }

    pub fn task_failed(msg: impl Into<String>) -> Self {
        Self::TaskFailed(msg.into())
    }

    /// Short reason recorded in a FAIL result.
    pub fn reason(&self) -> String {
        match self {
            WorkerError::InvalidInput(msg) | WorkerError::Unsupported(msg) => msg.clone(),
            WorkerError::Media(e) => e.reason(),
            other => other.to_string(),
        }
    }

    /// Whether the clip itself is at fault, so the caller should get a FAIL
    /// record rather than an error.
    pub fn is_input_error(&self) -> bool {
        match self {
            WorkerError::InvalidInput(_) | WorkerError::Unsupported(_) => true,
            WorkerError::Media(e) => e.is_input_error(),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use javelin_media::MediaError;

    #[test]
    fn test_input_error_classification() {
        assert!(WorkerError::from(MediaError::NoMarker).is_input_error());
        assert!(WorkerError::invalid_input("too large").is_input_error());
        assert!(!WorkerError::from(MediaError::FfprobeNotFound).is_input_error());
        assert!(!WorkerError::task_failed("panicked").is_input_error());
    }
}
