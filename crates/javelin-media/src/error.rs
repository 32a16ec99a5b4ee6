//! Error types for motion analysis.

use std::path::PathBuf;
use thiserror::Error;

/// Result type for media operations.
pub type MediaResult<T> = Result<T, MediaError>;

/// Errors that can occur while analyzing a clip.
#[derive(Debug, Error)]
pub enum MediaError {
    #[error("FFprobe not found in PATH")]
    FfprobeNotFound,

    #[error("FFprobe command failed: {message}")]
    FfprobeFailed {
        message: String,
        stderr: Option<String>,
    },

    #[error("File not found: {0}")]
    FileNotFound(PathBuf),

    #[error("Invalid video file: {0}")]
    InvalidVideo(String),

    #[error("Marker not detected")]
    NoMarker,

    #[error("Object not detected")]
    NoObject,

    #[error("Low frame rate: {fps:.1} fps (minimum {min:.1})")]
    LowFrameRate { fps: f64, min: f64 },

    #[error("Insufficient frames: {frames} (need at least {required})")]
    InsufficientFrames { frames: usize, required: usize },

    #[error("No upright pose found for auto calibration")]
    NoUprightPose,

    #[error("Pose detection failed: {0}")]
    DetectionFailed(String),

    #[error("Model not found: {0}")]
    ModelNotFound(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Operation timed out after {0} seconds")]
    Timeout(u64),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON parse error: {0}")]
    JsonParse(#[from] serde_json::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl MediaError {
    /// Create a detection failure error.
    pub fn detection_failed(message: impl Into<String>) -> Self {
        Self::DetectionFailed(message.into())
    }

    /// Create a model not found error.
    pub fn model_not_found(path: impl Into<String>) -> Self {
        Self::ModelNotFound(path.into())
    }

    /// Create an invalid configuration error.
    pub fn invalid_config(message: impl Into<String>) -> Self {
        Self::InvalidConfig(message.into())
    }

    /// Create an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Short reason reported in the result's `error` field.
    ///
    /// Input errors map onto their fixed names; everything else uses the
    /// full message.
    pub fn reason(&self) -> String {
        match self {
            Self::NoMarker => "Marker not detected".to_string(),
            Self::NoObject => "Object not detected".to_string(),
            Self::LowFrameRate { .. } => "Low frame rate".to_string(),
            Self::InsufficientFrames { .. } => "Insufficient frames".to_string(),
            other => other.to_string(),
        }
    }

    /// Whether this error was caused by the clip itself rather than the
    /// environment.
    pub fn is_input_error(&self) -> bool {
        matches!(
            self,
            Self::NoMarker
                | Self::NoObject
                | Self::LowFrameRate { .. }
                | Self::InsufficientFrames { .. }
                | Self::NoUprightPose
                | Self::InvalidVideo(_)
                | Self::FileNotFound(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reason_names() {
        assert_eq!(MediaError::NoMarker.reason(), "Marker not detected");
        assert_eq!(MediaError::NoObject.reason(), "Object not detected");
        assert_eq!(
            MediaError::LowFrameRate { fps: 10.0, min: 15.0 }.reason(),
            "Low frame rate"
        );
        assert_eq!(
            MediaError::InsufficientFrames { frames: 5, required: 7 }.reason(),
            "Insufficient frames"
        );
        assert_eq!(MediaError::Timeout(60).reason(), "Operation timed out after 60 seconds");
    }

    #[test]
    fn test_input_error_classification() {
        assert!(MediaError::NoUprightPose.is_input_error());
        assert!(!MediaError::Timeout(1).is_input_error());
        assert!(!MediaError::internal("x").is_input_error());
    }
}
