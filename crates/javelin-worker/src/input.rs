//! Clip submission and input validation.

use std::path::{Path, PathBuf};

use javelin_models::ClipParams;
use uuid::Uuid;

use crate::config::WorkerConfig;
use crate::error::{WorkerError, WorkerResult};

/// Where the frames of a clip come from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClipSource {
    /// Encoded video decoded in-process.
    Video(PathBuf),
    /// Pre-extracted observations (JSON).
    Observed(PathBuf),
}

impl ClipSource {
    /// Classify by extension: `.json` is an observation document, anything
    /// else is treated as video.
    pub fn from_path(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let is_json = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case("json"));
        if is_json {
            Self::Observed(path)
        } else {
            Self::Video(path)
        }
    }

    pub fn path(&self) -> &Path {
        match self {
            Self::Video(p) | Self::Observed(p) => p,
        }
    }

    pub fn operation(&self) -> &'static str {
        match self {
            Self::Video(_) => "analyze_video",
            Self::Observed(_) => "analyze_observed",
        }
    }
}

/// One clip to analyze.
#[derive(Debug, Clone)]
pub struct ClipJob {
    pub id: Uuid,
    pub source: ClipSource,
    pub params: ClipParams,
}

impl ClipJob {
    pub fn new(source: ClipSource, params: ClipParams) -> Self {
        Self {
            id: Uuid::new_v4(),
            source,
            params,
        }
    }

    /// File name used for the result document.
    pub fn output_name(&self) -> String {
        let stem = self
            .source
            .path()
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("clip");
        format!("{stem}.analysis.json")
    }
}

/// Check a submission before any decoding work.
pub fn validate_input(job: &ClipJob, config: &WorkerConfig) -> WorkerResult<()> {
    job.params.validate().map_err(WorkerError::invalid_input)?;

    let path = job.source.path();
    let metadata = std::fs::metadata(path)
        .map_err(|_| WorkerError::invalid_input(format!("File not found: {}", path.display())))?;
    if !metadata.is_file() {
        return Err(WorkerError::invalid_input(format!(
            "Not a file: {}",
            path.display()
        )));
    }

    if let ClipSource::Video(_) = job.source {
        if !config.is_allowed_extension(path) {
            let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");
            return Err(WorkerError::unsupported(format!(
                "Unsupported file type: .{ext}"
            )));
        }
        if metadata.len() > config.max_input_bytes {
            return Err(WorkerError::invalid_input(format!(
                "File too large: {} bytes (max {})",
                metadata.len(),
                config.max_input_bytes
            )));
        }
    }
    Ok(())
}
