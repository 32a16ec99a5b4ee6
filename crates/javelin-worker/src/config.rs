//! Worker configuration.

use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use javelin_media::AnalysisConfig;
use tracing::info;

use crate::error::{WorkerError, WorkerResult};

/// Worker configuration.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Maximum clips analyzed concurrently
    pub max_concurrent_clips: usize,
    /// Wall-clock ceiling per clip
    pub clip_timeout: Duration,
    /// Directory for result documents; results are only returned when unset
    pub output_dir: Option<PathBuf>,
    /// TOML file overriding the analysis defaults
    pub analysis_config_path: Option<PathBuf>,
    /// Largest accepted input file
    pub max_input_bytes: u64,
    /// Accepted video extensions, lowercase without the dot
    pub allowed_extensions: Vec<String>,
    /// Port for the Prometheus exporter; disabled when unset
    pub metrics_port: Option<u16>,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            max_concurrent_clips: 2,
            clip_timeout: Duration::from_secs(60),
            output_dir: None,
            analysis_config_path: None,
            max_input_bytes: 100 * 1024 * 1024, // 100 MB
            allowed_extensions: ["mp4", "mov", "avi", "webm"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            metrics_port: None,
        }
    }
}

fn env_parse<T: FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|s| s.trim().parse().ok())
}

impl WorkerConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            max_concurrent_clips: env_parse::<usize>("WORKER_MAX_CLIPS")
                .filter(|n| *n > 0)
                .unwrap_or(defaults.max_concurrent_clips),
            clip_timeout: env_parse::<u64>("WORKER_CLIP_TIMEOUT")
                .map(Duration::from_secs)
                .unwrap_or(defaults.clip_timeout),
            output_dir: std::env::var("WORKER_OUTPUT_DIR").ok().map(PathBuf::from),
            analysis_config_path: std::env::var("JAVELIN_CONFIG").ok().map(PathBuf::from),
            max_input_bytes: env_parse::<u64>("WORKER_MAX_UPLOAD_MB")
                .map(|mb| mb * 1024 * 1024)
                .unwrap_or(defaults.max_input_bytes),
            allowed_extensions: std::env::var("WORKER_ALLOWED_EXTENSIONS")
                .ok()
                .map(|s| parse_extensions(&s))
                .filter(|exts| !exts.is_empty())
                .unwrap_or(defaults.allowed_extensions),
            metrics_port: env_parse("METRICS_PORT"),
        }
    }

    pub fn is_allowed_extension(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .is_some_and(|e| self.allowed_extensions.iter().any(|a| *a == e))
    }

    /// Analysis settings from `analysis_config_path`, or the defaults.
    pub fn load_analysis_config(&self) -> WorkerResult<AnalysisConfig> {
        let config = match &self.analysis_config_path {
            Some(path) => {
                info!(path = %path.display(), "Loading analysis config");
                AnalysisConfig::load(path)?
            }
            None => AnalysisConfig::default(),
        };
        config.validate().map_err(WorkerError::config_error)?;
        Ok(config)
    }
}

fn parse_extensions(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|e| e.trim().trim_start_matches('.').to_ascii_lowercase())
        .filter(|e| !e.is_empty())
        .collect()
}
