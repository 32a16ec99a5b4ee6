//! Subscriber setup and per-clip structured logging.

use std::path::Path;
use std::time::Duration;

use javelin_models::QcStatus;
use tracing::{error, info, warn, Span};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};
use uuid::Uuid;

/// Install the global subscriber: JSON lines when `json` is set, compact
/// colored output otherwise. `RUST_LOG` directives are honored on top of the
/// crate defaults.
pub fn init_tracing(json: bool) {
    let mut env_filter = EnvFilter::from_default_env();
    for directive in ["javelin=info", "ort=warn", "onnxruntime=warn"] {
        if let Ok(d) = directive.parse() {
            env_filter = env_filter.add_directive(d);
        }
    }

    if json {
        tracing_subscriber::registry()
            .with(fmt::layer().json())
            .with(env_filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(
                fmt::layer()
                    .with_ansi(true)
                    .with_target(true)
                    .with_thread_ids(false)
                    .with_file(false)
                    .with_line_number(false),
            )
            .with(env_filter)
            .init();
    }
}

/// `LOG_FORMAT=json` selects JSON output.
pub fn json_requested() -> bool {
    std::env::var("LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false)
}

/// Per-clip log lines. Every line carries the clip id and operation so
/// concurrent clips can be told apart.
#[derive(Debug, Clone, Copy)]
pub struct ClipLogger {
    clip_id: Uuid,
    operation: &'static str,
}

impl ClipLogger {
    pub fn new(clip_id: Uuid, operation: &'static str) -> Self {
        Self { clip_id, operation }
    }

    pub fn clip_id(&self) -> Uuid {
        self.clip_id
    }

    pub fn span(&self) -> Span {
        tracing::info_span!("clip", clip_id = %self.clip_id, operation = self.operation)
    }

    pub fn started(&self, source: &Path) {
        info!(clip_id = %self.clip_id, operation = self.operation, source = %source.display(), "Clip started");
    }

    pub fn finished(&self, status: QcStatus, elapsed: Duration) {
        info!(
            clip_id = %self.clip_id,
            operation = self.operation,
            status = %status,
            elapsed_secs = elapsed.as_secs_f64(),
            "Clip analyzed"
        );
    }

    /// The clip itself could not be analyzed.
    pub fn rejected(&self, reason: &str) {
        warn!(clip_id = %self.clip_id, operation = self.operation, reason, "Clip rejected");
    }

    pub fn timed_out(&self, limit_secs: u64) {
        warn!(clip_id = %self.clip_id, operation = self.operation, limit_secs, "Clip timed out");
    }

    pub fn failed(&self, error: &dyn std::fmt::Display) {
        error!(clip_id = %self.clip_id, operation = self.operation, "Clip failed: {}", error);
    }
}
