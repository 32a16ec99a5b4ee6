//! Prometheus metrics for the clip worker.

use std::net::SocketAddr;

use javelin_models::QcStatus;
use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;
use tracing::info;

use crate::error::{WorkerError, WorkerResult};

/// Install the Prometheus recorder with an HTTP scrape endpoint on `port`.
///
/// Must be called from inside a Tokio runtime.
pub fn init_metrics(port: u16) -> WorkerResult<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .map_err(|e| WorkerError::Metrics(e.to_string()))?;
    info!(%addr, "Prometheus exporter listening");
    Ok(())
}

/// Metric names as constants for consistency.
pub mod names {
    pub const CLIPS_ANALYZED_TOTAL: &str = "javelin_clips_analyzed_total";
    pub const CLIPS_REJECTED_TOTAL: &str = "javelin_clips_rejected_total";
    pub const CLIPS_TIMED_OUT_TOTAL: &str = "javelin_clips_timed_out_total";
    pub const CLIPS_ERRORED_TOTAL: &str = "javelin_clips_errored_total";
    pub const CLIPS_IN_FLIGHT: &str = "javelin_clips_in_flight";
    pub const ANALYSIS_DURATION_SECONDS: &str = "javelin_analysis_duration_seconds";
}

/// Record a clip that produced a full result.
pub fn record_clip_analyzed(status: QcStatus, duration_secs: f64) {
    let labels = [("status", status.as_str().to_string())];
    counter!(names::CLIPS_ANALYZED_TOTAL, &labels).increment(1);
    histogram!(names::ANALYSIS_DURATION_SECONDS, &labels).record(duration_secs);
}

/// Record a clip rejected for a named input reason.
pub fn record_clip_rejected(reason: &str) {
    let labels = [("reason", reason.to_string())];
    counter!(names::CLIPS_REJECTED_TOTAL, &labels).increment(1);
}

pub fn record_clip_timeout() {
    counter!(names::CLIPS_TIMED_OUT_TOTAL).increment(1);
}

pub fn record_clip_error() {
    counter!(names::CLIPS_ERRORED_TOTAL).increment(1);
}

pub fn set_clips_in_flight(count: usize) {
    gauge!(names::CLIPS_IN_FLIGHT).set(count as f64);
}
