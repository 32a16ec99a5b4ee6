//! Analysis result record.
//!
//! This is the flat JSON document handed back for every clip. Absent numbers
//! mean "not computable", never zero.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::clip::{ClipParams, Handedness, ScaleMethod, ViewType};

/// Clip metadata echoed into the result.
///
/// Decoder values are absent when the clip was rejected before they were
/// read, or when the decoder reported nothing usable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct MetaInfo {
    #[serde(default)]
    pub fps: Option<f64>,
    #[serde(default)]
    pub frames: Option<usize>,
    #[serde(default)]
    pub width: Option<u32>,
    #[serde(default)]
    pub height: Option<u32>,
    pub view: ViewType,
    pub handedness: Handedness,
    pub scale_method: ScaleMethod,

    /// Meters per pixel; absent when calibration did not run.
    #[serde(default)]
    pub m_per_px: Option<f64>,
}

impl MetaInfo {
    /// Metadata as reported by the decoder. Non-positive fps and zero
    /// dimensions are dropped.
    pub fn new(fps: f64, frames: usize, width: u32, height: u32, params: &ClipParams) -> Self {
        Self {
            fps: (fps.is_finite() && fps > 0.0).then_some(fps),
            frames: Some(frames),
            width: (width > 0).then_some(width),
            height: (height > 0).then_some(height),
            ..Self::unknown(params)
        }
    }

    /// Only the request parameters are known.
    pub fn unknown(params: &ClipParams) -> Self {
        Self {
            fps: None,
            frames: None,
            width: None,
            height: None,
            view: params.view,
            handedness: params.handedness,
            scale_method: params.scale_method,
            m_per_px: None,
        }
    }
}

/// Key frames of the delivery stride.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, JsonSchema)]
pub struct EventFrames {
    /// Trailing foot contact before the block.
    pub penultimate_frame: Option<usize>,
    /// Block foot contact.
    pub plant_frame: Option<usize>,
    /// Implement leaves the hand.
    pub release_frame: Option<usize>,
}

impl EventFrames {
    /// True when the present events are non-decreasing.
    pub fn is_ordered(&self) -> bool {
        let present: Vec<usize> = [self.penultimate_frame, self.plant_frame, self.release_frame]
            .into_iter()
            .flatten()
            .collect();
        present.windows(2).all(|w| w[0] <= w[1])
    }

    pub fn detected_count(&self) -> usize {
        [self.penultimate_frame, self.plant_frame, self.release_frame]
            .iter()
            .filter(|e| e.is_some())
            .count()
    }
}

/// Derived kinematic metrics.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize, JsonSchema)]
pub struct MetricSet {
    pub release_angle_deg: Option<f64>,
    pub release_height_m: Option<f64>,
    pub release_height_ratio: Option<f64>,
    pub release_speed_mps: Option<f64>,
    pub plant_to_release_ms: Option<f64>,
    pub plant_foot_progression_deg: Option<f64>,
    pub shoulder_hip_separation_deg: Option<f64>,
    /// Rear view only.
    pub lane_alignment_error_cm: Option<f64>,
}

/// Quality verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "UPPERCASE")]
pub enum QcStatus {
    Good,
    Warn,
    Fail,
}

impl QcStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            QcStatus::Good => "GOOD",
            QcStatus::Warn => "WARN",
            QcStatus::Fail => "FAIL",
        }
    }
}

impl fmt::Display for QcStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Quality control verdict plus the signals it was derived from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct QualityControl {
    pub overall_status: QcStatus,
    pub release_fit_r2: Option<f64>,
    /// Share of trusted event-joint samples around the events.
    pub joint_visibility: Option<f64>,
    /// Mean pose confidence over frames with a pose.
    pub pose_confidence: Option<f64>,
    #[serde(default)]
    pub notes: Vec<String>,
}

impl QualityControl {
    /// FAIL verdict with no signals and a single note.
    pub fn failed(note: impl Into<String>) -> Self {
        Self {
            overall_status: QcStatus::Fail,
            release_fit_r2: None,
            joint_visibility: None,
            pose_confidence: None,
            notes: vec![note.into()],
        }
    }
}

/// Complete per-clip analysis output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct AnalysisResult {
    pub meta: MetaInfo,
    pub events: EventFrames,
    pub metrics: MetricSet,
    pub qc: QualityControl,

    /// Reason the clip could not be analyzed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl AnalysisResult {
    pub fn new(meta: MetaInfo, events: EventFrames, metrics: MetricSet, qc: QualityControl) -> Self {
        Self {
            meta,
            events,
            metrics,
            qc,
            error: None,
        }
    }

    /// Well-formed FAIL result for a clip that could not be analyzed.
    pub fn failure(meta: MetaInfo, reason: impl Into<String>) -> Self {
        let reason = reason.into();
        Self {
            meta,
            events: EventFrames::default(),
            metrics: MetricSet::default(),
            qc: QualityControl::failed(reason.clone()),
            error: Some(reason),
        }
    }

    pub fn status(&self) -> QcStatus {
        self.qc.overall_status
    }
}
