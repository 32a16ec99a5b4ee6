//! Pre-extracted observations.
//!
//! Lets detection run outside this process (a separate model server, a
//! notebook, a recorded fixture) while the rest of the pipeline stays the
//! same. The JSON document carries clip metadata and one entry per frame.

use javelin_models::Pose;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::debug;

use crate::detection::primitives::{CircleDetection, ImplementSighting, LineSegment};
use crate::detection::providers::{PoseProvider, PrimitiveProvider};
use crate::error::{MediaError, MediaResult};
use crate::pipeline::ClipMeta;

/// Detections recorded for one frame.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FrameObservation {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pose: Option<Pose>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub circles: Vec<CircleDetection>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub segments: Vec<LineSegment>,

    /// Implement sighting with its own confidence; takes precedence over
    /// `segments`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub implement: Option<ImplementSighting>,

    /// Error the upstream pose back-end reported for this frame.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pose_error: Option<String>,
}

/// A whole clip of observations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObservedClip {
    pub meta: ClipMeta,
    pub frames: Vec<FrameObservation>,
}

impl ObservedClip {
    pub fn from_json_str(content: &str) -> MediaResult<Self> {
        Ok(serde_json::from_str(content)?)
    }

    pub fn load(path: impl AsRef<Path>) -> MediaResult<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(MediaError::FileNotFound(path.to_path_buf()));
        }
        let content = std::fs::read_to_string(path)?;
        let clip = Self::from_json_str(&content)?;
        debug!(
            path = %path.display(),
            frames = clip.frames.len(),
            "Loaded observed clip"
        );
        Ok(clip)
    }
}

/// Replays recorded observations through both provider traits.
#[derive(Debug, Clone, Copy, Default)]
pub struct ObservedProvider;

impl PoseProvider<FrameObservation> for ObservedProvider {
    fn detect_pose(&self, frame: &FrameObservation) -> MediaResult<Option<Pose>> {
        if let Some(err) = &frame.pose_error {
            return Err(MediaError::detection_failed(err.clone()));
        }
        Ok(frame.pose.clone())
    }

    fn name(&self) -> &'static str {
        "observed"
    }
}

impl PrimitiveProvider<FrameObservation> for ObservedProvider {
    fn detect_circles(&self, frame: &FrameObservation) -> MediaResult<Vec<CircleDetection>> {
        Ok(frame.circles.clone())
    }

    fn detect_segments(&self, frame: &FrameObservation) -> MediaResult<Vec<LineSegment>> {
        Ok(frame.segments.clone())
    }

    fn tracked_implement(&self, frame: &FrameObservation) -> Option<ImplementSighting> {
        frame.implement
    }

    fn name(&self) -> &'static str {
        "observed"
    }
}
