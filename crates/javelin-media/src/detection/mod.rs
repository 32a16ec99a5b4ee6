//! Per-frame detection.
//!
//! Back-ends:
//! - [`ObservedProvider`]: replays pre-extracted observations (always available)
//! - `HoughPrimitiveDetector`: OpenCV circle/line Hough transforms (`opencv` feature)
//! - `YoloPoseDetector`: YOLOv8-pose on ONNX Runtime (`onnx` feature)

#[cfg(feature = "opencv")]
pub mod hough;
pub mod observed;
pub mod primitives;
pub mod providers;
#[cfg(feature = "onnx")]
pub mod yolo_pose;

use javelin_models::Pose;
use tracing::{debug, warn};

#[cfg(feature = "opencv")]
pub use hough::HoughPrimitiveDetector;
pub use observed::{FrameObservation, ObservedClip, ObservedProvider};
pub use primitives::{select_longest_segment, CircleDetection, ImplementSighting, LineSegment};
pub use providers::{PoseProvider, PrimitiveProvider};
#[cfg(feature = "onnx")]
pub use yolo_pose::YoloPoseDetector;

/// Everything detected in one frame.
#[derive(Debug, Clone, Default)]
pub struct FrameDetections {
    pub pose: Option<Pose>,
    pub circles: Vec<CircleDetection>,
    pub implement: Option<ImplementSighting>,
    /// The pose back-end errored on this frame
    pub pose_failed: bool,
}

/// Run both providers on one frame.
///
/// Back-end errors never propagate: a failed pose becomes "no detection"
/// and is counted, a failed primitive pass is treated as nothing found.
pub fn detect_frame<F>(
    frame: &F,
    frame_index: usize,
    pose_provider: &dyn PoseProvider<F>,
    primitive_provider: &dyn PrimitiveProvider<F>,
) -> FrameDetections {
    let (pose, pose_failed) = match pose_provider.detect_pose(frame) {
        Ok(pose) => (pose, false),
        Err(e) => {
            debug!(
                frame = frame_index,
                provider = pose_provider.name(),
                error = %e,
                "Pose detection failed"
            );
            metrics::counter!("javelin_pose_failures_total", "provider" => pose_provider.name())
                .increment(1);
            (None, true)
        }
    };

    let circles = primitive_provider.detect_circles(frame).unwrap_or_else(|e| {
        warn!(frame = frame_index, error = %e, "Marker detection failed");
        Vec::new()
    });

    let implement = primitive_provider.detect_implement(frame).unwrap_or_else(|e| {
        warn!(frame = frame_index, error = %e, "Implement detection failed");
        None
    });

    FrameDetections {
        pose,
        circles,
        implement,
        pose_failed,
    }
}
