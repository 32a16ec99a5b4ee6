//! Motion analysis for javelin throw video.
//!
//! This crate turns a clip into calibrated kinematic events and metrics:
//! - Per-frame pose and marker/implement detection behind provider traits
//! - Scale calibration from a reference marker or the athlete's height
//! - Savitzky-Golay trajectory smoothing
//! - Penultimate contact, plant and release segmentation
//! - Release and posture metrics with a quality-control verdict
//!
//! OpenCV decoding and Hough detectors sit behind the `opencv` feature, the
//! YOLOv8-pose back-end behind `onnx`.

pub mod calibration;
pub mod config;
pub mod detection;
pub mod error;
pub mod events;
pub mod kinematics;
pub mod pipeline;
pub mod probe;
pub mod qc;
pub mod smoothing;
pub mod tracks;
#[cfg(feature = "opencv")]
pub mod video;

pub use calibration::{calibrate, CalibrationFactor};
pub use config::{AnalysisConfig, PrimitiveDetectorConfig};
pub use detection::{
    FrameObservation, ObservedClip, ObservedProvider, PoseProvider, PrimitiveProvider,
};
pub use error::{MediaError, MediaResult};
pub use events::{segment_events, Segmentation};
pub use kinematics::{compute_metrics, KinematicInput};
pub use pipeline::{ClipMeta, Deadline, MotionAnalyzer};
pub use probe::{probe_video, VideoInfo};
pub use qc::score as score_quality;
pub use smoothing::{SavitzkyGolay, SmoothedTrack, SmoothedTracks};
pub use tracks::{PixelPoint, RawTracks, Track, TrackId, TrackSample};

#[cfg(feature = "opencv")]
pub use detection::HoughPrimitiveDetector;
#[cfg(feature = "onnx")]
pub use detection::YoloPoseDetector;
#[cfg(feature = "opencv")]
pub use video::{analyze_video, open_video, VideoFrames};
