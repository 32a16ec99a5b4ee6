//! Shared data models for javelin throw analysis.
//!
//! This crate provides Serde-serializable types for:
//! - Clip-level parameters (camera view, handedness, scale method)
//! - Pose keypoints in the 17-point COCO layout
//! - The analysis result record (meta, events, metrics, quality control)

pub mod clip;
pub mod keypoint;
pub mod result;

// Re-export common types
pub use clip::{ClipParams, Handedness, ParseEnumError, ScaleMethod, Side, ViewType};
pub use keypoint::{FootPoints, Keypoint, KeypointIndex, Pose};
pub use result::{AnalysisResult, EventFrames, MetaInfo, MetricSet, QcStatus, QualityControl};
