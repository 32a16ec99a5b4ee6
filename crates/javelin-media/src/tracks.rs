//! Per-entity pixel tracks.
//!
//! A track holds exactly one sample per frame. Missing detections are an
//! explicit [`TrackSample::Undetected`], so a track never carries a position
//! the detector did not produce.

use javelin_models::{KeypointIndex, Pose, Side};
use serde::{Deserialize, Serialize};

use crate::detection::FrameDetections;

/// Position in frame pixels (y grows downward).
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct PixelPoint {
    pub x: f64,
    pub y: f64,
}

impl PixelPoint {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn distance(&self, other: &PixelPoint) -> f64 {
        ((self.x - other.x).powi(2) + (self.y - other.y).powi(2)).sqrt()
    }

    pub fn midpoint(&self, other: &PixelPoint) -> PixelPoint {
        PixelPoint::new((self.x + other.x) / 2.0, (self.y + other.y) / 2.0)
    }
}

/// One frame of a raw track.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TrackSample {
    Undetected,
    Detected { point: PixelPoint, confidence: f64 },
}

impl TrackSample {
    /// Position when detected with at least `threshold` confidence.
    pub fn trusted(&self, threshold: f64) -> Option<PixelPoint> {
        match *self {
            TrackSample::Detected { point, confidence } if confidence >= threshold => Some(point),
            _ => None,
        }
    }

    pub fn confidence(&self) -> Option<f64> {
        match *self {
            TrackSample::Detected { confidence, .. } => Some(confidence),
            TrackSample::Undetected => None,
        }
    }

    pub fn is_detected(&self) -> bool {
        matches!(self, TrackSample::Detected { .. })
    }
}

/// Identifies one tracked entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TrackId {
    Keypoint(KeypointIndex),
    Heel(Side),
    Toe(Side),
    Implement,
}

impl TrackId {
    pub const COUNT: usize = KeypointIndex::COUNT + 5;

    /// Dense index into track tables.
    pub fn index(self) -> usize {
        match self {
            TrackId::Keypoint(kp) => kp as usize,
            TrackId::Heel(Side::Left) => KeypointIndex::COUNT,
            TrackId::Heel(Side::Right) => KeypointIndex::COUNT + 1,
            TrackId::Toe(Side::Left) => KeypointIndex::COUNT + 2,
            TrackId::Toe(Side::Right) => KeypointIndex::COUNT + 3,
            TrackId::Implement => KeypointIndex::COUNT + 4,
        }
    }

    pub fn all() -> impl Iterator<Item = TrackId> {
        KeypointIndex::ALL
            .into_iter()
            .map(TrackId::Keypoint)
            .chain([
                TrackId::Heel(Side::Left),
                TrackId::Heel(Side::Right),
                TrackId::Toe(Side::Left),
                TrackId::Toe(Side::Right),
                TrackId::Implement,
            ])
    }

    pub fn is_implement(self) -> bool {
        matches!(self, TrackId::Implement)
    }
}

/// Raw per-frame samples of one entity.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Track {
    samples: Vec<TrackSample>,
}

impl Track {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            samples: Vec::with_capacity(capacity),
        }
    }

    pub fn from_samples(samples: Vec<TrackSample>) -> Self {
        Self { samples }
    }

    pub fn push(&mut self, sample: TrackSample) {
        self.samples.push(sample);
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn get(&self, frame: usize) -> TrackSample {
        self.samples.get(frame).copied().unwrap_or(TrackSample::Undetected)
    }

    pub fn samples(&self) -> &[TrackSample] {
        &self.samples
    }

    /// Positions at or above `threshold`; everything else is a gap.
    pub fn trusted_points(&self, threshold: f64) -> Vec<Option<PixelPoint>> {
        self.samples.iter().map(|s| s.trusted(threshold)).collect()
    }

    pub fn detected_count(&self) -> usize {
        self.samples.iter().filter(|s| s.is_detected()).count()
    }
}

/// Everything the per-frame detectors produced for a clip.
#[derive(Debug, Clone)]
pub struct RawTracks {
    tracks: Vec<Track>,
    /// Diameter of the largest marker circle per frame.
    marker_diameters: Vec<Option<f64>>,
    pose_confidences: Vec<Option<f64>>,
    frame_count: usize,
    /// Frames where the pose back-end errored.
    pub pose_failures: usize,
}

impl RawTracks {
    pub fn with_capacity(frames: usize) -> Self {
        Self {
            tracks: (0..TrackId::COUNT).map(|_| Track::with_capacity(frames)).collect(),
            marker_diameters: Vec::with_capacity(frames),
            pose_confidences: Vec::with_capacity(frames),
            frame_count: 0,
            pose_failures: 0,
        }
    }

    /// Append one frame of detections.
    pub fn push_frame(&mut self, detections: &FrameDetections) {
        self.push_pose(detections.pose.as_ref());

        let implement = detections
            .implement
            .as_ref()
            .map_or(TrackSample::Undetected, |s| TrackSample::Detected {
                point: s.center,
                confidence: s.confidence,
            });
        self.tracks[TrackId::Implement.index()].push(implement);

        let largest = detections
            .circles
            .iter()
            .max_by(|a, b| a.radius.total_cmp(&b.radius))
            .map(|c| c.radius * 2.0);
        self.marker_diameters.push(largest);

        if detections.pose_failed {
            self.pose_failures += 1;
        }
        self.frame_count += 1;
    }

    fn push_pose(&mut self, pose: Option<&Pose>) {
        let Some(pose) = pose else {
            for id in TrackId::all().filter(|id| !id.is_implement()) {
                self.tracks[id.index()].push(TrackSample::Undetected);
            }
            self.pose_confidences.push(None);
            return;
        };

        for kp in KeypointIndex::ALL {
            let k = pose.get(kp);
            self.tracks[kp as usize].push(TrackSample::Detected {
                point: PixelPoint::new(k.x, k.y),
                confidence: k.confidence,
            });
        }
        for (side, foot) in [(Side::Left, pose.left_foot), (Side::Right, pose.right_foot)] {
            let (heel, toe) = match foot {
                Some(f) => (
                    TrackSample::Detected {
                        point: PixelPoint::new(f.heel.x, f.heel.y),
                        confidence: f.heel.confidence,
                    },
                    TrackSample::Detected {
                        point: PixelPoint::new(f.toe.x, f.toe.y),
                        confidence: f.toe.confidence,
                    },
                ),
                None => (TrackSample::Undetected, TrackSample::Undetected),
            };
            self.tracks[TrackId::Heel(side).index()].push(heel);
            self.tracks[TrackId::Toe(side).index()].push(toe);
        }
        self.pose_confidences.push(Some(pose.average_confidence()));
    }

    pub fn frame_count(&self) -> usize {
        self.frame_count
    }

    pub fn track(&self, id: TrackId) -> &Track {
        &self.tracks[id.index()]
    }

    pub fn keypoint(&self, kp: KeypointIndex) -> &Track {
        self.track(TrackId::Keypoint(kp))
    }

    pub fn implement(&self) -> &Track {
        self.track(TrackId::Implement)
    }

    pub fn marker_diameters(&self) -> &[Option<f64>] {
        &self.marker_diameters
    }

    /// Number of frames with a pose.
    pub fn poses_detected(&self) -> usize {
        self.pose_confidences.iter().filter(|c| c.is_some()).count()
    }

    /// Mean pose confidence over frames with a pose.
    pub fn mean_pose_confidence(&self) -> Option<f64> {
        let values: Vec<f64> = self.pose_confidences.iter().flatten().copied().collect();
        if values.is_empty() {
            return None;
        }
        Some(values.iter().sum::<f64>() / values.len() as f64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detection::{CircleDetection, ImplementSighting};
    use javelin_models::Keypoint;

    #[test]
    fn test_track_ids_dense() {
        let ids: Vec<usize> = TrackId::all().map(|id| id.index()).collect();
        assert_eq!(ids, (0..TrackId::COUNT).collect::<Vec<_>>());
    }

    #[test]
    fn test_trusted_threshold() {
        let sample = TrackSample::Detected {
            point: PixelPoint::new(1.0, 2.0),
            confidence: 0.4,
        };
        assert!(sample.trusted(0.5).is_none());
        assert_eq!(sample.trusted(0.3), Some(PixelPoint::new(1.0, 2.0)));
        assert!(TrackSample::Undetected.trusted(0.0).is_none());
    }

    #[test]
    fn test_push_frames_keeps_lengths_aligned() {
        let mut tracks = RawTracks::with_capacity(2);
        let pose = Pose::new([Keypoint::new(10.0, 20.0, 0.9); KeypointIndex::COUNT]);
        tracks.push_frame(&FrameDetections {
            pose: Some(pose),
            circles: vec![
                CircleDetection::new(PixelPoint::new(5.0, 5.0), 10.0),
                CircleDetection::new(PixelPoint::new(50.0, 5.0), 12.0),
            ],
            implement: None,
            pose_failed: false,
        });
        tracks.push_frame(&FrameDetections {
            pose: None,
            circles: vec![],
            implement: Some(ImplementSighting::new(PixelPoint::new(3.0, 4.0), 0.0, 120.0, 1.0)),
            pose_failed: true,
        });

        assert_eq!(tracks.frame_count(), 2);
        for id in TrackId::all() {
            assert_eq!(tracks.track(id).len(), 2);
        }
        assert_eq!(tracks.marker_diameters(), &[Some(24.0), None]);
        assert_eq!(tracks.poses_detected(), 1);
        assert_eq!(tracks.pose_failures, 1);
        assert!(!tracks.keypoint(KeypointIndex::Nose).get(1).is_detected());
        assert!(tracks.implement().get(1).is_detected());
        assert!(!tracks.track(TrackId::Heel(Side::Left)).get(0).is_detected());
        assert!((tracks.mean_pose_confidence().unwrap() - 0.9).abs() < 1e-12);
    }
}
