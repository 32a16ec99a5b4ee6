//! Observation documents for a clean synthetic throw.

use std::f64::consts::PI;
use std::path::{Path, PathBuf};

use javelin_media::detection::{CircleDetection, FrameObservation, LineSegment, ObservedClip};
use javelin_media::{ClipMeta, PixelPoint};
use javelin_models::{Handedness, Keypoint, KeypointIndex, Pose};

/// 30 fps stride at 0.01 m/px: trailing contact at frame 50, plant at 60,
/// release at 70. The standing height also yields 0.01 m/px under auto
/// calibration.
#[derive(Debug, Clone)]
pub struct ThrowClip {
    pub frames: usize,
    pub handedness: Handedness,
    pub marker: bool,
}

impl Default for ThrowClip {
    fn default() -> Self {
        Self {
            frames: 150,
            handedness: Handedness::Right,
            marker: true,
        }
    }
}

fn foot_y(frame: usize, contact: f64) -> f64 {
    500.0 + 100.0 * (2.0 * PI / 120.0 * (frame as f64 - contact)).cos()
}

impl ThrowClip {
    fn frame(&self, i: usize) -> FrameObservation {
        let mut kps = [Keypoint::new(400.0, 430.0, 0.9); KeypointIndex::COUNT];
        kps[KeypointIndex::Nose as usize] = Keypoint::new(400.0, 416.25, 0.9);
        kps[self.handedness.throwing_wrist() as usize] = Keypoint::new(400.0, 300.0, 0.9);
        kps[self.handedness.trailing_ankle() as usize] = Keypoint::new(380.0, foot_y(i, 50.0), 0.9);
        kps[self.handedness.plant_ankle() as usize] = Keypoint::new(420.0, foot_y(i, 60.0), 0.9);

        let x = if i > 69 { 400.0 + 20.0 * (i - 69) as f64 } else { 400.0 };
        let mut frame = FrameObservation {
            pose: Some(Pose::new(kps)),
            segments: vec![LineSegment::new(x - 75.0, 300.0, x + 75.0, 300.0)],
            ..Default::default()
        };
        if self.marker {
            frame
                .circles
                .push(CircleDetection::new(PixelPoint::new(1000.0, 600.0), 50.0));
        }
        frame
    }

    pub fn build(&self) -> ObservedClip {
        ObservedClip {
            meta: ClipMeta {
                fps: 30.0,
                frame_count: self.frames,
                width: 1280,
                height: 720,
            },
            frames: (0..self.frames).map(|i| self.frame(i)).collect(),
        }
    }

    /// Write the observation document as `dir/name`.
    pub fn write(&self, dir: &Path, name: &str) -> PathBuf {
        let path = dir.join(name);
        std::fs::write(&path, serde_json::to_vec(&self.build()).unwrap()).unwrap();
        path
    }
}
