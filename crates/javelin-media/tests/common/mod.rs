//! Synthetic throw clips for scenario tests and benches.

#![allow(dead_code)]

use std::f64::consts::PI;

use javelin_media::detection::{CircleDetection, FrameObservation, LineSegment, ObservedClip};
use javelin_media::{ClipMeta, PixelPoint};
use javelin_models::{FootPoints, Handedness, Keypoint, KeypointIndex, Pose};

/// Idealized delivery stride filmed at a fixed scale of 0.01 m/px.
///
/// With the defaults the trailing foot lands at frame 50, the plant foot at
/// frame 60 and the implement leaves the hand at frame 70.
#[derive(Debug, Clone)]
pub struct ThrowScenario {
    pub frames: usize,
    pub fps: f64,
    pub width: u32,
    pub height: u32,
    pub handedness: Handedness,
    /// Frame where the trailing foot is lowest.
    pub trailing_contact: f64,
    /// Frame where the plant foot is lowest.
    pub plant_contact: f64,
    /// Last frame the implement sits in the hand.
    pub hold_until: usize,
    pub marker: bool,
    pub implement: bool,
    pub confidence: f64,
}

impl Default for ThrowScenario {
    fn default() -> Self {
        Self {
            frames: 150,
            fps: 30.0,
            width: 1280,
            height: 720,
            handedness: Handedness::Right,
            trailing_contact: 50.0,
            plant_contact: 60.0,
            hold_until: 69,
            marker: true,
            implement: true,
            confidence: 0.9,
        }
    }
}

pub const HAND: (f64, f64) = (400.0, 300.0);
/// Chosen so the auto method lands on the marker scale:
/// 1.75 m / (600 - 416.25) px × 1.05 = 0.01 m/px.
pub const NOSE_Y: f64 = 416.25;

fn foot_y(frame: usize, contact: f64) -> f64 {
    500.0 + 100.0 * (2.0 * PI / 120.0 * (frame as f64 - contact)).cos()
}

impl ThrowScenario {
    pub fn implement_x(&self, frame: usize) -> f64 {
        if frame > self.hold_until {
            HAND.0 + 20.0 * (frame - self.hold_until) as f64
        } else {
            HAND.0
        }
    }

    pub fn pose(&self, frame: usize) -> Pose {
        let c = self.confidence;
        let mut kps = [Keypoint::new(400.0, 430.0, c); KeypointIndex::COUNT];
        let mut set = |kp: KeypointIndex, x: f64, y: f64| {
            kps[kp as usize] = Keypoint::new(x, y, c);
        };

        set(KeypointIndex::Nose, 400.0, NOSE_Y);
        set(KeypointIndex::LeftShoulder, 380.0, 445.0);
        set(KeypointIndex::RightShoulder, 420.0, 455.0);
        set(KeypointIndex::LeftHip, 385.0, 510.0);
        set(KeypointIndex::RightHip, 415.0, 510.0);

        let throwing = self.handedness.throwing_wrist();
        set(throwing, HAND.0, HAND.1);

        let trailing_y = foot_y(frame, self.trailing_contact);
        let plant_y = foot_y(frame, self.plant_contact);
        set(self.handedness.trailing_ankle(), 380.0, trailing_y);
        set(self.handedness.plant_ankle(), 420.0, plant_y);

        // Plant foot turned 45° off the line of travel.
        let foot = FootPoints {
            heel: Keypoint::new(410.0, plant_y, c),
            toe: Keypoint::new(430.0, plant_y - 20.0, c),
        };
        let pose = Pose::new(kps);
        match self.handedness {
            Handedness::Right => pose.with_feet(Some(foot), None),
            Handedness::Left => pose.with_feet(None, Some(foot)),
        }
    }

    pub fn frame(&self, index: usize) -> FrameObservation {
        let mut frame = FrameObservation {
            pose: Some(self.pose(index)),
            ..Default::default()
        };
        if self.marker {
            frame
                .circles
                .push(CircleDetection::new(PixelPoint::new(1000.0, 600.0), 50.0));
        }
        if self.implement {
            let x = self.implement_x(index);
            frame
                .segments
                .push(LineSegment::new(x - 75.0, HAND.1, x + 75.0, HAND.1));
        }
        frame
    }

    pub fn meta(&self) -> ClipMeta {
        ClipMeta {
            fps: self.fps,
            frame_count: self.frames,
            width: self.width,
            height: self.height,
        }
    }

    pub fn build(&self) -> ObservedClip {
        ObservedClip {
            meta: self.meta(),
            frames: (0..self.frames).map(|i| self.frame(i)).collect(),
        }
    }
}
