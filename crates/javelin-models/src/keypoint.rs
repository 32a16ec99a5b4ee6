//! Body keypoints in the 17-point COCO layout.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// COCO-17 keypoint index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
#[repr(usize)]
pub enum KeypointIndex {
    Nose = 0,
    LeftEye = 1,
    RightEye = 2,
    LeftEar = 3,
    RightEar = 4,
    LeftShoulder = 5,
    RightShoulder = 6,
    LeftElbow = 7,
    RightElbow = 8,
    LeftWrist = 9,
    RightWrist = 10,
    LeftHip = 11,
    RightHip = 12,
    LeftKnee = 13,
    RightKnee = 14,
    LeftAnkle = 15,
    RightAnkle = 16,
}

impl KeypointIndex {
    pub const COUNT: usize = 17;

    pub const ALL: [KeypointIndex; Self::COUNT] = [
        Self::Nose,
        Self::LeftEye,
        Self::RightEye,
        Self::LeftEar,
        Self::RightEar,
        Self::LeftShoulder,
        Self::RightShoulder,
        Self::LeftElbow,
        Self::RightElbow,
        Self::LeftWrist,
        Self::RightWrist,
        Self::LeftHip,
        Self::RightHip,
        Self::LeftKnee,
        Self::RightKnee,
        Self::LeftAnkle,
        Self::RightAnkle,
    ];

    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Nose => "nose",
            Self::LeftEye => "left_eye",
            Self::RightEye => "right_eye",
            Self::LeftEar => "left_ear",
            Self::RightEar => "right_ear",
            Self::LeftShoulder => "left_shoulder",
            Self::RightShoulder => "right_shoulder",
            Self::LeftElbow => "left_elbow",
            Self::RightElbow => "right_elbow",
            Self::LeftWrist => "left_wrist",
            Self::RightWrist => "right_wrist",
            Self::LeftHip => "left_hip",
            Self::RightHip => "right_hip",
            Self::LeftKnee => "left_knee",
            Self::RightKnee => "right_knee",
            Self::LeftAnkle => "left_ankle",
            Self::RightAnkle => "right_ankle",
        }
    }
}

/// A single joint position in frame pixels.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, JsonSchema, Default)]
pub struct Keypoint {
    /// X coordinate in pixels
    pub x: f64,
    /// Y coordinate in pixels (grows downward)
    pub y: f64,
    /// Detector confidence (0.0 to 1.0)
    pub confidence: f64,
}

impl Keypoint {
    pub fn new(x: f64, y: f64, confidence: f64) -> Self {
        Self { x, y, confidence }
    }

    /// Whether the confidence reaches the threshold.
    pub fn is_valid(&self, threshold: f64) -> bool {
        self.confidence >= threshold
    }
}

/// Heel and big-toe points of one foot.
///
/// Only whole-body pose models produce these; COCO-17 models leave them empty.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct FootPoints {
    pub heel: Keypoint,
    pub toe: Keypoint,
}

/// One athlete's pose in a single frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Pose {
    pub keypoints: [Keypoint; KeypointIndex::COUNT],

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub left_foot: Option<FootPoints>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub right_foot: Option<FootPoints>,
}

impl Pose {
    pub fn new(keypoints: [Keypoint; KeypointIndex::COUNT]) -> Self {
        Self {
            keypoints,
            left_foot: None,
            right_foot: None,
        }
    }

    pub fn with_feet(mut self, left: Option<FootPoints>, right: Option<FootPoints>) -> Self {
        self.left_foot = left;
        self.right_foot = right;
        self
    }

    pub fn get(&self, index: KeypointIndex) -> &Keypoint {
        &self.keypoints[index as usize]
    }

    /// Mean confidence over all 17 keypoints.
    pub fn average_confidence(&self) -> f64 {
        let sum: f64 = self.keypoints.iter().map(|k| k.confidence).sum();
        sum / KeypointIndex::COUNT as f64
    }
}

impl Default for Pose {
    fn default() -> Self {
        Self::new([Keypoint::default(); KeypointIndex::COUNT])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keypoint_index_from_index() {
        assert_eq!(KeypointIndex::from_index(0), Some(KeypointIndex::Nose));
        assert_eq!(KeypointIndex::from_index(16), Some(KeypointIndex::RightAnkle));
        assert_eq!(KeypointIndex::from_index(17), None);
        for (i, kp) in KeypointIndex::ALL.iter().enumerate() {
            assert_eq!(kp.index(), i);
        }
    }

    #[test]
    fn test_keypoint_is_valid() {
        let kp = Keypoint::new(10.0, 20.0, 0.5);
        assert!(kp.is_valid(0.5));
        assert!(!kp.is_valid(0.51));
    }

    #[test]
    fn test_pose_average_confidence() {
        let mut pose = Pose::default();
        pose.keypoints[KeypointIndex::Nose as usize].confidence = 1.7;
        assert!((pose.average_confidence() - 0.1).abs() < 1e-12);
    }

    #[test]
    fn test_pose_json_omits_missing_feet() {
        let json = serde_json::to_value(Pose::default()).unwrap();
        assert_eq!(json["keypoints"].as_array().unwrap().len(), 17);
        assert!(json.get("left_foot").is_none());
    }
}
