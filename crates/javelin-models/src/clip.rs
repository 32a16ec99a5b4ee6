//! Clip-level analysis parameters.
//!
//! These are supplied by whoever submits the clip (upload form, CLI flags)
//! and stay fixed for the whole analysis.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use crate::keypoint::KeypointIndex;

/// Camera placement relative to the runway.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum ViewType {
    /// Filmed from the side of the throwing arm.
    #[default]
    Side,
    /// Filmed from behind the runway center.
    Rear,
}

impl ViewType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ViewType::Side => "side",
            ViewType::Rear => "rear",
        }
    }

    /// Upload hint shown to athletes choosing this view.
    pub fn capture_hint(&self) -> &'static str {
        match self {
            ViewType::Side => "From the side of throwing arm",
            ViewType::Rear => "From behind the runway center",
        }
    }
}

/// Throwing arm of the athlete.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum Handedness {
    #[default]
    Right,
    Left,
}

/// Body side, used to pick left/right keypoints.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum Side {
    Left,
    Right,
}

impl Side {
    pub fn ankle(&self) -> KeypointIndex {
        match self {
            Side::Left => KeypointIndex::LeftAnkle,
            Side::Right => KeypointIndex::RightAnkle,
        }
    }

    pub fn wrist(&self) -> KeypointIndex {
        match self {
            Side::Left => KeypointIndex::LeftWrist,
            Side::Right => KeypointIndex::RightWrist,
        }
    }
}

impl Handedness {
    pub fn as_str(&self) -> &'static str {
        match self {
            Handedness::Right => "right",
            Handedness::Left => "left",
        }
    }

    /// Side of the throwing arm.
    pub fn throwing_side(&self) -> Side {
        match self {
            Handedness::Right => Side::Right,
            Handedness::Left => Side::Left,
        }
    }

    /// Side of the block (plant) foot, opposite the throwing arm.
    pub fn plant_side(&self) -> Side {
        match self {
            Handedness::Right => Side::Left,
            Handedness::Left => Side::Right,
        }
    }

    /// Keypoint of the throwing hand.
    pub fn throwing_wrist(&self) -> KeypointIndex {
        self.throwing_side().wrist()
    }

    /// Ankle of the foot making the penultimate contact.
    pub fn trailing_ankle(&self) -> KeypointIndex {
        self.throwing_side().ankle()
    }

    /// Ankle of the plant foot.
    pub fn plant_ankle(&self) -> KeypointIndex {
        self.plant_side().ankle()
    }

    /// Multiplier mapping image-plane lateral angles onto the
    /// "positive = toward throwing side" convention.
    pub fn lateral_sign(&self) -> f64 {
        match self {
            Handedness::Right => 1.0,
            Handedness::Left => -1.0,
        }
    }
}

/// How pixel distances are converted to meters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum ScaleMethod {
    /// Circular marker of known physical size visible in the frame.
    #[default]
    Marker,
    /// Estimate from the athlete's standing height.
    Auto,
}

impl ScaleMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScaleMethod::Marker => "marker",
            ScaleMethod::Auto => "auto",
        }
    }
}

impl fmt::Display for ViewType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl fmt::Display for Handedness {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl fmt::Display for ScaleMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for ViewType {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "side" => Ok(ViewType::Side),
            "rear" | "back" => Ok(ViewType::Rear),
            _ => Err(ParseEnumError::new("view", s)),
        }
    }
}

impl FromStr for Handedness {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "right" | "r" => Ok(Handedness::Right),
            "left" | "l" => Ok(Handedness::Left),
            _ => Err(ParseEnumError::new("handedness", s)),
        }
    }
}

impl FromStr for ScaleMethod {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "marker" => Ok(ScaleMethod::Marker),
            "auto" => Ok(ScaleMethod::Auto),
            _ => Err(ParseEnumError::new("scale method", s)),
        }
    }
}

#[derive(Debug, Error)]
#[error("Unknown {kind}: {value}")]
pub struct ParseEnumError {
    kind: &'static str,
    value: String,
}

impl ParseEnumError {
    fn new(kind: &'static str, value: &str) -> Self {
        Self {
            kind,
            value: value.to_string(),
        }
    }
}

/// Parameters supplied alongside a clip.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, JsonSchema, Default)]
pub struct ClipParams {
    #[serde(default)]
    pub view: ViewType,

    #[serde(default)]
    pub handedness: Handedness,

    #[serde(default)]
    pub scale_method: ScaleMethod,

    /// Measured athlete height in meters. When absent the auto scale
    /// method falls back to the configured assumed height.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub athlete_height_m: Option<f64>,
}

impl ClipParams {
    pub fn new(view: ViewType, handedness: Handedness, scale_method: ScaleMethod) -> Self {
        Self {
            view,
            handedness,
            scale_method,
            athlete_height_m: None,
        }
    }

    pub fn with_athlete_height(mut self, height_m: f64) -> Self {
        self.athlete_height_m = Some(height_m);
        self
    }

    /// Validate the parameters.
    pub fn validate(&self) -> Result<(), String> {
        if let Some(height) = self.athlete_height_m {
            if !height.is_finite() || !(0.5..=2.6).contains(&height) {
                return Err(format!(
                    "Athlete height must be between 0.5 and 2.6 m, got {}",
                    height
                ));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_params() {
        assert_eq!("side".parse::<ViewType>().unwrap(), ViewType::Side);
        assert_eq!("REAR".parse::<ViewType>().unwrap(), ViewType::Rear);
        assert_eq!("left".parse::<Handedness>().unwrap(), Handedness::Left);
        assert_eq!("marker".parse::<ScaleMethod>().unwrap(), ScaleMethod::Marker);
        assert!("top".parse::<ViewType>().is_err());
        assert!("both".parse::<Handedness>().is_err());
    }

    #[test]
    fn test_parse_error_message() {
        let err = "laser".parse::<ScaleMethod>().unwrap_err();
        assert_eq!(err.to_string(), "Unknown scale method: laser");
    }

    #[test]
    fn test_handedness_feet() {
        assert_eq!(Handedness::Right.plant_ankle(), KeypointIndex::LeftAnkle);
        assert_eq!(Handedness::Right.trailing_ankle(), KeypointIndex::RightAnkle);
        assert_eq!(Handedness::Left.plant_ankle(), KeypointIndex::RightAnkle);
        assert_eq!(Handedness::Left.throwing_wrist(), KeypointIndex::LeftWrist);
        assert_eq!(Handedness::Left.lateral_sign(), -1.0);
    }

    #[test]
    fn test_params_serde_defaults() {
        let params: ClipParams = serde_json::from_str(r#"{"view": "rear"}"#).unwrap();
        assert_eq!(params.view, ViewType::Rear);
        assert_eq!(params.handedness, Handedness::Right);
        assert_eq!(params.scale_method, ScaleMethod::Marker);
        assert!(params.athlete_height_m.is_none());
    }

    #[test]
    fn test_params_validate() {
        let params = ClipParams::default();
        assert!(params.validate().is_ok());
        assert!(params.with_athlete_height(1.82).validate().is_ok());
        assert!(params.with_athlete_height(0.0).validate().is_err());
        assert!(params.with_athlete_height(f64::NAN).validate().is_err());
    }
}
