//! Configuration for the motion-analysis pipeline.
//!
//! Every empirical constant is a named, overridable field. Files are TOML:
//!
//! ```toml
//! pose_confidence_threshold = 0.5
//!
//! [primitives]
//! canny_low = 50.0
//! ```

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::{MediaError, MediaResult};

/// Configuration for the motion-analysis pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    // === Confidence ===
    /// Minimum keypoint confidence to trust a joint (default: 0.5)
    pub pose_confidence_threshold: f64,

    /// Minimum implement detection confidence (default: 0.3)
    pub implement_confidence_threshold: f64,

    // === Events ===
    /// Vertical foot speed below which the foot counts as grounded, m/s (default: 0.05)
    pub contact_velocity_threshold: f64,

    /// Implement-to-wrist distance marking release, meters (default: 0.1)
    pub release_distance_threshold: f64,

    // === Smoothing ===
    /// Savitzky-Golay window length in samples, odd (default: 7)
    pub smoothing_window: usize,

    /// Savitzky-Golay polynomial degree (default: 2)
    pub smoothing_degree: usize,

    /// Half-width of the centered difference used for release speed (default: 2)
    pub release_speed_half_window: usize,

    /// Frames before plant used to estimate the direction of travel (default: 10)
    pub heading_lookback_frames: usize,

    // === Calibration ===
    /// Assumed athlete height when none is supplied, meters (default: 1.75)
    pub default_athlete_height_m: f64,

    /// Physical diameter of the reference marker, meters (default: 1.0)
    pub marker_size_m: f64,

    /// Correction applied to the auto scale estimate (default: 1.05)
    pub auto_scale_coefficient: f64,

    /// Relative tolerance around the median marker diameter (default: 0.2)
    pub marker_consistency_tolerance: f64,

    // === Quality Control ===
    /// Minimum release fit R² for GOOD (default: 0.9)
    pub qc_good_r2: f64,

    /// Minimum release fit R² for WARN (default: 0.75)
    pub qc_warn_r2: f64,

    /// Minimum joint visibility for GOOD (default: 0.8)
    pub qc_good_visibility: f64,

    /// Minimum joint visibility for WARN (default: 0.6)
    pub qc_warn_visibility: f64,

    // === Input Validation ===
    /// Lowest accepted frame rate (default: 15.0)
    pub min_fps: f64,

    /// Fail with "Object not detected" when the implement never shows up (default: true)
    pub require_implement: bool,

    /// Hough detector parameters
    pub primitives: PrimitiveDetectorConfig,
}

/// Parameters for the Hough-based marker and implement detectors.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PrimitiveDetectorConfig {
    /// Gaussian blur kernel size before circle detection (default: 9)
    pub blur_kernel: i32,

    /// Gaussian blur sigma (default: 2.0)
    pub blur_sigma: f64,

    /// Inverse accumulator resolution (default: 1.0)
    pub circle_dp: f64,

    /// Minimum distance between circle centers, px (default: 50.0)
    pub circle_min_dist: f64,

    /// Upper Canny threshold inside the circle transform (default: 100.0)
    pub circle_param1: f64,

    /// Accumulator threshold for circle centers (default: 30.0)
    pub circle_param2: f64,

    /// Minimum circle radius, px (default: 5)
    pub circle_min_radius: i32,

    /// Maximum circle radius, px (default: 30)
    pub circle_max_radius: i32,

    /// Lower Canny threshold for line detection (default: 50.0)
    pub canny_low: f64,

    /// Upper Canny threshold for line detection (default: 150.0)
    pub canny_high: f64,

    /// Distance resolution of the line accumulator, px (default: 1.0)
    pub line_rho: f64,

    /// Angle resolution of the line accumulator, degrees (default: 1.0)
    pub line_theta_deg: f64,

    /// Accumulator threshold for line segments (default: 50)
    pub line_threshold: i32,

    /// Minimum segment length, px (default: 100.0)
    pub line_min_length: f64,

    /// Maximum gap joining collinear segments, px (default: 10.0)
    pub line_max_gap: f64,
}

impl Default for PrimitiveDetectorConfig {
    fn default() -> Self {
        Self {
            blur_kernel: 9,
            blur_sigma: 2.0,
            circle_dp: 1.0,
            circle_min_dist: 50.0,
            circle_param1: 100.0,
            circle_param2: 30.0,
            circle_min_radius: 5,
            circle_max_radius: 30,
            canny_low: 50.0,
            canny_high: 150.0,
            line_rho: 1.0,
            line_theta_deg: 1.0,
            line_threshold: 50,
            line_min_length: 100.0,
            line_max_gap: 10.0,
        }
    }
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            pose_confidence_threshold: 0.5,
            implement_confidence_threshold: 0.3,
            contact_velocity_threshold: 0.05,
            release_distance_threshold: 0.1,
            smoothing_window: 7,
            smoothing_degree: 2,
            release_speed_half_window: 2,
            heading_lookback_frames: 10,
            default_athlete_height_m: 1.75,
            marker_size_m: 1.0,
            auto_scale_coefficient: 1.05,
            marker_consistency_tolerance: 0.2,
            qc_good_r2: 0.9,
            qc_warn_r2: 0.75,
            qc_good_visibility: 0.8,
            qc_warn_visibility: 0.6,
            min_fps: 15.0,
            require_implement: true,
            primitives: PrimitiveDetectorConfig::default(),
        }
    }
}

impl AnalysisConfig {
    /// Stricter preset for high-speed footage (120 fps and up).
    pub fn high_speed() -> Self {
        Self {
            smoothing_window: 11,
            smoothing_degree: 3,
            release_speed_half_window: 4,
            heading_lookback_frames: 30,
            min_fps: 60.0,
            ..Default::default()
        }
    }

    /// Lenient preset for phone footage with weak keypoints.
    pub fn lenient() -> Self {
        Self {
            pose_confidence_threshold: 0.35,
            implement_confidence_threshold: 0.2,
            qc_good_visibility: 0.7,
            qc_warn_visibility: 0.5,
            require_implement: false,
            ..Default::default()
        }
    }

    /// Parse a TOML document; missing keys keep their defaults.
    pub fn from_toml_str(content: &str) -> MediaResult<Self> {
        let config: AnalysisConfig = toml::from_str(content)
            .map_err(|e| MediaError::invalid_config(format!("TOML parse error: {e}")))?;
        config.validate().map_err(MediaError::InvalidConfig)?;
        Ok(config)
    }

    /// Load and validate a TOML config file.
    pub fn load<P: AsRef<Path>>(path: P) -> MediaResult<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(MediaError::FileNotFound(path.to_path_buf()));
        }
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Validate configuration values.
    pub fn validate(&self) -> Result<(), String> {
        let unit = |name: &str, v: f64| -> Result<(), String> {
            if !(0.0..=1.0).contains(&v) {
                return Err(format!("{name} must be between 0 and 1, got {v}"));
            }
            Ok(())
        };
        let positive = |name: &str, v: f64| -> Result<(), String> {
            if !(v.is_finite() && v > 0.0) {
                return Err(format!("{name} must be positive, got {v}"));
            }
            Ok(())
        };

        unit("pose_confidence_threshold", self.pose_confidence_threshold)?;
        unit("implement_confidence_threshold", self.implement_confidence_threshold)?;
        unit("qc_good_r2", self.qc_good_r2)?;
        unit("qc_warn_r2", self.qc_warn_r2)?;
        unit("qc_good_visibility", self.qc_good_visibility)?;
        unit("qc_warn_visibility", self.qc_warn_visibility)?;
        unit("marker_consistency_tolerance", self.marker_consistency_tolerance)?;

        positive("contact_velocity_threshold", self.contact_velocity_threshold)?;
        positive("release_distance_threshold", self.release_distance_threshold)?;
        positive("default_athlete_height_m", self.default_athlete_height_m)?;
        positive("marker_size_m", self.marker_size_m)?;
        positive("auto_scale_coefficient", self.auto_scale_coefficient)?;
        positive("min_fps", self.min_fps)?;

        if self.smoothing_window < 3 || self.smoothing_window % 2 == 0 {
            return Err(format!(
                "smoothing_window must be odd and at least 3, got {}",
                self.smoothing_window
            ));
        }
        if self.smoothing_degree >= self.smoothing_window {
            return Err(format!(
                "smoothing_degree ({}) must be less than smoothing_window ({})",
                self.smoothing_degree, self.smoothing_window
            ));
        }
        if self.release_speed_half_window == 0 {
            return Err("release_speed_half_window must be at least 1".to_string());
        }
        if self.qc_warn_r2 > self.qc_good_r2 {
            return Err("qc_warn_r2 must not exceed qc_good_r2".to_string());
        }
        if self.qc_warn_visibility > self.qc_good_visibility {
            return Err("qc_warn_visibility must not exceed qc_good_visibility".to_string());
        }
        if self.primitives.blur_kernel < 1 || self.primitives.blur_kernel % 2 == 0 {
            return Err("primitives.blur_kernel must be a positive odd number".to_string());
        }
        if self.primitives.circle_min_radius > self.primitives.circle_max_radius {
            return Err("primitives.circle_min_radius exceeds circle_max_radius".to_string());
        }

        Ok(())
    }
}
