//! Pixel to meter scale calibration.
//!
//! Computed once per clip before any physical-unit metric and frozen
//! afterwards: [`CalibrationFactor`] has no setters.

use javelin_models::{ClipParams, KeypointIndex, ScaleMethod};
use tracing::{debug, info};

use crate::config::AnalysisConfig;
use crate::error::{MediaError, MediaResult};
use crate::tracks::RawTracks;

/// Meters per pixel plus the method that produced it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CalibrationFactor {
    meters_per_pixel: f64,
    method: ScaleMethod,
}

impl CalibrationFactor {
    /// Rejects non-positive or non-finite factors.
    pub fn new(meters_per_pixel: f64, method: ScaleMethod) -> MediaResult<Self> {
        if !(meters_per_pixel.is_finite() && meters_per_pixel > 0.0) {
            return Err(MediaError::internal(format!(
                "Non-positive scale factor {meters_per_pixel} from {method} calibration"
            )));
        }
        Ok(Self {
            meters_per_pixel,
            method,
        })
    }

    pub fn meters_per_pixel(&self) -> f64 {
        self.meters_per_pixel
    }

    pub fn method(&self) -> ScaleMethod {
        self.method
    }

    pub fn to_meters(&self, pixels: f64) -> f64 {
        pixels * self.meters_per_pixel
    }
}

/// Joints that must all be trusted for a frame to count as upright.
const UPRIGHT_JOINTS: [KeypointIndex; 7] = [
    KeypointIndex::Nose,
    KeypointIndex::LeftShoulder,
    KeypointIndex::RightShoulder,
    KeypointIndex::LeftHip,
    KeypointIndex::RightHip,
    KeypointIndex::LeftAnkle,
    KeypointIndex::RightAnkle,
];

/// Compute the clip's calibration factor with the requested method.
pub fn calibrate(
    raw: &RawTracks,
    params: &ClipParams,
    config: &AnalysisConfig,
) -> MediaResult<CalibrationFactor> {
    match params.scale_method {
        ScaleMethod::Marker => marker_calibration(raw, config),
        ScaleMethod::Auto => auto_calibration(raw, params, config),
    }
}

fn marker_calibration(raw: &RawTracks, config: &AnalysisConfig) -> MediaResult<CalibrationFactor> {
    let mut diameters: Vec<f64> = raw
        .marker_diameters()
        .iter()
        .flatten()
        .copied()
        .filter(|d| *d > 0.0)
        .collect();
    if diameters.is_empty() {
        return Err(MediaError::NoMarker);
    }

    diameters.sort_by(f64::total_cmp);
    let median = median_sorted(&diameters);
    let tolerance = config.marker_consistency_tolerance * median;
    let consistent: Vec<f64> = diameters
        .iter()
        .copied()
        .filter(|d| (d - median).abs() <= tolerance)
        .collect();

    let diameter = if consistent.is_empty() {
        median
    } else {
        consistent.iter().sum::<f64>() / consistent.len() as f64
    };

    info!(
        detections = diameters.len(),
        consistent = consistent.len(),
        diameter_px = diameter,
        "Marker calibration"
    );

    CalibrationFactor::new(config.marker_size_m / diameter, ScaleMethod::Marker)
}

fn median_sorted(values: &[f64]) -> f64 {
    let mid = values.len() / 2;
    if values.len() % 2 == 0 {
        (values[mid - 1] + values[mid]) / 2.0
    } else {
        values[mid]
    }
}

fn auto_calibration(
    raw: &RawTracks,
    params: &ClipParams,
    config: &AnalysisConfig,
) -> MediaResult<CalibrationFactor> {
    let (frame, span) =
        standing_height_px(raw, config.pose_confidence_threshold).ok_or(MediaError::NoUprightPose)?;
    let height = params
        .athlete_height_m
        .unwrap_or(config.default_athlete_height_m);

    info!(frame, span_px = span, height_m = height, "Auto calibration");

    CalibrationFactor::new(height / span * config.auto_scale_coefficient, ScaleMethod::Auto)
}

/// Largest ankle-to-nose vertical span over frames where every upright
/// joint is trusted. Ties keep the earliest frame.
pub fn standing_height_px(raw: &RawTracks, threshold: f64) -> Option<(usize, f64)> {
    let mut best: Option<(usize, f64)> = None;
    for frame in 0..raw.frame_count() {
        let trusted: Option<Vec<_>> = UPRIGHT_JOINTS
            .iter()
            .map(|&kp| raw.keypoint(kp).get(frame).trusted(threshold))
            .collect();
        let Some(points) = trusted else {
            continue;
        };
        let nose = points[0];
        let ankle_y = points[5].y.max(points[6].y);
        let span = ankle_y - nose.y;
        if span <= 0.0 {
            continue;
        }
        if best.map_or(true, |(_, s)| span > s) {
            best = Some((frame, span));
        }
    }
    if best.is_none() {
        debug!("No frame qualifies as upright");
    }
    best
}

/// Athlete height used for the release height ratio.
///
/// An explicit height always wins; the auto method otherwise falls back to
/// its assumed height. Marker calibration has no height to offer.
pub fn athlete_height_estimate(params: &ClipParams, config: &AnalysisConfig) -> Option<f64> {
    match (params.athlete_height_m, params.scale_method) {
        (Some(h), _) => Some(h),
        (None, ScaleMethod::Auto) => Some(config.default_athlete_height_m),
        (None, ScaleMethod::Marker) => None,
    }
}
