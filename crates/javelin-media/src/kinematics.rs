//! Kinematic metrics from calibrated, smoothed tracks.
//!
//! Sign conventions, applied to every metric:
//! - image y grows downward and is flipped, so positive vertical is up
//! - "forward" is the athlete's direction of travel, taken from the hip
//!   midpoint heading before plant (implement motion as fallback)
//! - lateral angles are positive counter-clockwise in the upright image
//!   frame for a right-handed thrower and mirror for left-handed throwers
//! - the release angle does not mirror
//!
//! Every metric is `None` exactly when its inputs are missing.

use javelin_models::{ClipParams, EventFrames, Handedness, KeypointIndex, MetricSet, ViewType};
use tracing::debug;

use crate::calibration::CalibrationFactor;
use crate::config::AnalysisConfig;
use crate::smoothing::SmoothedTracks;
use crate::tracks::{PixelPoint, TrackId};

/// Everything the metrics engine reads.
pub struct KinematicInput<'a> {
    pub tracks: &'a SmoothedTracks,
    pub events: &'a EventFrames,
    pub calibration: &'a CalibrationFactor,
    pub params: &'a ClipParams,
    pub fps: f64,
    pub frame_width: u32,
    /// Athlete height for the release height ratio.
    pub athlete_height_m: Option<f64>,
}

/// Compute the full metric set.
pub fn compute_metrics(input: &KinematicInput<'_>, config: &AnalysisConfig) -> MetricSet {
    let release_velocity = input
        .events
        .release_frame
        .and_then(|r| implement_velocity(input, r, config.release_speed_half_window));

    let heading = input
        .events
        .plant_frame
        .and_then(|p| hip_heading(input.tracks, p, config.heading_lookback_frames));

    let forward_sign = heading
        .map(|(dx, _)| dx.signum())
        .or_else(|| release_velocity.map(|(vx, _)| if vx < 0.0 { -1.0 } else { 1.0 }))
        .unwrap_or(1.0);

    let release_angle_deg = release_velocity.map(|(vx, vy)| (-vy).atan2(vx * forward_sign).to_degrees());
    let release_speed_mps = release_velocity.map(|(vx, vy)| vx.hypot(vy));

    let release_height_m = release_height(input);
    let release_height_ratio = match (release_height_m, input.athlete_height_m) {
        (Some(h), Some(athlete)) if athlete > 0.0 => Some(h / athlete),
        _ => None,
    };

    let plant_to_release_ms = match (input.events.plant_frame, input.events.release_frame) {
        (Some(p), Some(r)) if r >= p => Some((r - p) as f64 / input.fps * 1000.0),
        _ => None,
    };

    let handedness = input.params.handedness;
    let heading_vec = heading.unwrap_or((forward_sign, 0.0));

    let metrics = MetricSet {
        release_angle_deg,
        release_height_m,
        release_height_ratio,
        release_speed_mps,
        plant_to_release_ms,
        plant_foot_progression_deg: plant_foot_progression(input, heading_vec, handedness),
        shoulder_hip_separation_deg: shoulder_hip_separation(input, handedness),
        lane_alignment_error_cm: lane_alignment(input, handedness),
    };

    debug!(?metrics, "Computed kinematic metrics");
    metrics
}

/// Implement velocity at `frame` in m/s, image axes (y down).
fn implement_velocity(input: &KinematicInput<'_>, frame: usize, half: usize) -> Option<(f64, f64)> {
    let track = input.tracks.implement();
    if frame < half {
        return None;
    }
    let before = track.at(frame - half)?;
    let after = track.at(frame + half)?;
    let dt = (2 * half) as f64 / input.fps;
    Some((
        input.calibration.to_meters(after.x - before.x) / dt,
        input.calibration.to_meters(after.y - before.y) / dt,
    ))
}

fn hip_midpoint(tracks: &SmoothedTracks, frame: usize) -> Option<PixelPoint> {
    let left = tracks.keypoint(KeypointIndex::LeftHip).at(frame)?;
    let right = tracks.keypoint(KeypointIndex::RightHip).at(frame)?;
    Some(left.midpoint(&right))
}

/// Hip-midpoint displacement into plant, normalized. `None` when the hips
/// are missing or did not move.
fn hip_heading(tracks: &SmoothedTracks, plant: usize, lookback: usize) -> Option<(f64, f64)> {
    let start = plant.saturating_sub(lookback);
    let from = (start..plant).find_map(|i| hip_midpoint(tracks, i))?;
    let to = hip_midpoint(tracks, plant)?;
    let (dx, dy) = (to.x - from.x, to.y - from.y);
    let norm = dx.hypot(dy);
    if norm < 1e-6 || dx.abs() < 1e-6 {
        return None;
    }
    Some((dx / norm, dy / norm))
}

fn release_height(input: &KinematicInput<'_>) -> Option<f64> {
    let plant = input.events.plant_frame?;
    let release = input.events.release_frame?;
    let tracks = input.tracks;

    let hand = tracks
        .keypoint(input.params.handedness.throwing_wrist())
        .at(release)
        .or_else(|| tracks.implement().at(release))?;

    let ground_y = [KeypointIndex::LeftAnkle, KeypointIndex::RightAnkle]
        .iter()
        .filter_map(|&kp| tracks.keypoint(kp).at(plant))
        .map(|p| p.y)
        .reduce(f64::max)?;

    let height = input.calibration.to_meters(ground_y - hand.y);
    (height > 0.0).then_some(height)
}

/// Signed angle from `a` to `b` in the upright frame, degrees.
fn signed_angle_deg(a: (f64, f64), b: (f64, f64)) -> f64 {
    let (ax, ay) = (a.0, -a.1);
    let (bx, by) = (b.0, -b.1);
    (ax * by - ay * bx).atan2(ax * bx + ay * by).to_degrees()
}

/// Orientation of the segment `from -> to` in the upright frame, degrees.
fn line_angle_deg(from: PixelPoint, to: PixelPoint) -> f64 {
    (-(to.y - from.y)).atan2(to.x - from.x).to_degrees()
}

/// Wrap into (-180, 180].
pub fn normalize_angle_deg(angle: f64) -> f64 {
    let mut a = angle % 360.0;
    if a <= -180.0 {
        a += 360.0;
    } else if a > 180.0 {
        a -= 360.0;
    }
    a
}

fn plant_foot_progression(
    input: &KinematicInput<'_>,
    heading: (f64, f64),
    handedness: Handedness,
) -> Option<f64> {
    let plant = input.events.plant_frame?;
    let side = handedness.plant_side();
    let heel = input.tracks.get(TrackId::Heel(side)).at(plant)?;
    let toe = input.tracks.get(TrackId::Toe(side)).at(plant)?;
    let foot = (toe.x - heel.x, toe.y - heel.y);
    if foot.0.hypot(foot.1) < 1e-6 {
        return None;
    }
    Some(signed_angle_deg(heading, foot) * handedness.lateral_sign())
}

fn shoulder_hip_separation(input: &KinematicInput<'_>, handedness: Handedness) -> Option<f64> {
    let plant = input.events.plant_frame?;
    let at = |kp: KeypointIndex| input.tracks.keypoint(kp).at(plant);
    let shoulders = line_angle_deg(at(KeypointIndex::LeftShoulder)?, at(KeypointIndex::RightShoulder)?);
    let hips = line_angle_deg(at(KeypointIndex::LeftHip)?, at(KeypointIndex::RightHip)?);
    Some(normalize_angle_deg(shoulders - hips) * handedness.lateral_sign())
}

fn lane_alignment(input: &KinematicInput<'_>, handedness: Handedness) -> Option<f64> {
    if input.params.view != ViewType::Rear {
        return None;
    }
    if input.frame_width == 0 {
        return None;
    }
    let plant = input.events.plant_frame?;
    let start = input.events.penultimate_frame.unwrap_or(plant).min(plant);
    let center_x = input.frame_width as f64 / 2.0;

    let offsets: Vec<f64> = (start..=plant)
        .filter_map(|i| hip_midpoint(input.tracks, i))
        .map(|p| p.x - center_x)
        .collect();
    if offsets.is_empty() {
        return None;
    }
    let mean_px = offsets.iter().sum::<f64>() / offsets.len() as f64;
    Some(input.calibration.to_meters(mean_px) * 100.0 * handedness.lateral_sign())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detection::{FrameDetections, ImplementSighting};
    use crate::smoothing::{smooth_all, SavitzkyGolay};
    use crate::tracks::RawTracks;
    use javelin_models::{Keypoint, Pose, ScaleMethod};

    const EVENTS: EventFrames = EventFrames {
        penultimate_frame: Some(50),
        plant_frame: Some(60),
        release_frame: Some(70),
    };

    /// Standing athlete with hips centered at x = 400; the implement leaves
    /// the right wrist after frame 69. `ankle_confidence` applies to both
    /// ankles on every frame.
    fn tracks(ankle_confidence: f64) -> SmoothedTracks {
        let mut raw = RawTracks::with_capacity(150);
        for i in 0..150 {
            let mut kps = [Keypoint::new(400.0, 400.0, 0.9); KeypointIndex::COUNT];
            kps[KeypointIndex::RightWrist as usize] = Keypoint::new(400.0, 300.0, 0.9);
            for ankle in [KeypointIndex::LeftAnkle, KeypointIndex::RightAnkle] {
                kps[ankle as usize] = Keypoint::new(400.0, 600.0, ankle_confidence);
            }
            let x = if i > 69 { 400.0 + 20.0 * (i - 69) as f64 } else { 400.0 };
            raw.push_frame(&FrameDetections {
                pose: Some(Pose::new(kps)),
                implement: Some(ImplementSighting::new(PixelPoint::new(x, 300.0), 0.0, 150.0, 1.0)),
                ..Default::default()
            });
        }
        let config = AnalysisConfig::default();
        let filter = SavitzkyGolay::from_config(&config).unwrap();
        smooth_all(&raw, &config, &filter)
    }

    fn metrics(tracks: &SmoothedTracks, view: ViewType, frame_width: u32) -> MetricSet {
        let calibration = CalibrationFactor::new(0.01, ScaleMethod::Marker).unwrap();
        let params = ClipParams::new(view, Handedness::Right, ScaleMethod::Marker);
        compute_metrics(
            &KinematicInput {
                tracks,
                events: &EVENTS,
                calibration: &calibration,
                params: &params,
                fps: 30.0,
                frame_width,
                athlete_height_m: Some(1.75),
            },
            &AnalysisConfig::default(),
        )
    }

    #[test]
    fn test_release_height_needs_a_ground_ankle() {
        let grounded = metrics(&tracks(0.9), ViewType::Side, 800);
        assert!((grounded.release_height_m.unwrap() - 3.0).abs() < 1e-9);
        assert!(grounded.release_height_ratio.is_some());

        let floating = metrics(&tracks(0.1), ViewType::Side, 800);
        assert!(floating.release_height_m.is_none());
        assert!(floating.release_height_ratio.is_none());
        assert!(floating.release_speed_mps.is_some());
    }

    #[test]
    fn test_lane_alignment_needs_frame_width() {
        let tracks = tracks(0.9);
        let centered = metrics(&tracks, ViewType::Rear, 800).lane_alignment_error_cm;
        assert!(centered.unwrap().abs() < 1e-9);
        assert!(metrics(&tracks, ViewType::Rear, 0).lane_alignment_error_cm.is_none());
        assert!(metrics(&tracks, ViewType::Side, 800).lane_alignment_error_cm.is_none());
    }

    #[test]
    fn test_normalize_angle() {
        assert_eq!(normalize_angle_deg(180.0), 180.0);
        assert_eq!(normalize_angle_deg(-180.0), 180.0);
        assert_eq!(normalize_angle_deg(190.0), -170.0);
        assert_eq!(normalize_angle_deg(-540.0), 180.0);
        assert_eq!(normalize_angle_deg(45.0), 45.0);
    }

    #[test]
    fn test_signed_angle_upright_frame() {
        // Heading right, foot pointing up-right in the image (y decreasing).
        let angle = signed_angle_deg((1.0, 0.0), (1.0, -1.0));
        assert!((angle - 45.0).abs() < 1e-9);
        let angle = signed_angle_deg((1.0, 0.0), (1.0, 1.0));
        assert!((angle + 45.0).abs() < 1e-9);
    }

    #[test]
    fn test_line_angle() {
        let a = line_angle_deg(PixelPoint::new(0.0, 0.0), PixelPoint::new(10.0, -10.0));
        assert!((a - 45.0).abs() < 1e-9);
    }
}
