//! Delivery-stride event segmentation.
//!
//! A single forward scan drives a small state machine:
//!
//! ```text
//! SearchingPenultimate -> SearchingPlant -> SearchingRelease -> Done
//! ```
//!
//! Foot contact is the frame where the foot's vertical speed drops below the
//! contact threshold (previous frame at or above, current below). Release is
//! the first frame at or after plant where the implement has moved away from
//! the throwing hand. When a transition is never satisfied the remaining
//! events stay `None`.

use javelin_models::{EventFrames, Handedness};
use tracing::debug;

use crate::calibration::CalibrationFactor;
use crate::config::AnalysisConfig;
use crate::smoothing::{SmoothedTrack, SmoothedTracks};

/// Vertical speed per frame in m/s by central difference.
///
/// `None` at the clip ends and wherever a neighbor is missing.
pub fn vertical_speed(
    track: &SmoothedTrack,
    fps: f64,
    calibration: &CalibrationFactor,
) -> Vec<Option<f64>> {
    let n = track.len();
    (0..n)
        .map(|i| {
            if i == 0 || i + 1 >= n {
                return None;
            }
            let prev = track.at(i - 1)?;
            let next = track.at(i + 1)?;
            Some(calibration.to_meters((next.y - prev.y).abs() / 2.0) * fps)
        })
        .collect()
}

/// Whether frame `i` is a ground contact on a speed series.
fn is_contact(speed: &[Option<f64>], i: usize, threshold: f64) -> bool {
    if i == 0 {
        return false;
    }
    match (speed.get(i - 1).copied().flatten(), speed.get(i).copied().flatten()) {
        (Some(prev), Some(curr)) => prev >= threshold && curr < threshold,
        _ => false,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SegmenterState {
    SearchingPenultimate,
    SearchingPlant { penultimate: usize },
    SearchingRelease { penultimate: usize, plant: usize },
    Done {
        penultimate: Option<usize>,
        plant: Option<usize>,
        release: Option<usize>,
    },
}

/// Segmentation output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Segmentation {
    pub events: EventFrames,
    /// Plant-foot contacts seen before the penultimate contact.
    pub discarded_plant_candidates: usize,
}

/// Inputs the scan reads on every frame.
struct ScanSignals<'a> {
    trailing_speed: Vec<Option<f64>>,
    plant_speed: Vec<Option<f64>>,
    implement: &'a SmoothedTrack,
    wrist: &'a SmoothedTrack,
    calibration: &'a CalibrationFactor,
    contact_threshold: f64,
    release_threshold: f64,
}

impl ScanSignals<'_> {
    fn trailing_contact(&self, i: usize) -> bool {
        is_contact(&self.trailing_speed, i, self.contact_threshold)
    }

    fn plant_contact(&self, i: usize) -> bool {
        is_contact(&self.plant_speed, i, self.contact_threshold)
    }

    fn released(&self, i: usize) -> bool {
        match (self.implement.at(i), self.wrist.at(i)) {
            (Some(imp), Some(wrist)) => {
                self.calibration.to_meters(imp.distance(&wrist)) > self.release_threshold
            }
            _ => false,
        }
    }
}

/// Detect penultimate contact, plant and release.
pub fn segment_events(
    tracks: &SmoothedTracks,
    handedness: Handedness,
    fps: f64,
    calibration: &CalibrationFactor,
    config: &AnalysisConfig,
) -> Segmentation {
    let signals = ScanSignals {
        trailing_speed: vertical_speed(tracks.keypoint(handedness.trailing_ankle()), fps, calibration),
        plant_speed: vertical_speed(tracks.keypoint(handedness.plant_ankle()), fps, calibration),
        implement: tracks.implement(),
        wrist: tracks.keypoint(handedness.throwing_wrist()),
        calibration,
        contact_threshold: config.contact_velocity_threshold,
        release_threshold: config.release_distance_threshold,
    };
    let n = signals.trailing_speed.len();

    let mut state = SegmenterState::SearchingPenultimate;
    let mut early_candidates: Vec<usize> = Vec::new();
    let mut discarded = 0usize;

    for i in 0..n {
        // Several transitions may fire on the same frame.
        loop {
            let next = match state {
                SegmenterState::SearchingPenultimate => {
                    if signals.trailing_contact(i) {
                        debug!(frame = i, "Penultimate contact");
                        discarded += early_candidates.len();
                        SegmenterState::SearchingPlant { penultimate: i }
                    } else {
                        if signals.plant_contact(i) {
                            early_candidates.push(i);
                        }
                        state
                    }
                }
                SegmenterState::SearchingPlant { penultimate } => {
                    if signals.plant_contact(i) && i >= penultimate {
                        debug!(frame = i, "Plant contact");
                        SegmenterState::SearchingRelease {
                            penultimate,
                            plant: i,
                        }
                    } else {
                        state
                    }
                }
                SegmenterState::SearchingRelease { penultimate, plant } => {
                    if signals.released(i) {
                        debug!(frame = i, "Release");
                        SegmenterState::Done {
                            penultimate: Some(penultimate),
                            plant: Some(plant),
                            release: Some(i),
                        }
                    } else {
                        state
                    }
                }
                SegmenterState::Done { .. } => state,
            };
            if next == state {
                break;
            }
            state = next;
        }
        if matches!(state, SegmenterState::Done { .. }) {
            break;
        }
    }

    let events = match state {
        SegmenterState::SearchingPenultimate => EventFrames::default(),
        SegmenterState::SearchingPlant { penultimate } => EventFrames {
            penultimate_frame: Some(penultimate),
            ..Default::default()
        },
        SegmenterState::SearchingRelease { penultimate, plant } => EventFrames {
            penultimate_frame: Some(penultimate),
            plant_frame: Some(plant),
            release_frame: None,
        },
        SegmenterState::Done {
            penultimate,
            plant,
            release,
        } => EventFrames {
            penultimate_frame: penultimate,
            plant_frame: plant,
            release_frame: release,
        },
    };

    if discarded > 0 {
        debug!(discarded, "Discarded plant candidates before penultimate contact");
    }

    Segmentation {
        events,
        discarded_plant_candidates: discarded,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detection::{FrameDetections, ImplementSighting};
    use crate::smoothing::{smooth_all, SavitzkyGolay};
    use crate::tracks::{PixelPoint, RawTracks};
    use javelin_models::{Keypoint, KeypointIndex, Pose, ScaleMethod};
    use std::f64::consts::PI;

    const FPS: f64 = 30.0;

    fn foot_y(frame: usize, contact: f64) -> f64 {
        500.0 + 100.0 * (2.0 * PI / 120.0 * (frame as f64 - contact)).cos()
    }

    /// Right-handed stride: trailing (right) foot lands at `trailing`, plant
    /// (left) foot at `plant`, implement leaves the wrist after `release`.
    fn stride(frames: usize, trailing: f64, plant: f64, release: usize) -> SmoothedTracks {
        let mut raw = RawTracks::with_capacity(frames);
        for i in 0..frames {
            let mut kps = [Keypoint::new(400.0, 300.0, 0.9); KeypointIndex::COUNT];
            kps[KeypointIndex::RightAnkle as usize] = Keypoint::new(380.0, foot_y(i, trailing), 0.9);
            kps[KeypointIndex::LeftAnkle as usize] = Keypoint::new(420.0, foot_y(i, plant), 0.9);
            let x = if i > release {
                400.0 + 20.0 * (i - release) as f64
            } else {
                400.0
            };
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

    fn calibration() -> CalibrationFactor {
        CalibrationFactor::new(0.01, ScaleMethod::Marker).unwrap()
    }

    #[test]
    fn test_full_stride() {
        let tracks = stride(150, 50.0, 60.0, 69);
        let seg = segment_events(
            &tracks,
            Handedness::Right,
            FPS,
            &calibration(),
            &AnalysisConfig::default(),
        );
        assert_eq!(seg.events.penultimate_frame, Some(50));
        assert_eq!(seg.events.plant_frame, Some(60));
        assert_eq!(seg.events.release_frame, Some(70));
        assert_eq!(seg.discarded_plant_candidates, 0);
    }

    #[test]
    fn test_early_plant_candidate_discarded() {
        let tracks = stride(150, 50.0, 30.0, 69);
        let seg = segment_events(
            &tracks,
            Handedness::Right,
            FPS,
            &calibration(),
            &AnalysisConfig::default(),
        );
        assert_eq!(seg.events.penultimate_frame, Some(50));
        assert_eq!(seg.events.plant_frame, Some(90));
        assert_eq!(seg.events.release_frame, Some(90));
        assert_eq!(seg.discarded_plant_candidates, 1);
        assert!(seg.events.is_ordered());
    }

    #[test]
    fn test_no_release_leaves_none() {
        let tracks = stride(150, 50.0, 60.0, 1000);
        let seg = segment_events(
            &tracks,
            Handedness::Right,
            FPS,
            &calibration(),
            &AnalysisConfig::default(),
        );
        assert_eq!(seg.events.plant_frame, Some(60));
        assert!(seg.events.release_frame.is_none());
    }

    #[test]
    fn test_mirrored_handedness_swaps_feet() {
        // For a left-handed thrower the left ankle trails.
        let tracks = stride(150, 60.0, 50.0, 69);
        let seg = segment_events(
            &tracks,
            Handedness::Left,
            FPS,
            &calibration(),
            &AnalysisConfig::default(),
        );
        assert_eq!(seg.events.penultimate_frame, Some(50));
        assert_eq!(seg.events.plant_frame, Some(60));
        // Left wrist sits at the same spot as the right one here.
        assert_eq!(seg.events.release_frame, Some(70));
    }

    #[test]
    fn test_vertical_speed_edges() {
        let tracks = stride(20, 5.0, 10.0, 100);
        let speed = vertical_speed(tracks.keypoint(KeypointIndex::RightAnkle), FPS, &calibration());
        assert!(speed[0].is_none());
        assert!(speed[19].is_none());
        assert!(speed[5].unwrap() < 1e-9);
    }
}
