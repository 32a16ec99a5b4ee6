//! Quality-control verdict.
//!
//! The verdict combines two signals, the smoother's release fit R² and the
//! share of trusted event-joint samples around the events. Every signal is
//! reported alongside the verdict together with human-readable notes.

use javelin_models::{EventFrames, Handedness, KeypointIndex, QcStatus, QualityControl};
use tracing::debug;

use crate::config::AnalysisConfig;
use crate::tracks::RawTracks;

/// Inputs to the QC scorer.
pub struct QcInput<'a> {
    pub raw: &'a RawTracks,
    pub events: &'a EventFrames,
    pub release_fit_r2: Option<f64>,
    pub handedness: Handedness,
    pub discarded_plant_candidates: usize,
}

/// Tiered verdict. A missing signal is below every tier.
pub fn verdict(
    release_fit_r2: Option<f64>,
    visibility: Option<f64>,
    config: &AnalysisConfig,
) -> QcStatus {
    let (Some(r2), Some(visibility)) = (release_fit_r2, visibility) else {
        return QcStatus::Fail;
    };
    if r2 >= config.qc_good_r2 && visibility >= config.qc_good_visibility {
        QcStatus::Good
    } else if r2 >= config.qc_warn_r2 && visibility >= config.qc_warn_visibility {
        QcStatus::Warn
    } else {
        QcStatus::Fail
    }
}

/// Joints whose visibility gates the verdict.
fn event_joints(handedness: Handedness) -> [KeypointIndex; 7] {
    [
        KeypointIndex::LeftAnkle,
        KeypointIndex::RightAnkle,
        KeypointIndex::LeftHip,
        KeypointIndex::RightHip,
        KeypointIndex::LeftShoulder,
        KeypointIndex::RightShoulder,
        handedness.throwing_wrist(),
    ]
}

/// Frames `[first event - margin, last event + margin]`, or the whole clip
/// when no event was found.
pub fn event_window(events: &EventFrames, margin: usize, frames: usize) -> std::ops::Range<usize> {
    let present: Vec<usize> = [events.penultimate_frame, events.plant_frame, events.release_frame]
        .into_iter()
        .flatten()
        .collect();
    match (present.iter().min(), present.iter().max()) {
        (Some(&first), Some(&last)) => first.saturating_sub(margin)..(last + margin + 1).min(frames),
        _ => 0..frames,
    }
}

/// Trusted and total (frame, event joint) samples in the event window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct WindowSamples {
    pub trusted: usize,
    pub total: usize,
}

impl WindowSamples {
    pub fn untrusted(&self) -> usize {
        self.total - self.trusted
    }

    /// Trusted share; `None` for an empty window.
    pub fn visibility(&self) -> Option<f64> {
        (self.total > 0).then(|| self.trusted as f64 / self.total as f64)
    }
}

/// Count event-joint samples at or above the pose threshold.
pub fn window_samples(
    raw: &RawTracks,
    events: &EventFrames,
    handedness: Handedness,
    config: &AnalysisConfig,
) -> WindowSamples {
    let window = event_window(events, config.smoothing_window, raw.frame_count());
    let joints = event_joints(handedness);
    let total = window.len() * joints.len();
    let trusted = window
        .flat_map(|i| joints.iter().map(move |&kp| (i, kp)))
        .filter(|&(i, kp)| raw.keypoint(kp).get(i).trusted(config.pose_confidence_threshold).is_some())
        .count();
    WindowSamples { trusted, total }
}

/// Score a clip.
pub fn score(input: &QcInput<'_>, config: &AnalysisConfig) -> QualityControl {
    let raw = input.raw;
    let frames = raw.frame_count();
    let samples = window_samples(raw, input.events, input.handedness, config);
    let visibility = samples.visibility();
    let pose_confidence = raw.mean_pose_confidence();
    let status = verdict(input.release_fit_r2, visibility, config);

    let mut notes = Vec::new();

    match input.release_fit_r2 {
        None => notes.push("Release fit R² unavailable".to_string()),
        Some(r2) if r2 < config.qc_warn_r2 => {
            notes.push(format!("Release fit R² {r2:.3} below {:.2}", config.qc_warn_r2))
        }
        _ => {}
    }
    match visibility {
        None => notes.push("Joint visibility unavailable".to_string()),
        Some(v) if v < config.qc_good_visibility => {
            notes.push(format!("Low joint visibility in event window ({v:.2})"))
        }
        _ => {}
    }
    if samples.untrusted() > 0 {
        notes.push(format!(
            "{} low-confidence joint samples in event window",
            samples.untrusted()
        ));
    }
    if let Some(c) = pose_confidence.filter(|c| *c < config.pose_confidence_threshold) {
        notes.push(format!("Low mean pose confidence ({c:.2})"));
    }
    if input.events.penultimate_frame.is_none() {
        notes.push("Penultimate contact not detected".to_string());
    }
    if input.events.plant_frame.is_none() {
        notes.push("Plant not detected".to_string());
    }
    if input.events.release_frame.is_none() {
        notes.push("Release not detected".to_string());
    }
    if input.discarded_plant_candidates > 0 {
        notes.push(format!(
            "Discarded {} plant candidate(s) before penultimate contact",
            input.discarded_plant_candidates
        ));
    }
    if raw.pose_failures > 0 {
        notes.push(format!(
            "Pose detector failed on {} of {frames} frames",
            raw.pose_failures
        ));
    }
    let missing = frames.saturating_sub(raw.poses_detected());
    if missing > 0 {
        notes.push(format!("No pose in {missing} of {frames} frames"));
    }

    debug!(
        status = %status,
        r2 = ?input.release_fit_r2,
        visibility = ?visibility,
        pose_confidence = ?pose_confidence,
        "QC scored"
    );

    QualityControl {
        overall_status: status,
        release_fit_r2: input.release_fit_r2,
        joint_visibility: visibility,
        pose_confidence,
        notes,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detection::FrameDetections;
    use javelin_models::{Keypoint, Pose};

    #[test]
    fn test_verdict_boundaries() {
        let config = AnalysisConfig::default();
        assert_eq!(verdict(Some(0.9), Some(0.8), &config), QcStatus::Good);
        assert_eq!(verdict(Some(0.89), Some(0.8), &config), QcStatus::Warn);
        assert_eq!(verdict(Some(0.9), Some(0.79), &config), QcStatus::Warn);
        assert_eq!(verdict(Some(0.75), Some(0.6), &config), QcStatus::Warn);
        assert_eq!(verdict(Some(0.74), Some(0.9), &config), QcStatus::Fail);
        assert_eq!(verdict(Some(0.95), Some(0.59), &config), QcStatus::Fail);
        assert_eq!(verdict(None, Some(1.0), &config), QcStatus::Fail);
        assert_eq!(verdict(Some(0.99), None, &config), QcStatus::Fail);
    }

    #[test]
    fn test_event_window() {
        let events = EventFrames {
            penultimate_frame: Some(50),
            plant_frame: Some(60),
            release_frame: Some(70),
        };
        assert_eq!(event_window(&events, 7, 150), 43..78);
        assert_eq!(event_window(&EventFrames::default(), 7, 150), 0..150);
        let edge = EventFrames {
            release_frame: Some(2),
            ..Default::default()
        };
        assert_eq!(event_window(&edge, 7, 5), 0..5);
    }

    #[test]
    fn test_visibility_counts_low_confidence_joints() {
        let mut raw = RawTracks::with_capacity(10);
        for i in 0..10 {
            let mut kps = [Keypoint::new(0.0, 0.0, 0.9); KeypointIndex::COUNT];
            if i % 2 == 0 {
                kps[KeypointIndex::RightWrist as usize].confidence = 0.1;
            }
            raw.push_frame(&FrameDetections {
                pose: Some(Pose::new(kps)),
                ..Default::default()
            });
        }
        let samples = window_samples(
            &raw,
            &EventFrames::default(),
            Handedness::Right,
            &AnalysisConfig::default(),
        );
        assert_eq!(samples.untrusted(), 5);
        assert!((samples.visibility().unwrap() - 65.0 / 70.0).abs() < 1e-12);
        assert_eq!(WindowSamples::default().visibility(), None);
    }

    #[test]
    fn test_single_untrusted_sample_is_noted() {
        let events = EventFrames {
            penultimate_frame: Some(50),
            plant_frame: Some(60),
            release_frame: Some(70),
        };
        let mut raw = RawTracks::with_capacity(150);
        for i in 0..150 {
            let mut pose = Pose::new([Keypoint::new(0.0, 0.0, 0.9); KeypointIndex::COUNT]);
            if i == 62 {
                pose.keypoints[KeypointIndex::RightWrist as usize].confidence = 0.2;
            }
            raw.push_frame(&FrameDetections {
                pose: Some(pose),
                ..Default::default()
            });
        }

        let qc = score(
            &QcInput {
                raw: &raw,
                events: &events,
                release_fit_r2: Some(0.99),
                handedness: Handedness::Right,
                discarded_plant_candidates: 0,
            },
            &AnalysisConfig::default(),
        );
        // Above the GOOD tier, still reported.
        assert_eq!(qc.overall_status, QcStatus::Good);
        assert!(qc.joint_visibility.unwrap() > 0.99);
        assert!(qc
            .notes
            .iter()
            .any(|n| n == "1 low-confidence joint samples in event window"));
    }

    #[test]
    fn test_clean_window_has_no_sample_note() {
        let mut raw = RawTracks::with_capacity(150);
        for _ in 0..150 {
            raw.push_frame(&FrameDetections {
                pose: Some(Pose::new([Keypoint::new(0.0, 0.0, 0.9); KeypointIndex::COUNT])),
                ..Default::default()
            });
        }
        let events = EventFrames {
            penultimate_frame: Some(50),
            plant_frame: Some(60),
            release_frame: Some(70),
        };
        let qc = score(
            &QcInput {
                raw: &raw,
                events: &events,
                release_fit_r2: Some(0.99),
                handedness: Handedness::Right,
                discarded_plant_candidates: 0,
            },
            &AnalysisConfig::default(),
        );
        assert_eq!(qc.joint_visibility, Some(1.0));
        assert!(qc.notes.is_empty(), "{:?}", qc.notes);
    }

    #[test]
    fn test_notes_explain_missing_pieces() {
        let mut raw = RawTracks::with_capacity(3);
        raw.push_frame(&FrameDetections {
            pose_failed: true,
            ..Default::default()
        });
        raw.push_frame(&FrameDetections::default());
        raw.push_frame(&FrameDetections::default());
        let qc = score(
            &QcInput {
                raw: &raw,
                events: &EventFrames::default(),
                release_fit_r2: None,
                handedness: Handedness::Right,
                discarded_plant_candidates: 2,
            },
            &AnalysisConfig::default(),
        );
        assert_eq!(qc.overall_status, QcStatus::Fail);
        assert_eq!(qc.joint_visibility, Some(0.0));
        assert_eq!(qc.pose_confidence, None);
        assert!(qc.notes.iter().any(|n| n.starts_with("21 low-confidence")));
        assert!(qc.notes.iter().any(|n| n.contains("R² unavailable")));
        assert!(qc.notes.iter().any(|n| n == "Release not detected"));
        assert!(qc.notes.iter().any(|n| n.contains("Discarded 2")));
        assert!(qc.notes.iter().any(|n| n.contains("failed on 1 of 3")));
        assert!(qc.notes.iter().any(|n| n.contains("No pose in 3 of 3")));
    }
}
