//! Clip analysis pipeline.
//!
//! frames -> per-frame detection -> raw tracks -> calibration -> smoothing
//! -> event segmentation -> metrics -> quality control -> result record.
//!
//! Each call owns its tracks and events; only the detector back-ends are
//! shared between concurrent analyses.

use std::time::{Duration, Instant};

use javelin_models::{AnalysisResult, ClipParams, EventFrames, Handedness, MetaInfo};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::calibration::{athlete_height_estimate, calibrate};
use crate::config::AnalysisConfig;
use crate::detection::{detect_frame, FrameObservation, ObservedClip, PoseProvider, PrimitiveProvider};
use crate::error::{MediaError, MediaResult};
use crate::events::segment_events;
use crate::kinematics::{compute_metrics, KinematicInput};
use crate::qc::{score, QcInput};
use crate::smoothing::{fit_r2, smooth_all, SavitzkyGolay, SmoothedTracks};
use crate::tracks::RawTracks;

/// Decoder-reported clip metadata. fps is taken as given, never re-derived.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ClipMeta {
    pub fps: f64,
    pub frame_count: usize,
    pub width: u32,
    pub height: u32,
}

/// Wall-clock ceiling for one clip.
#[derive(Debug, Clone, Copy)]
pub struct Deadline {
    at: Instant,
    budget: Duration,
}

impl Deadline {
    pub fn after(budget: Duration) -> Self {
        Self {
            at: Instant::now() + budget,
            budget,
        }
    }

    pub fn check(&self) -> MediaResult<()> {
        if Instant::now() >= self.at {
            return Err(MediaError::Timeout(self.budget.as_secs()));
        }
        Ok(())
    }
}

/// Runs the full analysis for one clip at a time; cheap to share.
#[derive(Debug, Clone)]
pub struct MotionAnalyzer {
    config: AnalysisConfig,
    filter: SavitzkyGolay,
}

impl MotionAnalyzer {
    pub fn new(config: AnalysisConfig) -> MediaResult<Self> {
        config.validate().map_err(MediaError::InvalidConfig)?;
        let filter = SavitzkyGolay::from_config(&config)?;
        Ok(Self { config, filter })
    }

    pub fn config(&self) -> &AnalysisConfig {
        &self.config
    }

    /// Reject clips that cannot be analyzed before any per-frame work.
    pub fn validate_meta(&self, meta: &ClipMeta) -> MediaResult<()> {
        if !meta.fps.is_finite() || meta.fps < self.config.min_fps {
            return Err(MediaError::LowFrameRate {
                fps: meta.fps,
                min: self.config.min_fps,
            });
        }
        if meta.frame_count < self.config.smoothing_window {
            return Err(MediaError::InsufficientFrames {
                frames: meta.frame_count,
                required: self.config.smoothing_window,
            });
        }
        Ok(())
    }

    /// Run both detectors over every frame.
    pub fn collect_tracks<F, I>(
        &self,
        frames: I,
        capacity: usize,
        pose_provider: &dyn PoseProvider<F>,
        primitive_provider: &dyn PrimitiveProvider<F>,
        deadline: Option<&Deadline>,
    ) -> MediaResult<RawTracks>
    where
        I: IntoIterator<Item = MediaResult<F>>,
    {
        let mut raw = RawTracks::with_capacity(capacity);
        for (index, frame) in frames.into_iter().enumerate() {
            if let Some(deadline) = deadline {
                deadline.check()?;
            }
            let frame = frame?;
            let detections = detect_frame(&frame, index, pose_provider, primitive_provider);
            raw.push_frame(&detections);
        }

        debug!(
            frames = raw.frame_count(),
            poses = raw.poses_detected(),
            pose_failures = raw.pose_failures,
            implement = raw.implement().detected_count(),
            pose_provider = pose_provider.name(),
            primitive_provider = primitive_provider.name(),
            "Collected raw tracks"
        );
        Ok(raw)
    }

    /// Analyze a clip from its frames.
    pub fn analyze<F, I>(
        &self,
        meta: ClipMeta,
        frames: I,
        params: &ClipParams,
        pose_provider: &dyn PoseProvider<F>,
        primitive_provider: &dyn PrimitiveProvider<F>,
        deadline: Option<&Deadline>,
    ) -> MediaResult<AnalysisResult>
    where
        I: IntoIterator<Item = MediaResult<F>>,
    {
        params.validate().map_err(MediaError::InvalidConfig)?;
        self.validate_meta(&meta)?;
        let raw = self.collect_tracks(
            frames,
            meta.frame_count,
            pose_provider,
            primitive_provider,
            deadline,
        )?;
        self.analyze_tracks(&meta, &raw, params)
    }

    /// Analyze pre-extracted observations.
    pub fn analyze_observed(
        &self,
        clip: &ObservedClip,
        params: &ClipParams,
        deadline: Option<&Deadline>,
    ) -> MediaResult<AnalysisResult> {
        let provider = crate::detection::ObservedProvider;
        self.analyze(
            clip.meta,
            clip.frames.iter().cloned().map(Ok::<FrameObservation, MediaError>),
            params,
            &provider,
            &provider,
            deadline,
        )
    }

    /// Everything after per-frame detection.
    pub fn analyze_tracks(
        &self,
        meta: &ClipMeta,
        raw: &RawTracks,
        params: &ClipParams,
    ) -> MediaResult<AnalysisResult> {
        let config = &self.config;
        let frames = raw.frame_count();
        if frames < config.smoothing_window {
            return Err(MediaError::InsufficientFrames {
                frames,
                required: config.smoothing_window,
            });
        }

        let mut meta_info = MetaInfo::new(meta.fps, frames, meta.width, meta.height, params);

        if raw.poses_detected() == 0 {
            warn!(frames, pose_failures = raw.pose_failures, "No pose detected in any frame");
            let events = EventFrames::default();
            let mut qc = score(
                &QcInput {
                    raw,
                    events: &events,
                    release_fit_r2: None,
                    handedness: params.handedness,
                    discarded_plant_candidates: 0,
                },
                config,
            );
            qc.notes.insert(0, "No pose detected in any frame".to_string());
            return Ok(AnalysisResult::new(meta_info, events, Default::default(), qc));
        }

        if config.require_implement && raw.implement().detected_count() == 0 {
            return Err(MediaError::NoObject);
        }

        let calibration = calibrate(raw, params, config)?;
        meta_info.m_per_px = Some(calibration.meters_per_pixel());

        let tracks = smooth_all(raw, config, &self.filter);
        let segmentation = segment_events(
            &tracks,
            params.handedness,
            meta.fps,
            &calibration,
            config,
        );
        let events = segmentation.events;

        let release_fit_r2 = events
            .release_frame
            .and_then(|r| release_fit_r2(&tracks, r, params.handedness, self.filter.window()));

        let metrics = compute_metrics(
            &KinematicInput {
                tracks: &tracks,
                events: &events,
                calibration: &calibration,
                params,
                fps: meta.fps,
                frame_width: meta.width,
                athlete_height_m: athlete_height_estimate(params, config),
            },
            config,
        );

        let qc = score(
            &QcInput {
                raw,
                events: &events,
                release_fit_r2,
                handedness: params.handedness,
                discarded_plant_candidates: segmentation.discarded_plant_candidates,
            },
            config,
        );

        info!(
            frames,
            m_per_px = calibration.meters_per_pixel(),
            penultimate = ?events.penultimate_frame,
            plant = ?events.plant_frame,
            release = ?events.release_frame,
            status = %qc.overall_status,
            "Clip analyzed"
        );

        Ok(AnalysisResult::new(meta_info, events, metrics, qc))
    }
}

/// Release fit quality on the implement track, falling back to the
/// throwing wrist when the implement has fewer than three raw samples near
/// release.
pub fn release_fit_r2(
    tracks: &SmoothedTracks,
    release: usize,
    handedness: Handedness,
    window: usize,
) -> Option<f64> {
    let implement = tracks.implement();
    if implement.raw_samples_near(release, window) >= 3 {
        return fit_r2(implement, release, window);
    }
    debug!(release, "Implement too sparse near release, scoring throwing wrist");
    fit_r2(tracks.keypoint(handedness.throwing_wrist()), release, window)
}
