//! Clip executor.
//!
//! Each clip runs on the blocking pool under a concurrency permit and a
//! wall-clock ceiling. Clip-level problems come back as well-formed FAIL
//! results; only environment failures surface as errors.

use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Instant;

use javelin_media::{probe_video, Deadline, MediaError, MediaResult, MotionAnalyzer, ObservedClip};
use javelin_models::{AnalysisResult, ClipParams, MetaInfo};
use tokio::sync::Semaphore;
use tracing::{debug, info, warn, Instrument};
use uuid::Uuid;

use crate::config::WorkerConfig;
use crate::error::{WorkerError, WorkerResult};
use crate::input::{validate_input, ClipJob, ClipSource};
use crate::logging::ClipLogger;
use crate::metrics;

#[cfg(feature = "video")]
pub use video::VideoBackends;

/// Outcome of one submitted clip.
#[derive(Debug)]
pub struct ClipReport {
    pub id: Uuid,
    pub source: PathBuf,
    pub result: WorkerResult<AnalysisResult>,
    /// Where the result document was written, if an output directory is set
    pub output: Option<PathBuf>,
}

type BlockingOutcome = (MetaInfo, MediaResult<AnalysisResult>);

/// Runs clips concurrently up to `max_concurrent_clips`. Cheap to clone.
#[derive(Clone)]
pub struct ClipExecutor {
    config: WorkerConfig,
    analyzer: Arc<MotionAnalyzer>,
    clip_semaphore: Arc<Semaphore>,
    in_flight: Arc<AtomicUsize>,
    #[cfg(feature = "video")]
    video: Option<Arc<VideoBackends>>,
}

impl ClipExecutor {
    /// Create a new clip executor.
    pub fn new(config: WorkerConfig) -> WorkerResult<Self> {
        let analysis = config.load_analysis_config()?;
        let analyzer = MotionAnalyzer::new(analysis)?;
        Ok(Self::with_analyzer(config, analyzer))
    }

    pub fn with_analyzer(config: WorkerConfig, analyzer: MotionAnalyzer) -> Self {
        let clip_semaphore = Arc::new(Semaphore::new(config.max_concurrent_clips.max(1)));
        Self {
            config,
            analyzer: Arc::new(analyzer),
            clip_semaphore,
            in_flight: Arc::new(AtomicUsize::new(0)),
            #[cfg(feature = "video")]
            video: None,
        }
    }

    /// Attach the in-process video detectors.
    #[cfg(feature = "video")]
    pub fn with_video_backends(mut self, backends: VideoBackends) -> Self {
        self.video = Some(Arc::new(backends));
        self
    }

    pub fn config(&self) -> &WorkerConfig {
        &self.config
    }

    pub fn analyzer(&self) -> &MotionAnalyzer {
        &self.analyzer
    }

    /// Run every job, at most `max_concurrent_clips` at a time. Reports come
    /// back in submission order.
    pub async fn run_all(&self, jobs: Vec<ClipJob>) -> Vec<ClipReport> {
        info!(
            clips = jobs.len(),
            max_concurrent = self.config.max_concurrent_clips,
            "Starting clip executor"
        );

        let handles: Vec<_> = jobs
            .into_iter()
            .map(|job| {
                let executor = self.clone();
                let id = job.id;
                let source = job.source.path().to_path_buf();
                let handle = tokio::spawn(async move { executor.run(job).await });
                (id, source, handle)
            })
            .collect();

        let mut reports = Vec::with_capacity(handles.len());
        for (id, source, handle) in handles {
            let report = handle.await.unwrap_or_else(|e| ClipReport {
                id,
                source,
                result: Err(WorkerError::task_failed(e.to_string())),
                output: None,
            });
            reports.push(report);
        }
        reports
    }

    /// Run one clip under a concurrency permit and persist its result.
    pub async fn run(&self, job: ClipJob) -> ClipReport {
        let logger = ClipLogger::new(job.id, job.source.operation());
        let span = logger.span();
        let source = job.source.path().to_path_buf();
        let id = job.id;

        let result = async {
            let _permit = self
                .clip_semaphore
                .clone()
                .acquire_owned()
                .await
                .map_err(|_| WorkerError::task_failed("Semaphore closed"))?;

            let in_flight = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            metrics::set_clips_in_flight(in_flight);

            let result = self.analyze(&job, &logger).await;

            let in_flight = self.in_flight.fetch_sub(1, Ordering::SeqCst) - 1;
            metrics::set_clips_in_flight(in_flight);
            result
        }
        .instrument(span)
        .await;

        let output = match &result {
            Ok(analysis) => match self.persist(&job, analysis).await {
                Ok(path) => path,
                Err(e) => {
                    logger.failed(&format_args!("failed to write result: {e}"));
                    return ClipReport {
                        id,
                        source,
                        result: Err(e),
                        output: None,
                    };
                }
            },
            Err(_) => None,
        };

        ClipReport {
            id,
            source,
            result,
            output,
        }
    }

    async fn analyze(&self, job: &ClipJob, logger: &ClipLogger) -> WorkerResult<AnalysisResult> {
        logger.started(job.source.path());
        let started = Instant::now();
        let fallback_meta = MetaInfo::unknown(&job.params);

        if let Err(e) = validate_input(job, &self.config) {
            return self.settle(logger, fallback_meta, Err(e), started);
        }

        let timeout = self.config.clip_timeout;
        let deadline = Deadline::after(timeout);
        let task = match &job.source {
            ClipSource::Observed(path) => {
                let analyzer = Arc::clone(&self.analyzer);
                let path = path.clone();
                let params = job.params;
                tokio::task::spawn_blocking(move || -> BlockingOutcome {
                    let clip = match ObservedClip::load(&path) {
                        Ok(clip) => clip,
                        Err(e) => return (MetaInfo::unknown(&params), Err(e)),
                    };
                    let meta = meta_info(&clip, &params);
                    (meta, analyzer.analyze_observed(&clip, &params, Some(&deadline)))
                })
            }
            ClipSource::Video(path) => {
                if let Err(e) = self.preflight_video(path).await {
                    return self.settle(logger, fallback_meta, Err(e), started);
                }
                match self.spawn_video(path.clone(), job.params, deadline) {
                    Ok(task) => task,
                    Err(e) => return self.settle(logger, fallback_meta, Err(e), started),
                }
            }
        };

        let outcome = match tokio::time::timeout(timeout, task).await {
            Err(_) => Err(WorkerError::Media(MediaError::Timeout(timeout.as_secs()))),
            Ok(Err(join_error)) => Err(WorkerError::task_failed(join_error.to_string())),
            Ok(Ok((meta, result))) => {
                return self.settle(logger, meta, result.map_err(WorkerError::from), started)
            }
        };
        self.settle(logger, fallback_meta, outcome, started)
    }

    /// Turn an analysis outcome into the caller-facing result.
    fn settle(
        &self,
        logger: &ClipLogger,
        meta: MetaInfo,
        outcome: WorkerResult<AnalysisResult>,
        started: Instant,
    ) -> WorkerResult<AnalysisResult> {
        match outcome {
            Ok(result) => {
                metrics::record_clip_analyzed(result.status(), started.elapsed().as_secs_f64());
                logger.finished(result.status(), started.elapsed());
                Ok(result)
            }
            Err(WorkerError::Media(MediaError::Timeout(secs))) => {
                metrics::record_clip_timeout();
                logger.timed_out(secs);
                Ok(AnalysisResult::failure(
                    meta,
                    format!("Analysis exceeded {secs}s time limit"),
                ))
            }
            Err(e) if e.is_input_error() => {
                let reason = e.reason();
                metrics::record_clip_rejected(&reason);
                logger.rejected(&reason);
                Ok(AnalysisResult::failure(meta, reason))
            }
            Err(e) => {
                metrics::record_clip_error();
                logger.failed(&e);
                Err(e)
            }
        }
    }

    /// Reject unreadable or out-of-range video before decoding. A missing
    /// ffprobe only skips the check.
    async fn preflight_video(&self, path: &std::path::Path) -> WorkerResult<()> {
        match probe_video(path).await {
            Ok(info) => {
                debug!(
                    fps = info.meta.fps,
                    frames = info.meta.frame_count,
                    codec = ?info.codec,
                    "Probed video"
                );
                self.analyzer.validate_meta(&info.meta)?;
                Ok(())
            }
            Err(MediaError::FfprobeNotFound) => {
                warn!("ffprobe not found, skipping preflight");
                Ok(())
            }
            Err(MediaError::FfprobeFailed { stderr, .. }) => Err(WorkerError::Media(
                MediaError::InvalidVideo(stderr.unwrap_or_else(|| "ffprobe failed".to_string())),
            )),
            Err(e) => Err(e.into()),
        }
    }

    #[cfg(feature = "video")]
    fn spawn_video(
        &self,
        path: PathBuf,
        params: ClipParams,
        deadline: Deadline,
    ) -> WorkerResult<tokio::task::JoinHandle<BlockingOutcome>> {
        let backends = self
            .video
            .clone()
            .ok_or_else(|| WorkerError::config_error("Video backends not loaded"))?;
        let analyzer = Arc::clone(&self.analyzer);
        Ok(tokio::task::spawn_blocking(move || -> BlockingOutcome {
            let (clip_meta, frames) = match javelin_media::open_video(&path) {
                Ok(opened) => opened,
                Err(e) => return (MetaInfo::unknown(&params), Err(e)),
            };
            let meta = MetaInfo::new(
                clip_meta.fps,
                clip_meta.frame_count,
                clip_meta.width,
                clip_meta.height,
                &params,
            );
            let result = analyzer.analyze(
                clip_meta,
                frames,
                &params,
                &backends.pose,
                &backends.primitives,
                Some(&deadline),
            );
            (meta, result)
        }))
    }

    #[cfg(not(feature = "video"))]
    fn spawn_video(
        &self,
        _path: PathBuf,
        _params: ClipParams,
        _deadline: Deadline,
    ) -> WorkerResult<tokio::task::JoinHandle<BlockingOutcome>> {
        Err(WorkerError::config_error(
            "Video decoding requires the `video` feature",
        ))
    }

    async fn persist(&self, job: &ClipJob, result: &AnalysisResult) -> WorkerResult<Option<PathBuf>> {
        let Some(dir) = &self.config.output_dir else {
            return Ok(None);
        };
        tokio::fs::create_dir_all(dir).await?;
        let path = dir.join(job.output_name());
        let body = serde_json::to_vec_pretty(result)?;
        tokio::fs::write(&path, body).await?;
        debug!(path = %path.display(), "Result written");
        Ok(Some(path))
    }
}

fn meta_info(clip: &ObservedClip, params: &ClipParams) -> MetaInfo {
    MetaInfo::new(
        clip.meta.fps,
        clip.frames.len(),
        clip.meta.width,
        clip.meta.height,
        params,
    )
}

#[cfg(feature = "video")]
mod video {
    use javelin_media::{AnalysisConfig, HoughPrimitiveDetector, YoloPoseDetector};

    use crate::error::WorkerResult;

    /// Detectors shared by every video clip.
    pub struct VideoBackends {
        pub pose: YoloPoseDetector,
        pub primitives: HoughPrimitiveDetector,
    }

    impl VideoBackends {
        pub fn load(config: &AnalysisConfig) -> WorkerResult<Self> {
            Ok(Self {
                pose: YoloPoseDetector::new_default()?,
                primitives: HoughPrimitiveDetector::new(config.primitives.clone()),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use javelin_models::QcStatus;

    #[test]
    fn test_missing_file_is_rejected() {
        let executor = ClipExecutor::new(WorkerConfig::default()).unwrap();
        let job = ClipJob::new(
            ClipSource::from_path("/nonexistent/throw.json"),
            ClipParams::default(),
        );
        // Rejected during validation, before any blocking work is spawned.
        let report = tokio_test::block_on(executor.run(job));
        let result = report.result.unwrap();
        assert_eq!(result.status(), QcStatus::Fail);
        assert!(result.error.unwrap().starts_with("File not found"));
        assert!(result.meta.fps.is_none());
        assert!(result.meta.frames.is_none());
        assert!(result.qc.pose_confidence.is_none());
        assert!(report.output.is_none());
    }

    #[tokio::test]
    async fn test_unparseable_observations_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.json");
        std::fs::write(&path, "{not json").unwrap();

        let executor = ClipExecutor::new(WorkerConfig::default()).unwrap();
        let report = executor
            .run(ClipJob::new(ClipSource::from_path(path), ClipParams::default()))
            .await;
        assert!(matches!(
            report.result,
            Err(WorkerError::Media(MediaError::JsonParse(_)))
        ));
    }
}
