//! OpenCV frame decoding.
//!
//! Frames come out in presentation order as BGR `Mat`s. Decoding is
//! sequential; the pipeline needs every frame, so there is no seeking.

use std::path::Path;

use opencv::core::Mat;
use opencv::prelude::{MatTraitConst, VideoCaptureTrait, VideoCaptureTraitConst};
use opencv::videoio::{
    VideoCapture, CAP_ANY, CAP_PROP_FPS, CAP_PROP_FRAME_COUNT, CAP_PROP_FRAME_HEIGHT,
    CAP_PROP_FRAME_WIDTH,
};
use tracing::{debug, warn};

use javelin_models::{AnalysisResult, ClipParams};

use crate::detection::{PoseProvider, PrimitiveProvider};
use crate::error::{MediaError, MediaResult};
use crate::pipeline::{ClipMeta, Deadline, MotionAnalyzer};

/// Sequential frame reader.
pub struct VideoFrames {
    cap: VideoCapture,
    read: usize,
    done: bool,
}

/// Open a video and read its metadata.
pub fn open_video(path: impl AsRef<Path>) -> MediaResult<(ClipMeta, VideoFrames)> {
    let path = path.as_ref();
    if !path.exists() {
        return Err(MediaError::FileNotFound(path.to_path_buf()));
    }
    let path_str = path
        .to_str()
        .ok_or_else(|| MediaError::InvalidVideo(format!("Non UTF-8 path: {}", path.display())))?;

    let cap = VideoCapture::from_file(path_str, CAP_ANY)
        .map_err(|e| MediaError::InvalidVideo(format!("Failed to open video: {e}")))?;

    if !cap.is_opened().unwrap_or(false) {
        return Err(MediaError::InvalidVideo(format!(
            "Failed to open video file: {path_str}"
        )));
    }

    let meta = ClipMeta {
        fps: cap.get(CAP_PROP_FPS).unwrap_or(0.0),
        frame_count: cap.get(CAP_PROP_FRAME_COUNT).unwrap_or(0.0).max(0.0) as usize,
        width: cap.get(CAP_PROP_FRAME_WIDTH).unwrap_or(0.0) as u32,
        height: cap.get(CAP_PROP_FRAME_HEIGHT).unwrap_or(0.0) as u32,
    };

    debug!(
        path = %path.display(),
        fps = meta.fps,
        frames = meta.frame_count,
        width = meta.width,
        height = meta.height,
        "Video opened"
    );

    Ok((
        meta,
        VideoFrames {
            cap,
            read: 0,
            done: false,
        },
    ))
}

/// Decode a video file and run the full analysis on it.
pub fn analyze_video(
    analyzer: &MotionAnalyzer,
    path: impl AsRef<Path>,
    params: &ClipParams,
    pose_provider: &dyn PoseProvider<Mat>,
    primitive_provider: &dyn PrimitiveProvider<Mat>,
    deadline: Option<&Deadline>,
) -> MediaResult<AnalysisResult> {
    let (meta, frames) = open_video(path)?;
    analyzer.analyze(meta, frames, params, pose_provider, primitive_provider, deadline)
}

impl Iterator for VideoFrames {
    type Item = MediaResult<Mat>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        let mut frame = Mat::default();
        match self.cap.read(&mut frame) {
            Ok(true) if !frame.empty() => {
                self.read += 1;
                Some(Ok(frame))
            }
            Ok(_) => {
                debug!(frames = self.read, "End of video");
                self.done = true;
                None
            }
            Err(e) => {
                warn!(frame = self.read, error = %e, "Failed to read frame");
                self.done = true;
                Some(Err(MediaError::InvalidVideo(format!(
                    "Failed to read frame {}: {e}",
                    self.read
                ))))
            }
        }
    }
}
