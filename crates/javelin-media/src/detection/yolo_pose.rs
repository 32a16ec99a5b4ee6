//! YOLOv8-pose inference on ONNX Runtime.
//!
//! Notes:
//! - OpenCV delivers frames as BGR; we convert to RGB before normalization.
//! - The frame is resized straight to the model input (no letterbox), so
//!   keypoints map back with independent x/y scale factors.
//! - Only the highest-scoring person is kept; clips hold a single athlete.

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use javelin_models::{Keypoint, KeypointIndex, Pose};
use opencv::core::{Mat, Size};
use opencv::imgproc;
use opencv::prelude::{MatTraitConst, MatTraitConstManual};
use ort::session::builder::GraphOptimizationLevel;
use ort::session::Session;
use ort::value::{Tensor, Value};
use tracing::info;

use crate::detection::providers::PoseProvider;
use crate::error::{MediaError, MediaResult};

/// Square model input side.
const INPUT_SIZE: i32 = 640;

/// Box (4) + person score (1) + 17 × (x, y, conf).
const CHANNELS: usize = 5 + KeypointIndex::COUNT * 3;

/// Person candidates below this score are ignored.
const MIN_PERSON_SCORE: f32 = 0.25;

/// ONNX Runtime wrapper for a YOLOv8-pose model.
///
/// The session sits behind a mutex: one inference at a time per process.
pub struct YoloPoseDetector {
    session: Mutex<Session>,
}

impl YoloPoseDetector {
    /// Load with default model search paths.
    pub fn new_default() -> MediaResult<Self> {
        let model_path = find_default_model_path().ok_or_else(|| {
            MediaError::model_not_found("yolov8n-pose.onnx not found; place it under models/pose/")
        })?;
        Self::load(&model_path)
    }

    pub fn load(model_path: &Path) -> MediaResult<Self> {
        if !model_path.exists() {
            return Err(MediaError::model_not_found(model_path.display().to_string()));
        }

        let model_bytes = std::fs::read(model_path)
            .map_err(|e| MediaError::detection_failed(format!("ORT read model file: {e}")))?;

        let session = Session::builder()
            .map_err(|e| MediaError::detection_failed(format!("ORT session builder: {e}")))?
            .with_optimization_level(GraphOptimizationLevel::Level3)
            .map_err(|e| MediaError::detection_failed(format!("ORT opt level: {e}")))?
            .commit_from_memory(model_bytes.as_slice())
            .map_err(|e| MediaError::detection_failed(format!("ORT load model: {e}")))?;

        info!(model = %model_path.display(), "Loaded YOLOv8-pose model");

        Ok(Self {
            session: Mutex::new(session),
        })
    }
}

impl PoseProvider<Mat> for YoloPoseDetector {
    fn detect_pose(&self, frame: &Mat) -> MediaResult<Option<Pose>> {
        let (frame_w, frame_h) = (frame.cols() as f32, frame.rows() as f32);
        if frame_w <= 0.0 || frame_h <= 0.0 {
            return Err(MediaError::detection_failed("Empty frame"));
        }

        let mut rgb = Mat::default();
        imgproc::cvt_color_def(frame, &mut rgb, imgproc::COLOR_BGR2RGB)
            .map_err(|e| MediaError::detection_failed(format!("BGR2RGB failed: {e}")))?;

        let mut resized = Mat::default();
        imgproc::resize(
            &rgb,
            &mut resized,
            Size::new(INPUT_SIZE, INPUT_SIZE),
            0.0,
            0.0,
            imgproc::INTER_LINEAR,
        )
        .map_err(|e| MediaError::detection_failed(format!("Resize failed: {e}")))?;

        let tensor = mat_to_chw_tensor(&resized)?;

        let mut session = self
            .session
            .lock()
            .map_err(|_| MediaError::detection_failed("ORT session poisoned"))?;

        let outputs = session
            .run(ort::inputs![tensor])
            .map_err(|e| MediaError::detection_failed(format!("ORT run failed: {e}")))?;

        let output = outputs
            .get("output0")
            .ok_or_else(|| MediaError::detection_failed("ORT returned no outputs"))?;

        let (shape, data) = output
            .try_extract_tensor::<f32>()
            .map_err(|e| MediaError::detection_failed(format!("ORT extract: {e}")))?;

        let dims: Vec<usize> = shape.iter().map(|&d| d as usize).collect();
        let scale = (
            frame_w / INPUT_SIZE as f32,
            frame_h / INPUT_SIZE as f32,
        );
        decode_best_pose(&dims, data, scale)
    }

    fn name(&self) -> &'static str {
        "yolov8-pose"
    }
}

/// Pick the best person from a `[1, 56, N]` or `[1, N, 56]` output.
fn decode_best_pose(dims: &[usize], data: &[f32], scale: (f32, f32)) -> MediaResult<Option<Pose>> {
    let (candidates, channel_major) = match dims {
        [1, c, n] if *c == CHANNELS => (*n, true),
        [1, n, c] if *c == CHANNELS => (*n, false),
        _ => {
            return Err(MediaError::detection_failed(format!(
                "Unexpected pose output shape: {:?}",
                dims
            )))
        }
    };
    if data.len() < candidates * CHANNELS {
        return Err(MediaError::detection_failed("Pose output truncated"));
    }

    let at = |candidate: usize, channel: usize| -> f32 {
        if channel_major {
            data[channel * candidates + candidate]
        } else {
            data[candidate * CHANNELS + channel]
        }
    };

    let best = (0..candidates)
        .map(|i| (i, at(i, 4)))
        .filter(|&(_, score)| score >= MIN_PERSON_SCORE)
        .fold(None, |best: Option<(usize, f32)>, cand| match best {
            Some(b) if b.1 >= cand.1 => Some(b),
            _ => Some(cand),
        });

    let Some((idx, _)) = best else {
        return Ok(None);
    };

    let mut keypoints = [Keypoint::default(); KeypointIndex::COUNT];
    for (k, kp) in keypoints.iter_mut().enumerate() {
        let base = 5 + k * 3;
        *kp = Keypoint::new(
            (at(idx, base) * scale.0) as f64,
            (at(idx, base + 1) * scale.1) as f64,
            at(idx, base + 2).clamp(0.0, 1.0) as f64,
        );
    }
    Ok(Some(Pose::new(keypoints)))
}

/// Convert Mat (RGB, HxWx3) to ORT tensor (1,3,H,W) scaled to [0,1].
fn mat_to_chw_tensor(mat_rgb: &Mat) -> MediaResult<Value> {
    let size = mat_rgb
        .size()
        .map_err(|e| MediaError::detection_failed(format!("Mat size: {e}")))?;
    let (h, w) = (size.height as usize, size.width as usize);
    if mat_rgb.channels() != 3 {
        return Err(MediaError::detection_failed("Expected 3-channel RGB Mat"));
    }

    let data = mat_rgb
        .data_typed::<u8>()
        .map_err(|e| MediaError::detection_failed(format!("Mat data: {e}")))?;

    let mut chw = vec![0f32; 3 * h * w];
    for y in 0..h {
        for x in 0..w {
            let src = (y * w + x) * 3;
            for c in 0..3 {
                chw[c * h * w + y * w + x] = data[src + c] as f32 / 255.0;
            }
        }
    }

    let shape = vec![1usize, 3, h, w];
    Tensor::from_array((shape, chw.into_boxed_slice()))
        .map(Value::from)
        .map_err(|e| MediaError::detection_failed(format!("ORT tensor: {e}")))
}

fn find_default_model_path() -> Option<PathBuf> {
    const CANDIDATES: &[&str] = &[
        "./models/pose/yolov8n-pose.onnx",
        "./models/yolov8n-pose.onnx",
        "/app/models/pose/yolov8n-pose.onnx",
    ];

    if let Ok(p) = std::env::var("JAVELIN_POSE_MODEL") {
        let path = PathBuf::from(p);
        if path.exists() {
            return Some(path);
        }
    }

    CANDIDATES
        .iter()
        .map(Path::new)
        .find(|p| p.exists())
        .map(Path::to_path_buf)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidate_major(scores: &[f32]) -> Vec<f32> {
        let mut data = Vec::new();
        for (i, &score) in scores.iter().enumerate() {
            let mut row = vec![0f32; CHANNELS];
            row[4] = score;
            for k in 0..KeypointIndex::COUNT {
                row[5 + k * 3] = 100.0 + i as f32;
                row[5 + k * 3 + 1] = 200.0;
                row[5 + k * 3 + 2] = 0.8;
            }
            data.extend(row);
        }
        data
    }

    #[test]
    fn test_decode_picks_best_candidate() {
        let data = candidate_major(&[0.3, 0.9, 0.5]);
        let pose = decode_best_pose(&[1, 3, CHANNELS], &data, (2.0, 0.5))
            .unwrap()
            .unwrap();
        let nose = pose.get(KeypointIndex::Nose);
        assert!((nose.x - 202.0).abs() < 1e-6);
        assert!((nose.y - 100.0).abs() < 1e-6);
        assert!((nose.confidence - 0.8).abs() < 1e-6);
    }

    #[test]
    fn test_decode_no_person() {
        let data = candidate_major(&[0.1, 0.2]);
        assert!(decode_best_pose(&[1, 2, CHANNELS], &data, (1.0, 1.0))
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_decode_rejects_bad_shape() {
        assert!(decode_best_pose(&[1, 10, 10], &[0.0; 100], (1.0, 1.0)).is_err());
    }
}
