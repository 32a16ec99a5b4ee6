//! Container metadata via ffprobe, read before any frame is decoded.

use std::path::Path;
use std::process::Stdio;

use serde::Deserialize;
use tokio::process::Command;

use crate::error::{MediaError, MediaResult};
use crate::pipeline::ClipMeta;

/// What the container says about its first video stream.
#[derive(Debug, Clone, PartialEq)]
pub struct VideoInfo {
    pub meta: ClipMeta,
    pub codec: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ProbeReport {
    #[serde(default)]
    streams: Vec<ProbeStream>,
    #[serde(default)]
    format: Option<ProbeFormat>,
}

#[derive(Debug, Deserialize)]
struct ProbeStream {
    codec_name: Option<String>,
    width: Option<u32>,
    height: Option<u32>,
    avg_frame_rate: Option<String>,
    r_frame_rate: Option<String>,
    nb_frames: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ProbeFormat {
    duration: Option<String>,
}

/// Read fps, frame count and dimensions of the first video stream.
pub async fn probe_video(path: impl AsRef<Path>) -> MediaResult<VideoInfo> {
    let path = path.as_ref();
    if !path.exists() {
        return Err(MediaError::FileNotFound(path.to_path_buf()));
    }
    which::which("ffprobe").map_err(|_| MediaError::FfprobeNotFound)?;

    let output = Command::new("ffprobe")
        .args(["-v", "error", "-select_streams", "v:0", "-print_format", "json"])
        .args([
            "-show_entries",
            "stream=codec_name,width,height,avg_frame_rate,r_frame_rate,nb_frames:format=duration",
        ])
        .arg(path)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .output()
        .await?;

    if !output.status.success() {
        return Err(MediaError::FfprobeFailed {
            message: format!("ffprobe exited with {}", output.status),
            stderr: Some(String::from_utf8_lossy(&output.stderr).trim().to_string()),
        });
    }
    video_info(&output.stdout)
}

fn video_info(stdout: &[u8]) -> MediaResult<VideoInfo> {
    let report: ProbeReport = serde_json::from_slice(stdout)?;
    let stream = report
        .streams
        .into_iter()
        .next()
        .ok_or_else(|| MediaError::InvalidVideo("No video stream found".to_string()))?;

    // avg_frame_rate is 0/0 for some variable-rate streams.
    let fps = [&stream.avg_frame_rate, &stream.r_frame_rate]
        .into_iter()
        .find_map(|r| r.as_deref().and_then(rational))
        .ok_or_else(|| MediaError::InvalidVideo("Frame rate unavailable".to_string()))?;

    let duration = report
        .format
        .and_then(|f| f.duration)
        .and_then(|d| d.parse::<f64>().ok());
    let frame_count = stream
        .nb_frames
        .as_deref()
        .and_then(|n| n.parse::<usize>().ok())
        .or_else(|| duration.map(|d| (d * fps).round() as usize))
        .ok_or_else(|| MediaError::InvalidVideo("Frame count unavailable".to_string()))?;

    Ok(VideoInfo {
        meta: ClipMeta {
            fps,
            frame_count,
            width: stream.width.unwrap_or(0),
            height: stream.height.unwrap_or(0),
        },
        codec: stream.codec_name,
    })
}

/// `"30000/1001"` or `"29.97"`; `None` unless positive.
fn rational(s: &str) -> Option<f64> {
    let value = match s.split_once('/') {
        Some((num, den)) => num.trim().parse::<f64>().ok()? / den.trim().parse::<f64>().ok()?,
        None => s.trim().parse::<f64>().ok()?,
    };
    (value.is_finite() && value > 0.0).then_some(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rational() {
        assert_eq!(rational("30/1"), Some(30.0));
        assert!((rational("30000/1001").unwrap() - 29.97).abs() < 0.01);
        assert_eq!(rational("59.94"), Some(59.94));
        assert_eq!(rational("0/0"), None);
        assert_eq!(rational("n/a"), None);
    }

    #[test]
    fn test_frame_count_from_duration() {
        let json = br#"{
            "streams": [{"codec_name": "h264", "width": 1920, "height": 1080,
                         "avg_frame_rate": "0/0", "r_frame_rate": "60/1"}],
            "format": {"duration": "5.0"}
        }"#;
        let info = video_info(json).unwrap();
        assert_eq!(
            info.meta,
            ClipMeta {
                fps: 60.0,
                frame_count: 300,
                width: 1920,
                height: 1080
            }
        );
        assert_eq!(info.codec.as_deref(), Some("h264"));
    }

    #[test]
    fn test_stream_frame_count_preferred() {
        let json = br#"{"streams": [{"avg_frame_rate": "30/1", "nb_frames": "148"}],
                        "format": {"duration": "5.0"}}"#;
        let info = video_info(json).unwrap();
        assert_eq!(info.meta.frame_count, 148);
        assert_eq!(info.meta.width, 0);
    }

    #[test]
    fn test_unusable_probe_output() {
        assert!(matches!(
            video_info(br#"{"streams": []}"#),
            Err(MediaError::InvalidVideo(_))
        ));
        assert!(matches!(
            video_info(br#"{"streams": [{"codec_name": "h264"}]}"#),
            Err(MediaError::InvalidVideo(_))
        ));
    }

    #[tokio::test]
    async fn test_probe_missing_file() {
        assert!(matches!(
            probe_video("/nonexistent/clip.mp4").await,
            Err(MediaError::FileNotFound(_))
        ));
    }
}
