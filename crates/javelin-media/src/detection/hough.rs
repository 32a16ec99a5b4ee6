//! OpenCV Hough-transform detectors for the reference marker and implement.
//!
//! Frames arrive as BGR `Mat`s straight from `VideoCapture`.

use opencv::core::{Mat, Size, Vec3f, Vec4i, Vector};
use opencv::imgproc;

use crate::config::PrimitiveDetectorConfig;
use crate::detection::primitives::{CircleDetection, LineSegment};
use crate::detection::providers::PrimitiveProvider;
use crate::error::{MediaError, MediaResult};
use crate::tracks::PixelPoint;

/// Circle and line Hough detector. Stateless, safe to share across clips.
pub struct HoughPrimitiveDetector {
    config: PrimitiveDetectorConfig,
}

impl HoughPrimitiveDetector {
    pub fn new(config: PrimitiveDetectorConfig) -> Self {
        Self { config }
    }

    fn grayscale(frame: &Mat) -> MediaResult<Mat> {
        let mut gray = Mat::default();
        imgproc::cvt_color_def(frame, &mut gray, imgproc::COLOR_BGR2GRAY)
            .map_err(|e| MediaError::detection_failed(format!("BGR2GRAY failed: {e}")))?;
        Ok(gray)
    }
}

impl Default for HoughPrimitiveDetector {
    fn default() -> Self {
        Self::new(PrimitiveDetectorConfig::default())
    }
}

impl PrimitiveProvider<Mat> for HoughPrimitiveDetector {
    fn detect_circles(&self, frame: &Mat) -> MediaResult<Vec<CircleDetection>> {
        let cfg = &self.config;
        let gray = Self::grayscale(frame)?;

        let mut blurred = Mat::default();
        imgproc::gaussian_blur_def(
            &gray,
            &mut blurred,
            Size::new(cfg.blur_kernel, cfg.blur_kernel),
            cfg.blur_sigma,
        )
        .map_err(|e| MediaError::detection_failed(format!("Gaussian blur failed: {e}")))?;

        let mut circles = Vector::<Vec3f>::new();
        imgproc::hough_circles(
            &blurred,
            &mut circles,
            imgproc::HOUGH_GRADIENT,
            cfg.circle_dp,
            cfg.circle_min_dist,
            cfg.circle_param1,
            cfg.circle_param2,
            cfg.circle_min_radius,
            cfg.circle_max_radius,
        )
        .map_err(|e| MediaError::detection_failed(format!("HoughCircles failed: {e}")))?;

        Ok(circles
            .iter()
            .map(|c| {
                CircleDetection::new(
                    PixelPoint::new(c[0].round() as f64, c[1].round() as f64),
                    c[2] as f64,
                )
            })
            .collect())
    }

    fn detect_segments(&self, frame: &Mat) -> MediaResult<Vec<LineSegment>> {
        let cfg = &self.config;
        let gray = Self::grayscale(frame)?;

        let mut edges = Mat::default();
        imgproc::canny_def(&gray, &mut edges, cfg.canny_low, cfg.canny_high)
            .map_err(|e| MediaError::detection_failed(format!("Canny failed: {e}")))?;

        let mut lines = Vector::<Vec4i>::new();
        imgproc::hough_lines_p(
            &edges,
            &mut lines,
            cfg.line_rho,
            cfg.line_theta_deg.to_radians(),
            cfg.line_threshold,
            cfg.line_min_length,
            cfg.line_max_gap,
        )
        .map_err(|e| MediaError::detection_failed(format!("HoughLinesP failed: {e}")))?;

        Ok(lines
            .iter()
            .map(|l| LineSegment::new(l[0] as f64, l[1] as f64, l[2] as f64, l[3] as f64))
            .collect())
    }

    fn name(&self) -> &'static str {
        "hough"
    }
}
