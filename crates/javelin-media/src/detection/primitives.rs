//! Geometric primitives produced by the marker and implement detectors.

use serde::{Deserialize, Serialize};

use crate::tracks::PixelPoint;

/// A circle candidate from the marker detector.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CircleDetection {
    pub center: PixelPoint,
    /// Radius in pixels
    pub radius: f64,
}

impl CircleDetection {
    pub fn new(center: PixelPoint, radius: f64) -> Self {
        Self { center, radius }
    }

    pub fn diameter(&self) -> f64 {
        self.radius * 2.0
    }
}

/// A straight segment from the implement detector.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LineSegment {
    pub start: PixelPoint,
    pub end: PixelPoint,
}

impl LineSegment {
    pub fn new(x1: f64, y1: f64, x2: f64, y2: f64) -> Self {
        Self {
            start: PixelPoint::new(x1, y1),
            end: PixelPoint::new(x2, y2),
        }
    }

    pub fn length(&self) -> f64 {
        self.start.distance(&self.end)
    }

    pub fn midpoint(&self) -> PixelPoint {
        self.start.midpoint(&self.end)
    }

    /// Orientation in image coordinates, degrees in (-180, 180].
    pub fn angle_deg(&self) -> f64 {
        (self.end.y - self.start.y)
            .atan2(self.end.x - self.start.x)
            .to_degrees()
    }
}

/// The implement as seen in one frame.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ImplementSighting {
    pub center: PixelPoint,
    pub angle_deg: f64,
    pub length_px: f64,
    /// Detector confidence; Hough segments report 1.0
    pub confidence: f64,
}

impl ImplementSighting {
    pub fn new(center: PixelPoint, angle_deg: f64, length_px: f64, confidence: f64) -> Self {
        Self {
            center,
            angle_deg,
            length_px,
            confidence,
        }
    }

    pub fn from_segment(segment: &LineSegment) -> Self {
        Self::new(segment.midpoint(), segment.angle_deg(), segment.length(), 1.0)
    }
}

/// Longest segment wins; on equal length the first in detector order is kept.
pub fn select_longest_segment(segments: &[LineSegment]) -> Option<&LineSegment> {
    segments.iter().fold(None, |best: Option<&LineSegment>, seg| match best {
        Some(b) if b.length() >= seg.length() => Some(b),
        _ => Some(seg),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_longest_segment() {
        let segments = vec![
            LineSegment::new(0.0, 0.0, 100.0, 0.0),
            LineSegment::new(0.0, 0.0, 0.0, 150.0),
            LineSegment::new(10.0, 10.0, 60.0, 10.0),
        ];
        let best = select_longest_segment(&segments).unwrap();
        assert_eq!(best.length(), 150.0);
        assert!(select_longest_segment(&[]).is_none());
    }

    #[test]
    fn test_longest_segment_tie_keeps_first() {
        let segments = vec![
            LineSegment::new(0.0, 0.0, 120.0, 0.0),
            LineSegment::new(0.0, 50.0, 120.0, 50.0),
        ];
        let best = select_longest_segment(&segments).unwrap();
        assert_eq!(best.start.y, 0.0);
    }

    #[test]
    fn test_sighting_from_segment() {
        let seg = LineSegment::new(100.0, 200.0, 200.0, 100.0);
        let sighting = ImplementSighting::from_segment(&seg);
        assert_eq!(sighting.center, PixelPoint::new(150.0, 150.0));
        assert!((sighting.angle_deg + 45.0).abs() < 1e-9);
        assert_eq!(sighting.confidence, 1.0);
    }
}
