//! Provider traits for per-frame detection back-ends.
//!
//! One trait per capability, generic over the frame representation so the
//! same pipeline runs on decoded OpenCV frames or pre-extracted observations.

use javelin_models::Pose;

use crate::detection::primitives::{
    select_longest_segment, CircleDetection, ImplementSighting, LineSegment,
};
use crate::error::MediaResult;

/// Body pose provider.
pub trait PoseProvider<F>: Send + Sync {
    /// Detect the athlete's pose in one frame.
    ///
    /// # Returns
    /// `Ok(None)` when no person is found. Errors mean the back-end itself
    /// failed on this frame.
    fn detect_pose(&self, frame: &F) -> MediaResult<Option<Pose>>;

    /// Provider name for logging.
    fn name(&self) -> &'static str;
}

/// Marker and implement provider.
pub trait PrimitiveProvider<F>: Send + Sync {
    /// Every circular marker candidate in the frame.
    fn detect_circles(&self, frame: &F) -> MediaResult<Vec<CircleDetection>>;

    /// Every straight segment in the frame, in detector output order.
    fn detect_segments(&self, frame: &F) -> MediaResult<Vec<LineSegment>>;

    /// Implement position the back-end tracks itself, if any.
    fn tracked_implement(&self, _frame: &F) -> Option<ImplementSighting> {
        None
    }

    /// The tracked implement, else the longest segment.
    fn detect_implement(&self, frame: &F) -> MediaResult<Option<ImplementSighting>> {
        if let Some(sighting) = self.tracked_implement(frame) {
            return Ok(Some(sighting));
        }
        let segments = self.detect_segments(frame)?;
        Ok(select_longest_segment(&segments).map(ImplementSighting::from_segment))
    }

    /// Provider name for logging.
    fn name(&self) -> &'static str;
}
