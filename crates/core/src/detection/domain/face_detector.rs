use crate::shared::frame::Frame;
use crate::shared::region::DetectedRegion;

/// Domain interface for full-frame face detection.
///
/// Frames handed to detectors are upright. Implementations may hold model
/// sessions that need mutation, hence `&mut self`.
pub trait FaceDetector: Send {
    fn detect(&mut self, frame: &Frame) -> Result<Vec<DetectedRegion>, Box<dyn std::error::Error>>;
}
