use crate::detection::domain::tracking_request::TrackingRequest;
use crate::shared::frame::Frame;

/// Sequential request handler for frame-to-frame region tracking.
///
/// One tracker instance must see every tracked frame in order: it keeps the
/// per-request motion state that gives tracking its continuity. Each call
/// writes a fresh `result` into every request, or fails as a whole.
pub trait FaceTracker: Send {
    /// Captures the appearance of freshly seeded requests on the frame they
    /// were detected in. Replaces any earlier motion state.
    fn start(
        &mut self,
        _requests: &[TrackingRequest],
        _frame: &Frame,
    ) -> Result<(), Box<dyn std::error::Error>> {
        Ok(())
    }

    fn track(
        &mut self,
        requests: &mut [TrackingRequest],
        frame: &Frame,
    ) -> Result<(), Box<dyn std::error::Error>>;

    /// Forgets all motion state, e.g. after the camera input changed.
    fn reset(&mut self) {}
}
