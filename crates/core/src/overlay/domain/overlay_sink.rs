use crate::overlay::domain::overlay_state::{OverlayCommand, OverlayState};
use crate::shared::frame::Frame;

/// The view layer that displays the overlay.
///
/// Called on the render thread once per processed frame with the command
/// produced by the overlay state machine, the resulting state, and the
/// upright frame the command belongs to.
pub trait OverlaySink: Send {
    fn apply(
        &mut self,
        command: &OverlayCommand,
        state: &OverlayState,
        frame: &Frame,
    ) -> Result<(), Box<dyn std::error::Error>>;

    /// Called once after the last frame.
    fn finish(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        Ok(())
    }
}
