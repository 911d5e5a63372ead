use log::{debug, info};

use crate::overlay::domain::overlay_sink::OverlaySink;
use crate::overlay::domain::overlay_state::{OverlayCommand, OverlayState};
use crate::shared::frame::Frame;

/// Writes overlay commands to the log. `Keep` is only logged at debug level.
#[derive(Default)]
pub struct LogOverlaySink {
    applied: usize,
}

impl LogOverlaySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Commands other than `Keep` seen so far.
    pub fn applied(&self) -> usize {
        self.applied
    }
}

impl OverlaySink for LogOverlaySink {
    fn apply(
        &mut self,
        command: &OverlayCommand,
        _state: &OverlayState,
        frame: &Frame,
    ) -> Result<(), Box<dyn std::error::Error>> {
        let index = frame.index();
        let camera = frame.camera();
        match command {
            OverlayCommand::Create(overlay) => info!(
                "[{index} {camera}] create box at ({:.0}, {:.0}) {:.0}x{:.0} \"{}\"",
                overlay.rect.x, overlay.rect.y, overlay.rect.width, overlay.rect.height, overlay.label.text
            ),
            OverlayCommand::Animate { to, duration } => info!(
                "[{index} {camera}] move box to ({:.0}, {:.0}) {:.0}x{:.0} over {}ms",
                to.rect.x,
                to.rect.y,
                to.rect.width,
                to.rect.height,
                duration.as_millis()
            ),
            OverlayCommand::Remove => info!("[{index} {camera}] remove box"),
            OverlayCommand::Keep => {
                debug!("[{index} {camera}] keep");
                return Ok(());
            }
        }
        self.applied += 1;
        Ok(())
    }
}
