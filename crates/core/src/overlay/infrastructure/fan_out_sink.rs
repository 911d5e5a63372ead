use crate::overlay::domain::overlay_sink::OverlaySink;
use crate::overlay::domain::overlay_state::{OverlayCommand, OverlayState};
use crate::shared::frame::Frame;

/// Forwards every command to several sinks in order.
///
/// All sinks see every command even if an earlier one fails; the first
/// error is returned.
pub struct FanOutSink {
    sinks: Vec<Box<dyn OverlaySink>>,
}

impl FanOutSink {
    pub fn new(sinks: Vec<Box<dyn OverlaySink>>) -> Self {
        Self { sinks }
    }

    pub fn len(&self) -> usize {
        self.sinks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sinks.is_empty()
    }
}

impl OverlaySink for FanOutSink {
    fn apply(
        &mut self,
        command: &OverlayCommand,
        state: &OverlayState,
        frame: &Frame,
    ) -> Result<(), Box<dyn std::error::Error>> {
        let mut first_error = None;
        for sink in &mut self.sinks {
            if let Err(e) = sink.apply(command, state, frame) {
                first_error.get_or_insert(e);
            }
        }
        first_error.map_or(Ok(()), Err)
    }

    fn finish(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        let mut first_error = None;
        for sink in &mut self.sinks {
            if let Err(e) = sink.finish() {
                first_error.get_or_insert(e);
            }
        }
        first_error.map_or(Ok(()), Err)
    }
}
