use log::warn;

use crate::overlay::domain::label_layout::LabelStyle;
use crate::overlay::domain::overlay_sink::OverlaySink;
use crate::overlay::domain::overlay_state::{reduce, OverlayCommand, OverlayState, OverlayUpdate};
use crate::overlay::domain::preview_transform::PreviewTransform;
use crate::shared::frame::Frame;

/// Size of the preview surface the overlay is drawn on.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub enum PreviewSize {
    /// Same size as each upright frame.
    #[default]
    MatchFrame,
    Fixed(f64, f64),
}

/// Applies overlay updates on the render thread.
///
/// Owns the overlay state and the view layer. Sink failures are logged and
/// never stop rendering.
pub struct OverlayRenderer {
    state: OverlayState,
    preview: PreviewSize,
    mirrored: bool,
    labels: LabelStyle,
    sink: Box<dyn OverlaySink>,
    sink_errors: usize,
}

impl OverlayRenderer {
    pub fn new(sink: Box<dyn OverlaySink>) -> Self {
        Self {
            state: OverlayState::NoOverlay,
            preview: PreviewSize::default(),
            mirrored: false,
            labels: LabelStyle::default(),
            sink,
            sink_errors: 0,
        }
    }

    pub fn with_preview(mut self, preview: PreviewSize) -> Self {
        self.preview = preview;
        self
    }

    pub fn with_mirroring(mut self, mirrored: bool) -> Self {
        self.mirrored = mirrored;
        self
    }

    pub fn with_labels(mut self, labels: LabelStyle) -> Self {
        self.labels = labels;
        self
    }

    pub fn state(&self) -> &OverlayState {
        &self.state
    }

    pub fn sink_errors(&self) -> usize {
        self.sink_errors
    }

    pub fn render(&mut self, update: &OverlayUpdate, frame: &Frame) -> OverlayCommand {
        let transform = self.transform_for(frame);
        let (next, command) = reduce(&self.state, update, &transform, &self.labels);
        self.state = next;

        if let Err(e) = self.sink.apply(&command, &self.state, frame) {
            self.sink_errors += 1;
            warn!("Overlay sink failed on frame {}: {e}", frame.index());
        }
        command
    }

    pub fn finish(&mut self) {
        if let Err(e) = self.sink.finish() {
            warn!("Overlay sink failed to finish: {e}");
        }
    }

    fn transform_for(&self, frame: &Frame) -> PreviewTransform {
        let (w, h) = match self.preview {
            PreviewSize::MatchFrame => (frame.width() as f64, frame.height() as f64),
            PreviewSize::Fixed(w, h) => (w, h),
        };
        PreviewTransform::new(w, h).mirrored(self.mirrored)
    }
}
