use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use serde::Serialize;

use face_overlay_core::overlay::domain::overlay_sink::OverlaySink;
use face_overlay_core::overlay::domain::overlay_state::{OverlayBox, OverlayCommand, OverlayState};
use face_overlay_core::shared::frame::Frame;

#[derive(Debug, Serialize)]
struct BoxRecord<'a> {
    x: f64,
    y: f64,
    width: f64,
    height: f64,
    label: &'a str,
}

impl<'a> From<&'a OverlayBox> for BoxRecord<'a> {
    fn from(overlay: &'a OverlayBox) -> Self {
        Self {
            x: overlay.rect.x,
            y: overlay.rect.y,
            width: overlay.rect.width,
            height: overlay.rect.height,
            label: &overlay.label.text,
        }
    }
}

/// One JSON line per rendered frame.
#[derive(Debug, Serialize)]
struct OverlayEvent<'a> {
    frame: usize,
    camera: String,
    command: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    overlay: Option<BoxRecord<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    duration_ms: Option<u128>,
}

/// Writes overlay commands as JSON lines. `Keep` commands are skipped.
pub struct JsonLinesSink<W: Write + Send> {
    out: W,
    written: usize,
}

impl JsonLinesSink<BufWriter<File>> {
    pub fn create(path: &Path) -> std::io::Result<Self> {
        Ok(Self::new(BufWriter::new(File::create(path)?)))
    }
}

impl<W: Write + Send> JsonLinesSink<W> {
    pub fn new(out: W) -> Self {
        Self { out, written: 0 }
    }

    pub fn written(&self) -> usize {
        self.written
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write + Send> OverlaySink for JsonLinesSink<W> {
    fn apply(
        &mut self,
        command: &OverlayCommand,
        _state: &OverlayState,
        frame: &Frame,
    ) -> Result<(), Box<dyn std::error::Error>> {
        let (name, overlay, duration_ms) = match command {
            OverlayCommand::Keep => return Ok(()),
            OverlayCommand::Create(overlay) => ("create", Some(overlay.into()), None),
            OverlayCommand::Animate { to, duration } => {
                ("animate", Some(to.into()), Some(duration.as_millis()))
            }
            OverlayCommand::Remove => ("remove", None, None),
        };
        let event = OverlayEvent {
            frame: frame.index(),
            camera: frame.camera().to_string(),
            command: name,
            overlay,
            duration_ms,
        };
        serde_json::to_writer(&mut self.out, &event)?;
        self.out.write_all(b"\n")?;
        self.written += 1;
        Ok(())
    }

    fn finish(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        self.out.flush()?;
        log::info!("Wrote {} overlay events", self.written);
        Ok(())
    }
}
