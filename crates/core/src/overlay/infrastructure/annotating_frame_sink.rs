use std::path::{Path, PathBuf};

use image::{Rgb, RgbImage};
use imageproc::drawing::draw_hollow_rect_mut;
use imageproc::rect::Rect;

use crate::overlay::domain::overlay_sink::OverlaySink;
use crate::overlay::domain::overlay_state::{OverlayCommand, OverlayState};
use crate::overlay::domain::preview_transform::ScreenRect;
use crate::shared::frame::Frame;

pub const BORDER_COLOR: Rgb<u8> = Rgb([52, 199, 89]);
pub const BORDER_WIDTH: u32 = 3;

/// Draws the current overlay onto a copy of every frame and saves it as
/// `frame_NNNNNN.png` in the output directory.
///
/// Box coordinates are taken as frame pixels, so the renderer should use a
/// preview that matches the frame size.
pub struct AnnotatingFrameSink {
    output_dir: PathBuf,
    written: usize,
}

impl AnnotatingFrameSink {
    pub fn new(output_dir: impl Into<PathBuf>) -> Result<Self, Box<dyn std::error::Error>> {
        let output_dir = output_dir.into();
        std::fs::create_dir_all(&output_dir)?;
        Ok(Self {
            output_dir,
            written: 0,
        })
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    pub fn written(&self) -> usize {
        self.written
    }
}

impl OverlaySink for AnnotatingFrameSink {
    fn apply(
        &mut self,
        _command: &OverlayCommand,
        state: &OverlayState,
        frame: &Frame,
    ) -> Result<(), Box<dyn std::error::Error>> {
        if frame.channels() != 3 {
            return Err(format!("cannot annotate a {}-channel frame", frame.channels()).into());
        }
        let mut img = RgbImage::from_raw(frame.width(), frame.height(), frame.data().to_vec())
            .ok_or("Failed to create image from frame data")?;

        if let OverlayState::ShowingOverlay(overlay) = state {
            draw_border(&mut img, &overlay.rect);
        }

        let path = self
            .output_dir
            .join(format!("frame_{:06}.png", frame.index()));
        img.save(&path)?;
        self.written += 1;
        Ok(())
    }
}

fn draw_border(img: &mut RgbImage, rect: &ScreenRect) {
    let (img_w, img_h) = img.dimensions();
    if img_w == 0 || img_h == 0 {
        return;
    }
    let max_x = (img_w - 1) as f64;
    let max_y = (img_h - 1) as f64;
    let x1 = rect.x.clamp(0.0, max_x).round() as i32;
    let y1 = rect.y.clamp(0.0, max_y).round() as i32;
    let x2 = (rect.x + rect.width).clamp(0.0, img_w as f64).round() as i32;
    let y2 = (rect.y + rect.height).clamp(0.0, img_h as f64).round() as i32;

    for inset in 0..BORDER_WIDTH as i32 {
        let w = x2 - x1 - 2 * inset;
        let h = y2 - y1 - 2 * inset;
        if w <= 0 || h <= 0 {
            break;
        }
        let r = Rect::at(x1 + inset, y1 + inset).of_size(w as u32, h as u32);
        draw_hollow_rect_mut(img, r, BORDER_COLOR);
    }
}
