use std::path::{Path, PathBuf};

use log::debug;

use crate::camera::domain::camera_input::{CameraInput, CaptureError};
use crate::camera::domain::camera_position::CameraPosition;
use crate::shared::constants::IMAGE_EXTENSIONS;
use crate::shared::frame::Frame;
use crate::shared::orientation::Orientation;

/// Camera input backed by a directory of still images, delivered in file
/// name order.
pub struct ImageSequenceInput {
    dir: PathBuf,
    position: CameraPosition,
    orientation: Orientation,
    looping: bool,
    paths: Vec<PathBuf>,
    cursor: usize,
    started: bool,
}

impl ImageSequenceInput {
    pub fn new(dir: impl Into<PathBuf>, position: CameraPosition) -> Self {
        Self {
            dir: dir.into(),
            position,
            orientation: Orientation::Up,
            looping: false,
            paths: Vec::new(),
            cursor: 0,
            started: false,
        }
    }

    pub fn with_orientation(mut self, orientation: Orientation) -> Self {
        self.orientation = orientation;
        self
    }

    /// Restart from the first image instead of ending the stream.
    pub fn with_looping(mut self, looping: bool) -> Self {
        self.looping = looping;
        self
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }
}

impl CameraInput for ImageSequenceInput {
    fn position(&self) -> CameraPosition {
        self.position
    }

    fn orientation(&self) -> Orientation {
        self.orientation
    }

    fn start(&mut self) -> Result<(), CaptureError> {
        if self.started {
            return Ok(());
        }
        let paths = list_images(&self.dir).map_err(|e| CaptureError::unavailable(self.position, e))?;
        if paths.is_empty() {
            return Err(CaptureError::unavailable(
                self.position,
                format!("no images in {}", self.dir.display()),
            ));
        }
        debug!(
            "Found {} images in {} for the {} camera",
            paths.len(),
            self.dir.display(),
            self.position
        );
        self.paths = paths;
        self.cursor = 0;
        self.started = true;
        Ok(())
    }

    fn is_available(&self) -> bool {
        self.started
    }

    fn read_frame(&mut self) -> Result<Option<Frame>, CaptureError> {
        if !self.started {
            return Err(CaptureError::NotStarted(self.position));
        }
        if self.cursor >= self.paths.len() {
            if !self.looping {
                return Ok(None);
            }
            self.cursor = 0;
        }
        let index = self.cursor;
        self.cursor += 1;

        let img = image::open(&self.paths[index])
            .map_err(|e| CaptureError::read(self.position, e))?
            .to_rgb8();
        let (width, height) = img.dimensions();
        Ok(Some(Frame::new(img.into_raw(), width, height, 3, index)))
    }

    fn stop(&mut self) {
        self.started = false;
        self.paths.clear();
        self.cursor = 0;
    }
}

fn list_images(dir: &Path) -> std::io::Result<Vec<PathBuf>> {
    let mut paths: Vec<PathBuf> = std::fs::read_dir(dir)?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| path.is_file() && has_image_extension(path))
        .collect();
    paths.sort();
    Ok(paths)
}

fn has_image_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| IMAGE_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}
