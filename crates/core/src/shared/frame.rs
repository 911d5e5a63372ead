use ndarray::ArrayView3;

use crate::camera::domain::camera_position::CameraPosition;
use crate::shared::orientation::Orientation;

/// A single captured frame: contiguous RGB bytes in row-major order, tagged
/// with the camera that produced it and the buffer's EXIF orientation.
///
/// Frames are moved through the pipeline by value and dropped after one
/// processing pass.
#[derive(Clone, Debug)]
pub struct Frame {
    data: Vec<u8>,
    width: u32,
    height: u32,
    channels: u8,
    index: usize,
    orientation: Orientation,
    camera: CameraPosition,
}

impl Frame {
    pub fn new(data: Vec<u8>, width: u32, height: u32, channels: u8, index: usize) -> Self {
        debug_assert_eq!(
            data.len(),
            (width as usize) * (height as usize) * (channels as usize),
            "data length must equal width * height * channels"
        );
        Self {
            data,
            width,
            height,
            channels,
            index,
            orientation: Orientation::Up,
            camera: CameraPosition::Back,
        }
    }

    pub fn with_orientation(mut self, orientation: Orientation) -> Self {
        self.orientation = orientation;
        self
    }

    pub fn with_camera(mut self, camera: CameraPosition) -> Self {
        self.camera = camera;
        self
    }

    pub fn with_index(mut self, index: usize) -> Self {
        self.index = index;
        self
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn channels(&self) -> u8 {
        self.channels
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn orientation(&self) -> Orientation {
        self.orientation
    }

    pub fn camera(&self) -> CameraPosition {
        self.camera
    }

    pub fn as_ndarray(&self) -> ArrayView3<'_, u8> {
        ArrayView3::from_shape(self.shape(), &self.data)
            .expect("Frame data length must match dimensions")
    }

    /// Consumes the frame and returns its upright (`Orientation::Up`) form.
    ///
    /// Only well-formed 3-channel frames are re-oriented; other layouts are
    /// returned unchanged.
    pub fn into_upright(self) -> Frame {
        if self.orientation == Orientation::Up
            || self.channels != 3
            || self.data.len() != self.shape().0 * self.shape().1 * 3
        {
            return self;
        }
        let (index, orientation, camera) = (self.index, self.orientation, self.camera);
        let Some(img) = image::RgbImage::from_raw(self.width, self.height, self.data) else {
            return Frame::new(Vec::new(), 0, 0, 3, index).with_camera(camera);
        };
        let upright = orientation.apply(&img);
        let (width, height) = upright.dimensions();
        Frame {
            data: upright.into_raw(),
            width,
            height,
            channels: 3,
            index,
            orientation: Orientation::Up,
            camera,
        }
    }

    fn shape(&self) -> (usize, usize, usize) {
        (
            self.height as usize,
            self.width as usize,
            self.channels as usize,
        )
    }
}
