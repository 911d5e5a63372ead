use std::path::{Path, PathBuf};

use log::debug;

use crate::camera::domain::camera_input::{CameraInput, CaptureError};
use crate::camera::domain::camera_position::CameraPosition;
use crate::shared::frame::Frame;
use crate::shared::orientation::Orientation;

/// Camera input that replays a video file through ffmpeg-next.
///
/// Frames are decoded lazily, one per [`CameraInput::read_frame`] call, and
/// converted to RGB24. Unless overridden, the orientation tag comes from the
/// stream's rotation metadata.
pub struct VideoFileInput {
    path: PathBuf,
    position: CameraPosition,
    orientation: Option<Orientation>,
    stream: Option<DecodeState>,
}

// Safety: VideoFileInput is only used from a single thread at a time.
// The raw pointers inside ffmpeg types are not shared across threads.
unsafe impl Send for VideoFileInput {}

impl VideoFileInput {
    pub fn new(path: impl Into<PathBuf>, position: CameraPosition) -> Self {
        Self {
            path: path.into(),
            position,
            orientation: None,
            stream: None,
        }
    }

    pub fn with_orientation(mut self, orientation: Orientation) -> Self {
        self.orientation = Some(orientation);
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl CameraInput for VideoFileInput {
    fn position(&self) -> CameraPosition {
        self.position
    }

    fn orientation(&self) -> Orientation {
        self.orientation
            .or_else(|| self.stream.as_ref().map(|s| s.orientation))
            .unwrap_or_default()
    }

    fn start(&mut self) -> Result<(), CaptureError> {
        if self.stream.is_some() {
            return Ok(());
        }
        let state = DecodeState::open(&self.path)
            .map_err(|e| CaptureError::unavailable(self.position, e))?;
        debug!(
            "Opened {} for the {} camera ({}x{}, {:?})",
            self.path.display(),
            self.position,
            state.width,
            state.height,
            state.orientation
        );
        self.stream = Some(state);
        Ok(())
    }

    fn is_available(&self) -> bool {
        self.stream.is_some()
    }

    fn read_frame(&mut self) -> Result<Option<Frame>, CaptureError> {
        let position = self.position;
        let stream = self
            .stream
            .as_mut()
            .ok_or(CaptureError::NotStarted(position))?;
        stream
            .next_frame()
            .map_err(|e| CaptureError::read(position, e))
    }

    fn stop(&mut self) {
        self.stream = None;
    }
}

struct DecodeState {
    ictx: ffmpeg_next::format::context::Input,
    decoder: ffmpeg_next::decoder::Video,
    scaler: ffmpeg_next::software::scaling::Context,
    stream_index: usize,
    width: u32,
    height: u32,
    orientation: Orientation,
    decoded: usize,
    flushing: bool,
    done: bool,
}

impl DecodeState {
    fn open(path: &Path) -> Result<Self, ffmpeg_next::Error> {
        ffmpeg_next::init()?;
        let ictx = ffmpeg_next::format::input(path)?;
        let stream = ictx
            .streams()
            .best(ffmpeg_next::media::Type::Video)
            .ok_or(ffmpeg_next::Error::StreamNotFound)?;
        let stream_index = stream.index();
        let orientation = orientation_for_rotation(extract_rotation(&stream));

        let codec_ctx = ffmpeg_next::codec::context::Context::from_parameters(stream.parameters())?;
        let decoder = codec_ctx.decoder().video()?;
        let (width, height) = (decoder.width(), decoder.height());
        let scaler = ffmpeg_next::software::scaling::Context::get(
            decoder.format(),
            width,
            height,
            ffmpeg_next::format::Pixel::RGB24,
            width,
            height,
            ffmpeg_next::software::scaling::Flags::BILINEAR,
        )?;

        Ok(Self {
            ictx,
            decoder,
            scaler,
            stream_index,
            width,
            height,
            orientation,
            decoded: 0,
            flushing: false,
            done: false,
        })
    }

    fn next_frame(&mut self) -> Result<Option<Frame>, ffmpeg_next::Error> {
        if self.done {
            return Ok(None);
        }
        if let Some(frame) = self.try_receive()? {
            return Ok(Some(frame));
        }
        if self.flushing {
            self.done = true;
            return Ok(None);
        }

        loop {
            let Some((stream, packet)) = self.ictx.packets().next() else {
                let _ = self.decoder.send_eof();
                self.flushing = true;
                let frame = self.try_receive()?;
                self.done = frame.is_none();
                return Ok(frame);
            };
            if stream.index() != self.stream_index {
                continue;
            }
            if self.decoder.send_packet(&packet).is_err() {
                continue;
            }
            if let Some(frame) = self.try_receive()? {
                return Ok(Some(frame));
            }
        }
    }

    fn try_receive(&mut self) -> Result<Option<Frame>, ffmpeg_next::Error> {
        let mut decoded = ffmpeg_next::util::frame::video::Video::empty();
        if self.decoder.receive_frame(&mut decoded).is_err() {
            return Ok(None);
        }
        let mut rgb = ffmpeg_next::util::frame::video::Video::empty();
        self.scaler.run(&decoded, &mut rgb)?;

        let pixels = packed_rgb(&rgb, self.width, self.height);
        let frame = Frame::new(pixels, self.width, self.height, 3, self.decoded);
        self.decoded += 1;
        Ok(Some(frame))
    }
}

/// Row-packed RGB bytes with the per-row stride padding removed.
fn packed_rgb(frame: &ffmpeg_next::util::frame::video::Video, width: u32, height: u32) -> Vec<u8> {
    let stride = frame.stride(0);
    let data = frame.data(0);
    let row_len = width as usize * 3;

    let mut pixels = Vec::with_capacity(row_len * height as usize);
    for row in 0..height as usize {
        let start = row * stride;
        pixels.extend_from_slice(&data[start..start + row_len]);
    }
    pixels
}

/// Clockwise display rotation in degrees (0, 90, 180 or 270), read from the
/// display matrix side data or the legacy `rotate` tag.
fn extract_rotation(stream: &ffmpeg_next::format::stream::Stream) -> i32 {
    for side_data in stream.side_data() {
        if side_data.kind() == ffmpeg_next::codec::packet::side_data::Type::DisplayMatrix {
            if let Some(angle) = parse_display_matrix(side_data.data()) {
                return normalize_rotation(angle);
            }
        }
    }
    stream
        .metadata()
        .get("rotate")
        .and_then(|v| v.parse::<i32>().ok())
        .map(normalize_rotation)
        .unwrap_or(0)
}

/// Rotation angle of a 16.16 fixed-point display matrix. The matrix holds the
/// inverse transform, hence the sign flip.
fn parse_display_matrix(data: &[u8]) -> Option<i32> {
    if data.len() < 36 {
        return None;
    }
    let m00 = i32::from_le_bytes(data[0..4].try_into().ok()?) as f64 / 65536.0;
    let m10 = i32::from_le_bytes(data[4..8].try_into().ok()?) as f64 / 65536.0;
    Some(-(m10.atan2(m00).to_degrees().round() as i32))
}

fn normalize_rotation(angle: i32) -> i32 {
    match angle.rem_euclid(360) {
        45..=134 => 90,
        135..=224 => 180,
        225..=315 => 270,
        _ => 0,
    }
}

fn orientation_for_rotation(degrees: i32) -> Orientation {
    match degrees {
        90 => Orientation::Right,
        180 => Orientation::Down,
        270 => Orientation::Left,
        _ => Orientation::Up,
    }
}
