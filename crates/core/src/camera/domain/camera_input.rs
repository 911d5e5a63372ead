use thiserror::Error;

use crate::camera::domain::camera_position::CameraPosition;
use crate::shared::frame::Frame;
use crate::shared::orientation::Orientation;

#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("{position} camera unavailable: {reason}")]
    DeviceUnavailable {
        position: CameraPosition,
        reason: String,
    },

    #[error("{0} camera has not been started")]
    NotStarted(CameraPosition),

    #[error("no input attached to the capture session")]
    NoActiveInput,

    #[error("capture session is already being configured")]
    AlreadyConfiguring,

    #[error("capture session is not being configured")]
    NotConfiguring,

    #[error("capture session already has the {0} camera attached")]
    SessionOccupied(CameraPosition),

    #[error("failed to read from the {position} camera")]
    Read {
        position: CameraPosition,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

impl CaptureError {
    pub fn unavailable(position: CameraPosition, reason: impl ToString) -> Self {
        Self::DeviceUnavailable {
            position,
            reason: reason.to_string(),
        }
    }

    pub fn read(
        position: CameraPosition,
        source: impl Into<Box<dyn std::error::Error + Send + Sync>>,
    ) -> Self {
        Self::Read {
            position,
            source: source.into(),
        }
    }
}

/// A capture device that can be attached to a [`CaptureSession`].
///
/// Inputs are started once at session setup and stay running; the session
/// decides which one delivers frames.
///
/// [`CaptureSession`]: crate::camera::capture_session::CaptureSession
pub trait CameraInput: Send {
    fn position(&self) -> CameraPosition;

    /// Orientation tag applied to every frame this input delivers.
    fn orientation(&self) -> Orientation {
        self.position().sensor_orientation()
    }

    fn start(&mut self) -> Result<(), CaptureError>;

    /// Whether the session may attach this input right now.
    fn is_available(&self) -> bool {
        true
    }

    /// Next frame, or `None` once the source is exhausted.
    fn read_frame(&mut self) -> Result<Option<Frame>, CaptureError>;

    fn stop(&mut self);
}
