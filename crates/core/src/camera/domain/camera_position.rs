use std::fmt;

use crate::shared::orientation::Orientation;

/// Which physical camera produced a frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CameraPosition {
    Back,
    Front,
}

impl CameraPosition {
    pub fn toggled(self) -> Self {
        match self {
            CameraPosition::Back => CameraPosition::Front,
            CameraPosition::Front => CameraPosition::Back,
        }
    }

    /// Orientation of raw sensor buffers in a portrait-locked interface.
    ///
    /// The front camera is mirrored so the preview behaves like a mirror.
    pub fn sensor_orientation(self) -> Orientation {
        match self {
            CameraPosition::Back => Orientation::Right,
            CameraPosition::Front => Orientation::LeftMirrored,
        }
    }
}

impl fmt::Display for CameraPosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CameraPosition::Back => write!(f, "back"),
            CameraPosition::Front => write!(f, "front"),
        }
    }
}
