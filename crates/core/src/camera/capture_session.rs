use log::{debug, info};

use crate::camera::domain::camera_input::{CameraInput, CaptureError};
use crate::camera::domain::camera_position::CameraPosition;
use crate::shared::frame::Frame;

/// Holds the back and front inputs and routes frames from the attached one.
///
/// Changing the attached input follows a begin / remove / add / commit
/// sequence. Frames cannot be read while a configuration is open.
pub struct CaptureSession {
    back: Box<dyn CameraInput>,
    front: Box<dyn CameraInput>,
    attached: Option<CameraPosition>,
    configuring: bool,
    delivered: usize,
}

impl CaptureSession {
    /// Starts both inputs and attaches the back camera.
    ///
    /// Any failure here is a setup error and leaves no session behind.
    pub fn new(
        mut back: Box<dyn CameraInput>,
        mut front: Box<dyn CameraInput>,
    ) -> Result<Self, CaptureError> {
        if back.position() != CameraPosition::Back {
            return Err(CaptureError::unavailable(
                CameraPosition::Back,
                format!("input reports position {}", back.position()),
            ));
        }
        if front.position() != CameraPosition::Front {
            return Err(CaptureError::unavailable(
                CameraPosition::Front,
                format!("input reports position {}", front.position()),
            ));
        }

        back.start()?;
        if let Err(e) = front.start() {
            back.stop();
            return Err(e);
        }

        let mut session = Self {
            back,
            front,
            attached: None,
            configuring: false,
            delivered: 0,
        };
        session.begin_configuration()?;
        session.add_input(CameraPosition::Back)?;
        session.commit_configuration()?;
        info!("Capture session started on the back camera");
        Ok(session)
    }

    pub fn active_input(&self) -> Option<CameraPosition> {
        self.attached
    }

    pub fn begin_configuration(&mut self) -> Result<(), CaptureError> {
        if self.configuring {
            return Err(CaptureError::AlreadyConfiguring);
        }
        self.configuring = true;
        Ok(())
    }

    /// Detaches `position` if it is attached; a no-op otherwise.
    pub fn remove_input(&mut self, position: CameraPosition) -> Result<(), CaptureError> {
        self.require_configuring()?;
        if self.attached == Some(position) {
            self.attached = None;
            debug!("Removed {position} camera from session");
        }
        Ok(())
    }

    pub fn add_input(&mut self, position: CameraPosition) -> Result<(), CaptureError> {
        self.require_configuring()?;
        if let Some(current) = self.attached {
            return Err(CaptureError::SessionOccupied(current));
        }
        if !self.input(position).is_available() {
            return Err(CaptureError::unavailable(
                position,
                "input cannot be added to the session",
            ));
        }
        self.attached = Some(position);
        debug!("Added {position} camera to session");
        Ok(())
    }

    pub fn commit_configuration(&mut self) -> Result<(), CaptureError> {
        self.require_configuring()?;
        self.configuring = false;
        Ok(())
    }

    /// Reads the next frame from the attached input and tags it with the
    /// camera, its orientation and a session-wide index.
    pub fn next_frame(&mut self) -> Result<Option<Frame>, CaptureError> {
        if self.configuring {
            return Err(CaptureError::AlreadyConfiguring);
        }
        let position = self.attached.ok_or(CaptureError::NoActiveInput)?;
        let input = self.input_mut(position);
        let orientation = input.orientation();
        let Some(frame) = input.read_frame()? else {
            return Ok(None);
        };
        let frame = frame
            .with_camera(position)
            .with_orientation(orientation)
            .with_index(self.delivered);
        self.delivered += 1;
        Ok(Some(frame))
    }

    pub fn stop(&mut self) {
        self.attached = None;
        self.configuring = false;
        self.back.stop();
        self.front.stop();
        info!("Capture session stopped after {} frames", self.delivered);
    }

    fn require_configuring(&self) -> Result<(), CaptureError> {
        if self.configuring {
            Ok(())
        } else {
            Err(CaptureError::NotConfiguring)
        }
    }

    fn input(&self, position: CameraPosition) -> &dyn CameraInput {
        match position {
            CameraPosition::Back => self.back.as_ref(),
            CameraPosition::Front => self.front.as_ref(),
        }
    }

    fn input_mut(&mut self, position: CameraPosition) -> &mut dyn CameraInput {
        match position {
            CameraPosition::Back => self.back.as_mut(),
            CameraPosition::Front => self.front.as_mut(),
        }
    }
}
