use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard};

use log::{info, warn};
use thiserror::Error;

use crate::camera::capture_session::CaptureSession;
use crate::camera::domain::camera_input::CaptureError;
use crate::camera::domain::camera_position::CameraPosition;
use crate::shared::frame::Frame;

#[derive(Debug, Error)]
pub enum SwitchError {
    #[error("a camera switch is already in progress")]
    Busy,

    #[error(transparent)]
    Capture(#[from] CaptureError),

    #[error("capture session lock poisoned")]
    Poisoned,
}

/// Serializes camera switches against frame delivery.
///
/// The controller is the only owner of the [`CaptureSession`]. Both
/// reconfiguration and frame reads take the same lock, so a frame is never
/// read from a half-configured session. While a switch runs, the switch
/// control is disabled and further requests fail with [`SwitchError::Busy`].
pub struct CameraSwitchController {
    session: Mutex<CaptureSession>,
    switching: AtomicBool,
    switches: AtomicUsize,
}

impl CameraSwitchController {
    pub fn new(session: CaptureSession) -> Self {
        Self {
            session: Mutex::new(session),
            switching: AtomicBool::new(false),
            switches: AtomicUsize::new(0),
        }
    }

    pub fn active_camera(&self) -> Result<Option<CameraPosition>, SwitchError> {
        Ok(self.lock()?.active_input())
    }

    /// True while a switch holds the control.
    pub fn is_switching(&self) -> bool {
        self.switching.load(Ordering::Acquire)
    }

    /// Completed switches since construction.
    pub fn switch_count(&self) -> usize {
        self.switches.load(Ordering::Relaxed)
    }

    /// Toggles between the back and front cameras and returns the new one.
    pub fn switch_camera(&self) -> Result<CameraPosition, SwitchError> {
        let _control = ControlGuard::acquire(&self.switching)?;
        let mut session = self.lock()?;
        let target = session
            .active_input()
            .unwrap_or(CameraPosition::Front)
            .toggled();
        reconfigure(&mut session, target)?;
        self.switches.fetch_add(1, Ordering::Relaxed);
        info!("Switched to the {target} camera");
        Ok(target)
    }

    /// Attaches `position`, detaching whatever was attached before.
    pub fn set_active_input(&self, position: CameraPosition) -> Result<(), SwitchError> {
        let _control = ControlGuard::acquire(&self.switching)?;
        let mut session = self.lock()?;
        if session.active_input() == Some(position) {
            return Ok(());
        }
        reconfigure(&mut session, position)?;
        self.switches.fetch_add(1, Ordering::Relaxed);
        info!("Switched to the {position} camera");
        Ok(())
    }

    pub fn next_frame(&self) -> Result<Option<Frame>, SwitchError> {
        Ok(self.lock()?.next_frame()?)
    }

    pub fn stop(&self) -> Result<(), SwitchError> {
        self.lock()?.stop();
        Ok(())
    }

    fn lock(&self) -> Result<MutexGuard<'_, CaptureSession>, SwitchError> {
        self.session.lock().map_err(|_| SwitchError::Poisoned)
    }
}

/// One atomic reconfiguration. A failed add restores the previous input.
fn reconfigure(session: &mut CaptureSession, target: CameraPosition) -> Result<(), CaptureError> {
    let previous = session.active_input();
    session.begin_configuration()?;
    session.remove_input(CameraPosition::Back)?;
    session.remove_input(CameraPosition::Front)?;

    if let Err(e) = session.add_input(target) {
        if let Some(previous) = previous {
            if let Err(restore) = session.add_input(previous) {
                warn!("Failed to restore the {previous} camera: {restore}");
            }
        }
        session.commit_configuration()?;
        return Err(e);
    }
    session.commit_configuration()
}

/// Disabled-control flag, re-enabled on drop.
struct ControlGuard<'a>(&'a AtomicBool);

impl<'a> ControlGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Result<Self, SwitchError> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| SwitchError::Busy)?;
        Ok(Self(flag))
    }
}

impl Drop for ControlGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}
