#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use face_overlay_core::camera::capture_session::CaptureSession;
use face_overlay_core::camera::domain::camera_input::{CameraInput, CaptureError};
use face_overlay_core::camera::domain::camera_position::CameraPosition;
use face_overlay_core::camera::switch_controller::CameraSwitchController;
use face_overlay_core::detection::domain::face_detector::FaceDetector;
use face_overlay_core::detection::domain::face_tracker::FaceTracker;
use face_overlay_core::detection::domain::tracking_request::TrackingRequest;
use face_overlay_core::overlay::domain::overlay_sink::OverlaySink;
use face_overlay_core::overlay::domain::overlay_state::{OverlayCommand, OverlayState};
use face_overlay_core::shared::frame::Frame;
use face_overlay_core::shared::region::{DetectedRegion, NormalizedRect};

pub const FRAME_W: u32 = 8;
pub const FRAME_H: u32 = 6;

/// In-memory camera producing `remaining` black frames.
pub struct MemoryInput {
    position: CameraPosition,
    remaining: usize,
    delay: Duration,
}

impl MemoryInput {
    pub fn boxed(position: CameraPosition, frames: usize) -> Box<dyn CameraInput> {
        Box::new(Self {
            position,
            remaining: frames,
            delay: Duration::ZERO,
        })
    }
}

impl CameraInput for MemoryInput {
    fn position(&self) -> CameraPosition {
        self.position
    }

    fn start(&mut self) -> Result<(), CaptureError> {
        Ok(())
    }

    fn read_frame(&mut self) -> Result<Option<Frame>, CaptureError> {
        if self.remaining == 0 {
            return Ok(None);
        }
        self.remaining -= 1;
        std::thread::sleep(self.delay);
        let data = vec![0u8; (FRAME_W * FRAME_H * 3) as usize];
        Ok(Some(Frame::new(data, FRAME_W, FRAME_H, 3, 0)))
    }

    fn stop(&mut self) {}
}

pub fn controller(back_frames: usize, front_frames: usize) -> Arc<CameraSwitchController> {
    let session = CaptureSession::new(
        MemoryInput::boxed(CameraPosition::Back, back_frames),
        MemoryInput::boxed(CameraPosition::Front, front_frames),
    )
    .unwrap();
    Arc::new(CameraSwitchController::new(session))
}

pub fn face(x: f64, confidence: f64) -> DetectedRegion {
    DetectedRegion::new(NormalizedRect::new(x, 0.3, 0.25, 0.25), confidence).with_label("face")
}

/// Detector that answers from a script, then repeats `fallback`.
pub struct ScriptedDetector {
    script: VecDeque<Result<Vec<DetectedRegion>, String>>,
    fallback: Vec<DetectedRegion>,
    delay: Duration,
}

impl ScriptedDetector {
    pub fn never() -> Box<dyn FaceDetector> {
        Self::always(Vec::new())
    }

    pub fn always(regions: Vec<DetectedRegion>) -> Box<dyn FaceDetector> {
        Box::new(Self {
            script: VecDeque::new(),
            fallback: regions,
            delay: Duration::ZERO,
        })
    }

    pub fn once(regions: Vec<DetectedRegion>) -> Box<dyn FaceDetector> {
        Self::scripted(vec![Ok(regions)], Vec::new())
    }

    pub fn scripted(
        script: Vec<Result<Vec<DetectedRegion>, String>>,
        fallback: Vec<DetectedRegion>,
    ) -> Box<dyn FaceDetector> {
        Box::new(Self {
            script: script.into(),
            fallback,
            delay: Duration::ZERO,
        })
    }

    pub fn slow(regions: Vec<DetectedRegion>, delay: Duration) -> Box<dyn FaceDetector> {
        Box::new(Self {
            script: VecDeque::new(),
            fallback: regions,
            delay,
        })
    }
}

impl FaceDetector for ScriptedDetector {
    fn detect(&mut self, _frame: &Frame) -> Result<Vec<DetectedRegion>, Box<dyn std::error::Error>> {
        std::thread::sleep(self.delay);
        match self.script.pop_front() {
            Some(Ok(regions)) => Ok(regions),
            Some(Err(e)) => Err(e.into()),
            None => Ok(self.fallback.clone()),
        }
    }
}

/// Tracker that gives every request the next scripted confidence, then
/// `fallback`.
pub struct ScriptedTracker {
    script: VecDeque<Result<f64, String>>,
    fallback: f64,
    delay: Duration,
}

impl ScriptedTracker {
    pub fn steady(confidence: f64) -> Box<dyn FaceTracker> {
        Self::scripted(Vec::new(), confidence)
    }

    pub fn scripted(script: Vec<Result<f64, String>>, fallback: f64) -> Box<dyn FaceTracker> {
        Box::new(Self {
            script: script.into(),
            fallback,
            delay: Duration::ZERO,
        })
    }

    pub fn slow(confidence: f64, delay: Duration) -> Box<dyn FaceTracker> {
        Box::new(Self {
            script: VecDeque::new(),
            fallback: confidence,
            delay,
        })
    }
}

impl FaceTracker for ScriptedTracker {
    fn track(
        &mut self,
        requests: &mut [TrackingRequest],
        _frame: &Frame,
    ) -> Result<(), Box<dyn std::error::Error>> {
        std::thread::sleep(self.delay);
        let confidence = match self.script.pop_front() {
            Some(Ok(c)) => c,
            Some(Err(e)) => return Err(e.into()),
            None => self.fallback,
        };
        for request in requests.iter_mut() {
            let mut bounds = request.input.bounds;
            bounds.x += 0.01;
            request.result = Some(DetectedRegion::new(bounds, confidence));
        }
        Ok(())
    }
}

#[derive(Clone, Debug)]
pub struct Applied {
    pub index: usize,
    pub camera: CameraPosition,
    pub command: OverlayCommand,
}

pub type CommandLog = Arc<Mutex<Vec<Applied>>>;

pub struct RecordingSink {
    log: CommandLog,
}

impl RecordingSink {
    pub fn new() -> (Box<dyn OverlaySink>, CommandLog) {
        let log = CommandLog::default();
        (
            Box::new(Self {
                log: Arc::clone(&log),
            }),
            log,
        )
    }
}

impl OverlaySink for RecordingSink {
    fn apply(
        &mut self,
        command: &OverlayCommand,
        _state: &OverlayState,
        frame: &Frame,
    ) -> Result<(), Box<dyn std::error::Error>> {
        self.log.lock().unwrap().push(Applied {
            index: frame.index(),
            camera: frame.camera(),
            command: command.clone(),
        });
        Ok(())
    }
}

/// Compact command names, e.g. `["create", "animate", "keep"]`.
pub fn command_names(log: &CommandLog) -> Vec<&'static str> {
    log.lock()
        .unwrap()
        .iter()
        .map(|a| match a.command {
            OverlayCommand::Create(_) => "create",
            OverlayCommand::Animate { .. } => "animate",
            OverlayCommand::Remove => "remove",
            OverlayCommand::Keep => "keep",
        })
        .collect()
}
