use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Instant;

use crossbeam_channel::{Receiver, Sender, TrySendError};
use log::{debug, info};

use crate::camera::switch_controller::CameraSwitchController;
use crate::overlay::overlay_renderer::OverlayRenderer;
use crate::pipeline::capture_loop::{pace, scheduled_switch, CaptureLoopExecutor, LoopConfig, LoopStats};
use crate::pipeline::frame_processor::{FrameOutcome, FrameProcessor};
use crate::shared::frame::Frame;

/// Runs the loop on three threads: capture (the caller) → processing → render.
///
/// Capture hands frames to the processing thread through a zero-capacity
/// channel. A frame is accepted only while the processor is waiting for
/// one; anything captured during a pass is dropped instead of queued, so
/// the overlay never lags behind the camera. Outcomes reach the render
/// thread over an unbounded channel.
#[derive(Default)]
pub struct ThreadedCaptureLoop;

impl ThreadedCaptureLoop {
    pub fn new() -> Self {
        Self
    }
}

impl CaptureLoopExecutor for ThreadedCaptureLoop {
    fn execute(
        &self,
        controller: Arc<CameraSwitchController>,
        processor: FrameProcessor,
        renderer: OverlayRenderer,
        config: LoopConfig,
    ) -> Result<LoopStats, Box<dyn std::error::Error>> {
        let switches_before = controller.switch_count();

        let (frame_tx, frame_rx) = crossbeam_channel::bounded::<Frame>(0);
        let (render_tx, render_rx) = crossbeam_channel::unbounded::<FrameOutcome>();

        let process_handle = spawn_processor(processor, frame_rx, render_tx);
        let render_handle = spawn_renderer(renderer, render_rx);

        let mut stats = LoopStats::default();
        let capture_error = run_capture(&controller, &frame_tx, &config, &mut stats);
        drop(frame_tx);

        let processor = join_threads(process_handle, render_handle, capture_error)?;

        processor.logger().summary();
        stats.processed = processor.stats().frames;
        stats.processor = processor.stats().clone();
        stats.switches = controller.switch_count() - switches_before;
        info!(
            "Frame loop finished: {} delivered, {} processed, {} dropped, {} switches",
            stats.delivered, stats.processed, stats.dropped, stats.switches
        );
        Ok(stats)
    }
}

fn spawn_processor(
    mut processor: FrameProcessor,
    frame_rx: Receiver<Frame>,
    render_tx: Sender<FrameOutcome>,
) -> JoinHandle<FrameProcessor> {
    std::thread::spawn(move || {
        for frame in frame_rx {
            let outcome = processor.process(frame);
            if render_tx.send(outcome).is_err() {
                break;
            }
        }
        processor
    })
}

fn spawn_renderer(
    mut renderer: OverlayRenderer,
    render_rx: Receiver<FrameOutcome>,
) -> JoinHandle<OverlayRenderer> {
    std::thread::spawn(move || {
        for outcome in render_rx {
            renderer.render(&outcome.update, &outcome.frame);
        }
        renderer.finish();
        renderer
    })
}

/// Capture loop on the calling thread. Returns the error that ended it, if any.
fn run_capture(
    controller: &CameraSwitchController,
    frame_tx: &Sender<Frame>,
    config: &LoopConfig,
    stats: &mut LoopStats,
) -> Option<Box<dyn std::error::Error>> {
    loop {
        if config.is_cancelled() || config.reached_limit(stats.delivered) {
            return None;
        }
        let tick = Instant::now();
        scheduled_switch(controller, config, stats.delivered);

        let frame = match controller.next_frame() {
            Ok(Some(frame)) => frame,
            Ok(None) => return None,
            Err(e) => return Some(e.into()),
        };
        stats.delivered += 1;

        match frame_tx.try_send(frame) {
            Ok(()) => {}
            Err(TrySendError::Full(frame)) => {
                stats.dropped += 1;
                debug!("Dropped frame {} while processing", frame.index());
            }
            Err(TrySendError::Disconnected(_)) => {
                stats.dropped += 1;
                return Some("Processing thread stopped unexpectedly".into());
            }
        }

        pace(config, tick);
    }
}

/// Joins the worker threads and coalesces the first error encountered.
fn join_threads(
    process_handle: JoinHandle<FrameProcessor>,
    render_handle: JoinHandle<OverlayRenderer>,
    mut first_error: Option<Box<dyn std::error::Error>>,
) -> Result<FrameProcessor, Box<dyn std::error::Error>> {
    fn set_if_none(slot: &mut Option<Box<dyn std::error::Error>>, err: Box<dyn std::error::Error>) {
        if slot.is_none() {
            *slot = Some(err);
        }
    }

    let processor = match process_handle.join() {
        Ok(p) => Some(p),
        Err(_) => {
            set_if_none(&mut first_error, "Processing thread panicked".into());
            None
        }
    };

    if render_handle.join().is_err() {
        set_if_none(&mut first_error, "Render thread panicked".into());
    }

    match (first_error, processor) {
        (Some(e), _) => Err(e),
        (None, Some(p)) => Ok(p),
        (None, None) => Err("Processing thread panicked".into()),
    }
}
