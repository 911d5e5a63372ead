use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use log::warn;

use crate::camera::switch_controller::CameraSwitchController;
use crate::overlay::overlay_renderer::OverlayRenderer;
use crate::pipeline::frame_processor::{FrameProcessor, ProcessorStats};

/// Configuration for one capture loop run.
#[derive(Clone, Debug, Default)]
pub struct LoopConfig {
    /// Delivered-frame counts at which the camera is switched, before the
    /// next frame is read.
    pub switch_at: Vec<usize>,
    /// Stop after this many delivered frames.
    pub max_frames: Option<usize>,
    /// Minimum time between captured frames; `None` reads as fast as possible.
    pub frame_interval: Option<Duration>,
    pub cancelled: Arc<AtomicBool>,
}

impl LoopConfig {
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Relaxed)
    }

    pub(crate) fn reached_limit(&self, delivered: usize) -> bool {
        self.max_frames.is_some_and(|max| delivered >= max)
    }
}

/// Counts for a finished run. `delivered == processed + dropped`.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct LoopStats {
    pub delivered: usize,
    pub processed: usize,
    pub dropped: usize,
    pub switches: usize,
    pub processor: ProcessorStats,
}

/// Runs capture → process → render until the active camera runs out of
/// frames, the frame limit is reached, or the run is cancelled.
///
/// This is a port. Infrastructure provides the concrete schedules
/// (threaded with frame dropping, sequential).
pub trait CaptureLoopExecutor {
    fn execute(
        &self,
        controller: Arc<CameraSwitchController>,
        processor: FrameProcessor,
        renderer: OverlayRenderer,
        config: LoopConfig,
    ) -> Result<LoopStats, Box<dyn std::error::Error>>;
}

/// Performs a scheduled switch if one is due at `delivered`.
pub(crate) fn scheduled_switch(
    controller: &CameraSwitchController,
    config: &LoopConfig,
    delivered: usize,
) {
    if !config.switch_at.contains(&delivered) {
        return;
    }
    if let Err(e) = controller.switch_camera() {
        warn!("Scheduled camera switch at frame {delivered} failed: {e}");
    }
}

/// Sleeps out the rest of the frame interval that started at `tick`.
pub(crate) fn pace(config: &LoopConfig, tick: Instant) {
    if let Some(interval) = config.frame_interval {
        if let Some(rest) = interval.checked_sub(tick.elapsed()) {
            std::thread::sleep(rest);
        }
    }
}
