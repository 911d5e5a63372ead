use std::sync::Arc;
use std::time::Instant;

use log::info;

use crate::camera::switch_controller::CameraSwitchController;
use crate::overlay::overlay_renderer::OverlayRenderer;
use crate::pipeline::capture_loop::{pace, scheduled_switch, CaptureLoopExecutor, LoopConfig, LoopStats};
use crate::pipeline::frame_processor::FrameProcessor;

/// Runs capture, processing and rendering inline on the calling thread.
///
/// Every delivered frame is processed, so runs are deterministic.
#[derive(Default)]
pub struct SequentialCaptureLoop;

impl SequentialCaptureLoop {
    pub fn new() -> Self {
        Self
    }
}

impl CaptureLoopExecutor for SequentialCaptureLoop {
    fn execute(
        &self,
        controller: Arc<CameraSwitchController>,
        mut processor: FrameProcessor,
        mut renderer: OverlayRenderer,
        config: LoopConfig,
    ) -> Result<LoopStats, Box<dyn std::error::Error>> {
        let switches_before = controller.switch_count();
        let mut stats = LoopStats::default();

        let result = loop {
            if config.is_cancelled() || config.reached_limit(stats.delivered) {
                break Ok(());
            }
            let tick = Instant::now();
            scheduled_switch(&controller, &config, stats.delivered);

            let frame = match controller.next_frame() {
                Ok(Some(frame)) => frame,
                Ok(None) => break Ok(()),
                Err(e) => break Err(e),
            };
            stats.delivered += 1;

            let outcome = processor.process(frame);
            stats.processed += 1;
            renderer.render(&outcome.update, &outcome.frame);

            pace(&config, tick);
        };

        renderer.finish();
        processor.logger().summary();
        stats.switches = controller.switch_count() - switches_before;
        stats.processor = processor.stats().clone();
        info!(
            "Frame loop finished: {} delivered, {} processed, {} switches",
            stats.delivered, stats.processed, stats.switches
        );

        result?;
        Ok(stats)
    }
}
