use std::time::Instant;

use log::{debug, info, warn};

use crate::camera::domain::camera_position::CameraPosition;
use crate::detection::domain::face_detector::FaceDetector;
use crate::detection::domain::face_tracker::FaceTracker;
use crate::detection::domain::tracking_request::TrackingLevel;
use crate::detection::domain::tracking_state::{Regime, TrackingState};
use crate::overlay::domain::overlay_state::OverlayUpdate;
use crate::pipeline::pipeline_logger::{NullPipelineLogger, PipelineLogger};
use crate::shared::constants::TRACKING_CONFIDENCE_THRESHOLD;
use crate::shared::frame::Frame;
use crate::shared::region::DetectedRegion;

/// What happens to active tracking requests when frames start arriving from
/// a different camera.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SwitchPolicy {
    /// Drop all requests and reset the tracker; the next frame is detected.
    #[default]
    ResetTracking,
    /// Keep tracking the old regions on the new camera's frames.
    RetainTracking,
}

#[derive(Clone, Debug)]
pub struct FrameProcessorConfig {
    /// Results below this confidence mark a request final.
    pub tracking_threshold: f64,
    pub tracking_level: TrackingLevel,
    pub switch_policy: SwitchPolicy,
}

impl Default for FrameProcessorConfig {
    fn default() -> Self {
        Self {
            tracking_threshold: TRACKING_CONFIDENCE_THRESHOLD,
            tracking_level: TrackingLevel::default(),
            switch_policy: SwitchPolicy::default(),
        }
    }
}

/// Which path a frame took through the processor.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Route {
    Detection,
    Tracking,
}

/// Result of one processing pass. `frame` is the upright frame the update
/// refers to, handed on to the renderer.
#[derive(Debug)]
pub struct FrameOutcome {
    pub frame: Frame,
    pub update: OverlayUpdate,
    pub route: Route,
    pub camera_switched: bool,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ProcessorStats {
    pub frames: usize,
    pub detection_passes: usize,
    pub tracking_passes: usize,
    pub refinement_passes: usize,
    pub failures: usize,
    pub tracking_resets: usize,
}

/// The detect-or-track loop body.
///
/// With no active requests a frame goes to the detector, whose regions seed
/// new tracking requests and are handed to the tracker together with the
/// detection frame. Otherwise all requests go to the tracker in one
/// call, weak results are retired, and the refiner places the box that is
/// shown. Errors from any collaborator are logged and turn into
/// [`OverlayUpdate::Clear`]; they never escape a frame.
///
/// The processor is the only writer of its [`TrackingState`].
pub struct FrameProcessor {
    detector: Box<dyn FaceDetector>,
    tracker: Box<dyn FaceTracker>,
    refiner: Box<dyn FaceDetector>,
    config: FrameProcessorConfig,
    state: TrackingState,
    logger: Box<dyn PipelineLogger>,
    last_camera: Option<CameraPosition>,
    stats: ProcessorStats,
}

impl FrameProcessor {
    pub fn new(
        detector: Box<dyn FaceDetector>,
        tracker: Box<dyn FaceTracker>,
        refiner: Box<dyn FaceDetector>,
        config: FrameProcessorConfig,
    ) -> Self {
        Self {
            detector,
            tracker,
            refiner,
            config,
            state: TrackingState::new(),
            logger: Box::new(NullPipelineLogger),
            last_camera: None,
            stats: ProcessorStats::default(),
        }
    }

    pub fn with_logger(mut self, logger: Box<dyn PipelineLogger>) -> Self {
        self.logger = logger;
        self
    }

    pub fn config(&self) -> &FrameProcessorConfig {
        &self.config
    }

    pub fn tracking_state(&self) -> &TrackingState {
        &self.state
    }

    pub fn stats(&self) -> &ProcessorStats {
        &self.stats
    }

    pub fn logger(&self) -> &dyn PipelineLogger {
        self.logger.as_ref()
    }

    pub fn process(&mut self, frame: Frame) -> FrameOutcome {
        let camera = frame.camera();
        let camera_switched = self.last_camera.is_some_and(|last| last != camera);
        self.last_camera = Some(camera);
        if camera_switched {
            self.on_camera_switch(camera);
        }

        let frame = frame.into_upright();
        let (route, update) = match self.state.regime() {
            Regime::Searching => (Route::Detection, self.search(&frame)),
            Regime::Tracking => (Route::Tracking, self.track(&frame)),
        };

        self.stats.frames += 1;
        self.logger
            .metric("tracking_requests", self.state.len() as f64);
        self.logger.progress(self.stats.frames);

        FrameOutcome {
            frame,
            update,
            route,
            camera_switched,
        }
    }

    fn search(&mut self, frame: &Frame) -> OverlayUpdate {
        self.stats.detection_passes += 1;
        let start = Instant::now();
        let result = self.detector.detect(frame);
        self.logger.timing("detect", elapsed_ms(start));

        let regions = match result {
            Ok(regions) => regions,
            Err(e) => {
                self.fail("detection", frame, e.as_ref());
                return OverlayUpdate::Clear;
            }
        };
        let Some(best) = DetectedRegion::most_confident(&regions).cloned() else {
            return OverlayUpdate::Clear;
        };

        self.state.seed(&regions, self.config.tracking_level);
        if let Err(e) = self.tracker.start(self.state.requests(), frame) {
            self.fail("tracker start", frame, e.as_ref());
            self.state.clear();
            return OverlayUpdate::Clear;
        }
        debug!(
            "Frame {}: detected {} face(s), {} tracking started",
            frame.index(),
            regions.len(),
            self.config.tracking_level
        );
        OverlayUpdate::Show(best)
    }

    fn track(&mut self, frame: &Frame) -> OverlayUpdate {
        self.stats.tracking_passes += 1;
        for request in self.state.requests_mut() {
            request.result = None;
        }

        let start = Instant::now();
        let result = self.tracker.track(self.state.requests_mut(), frame);
        self.logger.timing("track", elapsed_ms(start));

        if let Err(e) = result {
            self.fail("tracking", frame, e.as_ref());
            return OverlayUpdate::Clear;
        }

        if self.state.advance(self.config.tracking_threshold) == 0 {
            debug!("Frame {}: all tracks lost, searching", frame.index());
            return OverlayUpdate::Unchanged;
        }
        self.refine(frame)
    }

    fn refine(&mut self, frame: &Frame) -> OverlayUpdate {
        self.stats.refinement_passes += 1;
        let start = Instant::now();
        let result = self.refiner.detect(frame);
        self.logger.timing("refine", elapsed_ms(start));

        match result {
            Ok(regions) => match regions.last() {
                Some(refined) => OverlayUpdate::Show(refined.clone()),
                None => match self.state.last_active() {
                    Some(request) => OverlayUpdate::Show(request.input.clone()),
                    None => OverlayUpdate::Unchanged,
                },
            },
            Err(e) => {
                self.fail("refinement", frame, e.as_ref());
                OverlayUpdate::Clear
            }
        }
    }

    fn on_camera_switch(&mut self, camera: CameraPosition) {
        match self.config.switch_policy {
            SwitchPolicy::ResetTracking => {
                if !self.state.is_empty() {
                    info!(
                        "Camera switched to {camera}: dropping {} tracking request(s)",
                        self.state.len()
                    );
                }
                self.state.clear();
                self.tracker.reset();
                self.stats.tracking_resets += 1;
            }
            SwitchPolicy::RetainTracking => {
                debug!(
                    "Camera switched to {camera}: keeping {} tracking request(s)",
                    self.state.len()
                );
            }
        }
    }

    fn fail(&mut self, stage: &str, frame: &Frame, error: &dyn std::error::Error) {
        self.stats.failures += 1;
        warn!("Frame {}: {stage} failed: {error}", frame.index());
    }
}

fn elapsed_ms(start: Instant) -> f64 {
    start.elapsed().as_secs_f64() * 1000.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detection::domain::tracking_request::TrackingRequest;
    use crate::shared::region::NormalizedRect;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    type DetectResult = Result<Vec<DetectedRegion>, String>;

    /// Returns scripted results in order, then empty lists.
    struct ScriptedDetector {
        script: VecDeque<DetectResult>,
        calls: Arc<AtomicUsize>,
    }

    impl FaceDetector for ScriptedDetector {
        fn detect(
            &mut self,
            _frame: &Frame,
        ) -> Result<Vec<DetectedRegion>, Box<dyn std::error::Error>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match self.script.pop_front() {
                Some(Ok(regions)) => Ok(regions),
                Some(Err(e)) => Err(e.into()),
                None => Ok(Vec::new()),
            }
        }
    }

    /// Writes one scripted confidence per request (missing entries leave no
    /// result), nudging each box to the right.
    struct ScriptedTracker {
        script: VecDeque<Result<Vec<f64>, String>>,
        start_error: Option<String>,
        calls: Arc<AtomicUsize>,
        starts: Arc<AtomicUsize>,
        resets: Arc<AtomicUsize>,
    }

    impl FaceTracker for ScriptedTracker {
        fn start(
            &mut self,
            _requests: &[TrackingRequest],
            _frame: &Frame,
        ) -> Result<(), Box<dyn std::error::Error>> {
            self.starts.fetch_add(1, Ordering::SeqCst);
            match &self.start_error {
                Some(e) => Err(e.clone().into()),
                None => Ok(()),
            }
        }

        fn track(
            &mut self,
            requests: &mut [TrackingRequest],
            _frame: &Frame,
        ) -> Result<(), Box<dyn std::error::Error>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let confidences = match self.script.pop_front() {
                Some(Ok(c)) => c,
                Some(Err(e)) => return Err(e.into()),
                None => Vec::new(),
            };
            for (request, conf) in requests.iter_mut().zip(confidences) {
                let mut bounds = request.input.bounds;
                bounds.x += 0.01;
                request.result = Some(DetectedRegion::new(bounds, conf));
            }
            Ok(())
        }

        fn reset(&mut self) {
            self.resets.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[derive(Default)]
    struct Counters {
        detect: Arc<AtomicUsize>,
        track: Arc<AtomicUsize>,
        starts: Arc<AtomicUsize>,
        refine: Arc<AtomicUsize>,
        resets: Arc<AtomicUsize>,
    }

    fn face(x: f64, confidence: f64) -> DetectedRegion {
        DetectedRegion::new(NormalizedRect::new(x, 0.3, 0.2, 0.2), confidence).with_label("face")
    }

    fn processor(
        detections: Vec<DetectResult>,
        tracking: Vec<Result<Vec<f64>, String>>,
        refinements: Vec<DetectResult>,
        config: FrameProcessorConfig,
    ) -> (FrameProcessor, Counters) {
        let counters = Counters::default();
        let tracker = ScriptedTracker {
            script: tracking.into(),
            start_error: None,
            calls: Arc::clone(&counters.track),
            starts: Arc::clone(&counters.starts),
            resets: Arc::clone(&counters.resets),
        };
        let p = FrameProcessor::new(
            Box::new(ScriptedDetector {
                script: detections.into(),
                calls: Arc::clone(&counters.detect),
            }),
            Box::new(tracker),
            Box::new(ScriptedDetector {
                script: refinements.into(),
                calls: Arc::clone(&counters.refine),
            }),
            config,
        );
        (p, counters)
    }

    fn processor_with_tracker(
        detections: Vec<DetectResult>,
        tracker: Box<dyn FaceTracker>,
        refinements: Vec<DetectResult>,
        config: FrameProcessorConfig,
    ) -> FrameProcessor {
        FrameProcessor::new(
            Box::new(ScriptedDetector {
                script: detections.into(),
                calls: Arc::default(),
            }),
            tracker,
            Box::new(ScriptedDetector {
                script: refinements.into(),
                calls: Arc::default(),
            }),
            config,
        )
    }

    fn frame(camera: CameraPosition) -> Frame {
        Frame::new(vec![0u8; 4 * 2 * 3], 4, 2, 3, 0).with_camera(camera)
    }

    fn back() -> Frame {
        frame(CameraPosition::Back)
    }

    #[test]
    fn test_no_faces_clears_and_keeps_searching() {
        let (mut p, counters) = processor(vec![], vec![], vec![], Default::default());
        for _ in 0..3 {
            let out = p.process(back());
            assert_eq!(out.route, Route::Detection);
            assert_eq!(out.update, OverlayUpdate::Clear);
        }
        assert!(p.tracking_state().is_empty());
        assert_eq!(counters.detect.load(Ordering::SeqCst), 3);
        assert_eq!(counters.track.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_detection_seeds_and_shows_most_confident() {
        let (mut p, _) = processor(
            vec![Ok(vec![face(0.1, 0.6), face(0.5, 0.9)])],
            vec![],
            vec![],
            Default::default(),
        );
        let out = p.process(back());
        assert_eq!(out.update, OverlayUpdate::Show(face(0.5, 0.9)));
        assert_eq!(p.tracking_state().len(), 2);
        assert!(p
            .tracking_state()
            .requests()
            .iter()
            .all(|r| r.level == TrackingLevel::Fast));
    }

    #[test]
    fn test_tracking_shows_last_refined_region() {
        let (mut p, counters) = processor(
            vec![Ok(vec![face(0.1, 0.9)])],
            vec![Ok(vec![0.8])],
            vec![Ok(vec![face(0.2, 0.7), face(0.3, 0.6)])],
            Default::default(),
        );
        p.process(back());
        let out = p.process(back());
        assert_eq!(out.route, Route::Tracking);
        assert_eq!(out.update, OverlayUpdate::Show(face(0.3, 0.6)));
        assert_eq!(counters.detect.load(Ordering::SeqCst), 1);
        assert_eq!(counters.refine.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_refiner_miss_falls_back_to_tracked_region() {
        let (mut p, _) = processor(
            vec![Ok(vec![face(0.1, 0.9)])],
            vec![Ok(vec![0.8])],
            vec![],
            Default::default(),
        );
        p.process(back());
        let OverlayUpdate::Show(region) = p.process(back()).update else {
            panic!("expected Show");
        };
        assert!((region.bounds.x - 0.11).abs() < 1e-9);
        assert_eq!(region.confidence, 0.8);
    }

    #[test]
    fn test_refiner_miss_with_only_final_requests_is_unchanged() {
        let (mut p, _) = processor(
            vec![Ok(vec![face(0.1, 0.9)])],
            vec![Ok(vec![0.1])],
            vec![],
            Default::default(),
        );
        p.process(back());
        assert_eq!(p.process(back()).update, OverlayUpdate::Unchanged);
    }

    #[test]
    fn test_weak_result_gets_one_more_pass_then_search_resumes() {
        let (mut p, counters) = processor(
            vec![Ok(vec![face(0.1, 0.9)])],
            vec![Ok(vec![0.1]), Ok(vec![0.9])],
            vec![],
            Default::default(),
        );
        p.process(back());
        p.process(back());
        assert!(p.tracking_state().requests()[0].is_last_frame);

        let out = p.process(back());
        assert_eq!(out.route, Route::Tracking);
        assert_eq!(out.update, OverlayUpdate::Unchanged);
        assert!(p.tracking_state().is_empty());

        assert_eq!(p.process(back()).route, Route::Detection);
        assert_eq!(counters.track.load(Ordering::SeqCst), 2);
        assert_eq!(counters.detect.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_detector_error_clears_and_continues() {
        let (mut p, _) = processor(
            vec![Err("model crashed".into()), Ok(vec![face(0.1, 0.9)])],
            vec![],
            vec![],
            Default::default(),
        );
        assert_eq!(p.process(back()).update, OverlayUpdate::Clear);
        assert!(matches!(p.process(back()).update, OverlayUpdate::Show(_)));
        assert_eq!(p.stats().failures, 1);
    }

    #[test]
    fn test_tracker_error_clears_and_keeps_state() {
        let (mut p, _) = processor(
            vec![Ok(vec![face(0.1, 0.9)])],
            vec![Err("lost device".into()), Ok(vec![0.9])],
            vec![Ok(vec![face(0.2, 0.8)])],
            Default::default(),
        );
        p.process(back());
        let before = p.tracking_state().requests()[0].input.clone();

        assert_eq!(p.process(back()).update, OverlayUpdate::Clear);
        assert_eq!(p.tracking_state().len(), 1);
        assert_eq!(p.tracking_state().requests()[0].input, before);
        assert!(!p.tracking_state().requests()[0].is_last_frame);

        assert_eq!(p.process(back()).update, OverlayUpdate::Show(face(0.2, 0.8)));
    }

    #[test]
    fn test_refiner_error_clears() {
        let (mut p, _) = processor(
            vec![Ok(vec![face(0.1, 0.9)])],
            vec![Ok(vec![0.9])],
            vec![Err("refiner failed".into())],
            Default::default(),
        );
        p.process(back());
        assert_eq!(p.process(back()).update, OverlayUpdate::Clear);
        assert_eq!(p.tracking_state().len(), 1);
    }

    #[test]
    fn test_switch_with_reset_policy_detects_next_frame() {
        let (mut p, counters) = processor(
            vec![Ok(vec![face(0.1, 0.9)])],
            vec![Ok(vec![0.9])],
            vec![],
            Default::default(),
        );
        p.process(back());
        let out = p.process(frame(CameraPosition::Front));
        assert!(out.camera_switched);
        assert_eq!(out.route, Route::Detection);
        assert_eq!(counters.resets.load(Ordering::SeqCst), 1);
        assert_eq!(counters.track.load(Ordering::SeqCst), 0);
        assert_eq!(p.stats().tracking_resets, 1);
    }

    #[test]
    fn test_switch_with_retain_policy_keeps_tracking() {
        let config = FrameProcessorConfig {
            switch_policy: SwitchPolicy::RetainTracking,
            ..Default::default()
        };
        let (mut p, counters) =
            processor(vec![Ok(vec![face(0.1, 0.9)])], vec![Ok(vec![0.9])], vec![], config);
        p.process(back());
        let out = p.process(frame(CameraPosition::Front));
        assert!(out.camera_switched);
        assert_eq!(out.route, Route::Tracking);
        assert!(matches!(out.update, OverlayUpdate::Show(_)));
        assert_eq!(counters.resets.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_accurate_level_is_used_for_seeds() {
        let config = FrameProcessorConfig {
            tracking_level: TrackingLevel::Accurate,
            ..Default::default()
        };
        let (mut p, _) = processor(vec![Ok(vec![face(0.1, 0.9)])], vec![], vec![], config);
        p.process(back());
        assert_eq!(p.tracking_state().requests()[0].level, TrackingLevel::Accurate);
    }

    #[test]
    fn test_frames_come_out_upright() {
        use crate::shared::orientation::Orientation;
        let (mut p, _) = processor(vec![], vec![], vec![], Default::default());
        let out = p.process(back().with_orientation(Orientation::Right));
        assert_eq!(out.frame.orientation(), Orientation::Up);
        assert_eq!((out.frame.width(), out.frame.height()), (2, 4));
        assert_eq!(p.stats().frames, 1);
    }

    #[test]
    fn test_tracker_starts_on_the_detection_frame() {
        let (mut p, counters) = processor(
            vec![Ok(vec![face(0.1, 0.9)])],
            vec![Ok(vec![0.9])],
            vec![],
            Default::default(),
        );
        p.process(back());
        assert_eq!(counters.starts.load(Ordering::SeqCst), 1);
        assert_eq!(counters.track.load(Ordering::SeqCst), 0);

        p.process(back());
        assert_eq!(counters.starts.load(Ordering::SeqCst), 1);
        assert_eq!(counters.track.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_tracker_start_error_clears_and_searches_again() {
        let tracker = ScriptedTracker {
            script: VecDeque::new(),
            start_error: Some("no texture".into()),
            calls: Arc::default(),
            starts: Arc::default(),
            resets: Arc::default(),
        };
        let mut p = processor_with_tracker(
            vec![Ok(vec![face(0.1, 0.9)])],
            Box::new(tracker),
            vec![],
            Default::default(),
        );
        assert_eq!(p.process(back()).update, OverlayUpdate::Clear);
        assert!(p.tracking_state().is_empty());
        assert_eq!(p.stats().failures, 1);
        assert_eq!(p.process(back()).route, Route::Detection);
    }

    mod with_template_tracker {
        use super::*;
        use crate::detection::infrastructure::template_tracker::TemplateTracker;
        use approx::assert_relative_eq;
        use rstest::rstest;

        const W: u32 = 120;
        const H: u32 = 100;
        const SIDE: u32 = 24;

        /// Textured square on black, top-left at `(px, py)`.
        fn scene(px: u32, py: u32, index: usize) -> Frame {
            let mut data = vec![0u8; (W * H * 3) as usize];
            for y in 0..SIDE {
                for x in 0..SIDE {
                    let v = 120.0
                        + 70.0 * (0.35 * x as f64).sin() * (0.3 * y as f64).cos()
                        + 1.5 * x as f64;
                    let idx = (((py + y) * W + (px + x)) * 3) as usize;
                    data[idx..idx + 3].fill(v.clamp(0.0, 255.0) as u8);
                }
            }
            Frame::new(data, W, H, 3, index).with_camera(CameraPosition::Back)
        }

        fn patch(px: u32, py: u32) -> NormalizedRect {
            NormalizedRect::from_pixel_box(
                [px as f64, py as f64, (px + SIDE) as f64, (py + SIDE) as f64],
                W,
                H,
            )
        }

        #[rstest]
        #[case::fast(TrackingLevel::Fast)]
        #[case::accurate(TrackingLevel::Accurate)]
        fn test_overlay_follows_face_moving_after_detection(#[case] level: TrackingLevel) {
            let config = FrameProcessorConfig {
                tracking_level: level,
                ..Default::default()
            };
            let detected = DetectedRegion::new(patch(40, 30), 0.9).with_label("face");
            let mut p = processor_with_tracker(
                vec![Ok(vec![detected.clone()])],
                Box::new(TemplateTracker::default()),
                vec![],
                config,
            );

            let out = p.process(scene(40, 30, 0));
            assert_eq!(out.update, OverlayUpdate::Show(detected));

            for (i, (px, py)) in [(45, 33), (50, 36), (54, 38)].into_iter().enumerate() {
                let out = p.process(scene(px, py, i + 1));
                assert_eq!(out.route, Route::Tracking);
                let OverlayUpdate::Show(shown) = out.update else {
                    panic!("frame {}: expected Show, got {:?}", i + 1, out.update);
                };
                assert!(shown.confidence > 0.95, "confidence {}", shown.confidence);
                assert_relative_eq!(shown.bounds.x, patch(px, py).x, epsilon = 1e-9);
                assert_relative_eq!(shown.bounds.y, patch(px, py).y, epsilon = 1e-9);
                assert_eq!(shown.label.as_deref(), Some("face"));
            }
            assert_eq!(p.stats().detection_passes, 1);
            assert_eq!(p.stats().tracking_passes, 3);
        }

        #[test]
        fn test_face_leaving_the_frame_returns_to_detection() {
            let detected = DetectedRegion::new(patch(40, 30), 0.9);
            let mut p = processor_with_tracker(
                vec![Ok(vec![detected])],
                Box::new(TemplateTracker::default()),
                vec![],
                Default::default(),
            );
            let blank = || Frame::new(vec![0u8; (W * H * 3) as usize], W, H, 3, 0);

            p.process(scene(40, 30, 0));
            assert_eq!(p.process(blank()).update, OverlayUpdate::Unchanged);
            assert_eq!(p.process(blank()).update, OverlayUpdate::Unchanged);
            assert!(p.tracking_state().is_empty());
            assert_eq!(p.process(blank()).route, Route::Detection);
        }
    }
}
