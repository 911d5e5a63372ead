mod json_overlay_sink;
mod settings;

use std::io::BufRead;
use std::path::{Path, PathBuf};
use std::process;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;

use face_overlay_core::camera::capture_session::CaptureSession;
use face_overlay_core::camera::domain::camera_input::CameraInput;
use face_overlay_core::camera::domain::camera_position::CameraPosition;
use face_overlay_core::camera::infrastructure::image_sequence_input::ImageSequenceInput;
use face_overlay_core::camera::infrastructure::video_file_input::VideoFileInput;
use face_overlay_core::camera::switch_controller::CameraSwitchController;
use face_overlay_core::detection::domain::face_detector::FaceDetector;
use face_overlay_core::detection::infrastructure::model_resolver;
use face_overlay_core::detection::infrastructure::onnx_blazeface_detector::OnnxBlazefaceDetector;
use face_overlay_core::detection::infrastructure::template_tracker::{
    TemplateTracker, DEFAULT_SEARCH_SCALE,
};
use face_overlay_core::overlay::domain::overlay_sink::OverlaySink;
use face_overlay_core::overlay::infrastructure::annotating_frame_sink::AnnotatingFrameSink;
use face_overlay_core::overlay::infrastructure::fan_out_sink::FanOutSink;
use face_overlay_core::overlay::infrastructure::log_overlay_sink::LogOverlaySink;
use face_overlay_core::overlay::overlay_renderer::OverlayRenderer;
use face_overlay_core::pipeline::capture_loop::{CaptureLoopExecutor, LoopConfig};
use face_overlay_core::pipeline::frame_processor::{FrameProcessor, FrameProcessorConfig};
use face_overlay_core::pipeline::infrastructure::sequential_capture_loop::SequentialCaptureLoop;
use face_overlay_core::pipeline::infrastructure::threaded_capture_loop::ThreadedCaptureLoop;
use face_overlay_core::pipeline::pipeline_logger::StdoutPipelineLogger;
use face_overlay_core::shared::constants::BLAZEFACE_MODEL_NAME;
use face_overlay_core::shared::orientation::Orientation;

use crate::json_overlay_sink::JsonLinesSink;
use crate::settings::{LabelMode, Settings, SwitchMode, TrackingMode};

/// Live face overlay over back/front camera feeds.
#[derive(Parser)]
#[command(name = "face-overlay")]
struct Cli {
    /// Back camera source: a video file or a directory of images.
    #[arg(long)]
    back: PathBuf,

    /// Front camera source (defaults to the back source).
    #[arg(long)]
    front: Option<PathBuf>,

    /// EXIF orientation (1-8) of back camera frames. Defaults to upright, or
    /// the stream rotation for videos.
    #[arg(long, value_parser = parse_orientation)]
    back_orientation: Option<Orientation>,

    /// EXIF orientation (1-8) of front camera frames, e.g. 5 for a mirrored
    /// portrait sensor.
    #[arg(long, value_parser = parse_orientation)]
    front_orientation: Option<Orientation>,

    /// BlazeFace ONNX model (resolved from the cache directory when omitted).
    #[arg(long)]
    model: Option<PathBuf>,

    /// Download URL used when the model is not cached.
    #[arg(long)]
    model_url: Option<String>,

    /// Settings file (defaults to the platform config directory).
    #[arg(long)]
    config: Option<PathBuf>,

    /// Detection confidence threshold (0.0-1.0).
    #[arg(long)]
    confidence: Option<f64>,

    /// Confidence threshold for the refinement detector (0.0-1.0).
    #[arg(long)]
    refine_confidence: Option<f64>,

    /// Tracking results below this confidence end a track (0.0-1.0).
    #[arg(long)]
    tracking_threshold: Option<f64>,

    #[arg(long, value_enum)]
    tracking_level: Option<TrackingMode>,

    /// What happens to active tracks when the camera changes.
    #[arg(long, value_enum)]
    switch_policy: Option<SwitchMode>,

    #[arg(long, value_enum)]
    label_style: Option<LabelMode>,

    /// Name shown by the tracking label style.
    #[arg(long)]
    label_name: Option<String>,

    /// Switch camera after these many delivered frames (comma-separated).
    #[arg(long, value_delimiter = ',')]
    switch_at: Vec<usize>,

    /// Run capture, processing and rendering on separate threads at --fps,
    /// dropping frames that arrive while processing is busy.
    #[arg(long)]
    realtime: bool,

    /// Capture rate for --realtime.
    #[arg(long)]
    fps: Option<f64>,

    /// Stop after this many delivered frames.
    #[arg(long)]
    max_frames: Option<usize>,

    /// Restart image directories from the first image when they run out.
    #[arg(long)]
    loop_images: bool,

    /// Mirror overlay boxes horizontally.
    #[arg(long)]
    mirror_preview: bool,

    /// Tracker search window as a fraction of the box size.
    #[arg(long, default_value_t = DEFAULT_SEARCH_SCALE)]
    search_scale: f64,

    /// Write annotated frames as PNGs to this directory.
    #[arg(long)]
    output_dir: Option<PathBuf>,

    /// Write overlay events as JSON lines to this file.
    #[arg(long)]
    events: Option<PathBuf>,

    /// Read commands from stdin: `s` switches camera, `q` stops.
    #[arg(long)]
    interactive: bool,
}

impl Cli {
    /// Command-line flags take precedence over the settings file.
    fn apply_to(&self, mut settings: Settings) -> Settings {
        if let Some(v) = self.confidence {
            settings.confidence = v;
        }
        if let Some(v) = self.refine_confidence {
            settings.refine_confidence = v;
        }
        if let Some(v) = self.tracking_threshold {
            settings.tracking_threshold = v;
        }
        if let Some(v) = self.tracking_level {
            settings.tracking_level = v;
        }
        if let Some(v) = self.switch_policy {
            settings.switch_policy = v;
        }
        if let Some(v) = self.label_style {
            settings.label_style = v;
        }
        if let Some(v) = &self.label_name {
            settings.label_name = v.clone();
        }
        if let Some(v) = &self.model_url {
            settings.model_url = Some(v.clone());
        }
        if let Some(v) = self.fps {
            settings.fps = v;
        }
        if self.mirror_preview {
            settings.mirror_preview = true;
        }
        settings
    }
}

fn main() {
    env_logger::init();

    if let Err(e) = run() {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let settings = cli.apply_to(Settings::load(cli.config.as_deref())?);
    settings.validate()?;
    validate(&cli)?;

    let model_path = resolve_model(&cli, &settings)?;
    let detector: Box<dyn FaceDetector> =
        Box::new(OnnxBlazefaceDetector::new(&model_path, settings.confidence)?);
    let refiner: Box<dyn FaceDetector> = Box::new(OnnxBlazefaceDetector::new(
        &model_path,
        settings.refine_confidence,
    )?);
    let tracker = Box::new(TemplateTracker::new(cli.search_scale));

    let front_source = cli.front.as_deref().unwrap_or(&cli.back);
    let session = CaptureSession::new(
        open_input(
            &cli.back,
            CameraPosition::Back,
            cli.back_orientation,
            cli.loop_images,
        ),
        open_input(
            front_source,
            CameraPosition::Front,
            cli.front_orientation,
            cli.loop_images,
        ),
    )?;
    let controller = Arc::new(CameraSwitchController::new(session));

    let processor = FrameProcessor::new(
        detector,
        tracker,
        refiner,
        FrameProcessorConfig {
            tracking_threshold: settings.tracking_threshold,
            tracking_level: settings.tracking_level.into(),
            switch_policy: settings.switch_policy.into(),
        },
    )
    .with_logger(Box::new(StdoutPipelineLogger::default()));

    let renderer = OverlayRenderer::new(build_sink(&cli)?)
        .with_labels(settings.label_style())
        .with_mirroring(settings.mirror_preview);

    let config = LoopConfig {
        switch_at: cli.switch_at.clone(),
        max_frames: cli.max_frames,
        frame_interval: cli
            .realtime
            .then(|| Duration::from_secs_f64(1.0 / settings.fps)),
        ..Default::default()
    };

    if cli.interactive {
        spawn_stdin_commands(Arc::clone(&controller), &config);
    }

    let executor: Box<dyn CaptureLoopExecutor> = if cli.realtime {
        Box::new(ThreadedCaptureLoop::new())
    } else {
        Box::new(SequentialCaptureLoop::new())
    };
    let result = executor.execute(Arc::clone(&controller), processor, renderer, config);
    controller.stop()?;
    let stats = result?;

    log::info!(
        "{} frames delivered, {} processed, {} dropped, {} camera switches",
        stats.delivered,
        stats.processed,
        stats.dropped,
        stats.switches
    );
    Ok(())
}

fn resolve_model(cli: &Cli, settings: &Settings) -> Result<PathBuf, Box<dyn std::error::Error>> {
    if let Some(path) = &cli.model {
        return Ok(path.clone());
    }
    log::info!("Resolving model: {BLAZEFACE_MODEL_NAME}");
    let path = model_resolver::resolve(
        BLAZEFACE_MODEL_NAME,
        settings.model_url.as_deref(),
        None,
        Some(Box::new(download_progress)),
    )?;
    Ok(path)
}

fn open_input(
    source: &Path,
    position: CameraPosition,
    orientation: Option<Orientation>,
    looping: bool,
) -> Box<dyn CameraInput> {
    if source.is_dir() {
        let input = ImageSequenceInput::new(source, position).with_looping(looping);
        match orientation {
            Some(o) => Box::new(input.with_orientation(o)),
            None => Box::new(input),
        }
    } else {
        let input = VideoFileInput::new(source, position);
        match orientation {
            Some(o) => Box::new(input.with_orientation(o)),
            None => Box::new(input),
        }
    }
}

fn parse_orientation(value: &str) -> Result<Orientation, String> {
    value
        .parse::<u8>()
        .ok()
        .and_then(Orientation::from_exif)
        .ok_or_else(|| format!("expected an EXIF orientation between 1 and 8, got '{value}'"))
}

fn build_sink(cli: &Cli) -> Result<Box<dyn OverlaySink>, Box<dyn std::error::Error>> {
    let mut sinks: Vec<Box<dyn OverlaySink>> = vec![Box::new(LogOverlaySink::new())];
    if let Some(dir) = &cli.output_dir {
        sinks.push(Box::new(AnnotatingFrameSink::new(dir)?));
    }
    if let Some(path) = &cli.events {
        sinks.push(Box::new(JsonLinesSink::create(path)?));
    }
    Ok(Box::new(FanOutSink::new(sinks)))
}

/// Reads switch/quit commands from stdin on a detached thread.
fn spawn_stdin_commands(controller: Arc<CameraSwitchController>, config: &LoopConfig) {
    let cancelled = Arc::clone(&config.cancelled);
    eprintln!("Type 's' + Enter to switch camera, 'q' + Enter to stop");
    std::thread::spawn(move || {
        for line in std::io::stdin().lock().lines() {
            let Ok(line) = line else { break };
            match line.trim() {
                "s" => match controller.switch_camera() {
                    Ok(position) => log::info!("Switched to {position} camera"),
                    Err(e) => log::warn!("Camera switch refused: {e}"),
                },
                "q" => {
                    cancelled.store(true, Ordering::Relaxed);
                    break;
                }
                "" => {}
                other => log::warn!("Unknown command '{other}'"),
            }
        }
    });
}

fn validate(cli: &Cli) -> Result<(), Box<dyn std::error::Error>> {
    for source in std::iter::once(&cli.back).chain(cli.front.as_ref()) {
        if !source.exists() {
            return Err(format!("Camera source not found: {}", source.display()).into());
        }
    }
    if let Some(model) = &cli.model {
        if !model.is_file() {
            return Err(format!("Model file not found: {}", model.display()).into());
        }
    }
    if !(cli.search_scale > 0.0 && cli.search_scale <= 4.0) {
        return Err(format!(
            "Search scale must be in (0.0, 4.0], got {}",
            cli.search_scale
        )
        .into());
    }
    if cli.max_frames == Some(0) {
        return Err("--max-frames must be at least 1".into());
    }
    Ok(())
}

fn download_progress(downloaded: u64, total: u64) {
    if total > 0 {
        let pct = (downloaded as f64 / total as f64 * 100.0) as u32;
        eprint!("\rDownloading face detection model... {pct}%");
    } else {
        eprint!("\rDownloading face detection model... {downloaded} bytes");
    }
}
