use std::collections::HashMap;
use std::time::Instant;

/// Observer for per-frame loop events.
///
/// The frame processor reports stage timings and metrics here so callers can
/// choose where they go (log output, tests, nothing).
pub trait PipelineLogger: Send {
    /// Another frame finished processing.
    fn progress(&mut self, processed: usize);

    /// How long a named stage (`detect`, `track`, `refine`) took for one frame.
    fn timing(&mut self, stage: &str, duration_ms: f64);

    /// Point-in-time value such as the number of tracking requests.
    fn metric(&mut self, name: &str, value: f64);

    /// End-of-run report. Default: no-op.
    fn summary(&self) {}
}

pub struct NullPipelineLogger;

impl PipelineLogger for NullPipelineLogger {
    fn progress(&mut self, _processed: usize) {}
    fn timing(&mut self, _stage: &str, _duration_ms: f64) {}
    fn metric(&mut self, _name: &str, _value: f64) {}
}

/// Running count, sum and maximum of one timing or metric.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Aggregate {
    pub count: usize,
    pub sum: f64,
    pub max: f64,
}

impl Aggregate {
    fn record(&mut self, value: f64) {
        self.max = if self.count == 0 {
            value
        } else {
            self.max.max(value)
        };
        self.count += 1;
        self.sum += value;
    }

    pub fn mean(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.sum / self.count as f64
        }
    }
}

/// Aggregates timings and metrics and logs a throughput summary at the end.
///
/// Memory stays constant per stage name however long the loop runs. Progress
/// lines are throttled to one every `throttle_frames` frames.
pub struct StdoutPipelineLogger {
    throttle_frames: usize,
    timings: HashMap<String, Aggregate>,
    metrics: HashMap<String, Aggregate>,
    start_time: Instant,
    processed: usize,
}

impl StdoutPipelineLogger {
    pub fn new(throttle_frames: usize) -> Self {
        Self {
            throttle_frames: throttle_frames.max(1),
            timings: HashMap::new(),
            metrics: HashMap::new(),
            start_time: Instant::now(),
            processed: 0,
        }
    }

    pub fn processed(&self) -> usize {
        self.processed
    }

    /// Formatted summary, or `None` if nothing was recorded.
    pub fn summary_string(&self) -> Option<String> {
        if self.timings.is_empty() && self.metrics.is_empty() {
            return None;
        }

        let elapsed_ms = self.start_time.elapsed().as_secs_f64() * 1000.0;
        let frames = self.processed;
        let mut lines = vec![format!(
            "Frame loop summary ({frames} frames processed, {:.1}s total):",
            elapsed_ms / 1000.0
        )];

        let mut stages: Vec<_> = self.timings.iter().collect();
        stages.sort_by(|a, b| a.0.cmp(b.0));
        for (stage, agg) in stages {
            lines.push(format!(
                "  {stage:8}: {:5} runs  avg {:6.1}ms  max {:6.1}ms  total {:7.0}ms",
                agg.count,
                agg.mean(),
                agg.max,
                agg.sum,
            ));
        }

        let mut metrics: Vec<_> = self.metrics.iter().collect();
        metrics.sort_by(|a, b| a.0.cmp(b.0));
        for (name, agg) in metrics {
            lines.push(format!("  {name}: avg {:.1}", agg.mean()));
        }

        if frames > 0 && elapsed_ms > 0.0 {
            let fps = frames as f64 / (elapsed_ms / 1000.0);
            lines.push(format!("  Throughput: {fps:.1} fps"));
        }

        Some(lines.join("\n"))
    }

    pub fn timings_for(&self, stage: &str) -> Option<&Aggregate> {
        self.timings.get(stage)
    }

    pub fn metrics_for(&self, name: &str) -> Option<&Aggregate> {
        self.metrics.get(name)
    }
}

impl Default for StdoutPipelineLogger {
    fn default() -> Self {
        Self::new(30)
    }
}

impl PipelineLogger for StdoutPipelineLogger {
    fn progress(&mut self, processed: usize) {
        self.processed = processed;
        if processed % self.throttle_frames == 0 {
            log::info!("Processed {processed} frames");
        }
    }

    fn timing(&mut self, stage: &str, duration_ms: f64) {
        record(&mut self.timings, stage, duration_ms);
    }

    fn metric(&mut self, name: &str, value: f64) {
        record(&mut self.metrics, name, value);
    }

    fn summary(&self) {
        if let Some(text) = self.summary_string() {
            log::info!("\n\n{text}");
        }
    }
}

/// Looks the key up before allocating, since names repeat every frame.
fn record(map: &mut HashMap<String, Aggregate>, key: &str, value: f64) {
    match map.get_mut(key) {
        Some(agg) => agg.record(value),
        None => map.entry(key.to_string()).or_default().record(value),
    }
}
