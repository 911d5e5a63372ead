use std::collections::{HashMap, HashSet};

use ndarray::{s, Array2};

use crate::detection::domain::face_tracker::FaceTracker;
use crate::detection::domain::tracking_request::{TrackingLevel, TrackingRequest};
use crate::detection::infrastructure::math::{downsample_half, to_grayscale, Template};
use crate::shared::frame::Frame;
use crate::shared::region::{DetectedRegion, NormalizedRect};

/// Search radius as a fraction of the larger box side at the coarsest level.
pub const DEFAULT_SEARCH_SCALE: f64 = 0.5;

const MIN_SEARCH_RADIUS: isize = 4;

/// Boxes smaller than this (in pixels) cannot be tracked.
const MIN_TEMPLATE_SIDE: usize = 3;

/// Larger boxes are first matched on a downsampled level where their longer
/// side fits within this many pixels.
const COARSE_SIDE: usize = 32;

const MAX_PYRAMID_LEVELS: usize = 6;

/// Search radius when moving one pyramid level down.
const REFINE_RADIUS: isize = 2;

/// Matches at or above this score refresh the template.
const TEMPLATE_UPDATE_MIN_SCORE: f32 = 0.8;
const TEMPLATE_UPDATE_RATE: f32 = 0.2;

/// Short-horizon tracker based on normalized cross-correlation.
///
/// `start` cuts a grayscale template for each request from the frame it was
/// detected in. On every pass the template is matched inside a window
/// around the request's input box, and the best correlation score is the
/// result confidence.
///
/// Boxes wider than [`COARSE_SIDE`] are matched coarse-to-fine on an image
/// pyramid: the window search runs on the level where the box is small, and
/// each finer level only refines the position by a couple of pixels. The work
/// per pass therefore grows with the box area, not with its square. `Fast`
/// requests search the coarse window on a 2 px grid before refining;
/// `Accurate` requests search it exhaustively.
pub struct TemplateTracker {
    tracks: HashMap<u64, Track>,
    search_scale: f64,
    comparisons: usize,
}

impl TemplateTracker {
    pub fn new(search_scale: f64) -> Self {
        Self {
            tracks: HashMap::new(),
            search_scale: search_scale.max(0.0),
            comparisons: 0,
        }
    }

    /// Number of requests with live motion state.
    pub fn active_tracks(&self) -> usize {
        self.tracks.len()
    }

    /// Pixel comparisons spent by the most recent `track` call.
    pub fn last_pass_comparisons(&self) -> usize {
        self.comparisons
    }

    fn track_one(&mut self, request: &TrackingRequest, pyramid: &Pyramid) -> DetectedRegion {
        let (fw, fh) = pyramid.frame_size();
        let Some(bbox) = PixelBox::from_rect(&request.input.bounds, fw, fh) else {
            self.tracks.remove(&request.id());
            return lost(request);
        };

        let track = self
            .tracks
            .entry(request.id())
            .or_insert_with(|| Track::new(pyramid, bbox));
        if !track.fits(pyramid, bbox) {
            *track = Track::new(pyramid, bbox);
        }

        let cost = &mut self.comparisons;
        let top = track.top();
        let start = bbox.at_level(top);
        let radius = MIN_SEARCH_RADIUS
            .max((start.w.max(start.h) as f64 * self.search_scale).round() as isize);
        let coarse = pyramid.level(top);
        let (mut best, mut score) = match request.level {
            TrackingLevel::Accurate => search(&track.levels[top], coarse, start, radius, 1, cost),
            TrackingLevel::Fast => {
                let (grid, _) = search(&track.levels[top], coarse, start, radius, 2, cost);
                search(&track.levels[top], coarse, grid, 1, 1, cost)
            }
        };
        for k in (0..top).rev() {
            let level = pyramid.level(k);
            let (th, tw) = track.levels[k].dim();
            let center = PixelBox {
                x: best.x * 2,
                y: best.y * 2,
                w: tw,
                h: th,
            }
            .clamped(level);
            (best, score) = search(&track.levels[k], level, center, REFINE_RADIUS, 1, cost);
        }

        if score >= TEMPLATE_UPDATE_MIN_SCORE {
            for (k, template) in track.levels.iter_mut().enumerate() {
                template.blend(best.at_level(k).view(pyramid.level(k)), TEMPLATE_UPDATE_RATE);
            }
        }

        let bounds = NormalizedRect::from_pixel_box(best.to_f64(), fw as u32, fh as u32);
        DetectedRegion {
            bounds,
            confidence: score.max(0.0) as f64,
            label: request.input.label.clone(),
        }
    }
}

impl Default for TemplateTracker {
    fn default() -> Self {
        Self::new(DEFAULT_SEARCH_SCALE)
    }
}

impl FaceTracker for TemplateTracker {
    fn start(
        &mut self,
        requests: &[TrackingRequest],
        frame: &Frame,
    ) -> Result<(), Box<dyn std::error::Error>> {
        let pyramid = Pyramid::from_frame(frame)?;
        let (fw, fh) = pyramid.frame_size();
        self.tracks.clear();
        for request in requests {
            if let Some(bbox) = PixelBox::from_rect(&request.input.bounds, fw, fh) {
                self.tracks.insert(request.id(), Track::new(&pyramid, bbox));
            }
        }
        Ok(())
    }

    fn track(
        &mut self,
        requests: &mut [TrackingRequest],
        frame: &Frame,
    ) -> Result<(), Box<dyn std::error::Error>> {
        let pyramid = Pyramid::from_frame(frame)?;

        let live: HashSet<u64> = requests.iter().map(|r| r.id()).collect();
        self.tracks.retain(|id, _| live.contains(id));

        self.comparisons = 0;
        for request in requests.iter_mut() {
            request.result = Some(self.track_one(request, &pyramid));
        }
        Ok(())
    }

    fn reset(&mut self) {
        self.tracks.clear();
    }
}

/// Grayscale image pyramid. Level 0 is full resolution and every further
/// level halves both sides.
struct Pyramid {
    levels: Vec<Array2<f32>>,
}

impl Pyramid {
    fn from_frame(frame: &Frame) -> Result<Self, Box<dyn std::error::Error>> {
        if frame.width() == 0 || frame.height() == 0 {
            return Err("cannot track on an empty frame".into());
        }
        let mut levels = vec![to_grayscale(frame)];
        while levels.len() < MAX_PYRAMID_LEVELS {
            let Some(next) = levels
                .last()
                .filter(|l| l.nrows().min(l.ncols()) / 2 >= MIN_TEMPLATE_SIDE)
                .map(downsample_half)
            else {
                break;
            };
            levels.push(next);
        }
        Ok(Self { levels })
    }

    fn depth(&self) -> usize {
        self.levels.len()
    }

    fn level(&self, k: usize) -> &Array2<f32> {
        &self.levels[k]
    }

    /// `(width, height)` of the full-resolution level.
    fn frame_size(&self) -> (usize, usize) {
        let (h, w) = self.levels[0].dim();
        (w, h)
    }
}

/// Per-request templates, one per pyramid level up to the coarsest level
/// the box is matched on.
struct Track {
    levels: Vec<Template>,
}

impl Track {
    fn new(pyramid: &Pyramid, bbox: PixelBox) -> Self {
        let top = coarse_level(bbox, pyramid.depth());
        let levels = (0..=top)
            .map(|k| Template::new(bbox.at_level(k).view(pyramid.level(k))))
            .collect();
        Self { levels }
    }

    fn top(&self) -> usize {
        self.levels.len() - 1
    }

    fn fits(&self, pyramid: &Pyramid, bbox: PixelBox) -> bool {
        self.top() < pyramid.depth() && self.levels[0].dim() == (bbox.h, bbox.w)
    }
}

/// First level where the longer side of `bbox` is at most [`COARSE_SIDE`],
/// as long as the shorter side stays trackable.
fn coarse_level(bbox: PixelBox, depth: usize) -> usize {
    let (long, short) = (bbox.w.max(bbox.h), bbox.w.min(bbox.h));
    let mut k = 0;
    while k + 1 < depth && long >> k > COARSE_SIDE && short >> (k + 1) >= MIN_TEMPLATE_SIDE {
        k += 1;
    }
    k
}

/// Integer pixel box fully inside the frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct PixelBox {
    x: usize,
    y: usize,
    w: usize,
    h: usize,
}

impl PixelBox {
    fn from_rect(rect: &NormalizedRect, fw: usize, fh: usize) -> Option<Self> {
        let [x1, y1, x2, y2] = rect.to_pixel_box(fw as u32, fh as u32);
        let x1 = x1.round().clamp(0.0, fw as f64) as usize;
        let y1 = y1.round().clamp(0.0, fh as f64) as usize;
        let x2 = x2.round().clamp(0.0, fw as f64) as usize;
        let y2 = y2.round().clamp(0.0, fh as f64) as usize;
        let (w, h) = (x2.saturating_sub(x1), y2.saturating_sub(y1));
        if w < MIN_TEMPLATE_SIDE || h < MIN_TEMPLATE_SIDE {
            return None;
        }
        Some(Self { x: x1, y: y1, w, h })
    }

    /// The same box on pyramid level `k`.
    fn at_level(self, k: usize) -> Self {
        Self {
            x: self.x >> k,
            y: self.y >> k,
            w: self.w >> k,
            h: self.h >> k,
        }
    }

    /// Shifts the box back inside `plane`.
    fn clamped(self, plane: &Array2<f32>) -> Self {
        let (ph, pw) = plane.dim();
        Self {
            x: self.x.min(pw.saturating_sub(self.w)),
            y: self.y.min(ph.saturating_sub(self.h)),
            ..self
        }
    }

    fn view<'a>(&self, plane: &'a Array2<f32>) -> ndarray::ArrayView2<'a, f32> {
        plane.slice(s![self.y..self.y + self.h, self.x..self.x + self.w])
    }

    fn offset(&self, dx: isize, dy: isize, pw: usize, ph: usize) -> Option<Self> {
        let x = self.x as isize + dx;
        let y = self.y as isize + dy;
        if x < 0 || y < 0 || x as usize + self.w > pw || y as usize + self.h > ph {
            return None;
        }
        Some(Self {
            x: x as usize,
            y: y as usize,
            ..*self
        })
    }

    fn to_f64(self) -> [f64; 4] {
        [
            self.x as f64,
            self.y as f64,
            (self.x + self.w) as f64,
            (self.y + self.h) as f64,
        ]
    }
}

/// Best-scoring placement of `template` within `radius` of `center` on
/// `plane`. Every correlation adds the template area to `cost`.
///
/// The center is scored first, so ties keep the smallest displacement.
fn search(
    template: &Template,
    plane: &Array2<f32>,
    center: PixelBox,
    radius: isize,
    step: usize,
    cost: &mut usize,
) -> (PixelBox, f32) {
    let (ph, pw) = plane.dim();
    let (th, tw) = template.dim();
    let mut score_at = |b: PixelBox| {
        *cost += th * tw;
        template.correlate(b.view(plane))
    };
    let mut best = (center, f32::MIN);
    if let Some(b) = center.offset(0, 0, pw, ph) {
        best = (b, score_at(b));
    }
    for dy in (-radius..=radius).step_by(step) {
        for dx in (-radius..=radius).step_by(step) {
            if dx == 0 && dy == 0 {
                continue;
            }
            let Some(candidate) = center.offset(dx, dy, pw, ph) else {
                continue;
            };
            let score = score_at(candidate);
            if score > best.1 {
                best = (candidate, score);
            }
        }
    }
    best
}

fn lost(request: &TrackingRequest) -> DetectedRegion {
    DetectedRegion {
        bounds: request.input.bounds,
        confidence: 0.0,
        label: request.input.label.clone(),
    }
}
