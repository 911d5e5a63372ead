/// Axis-aligned rectangle in normalized frame coordinates.
///
/// All values are fractions of the upright frame size and the origin is the
/// **bottom-left** corner, so `y` grows upwards.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct NormalizedRect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl NormalizedRect {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// The whole frame.
    pub fn full() -> Self {
        Self::new(0.0, 0.0, 1.0, 1.0)
    }

    /// Builds a rect from a top-left-origin pixel box `[x1, y1, x2, y2]`.
    pub fn from_pixel_box(bbox: [f64; 4], frame_width: u32, frame_height: u32) -> Self {
        let fw = frame_width.max(1) as f64;
        let fh = frame_height.max(1) as f64;
        let [x1, y1, x2, y2] = bbox;
        Self {
            x: x1 / fw,
            y: 1.0 - y2 / fh,
            width: (x2 - x1) / fw,
            height: (y2 - y1) / fh,
        }
    }

    /// Top-left-origin pixel box `[x1, y1, x2, y2]` for a frame of the given size.
    pub fn to_pixel_box(&self, frame_width: u32, frame_height: u32) -> [f64; 4] {
        let fw = frame_width as f64;
        let fh = frame_height as f64;
        let x1 = self.x * fw;
        let y1 = (1.0 - self.y - self.height) * fh;
        [x1, y1, x1 + self.width * fw, y1 + self.height * fh]
    }
}

/// A face (or object) found by a detector or tracker.
#[derive(Clone, Debug, PartialEq)]
pub struct DetectedRegion {
    pub bounds: NormalizedRect,
    /// Confidence in `[0, 1]`.
    pub confidence: f64,
    pub label: Option<String>,
}

impl DetectedRegion {
    pub fn new(bounds: NormalizedRect, confidence: f64) -> Self {
        Self {
            bounds,
            confidence: confidence.clamp(0.0, 1.0),
            label: None,
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// The most confident region, earliest wins on ties.
    pub fn most_confident(regions: &[DetectedRegion]) -> Option<&DetectedRegion> {
        regions.iter().fold(None, |best, r| match best {
            Some(b) if b.confidence >= r.confidence => Some(b),
            _ => Some(r),
        })
    }
}
