use crate::shared::region::NormalizedRect;

/// Rectangle in preview pixels, origin at the top-left corner.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct ScreenRect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl ScreenRect {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn bottom(&self) -> f64 {
        self.y + self.height
    }
}

/// Maps normalized bottom-left-origin regions onto a preview surface.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PreviewTransform {
    width: f64,
    height: f64,
    mirrored: bool,
}

impl PreviewTransform {
    pub fn new(width: f64, height: f64) -> Self {
        Self {
            width: width.max(0.0),
            height: height.max(0.0),
            mirrored: false,
        }
    }

    /// Flip horizontally, for previews that are not already mirrored.
    pub fn mirrored(mut self, mirrored: bool) -> Self {
        self.mirrored = mirrored;
        self
    }

    pub fn size(&self) -> (f64, f64) {
        (self.width, self.height)
    }

    /// `(x·W, H − (y+h)·H, w·W, h·H)`, with `x` reflected when mirrored.
    pub fn to_screen(&self, rect: &NormalizedRect) -> ScreenRect {
        let width = rect.width * self.width;
        let height = rect.height * self.height;
        let x = if self.mirrored {
            self.width - (rect.x + rect.width) * self.width
        } else {
            rect.x * self.width
        };
        let y = self.height - (rect.y + rect.height) * self.height;
        ScreenRect::new(x, y, width, height)
    }
}
