use crate::overlay::domain::preview_transform::ScreenRect;
use crate::shared::constants::{DEFAULT_LABEL_NAME, LABEL_HEIGHT};
use crate::shared::region::DetectedRegion;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TextAlignment {
    Left,
    Center,
}

/// Text label attached to an overlay box.
#[derive(Clone, Debug, PartialEq)]
pub struct LabelLayout {
    pub rect: ScreenRect,
    pub text: String,
    pub alignment: TextAlignment,
}

/// How the label next to the bounding box is laid out.
#[derive(Clone, Debug, Default, PartialEq)]
pub enum LabelStyle {
    #[default]
    /// Above the box, left aligned: `"<label> (<NN>%)"`.
    Recognition,
    /// Centered below the box with a fixed name.
    Tracking { name: String },
}

impl LabelStyle {
    pub fn tracking(name: impl Into<String>) -> Self {
        LabelStyle::Tracking { name: name.into() }
    }

    pub fn layout(&self, bounds: &ScreenRect, region: &DetectedRegion) -> LabelLayout {
        match self {
            LabelStyle::Recognition => LabelLayout {
                rect: ScreenRect::new(bounds.x, bounds.y - LABEL_HEIGHT, bounds.width, LABEL_HEIGHT),
                text: recognition_text(region),
                alignment: TextAlignment::Left,
            },
            LabelStyle::Tracking { name } => LabelLayout {
                rect: ScreenRect::new(bounds.x, bounds.bottom(), bounds.width, LABEL_HEIGHT),
                text: name.clone(),
                alignment: TextAlignment::Center,
            },
        }
    }
}

fn recognition_text(region: &DetectedRegion) -> String {
    let name = region.label.as_deref().unwrap_or(DEFAULT_LABEL_NAME);
    let percent = (region.confidence * 100.0) as u32;
    format!("{name} ({percent}%)")
}
