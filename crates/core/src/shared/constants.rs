pub const BLAZEFACE_MODEL_NAME: &str = "blazeface_short_range.onnx";

/// Directory name used under the platform cache/config roots.
pub const APP_DIR_NAME: &str = "FaceOverlay";

pub const DEFAULT_DETECTION_CONFIDENCE: f64 = 0.5;

/// Tracker results below this confidence mark the request final.
pub const TRACKING_CONFIDENCE_THRESHOLD: f64 = 0.3;

/// Duration of the overlay move animation, in seconds.
pub const OVERLAY_ANIMATION_SECS: f64 = 0.1;

/// Height of the text label attached to the bounding box, in preview units.
pub const LABEL_HEIGHT: f64 = 48.0;

pub const DEFAULT_LABEL_NAME: &str = "Face";

pub const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "bmp", "tiff", "tif", "webp"];
