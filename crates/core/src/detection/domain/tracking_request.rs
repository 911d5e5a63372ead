use std::fmt;

use crate::shared::region::DetectedRegion;

/// Accuracy/speed trade-off requested from the tracker.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum TrackingLevel {
    #[default]
    Fast,
    Accurate,
}

impl fmt::Display for TrackingLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TrackingLevel::Fast => write!(f, "fast"),
            TrackingLevel::Accurate => write!(f, "accurate"),
        }
    }
}

/// One tracked region, carried from frame to frame.
#[derive(Clone, Debug, PartialEq)]
pub struct TrackingRequest {
    id: u64,
    /// Last accepted position; the tracker searches around it.
    pub input: DetectedRegion,
    /// Written by the tracker on every pass.
    pub result: Option<DetectedRegion>,
    /// Set once confidence fell below threshold; the request gets one more
    /// pass and is then dropped.
    pub is_last_frame: bool,
    pub level: TrackingLevel,
}

impl TrackingRequest {
    pub fn new(id: u64, seed: DetectedRegion, level: TrackingLevel) -> Self {
        Self {
            id,
            input: seed,
            result: None,
            is_last_frame: false,
            level,
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }
}
