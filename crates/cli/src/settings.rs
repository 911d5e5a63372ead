use std::fs;
use std::path::{Path, PathBuf};

use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use face_overlay_core::detection::domain::tracking_request::TrackingLevel;
use face_overlay_core::overlay::domain::label_layout::LabelStyle;
use face_overlay_core::pipeline::frame_processor::SwitchPolicy;
use face_overlay_core::shared::constants::{
    APP_DIR_NAME, DEFAULT_DETECTION_CONFIDENCE, DEFAULT_LABEL_NAME, TRACKING_CONFIDENCE_THRESHOLD,
};

#[derive(Error, Debug)]
pub enum SettingsError {
    #[error("failed to read settings from {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid settings in {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("{name} must be between {min} and {max}, got {value}")]
    OutOfRange {
        name: &'static str,
        min: f64,
        max: f64,
        value: f64,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum TrackingMode {
    Fast,
    Accurate,
}

impl From<TrackingMode> for TrackingLevel {
    fn from(mode: TrackingMode) -> Self {
        match mode {
            TrackingMode::Fast => TrackingLevel::Fast,
            TrackingMode::Accurate => TrackingLevel::Accurate,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum SwitchMode {
    Reset,
    Retain,
}

impl From<SwitchMode> for SwitchPolicy {
    fn from(mode: SwitchMode) -> Self {
        match mode {
            SwitchMode::Reset => SwitchPolicy::ResetTracking,
            SwitchMode::Retain => SwitchPolicy::RetainTracking,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum LabelMode {
    Recognition,
    Tracking,
}

/// Persistent defaults for a run. Every field can be overridden on the
/// command line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub confidence: f64,
    pub refine_confidence: f64,
    pub tracking_threshold: f64,
    pub tracking_level: TrackingMode,
    pub switch_policy: SwitchMode,
    pub label_style: LabelMode,
    pub label_name: String,
    pub model_url: Option<String>,
    pub fps: f64,
    pub mirror_preview: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            confidence: DEFAULT_DETECTION_CONFIDENCE,
            refine_confidence: DEFAULT_DETECTION_CONFIDENCE,
            tracking_threshold: TRACKING_CONFIDENCE_THRESHOLD,
            tracking_level: TrackingMode::Fast,
            switch_policy: SwitchMode::Reset,
            label_style: LabelMode::Recognition,
            label_name: DEFAULT_LABEL_NAME.to_string(),
            model_url: None,
            fps: 30.0,
            mirror_preview: false,
        }
    }
}

impl Settings {
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join(APP_DIR_NAME).join("settings.json"))
    }

    /// Loads settings from `explicit`, or from the default location.
    ///
    /// A missing default file yields defaults; a missing explicit file is an
    /// error.
    pub fn load(explicit: Option<&Path>) -> Result<Self, SettingsError> {
        match explicit {
            Some(path) => Self::load_from(path),
            None => match Self::default_path() {
                Some(path) if path.exists() => Self::load_from(&path),
                _ => Ok(Self::default()),
            },
        }
    }

    pub fn load_from(path: &Path) -> Result<Self, SettingsError> {
        let json = fs::read_to_string(path).map_err(|source| SettingsError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let settings: Settings =
            serde_json::from_str(&json).map_err(|source| SettingsError::Parse {
                path: path.to_path_buf(),
                source,
            })?;
        log::debug!("Loaded settings from {}", path.display());
        Ok(settings)
    }

    pub fn validate(&self) -> Result<(), SettingsError> {
        check_range("confidence", self.confidence, 0.0, 1.0)?;
        check_range("refine confidence", self.refine_confidence, 0.0, 1.0)?;
        check_range("tracking threshold", self.tracking_threshold, 0.0, 1.0)?;
        check_range("fps", self.fps, 1.0, 240.0)?;
        Ok(())
    }

    pub fn label_style(&self) -> LabelStyle {
        match self.label_style {
            LabelMode::Recognition => LabelStyle::Recognition,
            LabelMode::Tracking => LabelStyle::tracking(self.label_name.clone()),
        }
    }
}

fn check_range(name: &'static str, value: f64, min: f64, max: f64) -> Result<(), SettingsError> {
    if (min..=max).contains(&value) {
        Ok(())
    } else {
        Err(SettingsError::OutOfRange {
            name,
            min,
            max,
            value,
        })
    }
}
