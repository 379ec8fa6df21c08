//! Shared configuration types consumed across the glimpse workspace.
//!
//! These structures provide a common representation for capture, inference, detection, and
//! pacing settings that can be serialized to disk and reused by front-ends.

use anyhow::{Context, Result};
use log::LevelFilter;
use serde::{Deserialize, Serialize};
use std::{
    env, fs,
    path::{Path, PathBuf},
};

/// Placement and size of the screen region sampled on every cycle.
///
/// When `top` or `left` is `None`, the region is centered on the primary
/// display at startup.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct CaptureSettings {
    /// Absolute y coordinate of the region's top edge, in virtual-screen space.
    pub top: Option<i32>,
    /// Absolute x coordinate of the region's left edge, in virtual-screen space.
    pub left: Option<i32>,
    /// Region width in pixels.
    pub width: u32,
    /// Region height in pixels.
    pub height: u32,
}

impl Default for CaptureSettings {
    fn default() -> Self {
        Self {
            top: None,
            left: None,
            width: 300,
            height: 300,
        }
    }
}

/// Inference input resolution in pixels (width x height).
///
/// Captured frames are resized to these dimensions before being passed to the model.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct InputDimensions {
    pub width: u32,
    pub height: u32,
}

impl Default for InputDimensions {
    fn default() -> Self {
        Self {
            width: 640,
            height: 640,
        }
    }
}

/// Shared detection parameters applied during post-processing.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DetectionSettings {
    /// Minimum confidence score for a detection to be considered valid.
    /// Candidates at or below this value are discarded.
    pub confidence_threshold: f32,
}

impl Default for DetectionSettings {
    fn default() -> Self {
        Self {
            confidence_threshold: 0.5,
        }
    }
}

/// Loop pacing and failure-budget parameters for the pipeline worker.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct PacingSettings {
    /// Frame rate the worker paces itself toward.
    pub target_fps: u32,
    /// Number of recent frame-rate samples averaged for pacing decisions.
    pub fps_window: usize,
    /// Seconds between frame-rate log lines.
    pub fps_report_secs: u64,
    /// Consecutive cycle failures tolerated before the worker shuts down.
    pub max_consecutive_errors: u32,
    /// Milliseconds slept after a failed cycle before retrying.
    pub error_backoff_ms: u64,
}

impl Default for PacingSettings {
    fn default() -> Self {
        Self {
            target_fps: 40,
            fps_window: 30,
            fps_report_secs: 5,
            max_consecutive_errors: 3,
            error_backoff_ms: 1_000,
        }
    }
}

/// Settings controlling optional runtime telemetry.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TelemetrySettings {
    /// Whether telemetry timing logs are enabled.
    pub enabled: bool,
    /// Logging level for telemetry output (error, warn, info, debug, trace).
    pub level: String,
}

impl Default for TelemetrySettings {
    fn default() -> Self {
        Self {
            enabled: false,
            level: "debug".to_string(),
        }
    }
}

impl TelemetrySettings {
    /// Resolve the configured level string into a `LevelFilter`.
    pub fn level_filter(&self) -> LevelFilter {
        match self.level.trim().to_ascii_lowercase().as_str() {
            "off" => LevelFilter::Off,
            "error" => LevelFilter::Error,
            "warn" | "warning" => LevelFilter::Warn,
            "info" => LevelFilter::Info,
            "trace" => LevelFilter::Trace,
            _ => LevelFilter::Debug,
        }
    }

    /// Update the level string from a `LevelFilter` value.
    pub fn set_level(&mut self, level: LevelFilter) {
        let label = match level {
            LevelFilter::Off => "off",
            LevelFilter::Error => "error",
            LevelFilter::Warn => "warn",
            LevelFilter::Info => "info",
            LevelFilter::Debug => "debug",
            LevelFilter::Trace => "trace",
        };
        self.level = label.to_string();
    }
}

/// Persistent application settings consumed by the CLI front end.
///
/// This struct aggregates all user-configurable parameters, allowing them to be
/// loaded from and saved to a JSON file.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppSettings {
    /// Optional override for the detector ONNX model path.
    /// If `None`, a default path is used.
    pub model_path: Option<String>,
    /// Screen region sampled by the frame source.
    pub capture: CaptureSettings,
    /// The input dimensions for model inference.
    pub input: InputDimensions,
    /// The parameters for detection post-processing.
    pub detection: DetectionSettings,
    /// Loop pacing and failure tolerances.
    pub pacing: PacingSettings,
    /// Telemetry and diagnostics preferences.
    pub telemetry: TelemetrySettings,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            model_path: Some("models/detector_640.onnx".into()),
            capture: CaptureSettings::default(),
            input: InputDimensions::default(),
            detection: DetectionSettings::default(),
            pacing: PacingSettings::default(),
            telemetry: TelemetrySettings::default(),
        }
    }
}

impl AppSettings {
    /// Load settings from a JSON file.
    ///
    /// If the file does not exist or cannot be parsed, an error is returned.
    /// If the `model_path` is missing from the JSON, it falls back to the default.
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path)
            .with_context(|| format!("failed to read settings file {}", path.display()))?;
        let mut settings: AppSettings = serde_json::from_str(&contents)
            .with_context(|| format!("failed to parse settings JSON at {}", path.display()))?;

        if settings.model_path.is_none() {
            settings.model_path = AppSettings::default().model_path;
        }

        Ok(settings)
    }

    /// Serialize settings to disk in pretty-printed JSON.
    ///
    /// This will overwrite the file if it already exists.
    pub fn save_to_path<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let payload =
            serde_json::to_string_pretty(self).context("failed to serialize settings JSON")?;
        fs::write(path, payload)
            .with_context(|| format!("failed to write settings file {}", path.display()))?;
        Ok(())
    }
}

/// Returns the default path for persisted application settings (`config/settings.json`).
pub fn default_settings_path() -> PathBuf {
    env::current_dir()
        .map(|dir| dir.join("config/settings.json"))
        .unwrap_or_else(|_| PathBuf::from("config/settings.json"))
}
