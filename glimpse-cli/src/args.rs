//! Command-line arguments for the live detection loop.

use std::path::PathBuf;

use clap::Parser;
use glimpse_utils::config::AppSettings;

/// Run live object detection over a screen region.
#[derive(Debug, Parser)]
#[command(author, version, about)]
pub struct RunArgs {
    /// Path to the detector ONNX model.
    #[arg(short, long)]
    pub model: Option<PathBuf>,

    /// Optional settings JSON (defaults to built-in parameters).
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Top edge of the capture region (defaults to centered on the primary display).
    #[arg(long)]
    pub top: Option<i32>,

    /// Left edge of the capture region (defaults to centered on the primary display).
    #[arg(long)]
    pub left: Option<i32>,

    /// Capture region width (pixels).
    #[arg(long)]
    pub width: Option<u32>,

    /// Capture region height (pixels).
    #[arg(long)]
    pub height: Option<u32>,

    /// Override confidence threshold.
    #[arg(long)]
    pub confidence_threshold: Option<f32>,

    /// Override the target frame rate.
    #[arg(long)]
    pub target_fps: Option<u32>,

    /// Stop after this many frames (0 runs until interrupted).
    #[arg(long, default_value_t = 0)]
    pub frames: u64,

    /// Directory to write annotated frames as PNGs.
    #[arg(long)]
    pub annotate: Option<PathBuf>,

    /// Enable telemetry timing logs.
    #[arg(long)]
    pub telemetry: bool,

    /// Telemetry level (error, warn, info, debug, trace).
    #[arg(long, default_value = "debug")]
    pub telemetry_level: String,
}

pub fn apply_cli_overrides(settings: &mut AppSettings, args: &RunArgs) {
    if let Some(model) = args.model.as_ref() {
        settings.model_path = Some(model.display().to_string());
    }
    if let Some(top) = args.top {
        settings.capture.top = Some(top);
    }
    if let Some(left) = args.left {
        settings.capture.left = Some(left);
    }
    if let Some(width) = args.width {
        settings.capture.width = width;
    }
    if let Some(height) = args.height {
        settings.capture.height = height;
    }
    if let Some(threshold) = args.confidence_threshold {
        settings.detection.confidence_threshold = threshold;
    }
    if let Some(fps) = args.target_fps {
        settings.pacing.target_fps = fps;
    }
    if args.telemetry {
        settings.telemetry.enabled = true;
        settings.telemetry.level = args.telemetry_level.clone();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn overrides_replace_only_given_fields() {
        let args = RunArgs::parse_from([
            "glimpse",
            "--width",
            "500",
            "--confidence-threshold",
            "0.8",
            "--target-fps",
            "25",
        ]);
        let mut settings = AppSettings::default();
        apply_cli_overrides(&mut settings, &args);

        assert_eq!(settings.capture.width, 500);
        assert_eq!(settings.capture.height, 300);
        assert_eq!(settings.capture.top, None);
        assert_eq!(settings.detection.confidence_threshold, 0.8);
        assert_eq!(settings.pacing.target_fps, 25);
        assert!(!settings.telemetry.enabled);
    }

    #[test]
    fn telemetry_flag_enables_and_sets_level() {
        let args = RunArgs::parse_from(["glimpse", "--telemetry", "--telemetry-level", "trace"]);
        let mut settings = AppSettings::default();
        apply_cli_overrides(&mut settings, &args);

        assert!(settings.telemetry.enabled);
        assert_eq!(settings.telemetry.level, "trace");
    }

    #[test]
    fn frames_defaults_to_continuous() {
        let args = RunArgs::parse_from(["glimpse"]);
        assert_eq!(args.frames, 0);
        assert!(args.model.is_none());
    }
}
