use std::{
    path::PathBuf,
    sync::mpsc,
    thread,
    time::{Duration, Instant},
};

use anyhow::{Context, Result};
use clap::Parser;
use log::{info, warn};
use screenshots::Screen;

use glimpse_core::{
    CaptureRegion, Detector, FrameSource, InputSize, PipelineWorker, PostprocessConfig, Renderer,
    WorkerOptions, WorkerState,
};
use glimpse_utils::{
    config::{default_settings_path, AppSettings},
    init_logging, telemetry,
};

mod args;
mod sink;

use args::{apply_cli_overrides, RunArgs};
use sink::FrameSink;

const DEFAULT_MODEL_PATH: &str = "models/detector_640.onnx";
const JOIN_TIMEOUT: Duration = Duration::from_secs(5);

fn main() -> Result<()> {
    init_logging(log::LevelFilter::Info)?;
    let args = RunArgs::parse();

    let mut settings = load_settings(args.config.as_ref())?;
    apply_cli_overrides(&mut settings, &args);
    telemetry::configure(settings.telemetry.enabled, settings.telemetry.level_filter());

    let region = resolve_region(&settings)?;
    anyhow::ensure!(!region.is_empty(), "capture region must have non-zero area");
    info!(
        "glimpse {}: capturing {}x{} region at ({}, {})",
        glimpse_core::version(),
        region.width,
        region.height,
        region.left,
        region.top
    );

    let model_path = settings
        .model_path
        .clone()
        .unwrap_or_else(|| DEFAULT_MODEL_PATH.to_string());
    let input_size = InputSize::new(settings.input.width, settings.input.height);
    let postprocess: PostprocessConfig = settings.detection.into();
    info!(
        "loading detector model from {model_path} at resolution {}x{}",
        input_size.width, input_size.height
    );
    let detector = Detector::from_model_path(&model_path, input_size, postprocess)?;

    let source = FrameSource::open(region);
    let sink = FrameSink::new(args.annotate.clone())?;
    let mut options = WorkerOptions::from(settings.pacing);
    options.frame_limit = (args.frames > 0).then_some(args.frames);

    let mut worker = PipelineWorker::new(source, detector, Renderer::new(), sink, options);
    let stop = worker.stop_handle();

    let interrupt_stop = stop.clone();
    ctrlc::set_handler(move || {
        info!("interrupt received, stopping detection loop");
        interrupt_stop.stop();
    })
    .context("failed to install interrupt handler")?;

    let (result_tx, result_rx) = mpsc::channel();
    let handle = thread::Builder::new()
        .name("glimpse-worker".into())
        .spawn(move || {
            let _ = result_tx.send(worker.run());
        })
        .context("failed to spawn detection worker thread")?;

    // Wait for the worker, but do not hang forever if it misses the
    // shutdown deadline after a stop request.
    let mut stopping_since: Option<Instant> = None;
    let result = loop {
        match result_rx.recv_timeout(Duration::from_millis(100)) {
            Ok(result) => break result,
            Err(mpsc::RecvTimeoutError::Timeout) => {
                if stop.state() == WorkerState::Stopping {
                    let since = *stopping_since.get_or_insert_with(Instant::now);
                    if since.elapsed() >= JOIN_TIMEOUT {
                        warn!("detection worker did not stop within {JOIN_TIMEOUT:?}, abandoning it");
                        return Ok(());
                    }
                }
            }
            Err(mpsc::RecvTimeoutError::Disconnected) => {
                anyhow::bail!("detection worker exited without reporting a result")
            }
        }
    };
    let _ = handle.join();

    result.context("detection worker terminated")
}

fn load_settings(config_path: Option<&PathBuf>) -> Result<AppSettings> {
    if let Some(path) = config_path {
        return AppSettings::load_from_path(path);
    }
    let default_path = default_settings_path();
    if default_path.exists() {
        match AppSettings::load_from_path(&default_path) {
            Ok(settings) => return Ok(settings),
            Err(err) => warn!(
                "ignoring unreadable settings at {}: {err:#}",
                default_path.display()
            ),
        }
    }
    Ok(AppSettings::default())
}

/// Place the capture region, centering any axis the user left unspecified
/// on the primary display.
fn resolve_region(settings: &AppSettings) -> Result<CaptureRegion> {
    let (width, height) = (settings.capture.width, settings.capture.height);
    if let (Some(top), Some(left)) = (settings.capture.top, settings.capture.left) {
        return Ok(CaptureRegion::new(top, left, width, height));
    }

    let mut region = centered_region(width, height)?;
    if let Some(top) = settings.capture.top {
        region.top = top;
    }
    if let Some(left) = settings.capture.left {
        region.left = left;
    }
    Ok(region)
}

fn centered_region(width: u32, height: u32) -> Result<CaptureRegion> {
    let screens = Screen::all().map_err(|e| anyhow::anyhow!("failed to enumerate displays: {e}"))?;
    anyhow::ensure!(!screens.is_empty(), "no displays found");
    let info = screens
        .iter()
        .map(|screen| screen.display_info)
        .find(|info| info.is_primary)
        .unwrap_or(screens[0].display_info);

    let top = info.y + (info.height.saturating_sub(height) / 2) as i32;
    let left = info.x + (info.width.saturating_sub(width) / 2) as i32;
    Ok(CaptureRegion::new(top, left, width, height))
}
