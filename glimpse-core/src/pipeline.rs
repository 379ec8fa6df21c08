//! The live capture-detect-render loop.
//!
//! [`PipelineWorker`] runs the loop on the caller's thread (typically a
//! dedicated worker spawned by the front end) and owns every pipeline stage.
//! A [`StopHandle`] lets other threads request a cooperative shutdown, which
//! the worker acknowledges at the next loop boundary.

use std::{
    sync::{
        atomic::{AtomicU8, Ordering},
        Arc,
    },
    thread,
    time::{Duration, Instant},
};

use anyhow::{anyhow, Result};
use image::RgbImage;
use log::{error, info, Level};

use glimpse_utils::config::PacingSettings;
use glimpse_utils::{timing_guard, FpsReporter, FpsWindow};

use crate::capture::{CaptureBackend, FrameSource};
use crate::detect::{Detector, InferenceEngine};
use crate::render::Renderer;

/// Destination for rendered frames.
///
/// `show` failing counts against the worker's consecutive-error budget.
/// `quit_requested` lets interactive presenters (a preview window, for
/// example) end the loop cleanly from the user's side.
pub trait Presenter {
    fn show(&mut self, image: &RgbImage) -> Result<()>;

    fn quit_requested(&mut self) -> bool {
        false
    }
}

/// Lifecycle of a pipeline worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum WorkerState {
    Running = 0,
    /// Stop requested, the worker has not yet acknowledged it.
    Stopping = 1,
    Stopped = 2,
}

impl WorkerState {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => WorkerState::Running,
            1 => WorkerState::Stopping,
            _ => WorkerState::Stopped,
        }
    }
}

/// Cloneable handle for requesting and observing worker shutdown.
#[derive(Debug, Clone)]
pub struct StopHandle(Arc<AtomicU8>);

impl StopHandle {
    /// Ask the worker to stop after its current cycle. Calling this more
    /// than once, or after the worker already stopped, has no effect.
    pub fn stop(&self) {
        let _ = self.0.compare_exchange(
            WorkerState::Running as u8,
            WorkerState::Stopping as u8,
            Ordering::SeqCst,
            Ordering::SeqCst,
        );
    }

    pub fn state(&self) -> WorkerState {
        WorkerState::from_u8(self.0.load(Ordering::SeqCst))
    }

    pub fn is_stopped(&self) -> bool {
        self.state() == WorkerState::Stopped
    }
}

/// Pacing and failure tolerances for one worker run.
#[derive(Debug, Clone, Copy)]
pub struct WorkerOptions {
    /// Frame rate the loop paces itself toward.
    pub target_fps: u32,
    /// Number of frame-rate samples in the rolling window.
    pub fps_window: usize,
    /// How often the rolling average is logged.
    pub fps_report_interval: Duration,
    /// Consecutive failed cycles tolerated before the run aborts.
    pub max_consecutive_errors: u32,
    /// Pause after a failed cycle before the next attempt.
    pub error_backoff: Duration,
    /// Brief yield taken when the loop is already running below target.
    pub idle_sleep: Duration,
    /// Stop cleanly after this many successfully presented frames.
    pub frame_limit: Option<u64>,
}

impl Default for WorkerOptions {
    fn default() -> Self {
        Self {
            target_fps: 40,
            fps_window: 30,
            fps_report_interval: Duration::from_secs(5),
            max_consecutive_errors: 3,
            error_backoff: Duration::from_secs(1),
            idle_sleep: Duration::from_millis(1),
            frame_limit: None,
        }
    }
}

impl From<PacingSettings> for WorkerOptions {
    fn from(settings: PacingSettings) -> Self {
        Self {
            target_fps: settings.target_fps,
            fps_window: settings.fps_window,
            fps_report_interval: Duration::from_secs(settings.fps_report_secs),
            max_consecutive_errors: settings.max_consecutive_errors,
            error_backoff: Duration::from_millis(settings.error_backoff_ms),
            ..Self::default()
        }
    }
}

enum CycleOutcome {
    Shown,
    Quit,
}

/// Owns every pipeline stage and drives the detection loop.
pub struct PipelineWorker<B: CaptureBackend, E: InferenceEngine, P: Presenter> {
    source: FrameSource<B>,
    detector: Detector<E>,
    renderer: Renderer,
    presenter: P,
    options: WorkerOptions,
    state: Arc<AtomicU8>,
}

impl<B: CaptureBackend, E: InferenceEngine, P: Presenter> PipelineWorker<B, E, P> {
    pub fn new(
        source: FrameSource<B>,
        detector: Detector<E>,
        renderer: Renderer,
        presenter: P,
        options: WorkerOptions,
    ) -> Self {
        Self {
            source,
            detector,
            renderer,
            presenter,
            options,
            state: Arc::new(AtomicU8::new(WorkerState::Running as u8)),
        }
    }

    pub fn stop_handle(&self) -> StopHandle {
        StopHandle(Arc::clone(&self.state))
    }

    /// Run the loop until a stop is requested, the frame limit is reached,
    /// the presenter quits, or the consecutive-error budget is exhausted.
    ///
    /// The worker always transitions to [`WorkerState::Stopped`] on return,
    /// and its capture handle for this thread is released.
    pub fn run(&mut self) -> Result<()> {
        let result = self.run_loop();
        self.source.close();
        self.state
            .store(WorkerState::Stopped as u8, Ordering::SeqCst);
        result
    }

    fn run_loop(&mut self) -> Result<()> {
        let region = self.source.region();
        info!(
            "detection loop started: {}x{} region at ({}, {}), target {} fps",
            region.width, region.height, region.left, region.top, self.options.target_fps
        );

        let mut window = FpsWindow::new(self.options.fps_window);
        let mut reporter = FpsReporter::new(self.options.fps_report_interval);
        let budget = frame_budget(self.options.target_fps);
        let mut frames: u64 = 0;
        let mut consecutive_errors: u32 = 0;

        loop {
            if self.state.load(Ordering::SeqCst) != WorkerState::Running as u8 {
                info!("stop requested, exiting after {frames} frames");
                return Ok(());
            }
            if self.options.frame_limit.is_some_and(|limit| frames >= limit) {
                info!("frame limit reached, exiting after {frames} frames");
                return Ok(());
            }

            let cycle_start = Instant::now();
            match self.run_cycle() {
                Ok(CycleOutcome::Quit) => {
                    info!("presenter requested quit after {frames} frames");
                    return Ok(());
                }
                Ok(CycleOutcome::Shown) => {
                    frames += 1;
                    consecutive_errors = 0;

                    let elapsed = cycle_start.elapsed();
                    let instantaneous = if elapsed.is_zero() {
                        0.0
                    } else {
                        1.0 / elapsed.as_secs_f64()
                    };
                    window.record(instantaneous);
                    if reporter.due() {
                        info!("current fps: {:.2}", window.average());
                    }

                    self.pace(window.average(), cycle_start, budget);
                }
                Err(err) => {
                    consecutive_errors += 1;
                    error!(
                        "error in detection loop ({consecutive_errors}/{}): {err:#}",
                        self.options.max_consecutive_errors
                    );
                    if consecutive_errors >= self.options.max_consecutive_errors {
                        return Err(anyhow!(
                            "too many consecutive errors ({consecutive_errors}), shutting down detection loop"
                        ));
                    }
                    thread::sleep(self.options.error_backoff);
                }
            }
        }
    }

    fn run_cycle(&mut self) -> Result<CycleOutcome> {
        if self.presenter.quit_requested() {
            return Ok(CycleOutcome::Quit);
        }

        let display = {
            let frame = self.source.capture();
            anyhow::ensure!(!frame.is_empty(), "captured frame has zero area");
            let detections = self.detector.detect(&frame);
            let _guard = timing_guard("glimpse_core::render", Level::Debug);
            self.renderer.draw(&frame, &detections)
        };

        self.presenter.show(&display)?;
        Ok(CycleOutcome::Shown)
    }

    /// Sleep out the remainder of the frame budget once the rolling average
    /// has reached the target; otherwise yield briefly so a slow stretch can
    /// catch up without pegging a core.
    fn pace(&self, rolling_fps: f64, cycle_start: Instant, budget: Duration) {
        if rolling_fps < self.options.target_fps as f64 {
            thread::sleep(self.options.idle_sleep);
            return;
        }
        if let Some(remaining) = budget.checked_sub(cycle_start.elapsed()) {
            thread::sleep(remaining);
        }
    }
}

fn frame_budget(target_fps: u32) -> Duration {
    Duration::from_secs_f64(1.0 / target_fps.max(1) as f64)
}
