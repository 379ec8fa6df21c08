//! Core screen-region detection primitives.
//!
//! This crate captures a fixed screen region, runs ONNX object detection on
//! it with `tract-onnx`, renders overlays, and drives the whole cycle from a
//! pace-controlled worker loop.

/// Screen capture backends and the shared frame source.
pub mod capture;
/// Detection: preprocessing, inference, postprocessing.
pub mod detect;
/// Frame and region primitives.
pub mod frame;
/// The capture-detect-render worker loop.
pub mod pipeline;
/// Overlay rendering for detections.
pub mod render;

pub use capture::{CaptureBackend, CaptureError, FrameSource, FrameView, RawCapture, ScreenBackend};
pub use detect::{
    apply_postprocess, DetectionBox, Detector, InferenceEngine, InputSize, PostprocessConfig,
    Preprocessor, TractEngine,
};
pub use frame::{CaptureRegion, Frame};
pub use pipeline::{PipelineWorker, Presenter, StopHandle, WorkerOptions, WorkerState};
pub use render::Renderer;

/// Returns the crate version for diagnostics.
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
