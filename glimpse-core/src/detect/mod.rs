//! Object detection: preprocessing, ONNX inference, and output decoding.

pub mod detector;
pub mod model;
pub mod postprocess;
pub mod preprocess;

pub use detector::Detector;
pub use model::{InferenceEngine, TractEngine};
pub use postprocess::{apply_postprocess, DetectionBox, PostprocessConfig};
pub use preprocess::{InputSize, Preprocessor};
