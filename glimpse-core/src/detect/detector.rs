//! High-level detector tying preprocessing, inference, and decoding together.

use std::path::Path;

use anyhow::{Context, Result};
use log::{error, Level};

use glimpse_utils::telemetry::timing_guard;

use crate::detect::model::{InferenceEngine, TractEngine};
use crate::detect::postprocess::{apply_postprocess, DetectionBox, PostprocessConfig};
use crate::detect::preprocess::{InputSize, Preprocessor};
use crate::frame::Frame;

/// Frame-to-boxes detector around a pluggable inference engine.
#[derive(Debug)]
pub struct Detector<E: InferenceEngine> {
    engine: E,
    preprocessor: Preprocessor,
    postprocess: PostprocessConfig,
}

impl Detector<TractEngine> {
    /// Build a detector from an ONNX model on disk.
    pub fn from_model_path<P: AsRef<Path>>(
        model_path: P,
        input_size: InputSize,
        postprocess: PostprocessConfig,
    ) -> Result<Self> {
        let engine = TractEngine::load(&model_path).with_context(|| {
            format!(
                "failed to load detector model from {}",
                model_path.as_ref().display()
            )
        })?;
        Self::new(engine, input_size, postprocess)
    }
}

impl<E: InferenceEngine> Detector<E> {
    pub fn new(engine: E, input_size: InputSize, postprocess: PostprocessConfig) -> Result<Self> {
        Ok(Self {
            engine,
            preprocessor: Preprocessor::new(input_size)?,
            postprocess,
        })
    }

    pub fn input_size(&self) -> InputSize {
        self.preprocessor.input_size()
    }

    /// Detect objects in one frame.
    ///
    /// Never fails from the caller's perspective: any internal error is
    /// logged and reported as "no detections" so the live loop keeps running.
    pub fn detect(&mut self, frame: &Frame) -> Vec<DetectionBox> {
        match self.try_detect(frame) {
            Ok(boxes) => boxes,
            Err(err) => {
                error!("detection failed: {err:#}");
                Vec::new()
            }
        }
    }

    fn try_detect(&mut self, frame: &Frame) -> Result<Vec<DetectionBox>> {
        let input = {
            let _guard = timing_guard("glimpse_core::preprocess", Level::Debug);
            self.preprocessor.run(frame)?
        };

        let output = {
            let _guard = timing_guard("glimpse_core::inference", Level::Debug);
            self.engine.infer(input)?
        };

        let _guard = timing_guard("glimpse_core::postprocess", Level::Debug);
        apply_postprocess(
            &output,
            self.preprocessor.input_size(),
            (frame.width(), frame.height()),
            &self.postprocess,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tract_onnx::prelude::Tensor;

    /// Engine that replays a fixed output tensor and records its input shape.
    struct FixedEngine {
        output: Tensor,
    }

    impl std::fmt::Debug for FixedEngine {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            f.write_str("FixedEngine")
        }
    }

    impl InferenceEngine for FixedEngine {
        fn infer(&self, input: Tensor) -> Result<Tensor> {
            assert_eq!(input.shape()[0], 1);
            assert_eq!(input.shape()[1], 3);
            Ok(self.output.clone())
        }
    }

    struct FailingEngine;

    impl InferenceEngine for FailingEngine {
        fn infer(&self, _input: Tensor) -> Result<Tensor> {
            anyhow::bail!("engine exploded")
        }
    }

    fn candidate_tensor(candidates: &[[f32; 5]]) -> Tensor {
        let n = candidates.len();
        let mut flat = vec![0.0f32; 5 * n];
        for (col, candidate) in candidates.iter().enumerate() {
            for (row, value) in candidate.iter().enumerate() {
                flat[row * n + col] = *value;
            }
        }
        Tensor::from_shape(&[1, 5, n], &flat).unwrap()
    }

    #[test]
    fn detect_maps_boxes_into_frame_space() {
        let engine = FixedEngine {
            output: candidate_tensor(&[[320.0, 320.0, 100.0, 100.0, 0.9]]),
        };
        let mut detector = Detector::new(
            engine,
            InputSize::new(640, 640),
            PostprocessConfig::default(),
        )
        .unwrap();

        let frame = Frame::zeroed(300, 300);
        let boxes = detector.detect(&frame);
        assert_eq!(boxes.len(), 1);
        assert_eq!((boxes[0].x1, boxes[0].y1), (126, 126));
        assert_eq!((boxes[0].x2, boxes[0].y2), (173, 173));
    }

    #[test]
    fn engine_failure_yields_no_detections() {
        let mut detector = Detector::new(
            FailingEngine,
            InputSize::new(64, 64),
            PostprocessConfig::default(),
        )
        .unwrap();

        let frame = Frame::zeroed(100, 100);
        assert!(detector.detect(&frame).is_empty());
    }

    #[test]
    fn empty_frame_yields_no_detections() {
        let engine = FixedEngine {
            output: candidate_tensor(&[[32.0, 32.0, 10.0, 10.0, 0.9]]),
        };
        let mut detector = Detector::new(
            engine,
            InputSize::new(64, 64),
            PostprocessConfig::default(),
        )
        .unwrap();

        let frame = Frame::zeroed(0, 0);
        assert!(detector.detect(&frame).is_empty());
    }
}
