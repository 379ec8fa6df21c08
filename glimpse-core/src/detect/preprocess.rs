//! Preprocessing for detector inference.
//!
//! Captured BGR frames are resized to the model's input resolution and packed
//! into a normalized `[1, 3, H, W]` RGB tensor. The resizer and both staging
//! buffers are allocated once and reused for every frame.

use anyhow::{Context, Result};
use fast_image_resize::{
    images::{Image, ImageRef},
    FilterType, PixelType, ResizeAlg, ResizeOptions, Resizer,
};
use tract_onnx::prelude::Tensor;

use crate::frame::Frame;

/// Desired input resolution for the detector.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InputSize {
    /// The width of the input tensor.
    pub width: u32,
    /// The height of the input tensor.
    pub height: u32,
}

impl InputSize {
    /// Creates a new `InputSize`.
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

impl Default for InputSize {
    fn default() -> Self {
        Self {
            width: 640,
            height: 640,
        }
    }
}

/// Reusable frame-to-tensor converter.
pub struct Preprocessor {
    input_size: InputSize,
    resizer: Resizer,
    resized: Image<'static>,
    tensor: Vec<f32>,
}

impl std::fmt::Debug for Preprocessor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Preprocessor")
            .field("input_size", &self.input_size)
            .finish_non_exhaustive()
    }
}

impl Preprocessor {
    pub fn new(input_size: InputSize) -> Result<Self> {
        anyhow::ensure!(
            input_size.width > 0 && input_size.height > 0,
            "input size must be non-zero, got {}x{}",
            input_size.width,
            input_size.height
        );
        let plane = input_size.width as usize * input_size.height as usize;
        Ok(Self {
            input_size,
            resizer: Resizer::new(),
            resized: Image::new(input_size.width, input_size.height, PixelType::U8x3),
            tensor: vec![0.0; plane * 3],
        })
    }

    pub fn input_size(&self) -> InputSize {
        self.input_size
    }

    /// Resize a BGR frame to the model resolution and produce a `[1, 3, H, W]`
    /// RGB tensor with channel values normalized to `[0, 1]`.
    pub fn run(&mut self, frame: &Frame) -> Result<Tensor> {
        anyhow::ensure!(!frame.is_empty(), "cannot preprocess an empty frame");

        let src = ImageRef::new(
            frame.width(),
            frame.height(),
            frame.data(),
            PixelType::U8x3,
        )
        .context("captured frame does not match its declared dimensions")?;
        self.resizer
            .resize(
                &src,
                &mut self.resized,
                &ResizeOptions::new().resize_alg(ResizeAlg::Convolution(FilterType::Bilinear)),
            )
            .context("failed to resize frame to model input size")?;

        // Planar RGB from interleaved BGR, normalized in the same pass.
        let plane = self.input_size.width as usize * self.input_size.height as usize;
        let pixels = self.resized.buffer();
        for (i, bgr) in pixels.chunks_exact(3).enumerate() {
            self.tensor[i] = bgr[2] as f32 / 255.0;
            self.tensor[plane + i] = bgr[1] as f32 / 255.0;
            self.tensor[2 * plane + i] = bgr[0] as f32 / 255.0;
        }

        Tensor::from_shape(
            &[1, 3, self.input_size.height as usize, self.input_size.width as usize],
            &self.tensor,
        )
        .map_err(|e| anyhow::anyhow!("failed to build input tensor: {e}"))
    }
}
