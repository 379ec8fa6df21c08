//! Decode raw detector output into bounding boxes in frame coordinates.

use anyhow::Result;
use tract_onnx::prelude::{Tensor, tract_ndarray::ArrayView2};
use glimpse_utils::config::DetectionSettings;

use crate::detect::preprocess::InputSize;

/// Detection decoding configuration.
#[derive(Debug, Clone, Copy)]
pub struct PostprocessConfig {
    /// Minimum confidence score for a detection to be considered valid.
    /// The comparison is strict, so candidates exactly at the threshold drop.
    pub confidence_threshold: f32,
}

impl Default for PostprocessConfig {
    fn default() -> Self {
        Self {
            confidence_threshold: 0.5,
        }
    }
}

impl From<DetectionSettings> for PostprocessConfig {
    fn from(settings: DetectionSettings) -> Self {
        PostprocessConfig {
            confidence_threshold: settings.confidence_threshold,
        }
    }
}

/// Axis-aligned box in integer frame coordinates, corners inclusive.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DetectionBox {
    pub x1: i32,
    pub y1: i32,
    pub x2: i32,
    pub y2: i32,
    pub confidence: f32,
}

impl DetectionBox {
    pub fn width(&self) -> u32 {
        (self.x2 - self.x1).max(0) as u32
    }

    pub fn height(&self) -> u32 {
        (self.y2 - self.y1).max(0) as u32
    }
}

/// Decode detector output into boxes in the captured frame's coordinate space.
///
/// The output tensor is channel-major: row 0..4 hold center-x, center-y,
/// width, and height in model-input coordinates, row 4 holds the confidence
/// score, one column per candidate. Candidates below the confidence threshold
/// are skipped, surviving corners are scaled to the frame, truncated toward
/// zero, and clipped to the frame bounds. Boxes that collapse to zero area
/// after clipping are dropped. Candidate order is preserved and no overlap
/// suppression is applied.
pub fn apply_postprocess(
    output: &Tensor,
    input_size: InputSize,
    frame_size: (u32, u32),
    config: &PostprocessConfig,
) -> Result<Vec<DetectionBox>> {
    let (frame_w, frame_h) = frame_size;
    anyhow::ensure!(
        frame_w > 0 && frame_h > 0,
        "frame size must be non-zero, got {frame_w}x{frame_h}"
    );
    let rows = candidate_columns(output)?;

    let scale_x = frame_w as f32 / input_size.width as f32;
    let scale_y = frame_h as f32 / input_size.height as f32;
    let max_x = frame_w as i32 - 1;
    let max_y = frame_h as i32 - 1;

    let mut boxes = Vec::new();
    for n in 0..rows.shape()[1] {
        let score = rows[(4, n)];
        if !score.is_finite() || score <= config.confidence_threshold {
            continue;
        }

        let cx = rows[(0, n)];
        let cy = rows[(1, n)];
        let w = rows[(2, n)];
        let h = rows[(3, n)];

        let x1 = (((cx - w / 2.0) * scale_x) as i32).clamp(0, max_x);
        let y1 = (((cy - h / 2.0) * scale_y) as i32).clamp(0, max_y);
        let x2 = (((cx + w / 2.0) * scale_x) as i32).clamp(0, max_x);
        let y2 = (((cy + h / 2.0) * scale_y) as i32).clamp(0, max_y);

        if x2 <= x1 || y2 <= y1 {
            continue;
        }

        boxes.push(DetectionBox {
            x1,
            y1,
            x2,
            y2,
            confidence: score,
        });
    }

    Ok(boxes)
}

/// View the output tensor as `(channels, candidates)`.
fn candidate_columns(output: &Tensor) -> Result<ArrayView2<'_, f32>> {
    let shape = output.shape();
    let (channels, candidates) = match shape {
        [channels, candidates] => (*channels, *candidates),
        [1, channels, candidates] => (*channels, *candidates),
        other => anyhow::bail!(
            "detector output must have shape [C, N] or [1, C, N] (got {:?})",
            other
        ),
    };
    anyhow::ensure!(
        channels >= 5,
        "detector output needs at least 5 channels (bbox + score), got {channels}"
    );

    let slice = output
        .as_slice::<f32>()
        .map_err(|e| anyhow::anyhow!("detector output is not f32: {e}"))?;

    ArrayView2::from_shape((channels, candidates), slice)
        .map_err(|_| anyhow::anyhow!("detector output data is not contiguous"))
}
