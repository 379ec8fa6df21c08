use std::{fmt::Write, path::Path};

use anyhow::{Context, Result};
use log::{debug, warn};
use tract_onnx::prelude::{
    Framework, Graph, InferenceModelExt, IntoTensor, SimplePlan, Tensor, TypedFact, TypedOp, tvec,
};

type RunnableModel = SimplePlan<TypedFact, Box<dyn TypedOp>, Graph<TypedFact, Box<dyn TypedOp>>>;

/// Inference over a preprocessed input tensor.
///
/// The pipeline treats the engine as a black box: one tensor in, one tensor
/// out. Implementations must be cheap to call repeatedly from the worker
/// thread.
pub trait InferenceEngine {
    fn infer(&self, input: Tensor) -> Result<Tensor>;
}

/// ONNX engine backed by a tract execution plan.
///
/// This struct handles loading the ONNX graph, preparing it for execution,
/// and running inference.
#[derive(Debug)]
pub struct TractEngine {
    runnable: RunnableModel,
}

impl TractEngine {
    /// Load and optimize the detector's ONNX graph.
    ///
    /// Optimization occasionally rejects valid graphs, so a failed optimized
    /// load falls back to the decluttered (slower) form before giving up.
    pub fn load<P: AsRef<Path>>(model_path: P) -> Result<Self> {
        let path = model_path.as_ref();
        anyhow::ensure!(path.exists(), "model file not found: {}", path.display());

        let runnable = match load_runnable_model(path, true) {
            Ok(model) => {
                debug!("detector model {} optimized successfully", path.display());
                model
            }
            Err(opt_err) => {
                let optimize_msg = format!("{opt_err}");
                let mut chain_msg = String::new();
                for cause in opt_err.chain() {
                    let _ = writeln!(&mut chain_msg, "  - {cause}");
                }
                warn!(
                    "detector model {} failed optimized load ({}); falling back to decluttered graph (~2x slower).\nError chain:\n{}",
                    path.display(),
                    optimize_msg,
                    chain_msg.trim_end()
                );
                let decluttered = load_runnable_model(path, false).with_context(|| {
                    format!(
                        "fallback to decluttered graph failed after optimize error: {optimize_msg}"
                    )
                })?;
                debug!("detector model {} running in decluttered mode", path.display());
                decluttered
            }
        };

        Ok(Self { runnable })
    }
}

impl InferenceEngine for TractEngine {
    fn infer(&self, input: Tensor) -> Result<Tensor> {
        let mut outputs = self
            .runnable
            .run(tvec![input.into()])
            .map_err(|e| anyhow::anyhow!("detector execution failed: {e}"))?;

        anyhow::ensure!(!outputs.is_empty(), "detector model produced no outputs");
        Ok(outputs.remove(0).into_tensor())
    }
}

fn load_runnable_model(path: &Path, optimized: bool) -> Result<RunnableModel> {
    let model = tract_onnx::onnx()
        .model_for_path(path)
        .with_context(|| format!("failed to parse ONNX graph from {}", path.display()))?;

    if optimized {
        model
            .into_optimized()
            .map_err(|e| anyhow::anyhow!("unable to optimize detector graph: {e}"))?
            .into_runnable()
            .map_err(|e| anyhow::anyhow!("unable to make detector graph runnable: {e}"))
    } else {
        model
            .into_typed()
            .map_err(|e| anyhow::anyhow!("unable to type-check detector graph: {e}"))?
            .into_decluttered()
            .map_err(|e| anyhow::anyhow!("unable to declutter detector graph: {e}"))?
            .into_runnable()
            .map_err(|e| anyhow::anyhow!("unable to make detector graph runnable: {e}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn loading_missing_model_fails() {
        let result = TractEngine::load("missing.onnx");
        assert!(result.is_err());
    }

    #[test]
    fn invalid_model_produces_useful_error() {
        let mut temp = NamedTempFile::new().expect("temp file");
        temp.write_all(b"not a real onnx file")
            .expect("write mock model");

        let err = TractEngine::load(temp.path()).expect_err("invalid ONNX should fail");
        let message = format!("{err}");
        assert!(
            message.contains("failed to parse ONNX") || message.contains("unable to optimize"),
            "Unexpected error message: {message}"
        );
    }
}
