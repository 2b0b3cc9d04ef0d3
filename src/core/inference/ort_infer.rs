//! ONNX Runtime implementation of [`InferenceEngine`].

use super::{InferenceEngine, Tensor4D, TensorD};
use crate::core::errors::OcrResult;
use ort::session::Session;
use std::path::PathBuf;
use std::sync::Mutex;

#[path = "ort_infer_builders.rs"]
mod ort_infer_builders;
#[path = "ort_infer_execution.rs"]
mod ort_infer_execution;

/// One ONNX Runtime session bound to a model's first input and first output.
pub struct OrtInfer {
    pub(super) session: Mutex<Session>,
    pub(super) input_name: String,
    pub(super) output_name: String,
    pub(super) model_path: PathBuf,
    pub(super) model_name: String,
}

impl std::fmt::Debug for OrtInfer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OrtInfer")
            .field("input_name", &self.input_name)
            .field("output_name", &self.output_name)
            .field("model_path", &self.model_path)
            .field("model_name", &self.model_name)
            .finish()
    }
}

impl OrtInfer {
    /// Returns the model name associated with this inference engine.
    pub fn model_name(&self) -> &str {
        &self.model_name
    }
}

impl InferenceEngine for OrtInfer {
    fn infer(&self, input: &Tensor4D) -> OcrResult<TensorD> {
        self.run(input)
    }

    fn input_name(&self) -> &str {
        &self.input_name
    }

    fn output_name(&self) -> &str {
        &self.output_name
    }

    fn engine_info(&self) -> String {
        format!(
            "{} ({} -> {})",
            self.model_name, self.input_name, self.output_name
        )
    }
}
