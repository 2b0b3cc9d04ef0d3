//! Structures and helpers for ONNX Runtime inference.
//!
//! Stages talk to their model through the [`InferenceEngine`] trait. The ONNX
//! Runtime implementation is [`OrtInfer`]; tests substitute canned engines.
//! [`ModelSession`] owns the engine of one stage and opens it on first use
//! inside the process-wide [`InferenceEnvironment`].

pub mod environment;
pub mod ort_infer;
pub mod session;

pub use environment::InferenceEnvironment;
pub use ort_infer::OrtInfer;
pub use session::{ModelSession, ModelState};

use crate::core::errors::OcrResult;
use ndarray::{Array4, ArrayD};

/// A batch of images in NCHW layout.
pub type Tensor4D = Array4<f32>;

/// A model output of arbitrary rank.
pub type TensorD = ArrayD<f32>;

/// Runs one model on one input tensor.
pub trait InferenceEngine: Send + Sync + std::fmt::Debug {
    /// Executes the model and returns its first output.
    fn infer(&self, input: &Tensor4D) -> OcrResult<TensorD>;

    /// Name of the model input the tensor is bound to.
    fn input_name(&self) -> &str;

    /// Name of the model output that is returned.
    fn output_name(&self) -> &str;

    /// Short description used in logs.
    fn engine_info(&self) -> String {
        format!("{} -> {}", self.input_name(), self.output_name())
    }
}

#[cfg(test)]
pub(crate) mod mock {
    //! Engine returning canned outputs, for exercising stages without a model.

    use super::*;
    use std::sync::{Arc, Mutex};

    #[derive(Debug)]
    pub struct MockEngine {
        outputs: Mutex<Vec<TensorD>>,
        repeat: Option<TensorD>,
        pub seen_shapes: Mutex<Vec<Vec<usize>>>,
        pub seen_inputs: Mutex<Vec<Tensor4D>>,
    }

    impl MockEngine {
        /// Returns each output once, in order.
        pub fn sequence(outputs: Vec<TensorD>) -> Self {
            Self {
                outputs: Mutex::new(outputs.into_iter().rev().collect()),
                repeat: None,
                seen_shapes: Mutex::new(Vec::new()),
                seen_inputs: Mutex::new(Vec::new()),
            }
        }

        /// Returns the same output for every call.
        pub fn repeating(output: TensorD) -> Self {
            Self {
                outputs: Mutex::new(Vec::new()),
                repeat: Some(output),
                seen_shapes: Mutex::new(Vec::new()),
                seen_inputs: Mutex::new(Vec::new()),
            }
        }
    }

    impl InferenceEngine for MockEngine {
        fn infer(&self, input: &Tensor4D) -> OcrResult<TensorD> {
            self.seen_shapes.lock().unwrap().push(input.shape().to_vec());
            self.seen_inputs.lock().unwrap().push(input.clone());
            if let Some(out) = self.outputs.lock().unwrap().pop() {
                return Ok(out);
            }
            self.repeat.clone().ok_or_else(|| {
                crate::core::errors::OCRError::inference_error(
                    "mock",
                    "no canned output left",
                    crate::core::errors::SimpleError::new("exhausted"),
                )
            })
        }

        fn input_name(&self) -> &str {
            "x"
        }

        fn output_name(&self) -> &str {
            "fetch_name_0"
        }
    }

    /// Lets a test keep a handle on the engine after handing it to a session.
    impl InferenceEngine for Arc<MockEngine> {
        fn infer(&self, input: &Tensor4D) -> OcrResult<TensorD> {
            self.as_ref().infer(input)
        }

        fn input_name(&self) -> &str {
            self.as_ref().input_name()
        }

        fn output_name(&self) -> &str {
            self.as_ref().output_name()
        }
    }
}
