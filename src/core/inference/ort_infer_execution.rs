use super::*;
use crate::core::errors::{OCRError, SimpleError};
use ndarray::IxDyn;
use ort::value::TensorRef;

impl OrtInfer {
    pub(super) fn run(&self, x: &Tensor4D) -> OcrResult<TensorD> {
        let input_shape = x.shape().to_vec();

        let input_tensor = TensorRef::from_array_view(x.view()).map_err(|e| {
            OCRError::inference_error(
                &self.model_name,
                &format!("failed to convert input tensor with shape {input_shape:?}"),
                e,
            )
        })?;
        let inputs = ort::inputs![self.input_name.as_str() => input_tensor];

        let mut session = self.session.lock().map_err(|_| {
            OCRError::inference_error(
                &self.model_name,
                "session lock poisoned",
                SimpleError::new("a previous inference panicked"),
            )
        })?;

        let outputs = session.run(inputs).map_err(|e| {
            OCRError::inference_error(
                &self.model_name,
                &format!(
                    "forward pass failed for input '{}' with shape {input_shape:?}",
                    self.input_name
                ),
                e,
            )
        })?;

        let (shape, data) = outputs[self.output_name.as_str()]
            .try_extract_tensor::<f32>()
            .map_err(|e| {
                OCRError::inference_error(
                    &self.model_name,
                    &format!("failed to extract output '{}' as f32", self.output_name),
                    e,
                )
            })?;

        let dims: Vec<usize> = shape.iter().map(|&d| d.max(0) as usize).collect();
        let expected: usize = dims.iter().product();
        if data.len() != expected {
            return Err(OCRError::inference_error(
                &self.model_name,
                &format!(
                    "output '{}' holds {} values but its shape {dims:?} needs {expected}",
                    self.output_name,
                    data.len()
                ),
                SimpleError::new("output size mismatch"),
            ));
        }

        Ok(TensorD::from_shape_vec(IxDyn(&dims), data.to_vec())?)
    }
}
