//! Error types for the OCR pipeline.
//!
//! [`OCRError`] is shared by every stage. Helper constructors attach the
//! processing step, model name or path to the underlying failure.

use std::path::{Path, PathBuf};
use thiserror::Error;

/// Which processing step a [`OCRError::Processing`] came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessingStage {
    TensorOperation,
    Normalization,
    Resize,
    PostProcessing,
    Rectification,
    Generic,
}

impl std::fmt::Display for ProcessingStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProcessingStage::TensorOperation => write!(f, "tensor operation"),
            ProcessingStage::Normalization => write!(f, "normalization"),
            ProcessingStage::Resize => write!(f, "resize"),
            ProcessingStage::PostProcessing => write!(f, "post-processing"),
            ProcessingStage::Rectification => write!(f, "rectification"),
            ProcessingStage::Generic => write!(f, "processing"),
        }
    }
}

/// Errors produced while configuring or running the pipeline.
#[derive(Error, Debug)]
pub enum OCRError {
    /// The source image could not be decoded.
    #[error("image load")]
    ImageLoad(#[source] image::ImageError),

    /// A pre- or post-processing step failed.
    #[error("{kind} failed: {context}")]
    Processing {
        kind: ProcessingStage,
        context: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Error occurred inside the inference engine.
    #[error("inference on model '{model}': {context}")]
    Inference {
        /// Name of the model that was running.
        model: String,
        /// What the engine was doing when it failed.
        context: String,
        /// The underlying engine error.
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// A model artifact could not be loaded.
    #[error("failed to load model '{path}': {message}")]
    ModelLoad {
        /// Path of the model artifact.
        path: PathBuf,
        /// Description of the failure.
        message: String,
        /// The underlying error, when there is one.
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// The caller handed a stage something it cannot work with.
    #[error("invalid input: {message}")]
    InvalidInput { message: String },

    #[error("configuration: {message}")]
    ConfigError { message: String },

    #[error(transparent)]
    Session(#[from] ort::Error),

    #[error("tensor shape")]
    Tensor(#[from] ndarray::ShapeError),

    #[error("io")]
    Io(#[from] std::io::Error),
}

/// Result alias used throughout the crate.
pub type OcrResult<T> = Result<T, OCRError>;

/// A plain message usable as the `source` of a wrapped error.
#[derive(Error, Debug)]
#[error("{message}")]
pub struct SimpleError {
    message: String,
}

impl SimpleError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl OCRError {
    /// Wraps a failure while turning model output into results.
    pub fn post_processing(
        context: &str,
        error: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::processing_error(ProcessingStage::PostProcessing, context, error)
    }

    /// Wraps a failure while building an input tensor.
    pub fn normalization(
        context: &str,
        error: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::processing_error(ProcessingStage::Normalization, context, error)
    }

    /// Wraps a failure while resizing an image.
    pub fn resize_error(
        context: &str,
        error: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::processing_error(ProcessingStage::Resize, context, error)
    }

    /// A region whose perspective transform cannot be solved.
    pub fn rectification(context: &str) -> Self {
        Self::processing_error(
            ProcessingStage::Rectification,
            context,
            SimpleError::new(context),
        )
    }

    fn processing_error(
        kind: ProcessingStage,
        context: &str,
        error: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Processing {
            kind,
            context: context.to_string(),
            source: Box::new(error),
        }
    }

    /// Wraps an engine failure with the model name and what it was doing.
    pub fn inference_error(
        model: &str,
        context: &str,
        error: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Inference {
            model: model.to_string(),
            context: context.to_string(),
            source: Box::new(error),
        }
    }

    pub fn model_load_error(
        path: &Path,
        message: &str,
        error: Option<impl std::error::Error + Send + Sync + 'static>,
    ) -> Self {
        Self::ModelLoad {
            path: path.to_path_buf(),
            message: message.to_string(),
            source: error.map(|e| Box::new(e) as Box<dyn std::error::Error + Send + Sync>),
        }
    }

    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput {
            message: message.into(),
        }
    }

    pub fn config_error(message: impl Into<String>) -> Self {
        Self::ConfigError {
            message: message.into(),
        }
    }

    /// Returns true when the error is local to one call and the pipeline may go on.
    ///
    /// Image decode failures and unreadable files degrade to an empty result,
    /// everything else is surfaced to the caller.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::ImageLoad(_) | Self::Io(_))
    }
}

impl From<image::ImageError> for OCRError {
    fn from(error: image::ImageError) -> Self {
        Self::ImageLoad(error)
    }
}

impl From<crate::core::config::ConfigError> for OCRError {
    fn from(error: crate::core::config::ConfigError) -> Self {
        Self::ConfigError {
            message: error.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn processing_error_reports_stage_and_context() {
        let err = OCRError::post_processing("contour scoring", SimpleError::new("empty map"));
        assert_eq!(err.to_string(), "post-processing failed: contour scoring");
    }

    #[test]
    fn simple_error_displays_its_message_without_source() {
        let err = SimpleError::new("exhausted");
        assert_eq!(err.to_string(), "exhausted");
        assert!(std::error::Error::source(&err).is_none());
    }

    #[test]
    fn image_and_io_errors_are_recoverable() {
        let io = OCRError::from(std::io::Error::new(std::io::ErrorKind::NotFound, "gone"));
        assert!(io.is_recoverable());
        assert!(!OCRError::config_error("missing").is_recoverable());
        assert!(!OCRError::invalid_input("bad").is_recoverable());
    }

    #[test]
    fn model_load_error_keeps_path() {
        let err = OCRError::model_load_error(
            Path::new("models/det.onnx"),
            "file not found",
            None::<SimpleError>,
        );
        assert!(err.to_string().contains("models/det.onnx"));
    }
}
