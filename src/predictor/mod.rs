//! Stage implementations for the OCR pipeline.
//!
//! - Text detection (finding text regions and rectifying them)
//! - Text line classification (upright or turned by 180 degrees)
//! - Text recognition (reading the characters of each crop)

/// Text recognition using a CRNN model with CTC decoding
pub mod crnn_recognizer;

/// Text detection using the DB (Differentiable Binarization) algorithm
pub mod db_detector;

/// Orientation classifier for cropped text lines
pub mod text_line_classifier;

pub use crnn_recognizer::TextRecognizer;
pub use db_detector::TextDetector;
pub use text_line_classifier::TextLineClassifier;

use crate::core::config::{ConfigError, StageConfig, TaskKind};
use crate::core::context::CallContext;
use crate::core::errors::OcrResult;
use crate::core::inference::{InferenceEnvironment, ModelSession};
use crate::core::traits::Stage;

/// The closed set of stages, selected by task kind.
#[derive(Debug)]
pub enum StageVariant {
    Detector(TextDetector),
    Orientation(TextLineClassifier),
    Recognizer(TextRecognizer),
}

impl StageVariant {
    /// Builds the stage matching `config.task` inside `environment`.
    ///
    /// # Errors
    ///
    /// `TaskKind::Combined` is not a single stage and is rejected.
    pub fn from_config(
        config: StageConfig,
        environment: &'static InferenceEnvironment,
    ) -> OcrResult<Self> {
        Ok(match config.task {
            TaskKind::Detection => {
                Self::Detector(TextDetector::with_environment(config, environment)?)
            }
            TaskKind::Orientation => {
                Self::Orientation(TextLineClassifier::with_environment(config, environment)?)
            }
            TaskKind::Recognition => {
                Self::Recognizer(TextRecognizer::with_environment(config, environment)?)
            }
            TaskKind::Combined => {
                return Err(ConfigError::InvalidConfig {
                    message: "the combined task is a pipeline, not a stage".to_string(),
                }
                .into());
            }
        })
    }

    fn stage(&self) -> &dyn Stage {
        match self {
            Self::Detector(s) => s,
            Self::Orientation(s) => s,
            Self::Recognizer(s) => s,
        }
    }
}

impl Stage for StageVariant {
    fn task(&self) -> TaskKind {
        self.stage().task()
    }

    fn session(&self) -> &ModelSession {
        self.stage().session()
    }

    fn pre_process(&self, ctx: &mut CallContext) -> OcrResult<()> {
        self.stage().pre_process(ctx)
    }

    fn run_inference(&self, ctx: &mut CallContext) -> OcrResult<()> {
        self.stage().run_inference(ctx)
    }

    fn post_process(&self, ctx: &mut CallContext) -> OcrResult<()> {
        self.stage().post_process(ctx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::errors::OCRError;

    #[test]
    fn combined_task_is_not_a_stage() {
        let config = StageConfig::new(TaskKind::Combined, "m.onnx", "m.yml");
        assert!(matches!(
            StageVariant::from_config(config, InferenceEnvironment::detached()),
            Err(OCRError::ConfigError { .. })
        ));
    }

    #[test]
    fn missing_model_fails_construction() {
        let config = StageConfig::new(TaskKind::Detection, "/absent/det.onnx", "/absent/det.yml");
        assert!(StageVariant::from_config(config, InferenceEnvironment::detached()).is_err());
    }
}
