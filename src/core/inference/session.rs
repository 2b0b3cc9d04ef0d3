//! Lazily opened model session owned by a single stage.

use super::{InferenceEngine, InferenceEnvironment, OrtInfer};
use crate::core::config::StageConfig;
use crate::core::errors::{OCRError, OcrResult};
use once_cell::sync::OnceCell;
use tracing::{debug, info};

/// Lifecycle of a stage's model session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelState {
    /// Configuration loaded, model not opened yet.
    Constructed,
    /// The engine is open and accepts tensors.
    Ready,
}

/// The stage's configuration plus its inference engine, opened on first use.
///
/// The engine is created at most once. A failed open leaves the session in
/// [`ModelState::Constructed`] so the next call can retry.
#[derive(Debug)]
pub struct ModelSession {
    config: StageConfig,
    environment: Option<&'static InferenceEnvironment>,
    engine: OnceCell<Box<dyn InferenceEngine>>,
}

impl ModelSession {
    /// A session that opens its model inside `environment` on first use.
    pub fn new(config: StageConfig, environment: &'static InferenceEnvironment) -> Self {
        Self {
            config,
            environment: Some(environment),
            engine: OnceCell::new(),
        }
    }

    /// Creates a session whose engine is already open.
    pub fn with_engine(config: StageConfig, engine: Box<dyn InferenceEngine>) -> Self {
        Self {
            config,
            environment: None,
            engine: OnceCell::from(engine),
        }
    }

    /// The environment the model is opened in. `None` for injected engines.
    pub fn environment(&self) -> Option<&'static InferenceEnvironment> {
        self.environment
    }

    pub fn config(&self) -> &StageConfig {
        &self.config
    }

    pub fn state(&self) -> ModelState {
        if self.engine.get().is_some() {
            ModelState::Ready
        } else {
            ModelState::Constructed
        }
    }

    /// Opens the model if needed and returns the engine.
    pub fn ensure_ready(&self) -> OcrResult<&dyn InferenceEngine> {
        let engine = self.engine.get_or_try_init(|| {
            let path = &self.config.model_path;
            if !path.is_file() {
                return Err(OCRError::model_load_error(
                    path,
                    "model file not found",
                    None::<OCRError>,
                ));
            }
            let environment = self.environment.ok_or_else(|| {
                OCRError::model_load_error(
                    path,
                    "session has no inference environment",
                    None::<OCRError>,
                )
            })?;
            debug!(environment = environment.name(), model = %path.display(), "opening model");
            let engine = OrtInfer::from_stage_config(&self.config)?;
            info!(
                task = %self.config.task,
                backend = %self.config.backend,
                engine = %engine.engine_info(),
                "stage ready"
            );
            Ok::<Box<dyn InferenceEngine>, OCRError>(Box::new(engine))
        })?;
        Ok(engine.as_ref())
    }
}
