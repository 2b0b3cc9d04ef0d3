//! Text Line Classifier
//!
//! Decides for every crop whether the text line is upright (flag 0) or turned
//! by 180 degrees (flag 1). Crops are resized to the model's fixed input size,
//! ignoring their aspect ratio, and classified in one batch.

use crate::core::config::{ConfigValidator, ModelYaml, OrientationParams, StageConfig, TaskKind};
use crate::core::context::CallContext;
use crate::core::errors::{OCRError, OcrResult, SimpleError};
use crate::core::inference::{InferenceEnvironment, ModelSession, TensorD};
use crate::core::traits::Stage;
use crate::processors::{ClsResize, NormalizeImage, argmax};
use ndarray::Ix2;
use tracing::{debug, info};

/// Rotation in degrees for each classifier output index.
const ANGLES: [u32; 2] = [0, 180];

/// Orientation stage.
#[derive(Debug)]
pub struct TextLineClassifier {
    session: ModelSession,
    params: OrientationParams,
    resize: ClsResize,
    normalize: NormalizeImage,
}

impl TextLineClassifier {
    /// Builds the classifier from its stage configuration and opens the model.
    pub fn new(config: StageConfig) -> OcrResult<Self> {
        Self::with_environment(config, InferenceEnvironment::global()?)
    }

    /// Like [`Self::new`], opening the model inside `environment`.
    pub fn with_environment(
        config: StageConfig,
        environment: &'static InferenceEnvironment,
    ) -> OcrResult<Self> {
        config.validate()?;
        config.validate_path_exists(&config.model_path)?;
        let yaml = ModelYaml::from_file(&config.config_path)?;
        let (params, diagnostics) = OrientationParams::from_yaml(&yaml)?;
        diagnostics.emit();

        let classifier = Self::from_parts(ModelSession::new(config, environment), params)?;
        classifier.session.ensure_ready()?;
        Ok(classifier)
    }

    pub fn from_parts(session: ModelSession, params: OrientationParams) -> OcrResult<Self> {
        Ok(Self {
            resize: ClsResize::new(params.width, params.height),
            normalize: NormalizeImage::new(params.scale, params.mean, params.std)?,
            params,
            session,
        })
    }

    pub fn params(&self) -> &OrientationParams {
        &self.params
    }
}

impl Stage for TextLineClassifier {
    fn task(&self) -> TaskKind {
        TaskKind::Orientation
    }

    fn session(&self) -> &ModelSession {
        &self.session
    }

    fn pre_process(&self, ctx: &mut CallContext) -> OcrResult<()> {
        if ctx.crops.is_empty() {
            let whole = ctx.ensure_image()?.clone();
            ctx.crops.push(whole);
        }
        let resized = self.resize.apply(&ctx.crops);
        ctx.input = Some(self.normalize.to_batch_tensor(&resized)?);
        debug!(batch = resized.len(), "orientation input prepared");
        Ok(())
    }

    fn post_process(&self, ctx: &mut CallContext) -> OcrResult<()> {
        let output: TensorD = ctx.take_output()?;
        let scores = output.view().into_dimensionality::<Ix2>().map_err(|e| {
            OCRError::post_processing(
                &format!("expected [batch, classes], got {:?}", output.shape()),
                e,
            )
        })?;

        let mut flags = Vec::with_capacity(scores.nrows());
        for (i, row) in scores.outer_iter().enumerate() {
            let (idx, score) = argmax(row).ok_or_else(|| {
                OCRError::post_processing(
                    "orientation output has no classes",
                    SimpleError::new("empty class axis"),
                )
            })?;
            let angle = ANGLES.get(idx).copied().unwrap_or(ANGLES[1]);
            info!(index = i, angle, score, "text line orientation");
            flags.push(u8::from(idx != 0));
        }
        ctx.flags = flags;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::inference::mock::MockEngine;
    use image::{Rgb, RgbImage};
    use ndarray::array;
    use std::sync::Arc;

    fn classifier(engine: Arc<MockEngine>) -> TextLineClassifier {
        let config = StageConfig::new(TaskKind::Orientation, "cls.onnx", "cls.yml");
        TextLineClassifier::from_parts(
            ModelSession::with_engine(config, Box::new(engine)),
            OrientationParams::default(),
        )
        .unwrap()
    }

    #[test]
    fn argmax_index_becomes_flag() {
        let engine = Arc::new(MockEngine::repeating(
            array![[0.9, 0.1], [0.2, 0.8], [0.5, 0.5]].into_dyn(),
        ));
        let cls = classifier(engine.clone());
        let mut ctx = CallContext::default();
        ctx.crops = vec![RgbImage::new(30, 10), RgbImage::new(60, 12), RgbImage::new(5, 5)];

        assert!(cls.infer(&mut ctx).unwrap());
        assert_eq!(ctx.flags, vec![0, 1, 0]);
        assert_eq!(engine.seen_shapes.lock().unwrap()[0], vec![3, 3, 80, 160]);
    }

    #[test]
    fn standalone_call_classifies_whole_image() {
        let engine = Arc::new(MockEngine::repeating(array![[0.3, 0.7]].into_dyn()));
        let cls = classifier(engine);
        let mut ctx = CallContext::from_image(RgbImage::from_pixel(50, 20, Rgb([1, 2, 3])));

        assert!(cls.infer(&mut ctx).unwrap());
        assert_eq!(ctx.crops.len(), 1);
        assert_eq!(ctx.crops[0].dimensions(), (50, 20));
        assert_eq!(ctx.flags, vec![1]);
    }

    #[test]
    fn malformed_output_is_an_error() {
        let engine = Arc::new(MockEngine::repeating(ndarray::ArrayD::zeros(vec![1, 2, 3])));
        let cls = classifier(engine);
        let mut ctx = CallContext::for_region(RgbImage::new(8, 8), 0);
        assert!(cls.infer(&mut ctx).is_err());
    }
}
