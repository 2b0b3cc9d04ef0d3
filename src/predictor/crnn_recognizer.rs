//! CRNN Text Recognizer
//!
//! Crops are scaled to the model height, right-padded with white to the
//! widest crop of the batch, turned by 180 degrees when their orientation
//! flag is set, and decoded with greedy CTC.

use crate::core::config::{ConfigValidator, ModelYaml, RecognizerParams, StageConfig, TaskKind};
use crate::core::context::CallContext;
use crate::core::errors::{OCRError, OcrResult};
use crate::core::inference::{InferenceEnvironment, ModelSession};
use crate::core::traits::Stage;
use crate::processors::{CTCLabelDecode, NormalizeImage, RecResize};
use image::imageops;
use tracing::debug;

/// Recognition stage.
#[derive(Debug)]
pub struct TextRecognizer {
    session: ModelSession,
    params: RecognizerParams,
    resize: RecResize,
    normalize: NormalizeImage,
    decoder: CTCLabelDecode,
}

impl TextRecognizer {
    /// Builds the recognizer from its stage configuration and opens the model.
    ///
    /// # Errors
    ///
    /// Besides the usual configuration and model errors, fails when the YAML
    /// lacks `PreProcess` or `PostProcess.character_dict`.
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
        let (params, diagnostics) = RecognizerParams::from_yaml(&yaml)?;
        diagnostics.emit();

        let recognizer = Self::from_parts(ModelSession::new(config, environment), params);
        recognizer.session.ensure_ready()?;
        Ok(recognizer)
    }

    pub fn from_parts(session: ModelSession, params: RecognizerParams) -> Self {
        Self {
            resize: RecResize::new(params.height),
            normalize: NormalizeImage::for_recognition(),
            decoder: CTCLabelDecode::new(&params.character_dict),
            params,
            session,
        }
    }

    pub fn params(&self) -> &RecognizerParams {
        &self.params
    }
}

impl Stage for TextRecognizer {
    fn task(&self) -> TaskKind {
        TaskKind::Recognition
    }

    fn session(&self) -> &ModelSession {
        &self.session
    }

    fn pre_process(&self, ctx: &mut CallContext) -> OcrResult<()> {
        if ctx.crops.is_empty() {
            let whole = ctx.ensure_image()?.clone();
            ctx.crops.push(whole);
            ctx.flags = vec![0];
        }
        if ctx.flags.is_empty() {
            ctx.flags = vec![0; ctx.crops.len()];
        }
        if ctx.flags.len() != ctx.crops.len() {
            return Err(OCRError::invalid_input(format!(
                "{} orientation flags for {} crops",
                ctx.flags.len(),
                ctx.crops.len()
            )));
        }

        let (mut batch, max_width) = self.resize.apply(&ctx.crops);
        for (img, &flag) in batch.iter_mut().zip(&ctx.flags) {
            if flag != 0 {
                *img = imageops::rotate180(img);
            }
        }
        debug!(batch = batch.len(), width = max_width, "recognition input prepared");
        ctx.input = Some(self.normalize.to_batch_tensor(&batch)?);
        Ok(())
    }

    fn post_process(&self, ctx: &mut CallContext) -> OcrResult<()> {
        let output = ctx.take_output()?;
        let decoded = self.decoder.apply(&output)?;
        for (i, d) in decoded.iter().enumerate() {
            debug!(index = i, text = %d.text, score = d.score, "recognized");
        }
        let (texts, scores) = decoded.into_iter().map(|d| (d.text, d.score)).unzip();
        ctx.texts = texts;
        ctx.text_scores = scores;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::inference::mock::MockEngine;
    use image::{Rgb, RgbImage};
    use ndarray::Array3;
    use std::sync::Arc;

    fn params() -> RecognizerParams {
        RecognizerParams {
            channels: 3,
            height: 48,
            width: 320,
            character_dict: vec!["h".into(), "i".into()],
        }
    }

    fn recognizer(engine: Arc<MockEngine>) -> TextRecognizer {
        let config = StageConfig::new(TaskKind::Recognition, "rec.onnx", "rec.yml");
        TextRecognizer::from_parts(ModelSession::with_engine(config, Box::new(engine)), params())
    }

    /// Output spelling "hi" for every batch element: h, h, blank, i.
    fn hi_output(batch: usize) -> ndarray::ArrayD<f32> {
        let mut out = Array3::<f32>::zeros((batch, 4, 4));
        for b in 0..batch {
            out[[b, 0, 1]] = 0.9;
            out[[b, 1, 1]] = 0.9;
            out[[b, 2, 0]] = 0.9;
            out[[b, 3, 2]] = 0.7;
        }
        out.into_dyn()
    }

    #[test]
    fn decodes_each_crop_with_padded_batch() {
        let engine = Arc::new(MockEngine::repeating(hi_output(2)));
        let rec = recognizer(engine.clone());
        let mut ctx = CallContext::default();
        ctx.crops = vec![RgbImage::new(100, 24), RgbImage::new(30, 48)];

        assert!(rec.infer(&mut ctx).unwrap());
        assert_eq!(ctx.texts, vec!["hi".to_string(), "hi".to_string()]);
        assert!((ctx.text_scores[0] - 0.8).abs() < 1e-6);
        assert_eq!(engine.seen_shapes.lock().unwrap()[0], vec![2, 3, 48, 200]);
    }

    #[test]
    fn flagged_crop_is_rotated_before_normalization() {
        let engine = Arc::new(MockEngine::repeating(hi_output(1)));
        let rec = recognizer(engine);
        let mut crop = RgbImage::from_pixel(48, 48, Rgb([255, 255, 255]));
        crop.put_pixel(0, 0, Rgb([0, 0, 0]));

        let mut ctx = CallContext::for_region(crop, 1);
        rec.pre_process(&mut ctx).unwrap();
        let input = ctx.input.as_ref().unwrap();
        assert!((input[[0, 0, 47, 47]] + 1.0).abs() < 1e-6);
        assert!((input[[0, 0, 0, 0]] - 1.0).abs() < 1e-6);
    }

    #[test]
    fn standalone_call_uses_whole_image() {
        let engine = Arc::new(MockEngine::repeating(hi_output(1)));
        let rec = recognizer(engine);
        let mut ctx = CallContext::from_image(RgbImage::new(96, 24));
        assert!(rec.infer(&mut ctx).unwrap());
        assert_eq!(ctx.flags, vec![0]);
        assert_eq!(ctx.texts, vec!["hi".to_string()]);
    }

    #[test]
    fn flag_count_mismatch_is_invalid_input() {
        let rec = recognizer(Arc::new(MockEngine::repeating(hi_output(1))));
        let mut ctx = CallContext::default();
        ctx.crops = vec![RgbImage::new(10, 10), RgbImage::new(10, 10)];
        ctx.flags = vec![0];
        assert!(matches!(
            rec.infer(&mut ctx),
            Err(OCRError::InvalidInput { .. })
        ));
    }
}
