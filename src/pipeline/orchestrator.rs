//! Chains detection, orientation and recognition for one image.
//!
//! Each stage is optional. The detector and the classifier share one
//! [`CallContext`]; the recognizer then reads every crop on its own, in
//! reading order, with a single-element context carrying the crop's
//! orientation flag.

use crate::core::config::{ConfigValidator, TaskKind};
use crate::core::context::{CallContext, Region, StageTimings};
use crate::core::errors::OcrResult;
use crate::core::inference::InferenceEnvironment;
use crate::core::traits::Stage;
use crate::pipeline::config::PipelineConfig;
use crate::pipeline::stats::StatsManager;
use crate::predictor::{StageVariant, TextDetector, TextLineClassifier, TextRecognizer};
use image::RgbImage;
use std::path::Path;
use std::time::Instant;
use tracing::{debug, info};

/// Output of one pipeline call.
#[derive(Debug, Clone, Default)]
pub struct PipelineResult {
    /// Detected regions in reading order. Empty unless a detector ran.
    pub regions: Vec<Region>,
    /// Rectified crop of each region.
    pub crops: Vec<RgbImage>,
    /// Orientation flag of each crop. Empty unless the classifier ran.
    pub flags: Vec<u8>,
    /// Recognized text, one per region (or one for the whole image).
    pub texts: Vec<String>,
    /// Mean character score of each text.
    pub text_scores: Vec<f32>,
    /// Timings summed over every stage call.
    pub timings: StageTimings,
}

/// The configured stages of one pipeline.
#[derive(Debug, Default)]
pub struct Pipeline {
    detector: Option<TextDetector>,
    classifier: Option<TextLineClassifier>,
    recognizer: Option<TextRecognizer>,
    stats: StatsManager,
}

impl Pipeline {
    pub fn builder() -> PipelineBuilder {
        PipelineBuilder::default()
    }

    /// Builds every stage listed in `config` inside the process-wide
    /// inference environment.
    ///
    /// # Errors
    ///
    /// Fails if the configuration is invalid, the environment cannot be
    /// committed, or any stage cannot be constructed.
    pub fn from_config(config: &PipelineConfig) -> OcrResult<Self> {
        config.validate()?;
        Self::with_environment(config, InferenceEnvironment::global()?)
    }

    /// Like [`Self::from_config`] with an explicit environment.
    pub fn with_environment(
        config: &PipelineConfig,
        environment: &'static InferenceEnvironment,
    ) -> OcrResult<Self> {
        config.validate()?;
        let mut builder = PipelineBuilder::default();
        for stage in &config.stages {
            builder = match StageVariant::from_config(stage.clone(), environment)? {
                StageVariant::Detector(s) => builder.detector(s),
                StageVariant::Orientation(s) => builder.classifier(s),
                StageVariant::Recognizer(s) => builder.recognizer(s),
            };
        }
        Ok(builder.build())
    }

    /// What this pipeline does as a whole.
    pub fn task(&self) -> Option<TaskKind> {
        match (
            self.detector.is_some(),
            self.classifier.is_some(),
            self.recognizer.is_some(),
        ) {
            (false, false, false) => None,
            (true, false, false) => Some(TaskKind::Detection),
            (false, true, false) => Some(TaskKind::Orientation),
            (false, false, true) => Some(TaskKind::Recognition),
            _ => Some(TaskKind::Combined),
        }
    }

    pub fn stats(&self) -> &StatsManager {
        &self.stats
    }

    /// Runs the pipeline on an image file.
    pub fn run_path(&self, path: impl AsRef<Path>) -> OcrResult<PipelineResult> {
        self.run(CallContext::from_path(path))
    }

    /// Runs the pipeline on a decoded image.
    pub fn run_image(&self, image: RgbImage) -> OcrResult<PipelineResult> {
        self.run(CallContext::from_image(image))
    }

    /// Runs every configured stage against `ctx`.
    ///
    /// Engine failures abort the call. An unreadable image or an image without
    /// text regions ends the call early with whatever was produced so far.
    pub fn run(&self, ctx: CallContext) -> OcrResult<PipelineResult> {
        let start = Instant::now();
        let result = self.run_stages(ctx);
        let elapsed_ms = start.elapsed().as_secs_f64() * 1e3;
        match &result {
            Ok(_) => self.stats.update_stats(1, 1, 0, elapsed_ms),
            Err(_) => self.stats.update_stats(1, 0, 1, elapsed_ms),
        }
        result
    }

    fn run_stages(&self, mut ctx: CallContext) -> OcrResult<PipelineResult> {
        let mut result = PipelineResult::default();

        let mut proceed = true;
        if let Some(detector) = &self.detector {
            let ran = detector.infer(&mut ctx)?;
            result.timings += ctx.timings;
            proceed = ran && !ctx.regions.is_empty();
            if !proceed {
                debug!(ran, "detector produced nothing, skipping remaining stages");
            }
        }

        if proceed && let Some(classifier) = &self.classifier {
            proceed = classifier.infer(&mut ctx)?;
            result.timings += ctx.timings;
        }

        if proceed && let Some(recognizer) = &self.recognizer {
            // Crops come from the detector, or from the classifier holding the
            // whole image as its single crop.
            if !ctx.crops.is_empty() {
                for (i, crop) in ctx.crops.iter().enumerate() {
                    let flag = ctx.flags.get(i).copied().unwrap_or(0);
                    let mut region_ctx = CallContext::for_region(crop.clone(), flag);
                    recognizer.infer(&mut region_ctx)?;
                    result.timings += region_ctx.timings;
                    if let Some(text) = region_ctx.texts.pop() {
                        result.text_scores.push(region_ctx.text_scores.pop().unwrap_or(0.0));
                        result.texts.push(text);
                    }
                }
            } else {
                let mut whole = CallContext {
                    image_path: ctx.image_path.clone(),
                    image: ctx.image.take(),
                    ..Default::default()
                };
                recognizer.infer(&mut whole)?;
                result.timings += whole.timings;
                result.texts = whole.texts;
                result.text_scores = whole.text_scores;
            }
        }

        if self.detector.is_some() {
            result.regions = std::mem::take(&mut ctx.regions);
            result.crops = std::mem::take(&mut ctx.crops);
        }
        if self.classifier.is_some() {
            result.flags = std::mem::take(&mut ctx.flags);
        }

        info!(
            regions = result.regions.len(),
            texts = result.texts.len(),
            total_ms = result.timings.total().as_secs_f64() * 1e3,
            "pipeline finished"
        );
        Ok(result)
    }
}

/// Assembles a [`Pipeline`] from already constructed stages.
#[derive(Debug, Default)]
pub struct PipelineBuilder {
    detector: Option<TextDetector>,
    classifier: Option<TextLineClassifier>,
    recognizer: Option<TextRecognizer>,
}

impl PipelineBuilder {
    pub fn detector(mut self, detector: TextDetector) -> Self {
        self.detector = Some(detector);
        self
    }

    pub fn classifier(mut self, classifier: TextLineClassifier) -> Self {
        self.classifier = Some(classifier);
        self
    }

    pub fn recognizer(mut self, recognizer: TextRecognizer) -> Self {
        self.recognizer = Some(recognizer);
        self
    }

    pub fn build(self) -> Pipeline {
        Pipeline {
            detector: self.detector,
            classifier: self.classifier,
            recognizer: self.recognizer,
            stats: StatsManager::new(),
        }
    }
}
