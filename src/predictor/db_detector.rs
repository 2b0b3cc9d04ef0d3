//! DB (Differentiable Binarization) Text Detector
//!
//! [`TextDetector`] resizes the source image onto the model canvas, runs the
//! DB model, turns its probability map into text quads, and rectifies every
//! quad into an upright crop for the downstream stages.

use crate::core::config::{ConfigValidator, DetectorParams, ModelYaml, StageConfig, TaskKind};
use crate::core::context::{CallContext, Region};
use crate::core::errors::{OCRError, OcrResult};
use crate::core::inference::{InferenceEnvironment, ModelSession, TensorD};
use crate::core::traits::Stage;
use crate::processors::{DBPostProcess, NormalizeImage, ResizePad};
use crate::utils::{bounding_crop, draw_regions, rectify, save_image_logged};
use image::RgbImage;
use ndarray::ArrayView2;
use tracing::{debug, info, warn};

/// Detection stage.
#[derive(Debug)]
pub struct TextDetector {
    session: ModelSession,
    params: DetectorParams,
    resize: ResizePad,
    normalize: NormalizeImage,
    post: DBPostProcess,
}

impl TextDetector {
    /// Builds the detector from its stage configuration and opens the model.
    ///
    /// # Errors
    ///
    /// Fails if the configuration is invalid, the YAML is missing or
    /// unparseable, or the model cannot be opened.
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
        let (params, diagnostics) = DetectorParams::from_yaml(&yaml)?;
        diagnostics.emit();

        let detector = Self::from_parts(ModelSession::new(config, environment), params)?;
        detector.session.ensure_ready()?;
        Ok(detector)
    }

    /// Builds the detector around an existing session without touching disk.
    pub fn from_parts(session: ModelSession, params: DetectorParams) -> OcrResult<Self> {
        let [_, height, width] = session.config().input_shape;
        let normalize = NormalizeImage::with_unit_scale(params.mean, params.std)?;
        Ok(Self {
            resize: ResizePad::new(height as u32, width as u32),
            post: DBPostProcess::new(&params),
            normalize,
            params,
            session,
        })
    }

    pub fn params(&self) -> &DetectorParams {
        &self.params
    }

    fn save_intermediates(&self, image: &RgbImage, regions: &[Region], crops: &[RgbImage]) {
        let dir = &self.session.config().output_dir;
        if let Err(e) = std::fs::create_dir_all(dir) {
            warn!(dir = %dir.display(), error = %e, "cannot create output directory");
            return;
        }
        for (i, (region, crop)) in regions.iter().zip(crops).enumerate() {
            if let Some(roi) = bounding_crop(image, &region.points) {
                save_image_logged(&roi, &dir.join(format!("det_mat_{i}.png")));
            }
            save_image_logged(crop, &dir.join(format!("corrected_mat_{i}.png")));
        }
        let quads: Vec<_> = regions.iter().map(|r| r.points).collect();
        save_image_logged(&draw_regions(image, &quads), &dir.join("dec_dst.png"));
    }
}

/// Views a `[1, 1, H, W]` (or `[1, H, W]`, `[H, W]`) output as the probability map.
fn probability_map(output: &TensorD) -> OcrResult<ArrayView2<'_, f32>> {
    let shape = output.shape();
    let n = shape.len();
    if n < 2 || shape[..n - 2].iter().any(|&d| d != 1) {
        return Err(OCRError::post_processing(
            &format!("expected a single probability map, got shape {shape:?}"),
            crate::core::errors::SimpleError::new("unexpected detector output"),
        ));
    }
    let (h, w) = (shape[n - 2], shape[n - 1]);
    Ok(output.view().into_shape_with_order((h, w))?)
}

/// Rectifies every region, dropping the ones whose crop cannot be built.
///
/// Regions and crops stay index-aligned.
fn rectify_regions(image: &RgbImage, regions: Vec<Region>) -> (Vec<Region>, Vec<RgbImage>) {
    let mut kept = Vec::with_capacity(regions.len());
    let mut crops = Vec::with_capacity(regions.len());
    for region in regions {
        match rectify(image, &region.points) {
            Ok(crop) => {
                kept.push(region);
                crops.push(crop);
            }
            Err(e) => warn!(
                score = region.score,
                error = %e,
                "skipping region that cannot be rectified"
            ),
        }
    }
    (kept, crops)
}

impl Stage for TextDetector {
    fn task(&self) -> TaskKind {
        TaskKind::Detection
    }

    fn session(&self) -> &ModelSession {
        &self.session
    }

    fn pre_process(&self, ctx: &mut CallContext) -> OcrResult<()> {
        let (canvas, info) = self.resize.apply(ctx.ensure_image()?)?;
        debug!(
            scale = info.scale,
            pad_top = info.pad_top,
            pad_left = info.pad_left,
            "detector input prepared"
        );
        ctx.input = Some(self.normalize.to_tensor(&canvas)?);
        ctx.resize_info = Some(info);
        Ok(())
    }

    fn post_process(&self, ctx: &mut CallContext) -> OcrResult<()> {
        let output = ctx.take_output()?;
        let info = ctx
            .resize_info
            .ok_or_else(|| OCRError::invalid_input("detector output without resize geometry"))?;

        let mut regions: Vec<Region> = self
            .post
            .apply(probability_map(&output)?)
            .into_iter()
            .map(|b| Region::new(b.quad.map(|p| info.to_source(p)), b.score))
            .collect();
        regions.sort_by(Region::reading_order);

        let image = ctx
            .image
            .as_ref()
            .ok_or_else(|| OCRError::invalid_input("detector context lost its image"))?;
        let (regions, crops) = rectify_regions(image, regions);

        if self.session.config().save_images {
            self.save_intermediates(image, &regions, &crops);
        }

        if regions.is_empty() {
            info!("no text regions");
        } else {
            info!(regions = regions.len(), "text regions detected");
        }
        ctx.regions = regions;
        ctx.crops = crops;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::inference::mock::MockEngine;
    use image::Rgb;
    use ndarray::Array4;
    use std::sync::Arc;

    fn detector(engine: Arc<MockEngine>, shape: [usize; 3]) -> TextDetector {
        let config =
            StageConfig::new(TaskKind::Detection, "det.onnx", "det.yml").with_input_shape(shape);
        TextDetector::from_parts(
            ModelSession::with_engine(config, Box::new(engine)),
            DetectorParams::default(),
        )
        .unwrap()
    }

    #[test]
    fn block_on_map_becomes_landscape_region() {
        let mut map = Array4::<f32>::zeros((1, 1, 64, 64));
        for y in 20..30 {
            for x in 10..50 {
                map[[0, 0, y, x]] = 0.9;
            }
        }
        let engine = Arc::new(MockEngine::repeating(map.into_dyn()));
        let det = detector(engine.clone(), [3, 64, 64]);

        let mut ctx = CallContext::from_image(RgbImage::from_pixel(100, 50, Rgb([255, 255, 255])));
        assert!(det.infer(&mut ctx).unwrap());

        assert_eq!(engine.seen_shapes.lock().unwrap()[0], vec![1, 3, 64, 64]);
        assert_eq!(ctx.regions.len(), 1);
        assert_eq!(ctx.crops.len(), 1);
        for p in ctx.regions[0].points {
            assert!((0.0..=99.0).contains(&p.x));
            assert!((0.0..=49.0).contains(&p.y));
        }
        assert!(ctx.crops[0].width() >= ctx.crops[0].height());
    }

    fn square(x: f32, y: f32, side: f32) -> Region {
        use crate::processors::Point;
        Region::new(
            [
                Point::new(x, y),
                Point::new(x + side, y),
                Point::new(x + side, y + side),
                Point::new(x, y + side),
            ],
            0.9,
        )
    }

    #[test]
    fn unrectifiable_regions_are_dropped_not_fatal() {
        let pair = vec![square(0.0, 0.0, 8.0), square(16.0, 16.0, 8.0)];
        let (regions, crops) = rectify_regions(&RgbImage::new(0, 0), pair.clone());
        assert!(regions.is_empty());
        assert!(crops.is_empty());

        let (regions, crops) = rectify_regions(&RgbImage::new(32, 32), pair);
        assert_eq!(regions.len(), 2);
        assert_eq!(crops.len(), 2);
    }

    #[test]
    fn blank_map_yields_no_regions() {
        let engine = Arc::new(MockEngine::repeating(
            Array4::<f32>::zeros((1, 1, 32, 32)).into_dyn(),
        ));
        let det = detector(engine, [3, 32, 32]);
        let mut ctx = CallContext::from_image(RgbImage::new(40, 40));
        assert!(det.infer(&mut ctx).unwrap());
        assert!(ctx.regions.is_empty());
        assert!(ctx.crops.is_empty());
    }

    #[test]
    fn unreadable_image_reports_not_run() {
        let engine = Arc::new(MockEngine::repeating(
            Array4::<f32>::zeros((1, 1, 32, 32)).into_dyn(),
        ));
        let det = detector(engine.clone(), [3, 32, 32]);
        let mut ctx = CallContext::from_path("/missing/input.jpg");
        assert!(!det.infer(&mut ctx).unwrap());
        assert!(engine.seen_shapes.lock().unwrap().is_empty());
    }

    #[test]
    fn saves_intermediate_images() {
        let dir = tempfile::tempdir().unwrap();
        let mut map = Array4::<f32>::zeros((1, 1, 32, 32));
        for y in 8..16 {
            for x in 4..28 {
                map[[0, 0, y, x]] = 0.95;
            }
        }
        let config = StageConfig::new(TaskKind::Detection, "det.onnx", "det.yml")
            .with_input_shape([3, 32, 32])
            .with_save_images(true, dir.path());
        let det = TextDetector::from_parts(
            ModelSession::with_engine(config, Box::new(MockEngine::repeating(map.into_dyn()))),
            DetectorParams::default(),
        )
        .unwrap();

        let mut ctx = CallContext::from_image(RgbImage::new(32, 32));
        det.infer(&mut ctx).unwrap();
        assert_eq!(ctx.regions.len(), 1);
        assert!(dir.path().join("dec_dst.png").is_file());
        assert!(dir.path().join("det_mat_0.png").is_file());
        assert!(dir.path().join("corrected_mat_0.png").is_file());
    }

    #[test]
    fn rejects_multi_map_output() {
        let out = ndarray::ArrayD::<f32>::zeros(vec![2, 1, 4, 4]);
        assert!(probability_map(&out).is_err());
    }
}
