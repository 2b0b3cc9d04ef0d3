//! Per-call state threaded through the stages.
//!
//! A [`CallContext`] is owned by whoever starts the call and passed by `&mut`
//! into each stage. Stages never keep it, so one stage can serve many calls.

use crate::core::errors::{OCRError, OcrResult};
use crate::core::inference::{Tensor4D, TensorD};
use crate::processors::{Quad, ResizeInfo};
use crate::utils::load_image;
use image::RgbImage;
use std::ops::AddAssign;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// A detected text region in source image coordinates.
#[derive(Debug, Clone, PartialEq)]
pub struct Region {
    /// Corners ordered top-left, top-right, bottom-right, bottom-left.
    pub points: Quad,
    /// Smallest y over the corners.
    pub top: f32,
    /// Smallest x over the corners.
    pub left: f32,
    /// Mean detection probability of the region.
    pub score: f32,
}

impl Region {
    pub fn new(points: Quad, score: f32) -> Self {
        let top = points.iter().map(|p| p.y).fold(f32::INFINITY, f32::min);
        let left = points.iter().map(|p| p.x).fold(f32::INFINITY, f32::min);
        Self {
            points,
            top,
            left,
            score,
        }
    }

    /// Reading order: by top, then by left.
    pub fn reading_order(a: &Region, b: &Region) -> std::cmp::Ordering {
        a.top.total_cmp(&b.top).then(a.left.total_cmp(&b.left))
    }
}

/// Durations of the three phases of a stage call.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct StageTimings {
    pub pre: Duration,
    pub infer: Duration,
    pub post: Duration,
}

impl StageTimings {
    pub fn total(&self) -> Duration {
        self.pre + self.infer + self.post
    }
}

impl AddAssign for StageTimings {
    fn add_assign(&mut self, rhs: Self) {
        self.pre += rhs.pre;
        self.infer += rhs.infer;
        self.post += rhs.post;
    }
}

/// Everything one call reads and produces.
#[derive(Debug, Default)]
pub struct CallContext {
    /// Where the source image comes from, when it is loaded lazily.
    pub image_path: Option<PathBuf>,
    /// Decoded source image.
    pub image: Option<RgbImage>,
    /// Geometry of the detector's resize, kept for mapping boxes back.
    pub resize_info: Option<ResizeInfo>,
    /// Tensor handed to the engine.
    pub input: Option<Tensor4D>,
    /// Raw engine output.
    pub output: Option<TensorD>,
    pub regions: Vec<Region>,
    /// Rectified crops, one per region.
    pub crops: Vec<RgbImage>,
    /// Orientation per crop: 0 upright, 1 rotated by 180 degrees.
    pub flags: Vec<u8>,
    pub texts: Vec<String>,
    /// Mean character score per text.
    pub text_scores: Vec<f32>,
    /// Timings of the most recent stage call.
    pub timings: StageTimings,
}

impl CallContext {
    /// A context whose image is decoded on first use.
    pub fn from_path(path: impl AsRef<Path>) -> Self {
        Self {
            image_path: Some(path.as_ref().to_path_buf()),
            ..Default::default()
        }
    }

    pub fn from_image(image: RgbImage) -> Self {
        Self {
            image: Some(image),
            ..Default::default()
        }
    }

    /// A single-element context for recognizing one region crop.
    pub fn for_region(crop: RgbImage, flag: u8) -> Self {
        Self {
            crops: vec![crop],
            flags: vec![flag],
            ..Default::default()
        }
    }

    /// Returns the source image, decoding it from `image_path` if needed.
    ///
    /// # Errors
    ///
    /// `OCRError::ImageLoad` if decoding fails, `InvalidInput` if the context
    /// has neither an image nor a path.
    pub fn ensure_image(&mut self) -> OcrResult<&RgbImage> {
        if self.image.is_none() {
            let path = self
                .image_path
                .as_deref()
                .ok_or_else(|| OCRError::invalid_input("call context has no image or image path"))?;
            self.image = Some(load_image(path)?);
        }
        self.image
            .as_ref()
            .ok_or_else(|| OCRError::invalid_input("call context has no image"))
    }

    /// Takes the prepared input tensor.
    pub fn take_input(&mut self) -> OcrResult<Tensor4D> {
        self.input
            .take()
            .ok_or_else(|| OCRError::invalid_input("no input tensor prepared for inference"))
    }

    /// Takes the raw engine output.
    pub fn take_output(&mut self) -> OcrResult<TensorD> {
        self.output
            .take()
            .ok_or_else(|| OCRError::invalid_input("no inference output to post-process"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::processors::Point;
    use image::Rgb;

    fn square(x: f32, y: f32) -> Quad {
        [
            Point::new(x, y),
            Point::new(x + 4.0, y),
            Point::new(x + 4.0, y + 4.0),
            Point::new(x, y + 4.0),
        ]
    }

    #[test]
    fn regions_sort_by_top_then_left() {
        let mut regions = vec![
            Region::new(square(50.0, 10.0), 0.9),
            Region::new(square(5.0, 10.0), 0.9),
            Region::new(square(0.0, 2.0), 0.9),
        ];
        regions.sort_by(Region::reading_order);
        let lefts: Vec<f32> = regions.iter().map(|r| r.left).collect();
        assert_eq!(lefts, vec![0.0, 5.0, 50.0]);
    }

    #[test]
    fn ensure_image_loads_lazily() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("in.png");
        RgbImage::from_pixel(4, 3, Rgb([9, 9, 9])).save(&path).unwrap();

        let mut ctx = CallContext::from_path(&path);
        assert!(ctx.image.is_none());
        assert_eq!(ctx.ensure_image().unwrap().dimensions(), (4, 3));
        assert!(ctx.image.is_some());
    }

    #[test]
    fn ensure_image_reports_missing_file() {
        let mut ctx = CallContext::from_path("/no/such/image.png");
        assert!(ctx.ensure_image().unwrap_err().is_recoverable());
        assert!(matches!(
            CallContext::default().ensure_image(),
            Err(OCRError::InvalidInput { .. })
        ));
    }

    #[test]
    fn timings_accumulate() {
        let mut total = StageTimings::default();
        let step = StageTimings {
            pre: Duration::from_millis(1),
            infer: Duration::from_millis(2),
            post: Duration::from_millis(3),
        };
        total += step;
        total += step;
        assert_eq!(total.total(), Duration::from_millis(12));
    }
}
