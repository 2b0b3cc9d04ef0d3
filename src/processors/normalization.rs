//! Image normalization into channel-major tensors.
//!
//! Every stage feeds its model `(v * scale - mean[c]) / std[c]` per channel,
//! laid out as `[batch, channels, height, width]`. The per-channel factors are
//! folded into `alpha = scale / std` and `beta = -mean / std` once, at
//! construction.

use crate::core::constants::{DEFAULT_SCALE, REC_NORM_VALUE};
use crate::core::errors::{OCRError, OcrResult};
use crate::core::inference::Tensor4D;
use image::RgbImage;
use ndarray::Array4;
use rayon::prelude::*;

/// Normalizes RGB images into an NCHW tensor.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizeImage {
    /// Scaling factors for each channel (alpha = scale / std)
    pub alpha: [f32; 3],
    /// Offset values for each channel (beta = -mean / std)
    pub beta: [f32; 3],
}

impl NormalizeImage {
    /// Creates a normalizer from a pixel scale and RGB-ordered mean and std.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the scale or any std value is not
    /// strictly positive.
    pub fn new(scale: f32, mean: [f32; 3], std: [f32; 3]) -> OcrResult<Self> {
        if scale <= 0.0 || !scale.is_finite() {
            return Err(OCRError::config_error(format!(
                "normalization scale must be greater than 0, got {scale}"
            )));
        }
        if let Some((i, s)) = std.iter().enumerate().find(|(_, s)| **s <= 0.0) {
            return Err(OCRError::config_error(format!(
                "standard deviation at index {i} must be greater than 0, got {s}"
            )));
        }

        Ok(Self {
            alpha: std.map(|s| scale / s),
            beta: [0, 1, 2].map(|c| -mean[c] / std[c]),
        })
    }

    /// `(v / 255 - mean) / std` with the given statistics.
    pub fn with_unit_scale(mean: [f32; 3], std: [f32; 3]) -> OcrResult<Self> {
        Self::new(DEFAULT_SCALE, mean, std)
    }

    /// Recognition input: `(v / 255 - 0.5) / 0.5` on every channel.
    pub fn for_recognition() -> Self {
        let a = DEFAULT_SCALE / REC_NORM_VALUE;
        let b = -REC_NORM_VALUE / REC_NORM_VALUE;
        Self {
            alpha: [a; 3],
            beta: [b; 3],
        }
    }

    #[inline]
    fn value(&self, v: u8, c: usize) -> f32 {
        v as f32 * self.alpha[c] + self.beta[c]
    }

    /// Normalizes a batch of equally sized images into one tensor.
    ///
    /// An empty batch yields a tensor with a zero batch dimension.
    ///
    /// # Errors
    ///
    /// Returns a normalization error if the images differ in size.
    pub fn to_batch_tensor(&self, imgs: &[RgbImage]) -> OcrResult<Tensor4D> {
        let Some(first) = imgs.first() else {
            return Ok(Array4::zeros((0, 3, 0, 0)));
        };
        let (width, height) = first.dimensions();
        if let Some(odd) = imgs.iter().find(|img| img.dimensions() != (width, height)) {
            return Err(OCRError::normalization(
                "batch images must share one size",
                crate::core::errors::SimpleError::new(format!(
                    "expected {width}x{height}, got {}x{}",
                    odd.width(),
                    odd.height()
                )),
            ));
        }

        let (h, w) = (height as usize, width as usize);
        let plane = h * w;
        let data: Vec<f32> = imgs
            .par_iter()
            .flat_map_iter(|img| {
                let mut chw = vec![0.0f32; 3 * plane];
                for (x, y, pixel) in img.enumerate_pixels() {
                    let i = y as usize * w + x as usize;
                    for c in 0..3 {
                        chw[c * plane + i] = self.value(pixel[c], c);
                    }
                }
                chw
            })
            .collect();

        Ok(Array4::from_shape_vec((imgs.len(), 3, h, w), data)?)
    }

    /// Normalizes a single image into a `[1, 3, H, W]` tensor.
    pub fn to_tensor(&self, img: &RgbImage) -> OcrResult<Tensor4D> {
        self.to_batch_tensor(std::slice::from_ref(img))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    #[test]
    fn detection_normalization_matches_formula() {
        let norm =
            NormalizeImage::with_unit_scale([0.485, 0.456, 0.406], [0.229, 0.224, 0.225]).unwrap();
        let img = RgbImage::from_pixel(2, 1, Rgb([255, 0, 128]));
        let t = norm.to_tensor(&img).unwrap();
        assert_eq!(t.shape(), &[1, 3, 1, 2]);
        assert!((t[[0, 0, 0, 0]] - (1.0 - 0.485) / 0.229).abs() < 1e-5);
        assert!((t[[0, 1, 0, 1]] - (0.0 - 0.456) / 0.224).abs() < 1e-5);
        assert!((t[[0, 2, 0, 0]] - (128.0 / 255.0 - 0.406) / 0.225).abs() < 1e-5);
    }

    #[test]
    fn recognition_normalization_maps_to_unit_range() {
        let norm = NormalizeImage::for_recognition();
        let white = RgbImage::from_pixel(1, 1, Rgb([255, 255, 255]));
        let black = RgbImage::from_pixel(1, 1, Rgb([0, 0, 0]));
        let t = norm.to_batch_tensor(&[white, black]).unwrap();
        assert!((t[[0, 0, 0, 0]] - 1.0).abs() < 1e-6);
        assert!((t[[1, 2, 0, 0]] + 1.0).abs() < 1e-6);
    }

    #[test]
    fn mismatched_batch_is_rejected() {
        let norm = NormalizeImage::for_recognition();
        let a = RgbImage::new(4, 2);
        let b = RgbImage::new(5, 2);
        assert!(norm.to_batch_tensor(&[a, b]).is_err());
    }

    #[test]
    fn non_positive_std_is_rejected() {
        assert!(NormalizeImage::new(1.0, [0.0; 3], [1.0, 0.0, 1.0]).is_err());
        assert!(NormalizeImage::new(0.0, [0.0; 3], [1.0; 3]).is_err());
    }
}
