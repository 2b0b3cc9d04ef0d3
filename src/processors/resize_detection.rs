//! Aspect-preserving resize with centred white padding for the detector.
//!
//! The detector model takes a fixed `targetH x targetW` input. The image is
//! scaled by `min(targetH / h, targetW / w)`, rounded to whole pixels, and
//! centred on a white canvas. [`ResizeInfo`] records the geometry so boxes
//! found on the probability map can be mapped back onto the source image.

use crate::core::constants::PAD_VALUE;
use crate::core::errors::{OCRError, OcrResult};
use crate::processors::geometry::Point;
use image::imageops::{self, FilterType};
use image::{Rgb, RgbImage};

/// Geometry of one resize-and-pad operation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResizeInfo {
    pub scale: f32,
    pub pad_top: u32,
    pub pad_left: u32,
    pub src_width: u32,
    pub src_height: u32,
}

impl ResizeInfo {
    /// Maps a point on the padded canvas back to source pixels, clamped to
    /// `[0, width - 1] x [0, height - 1]`.
    pub fn to_source(&self, p: Point) -> Point {
        let max_x = self.src_width.saturating_sub(1) as f32;
        let max_y = self.src_height.saturating_sub(1) as f32;
        Point::new(
            ((p.x - self.pad_left as f32) / self.scale).clamp(0.0, max_x),
            ((p.y - self.pad_top as f32) / self.scale).clamp(0.0, max_y),
        )
    }
}

/// Resizes to a fixed canvas while keeping the aspect ratio.
#[derive(Debug, Clone, Copy)]
pub struct ResizePad {
    pub target_height: u32,
    pub target_width: u32,
}

impl ResizePad {
    pub fn new(target_height: u32, target_width: u32) -> Self {
        Self {
            target_height,
            target_width,
        }
    }

    /// Resizes and pads one image.
    ///
    /// # Errors
    ///
    /// Returns a resize error for an empty source image.
    pub fn apply(&self, img: &RgbImage) -> OcrResult<(RgbImage, ResizeInfo)> {
        let (w, h) = img.dimensions();
        if w == 0 || h == 0 {
            return Err(OCRError::resize_error(
                "cannot resize an empty image",
                crate::core::errors::SimpleError::new(format!("source is {w}x{h}")),
            ));
        }

        let scale = (self.target_height as f32 / h as f32).min(self.target_width as f32 / w as f32);
        let new_h = ((h as f32 * scale).round() as u32).clamp(1, self.target_height);
        let new_w = ((w as f32 * scale).round() as u32).clamp(1, self.target_width);

        let resized = imageops::resize(img, new_w, new_h, FilterType::Triangle);

        let pad_top = (self.target_height - new_h) / 2;
        let pad_left = (self.target_width - new_w) / 2;
        let mut canvas = RgbImage::from_pixel(
            self.target_width,
            self.target_height,
            Rgb([PAD_VALUE; 3]),
        );
        imageops::replace(&mut canvas, &resized, pad_left as i64, pad_top as i64);

        Ok((
            canvas,
            ResizeInfo {
                scale,
                pad_top,
                pad_left,
                src_width: w,
                src_height: h,
            },
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wide_image_is_padded_top_and_bottom() {
        let img = RgbImage::from_pixel(200, 100, Rgb([0, 0, 0]));
        let (out, info) = ResizePad::new(960, 960).apply(&img).unwrap();
        assert_eq!(out.dimensions(), (960, 960));
        assert!((info.scale - 4.8).abs() < 1e-6);
        assert_eq!(info.pad_left, 0);
        assert_eq!(info.pad_top, 240);
        assert_eq!(out.get_pixel(10, 10), &Rgb([255, 255, 255]));
        assert_eq!(out.get_pixel(480, 480), &Rgb([0, 0, 0]));
    }

    #[test]
    fn to_source_removes_padding_and_clamps() {
        let info = ResizeInfo {
            scale: 2.0,
            pad_top: 10,
            pad_left: 0,
            src_width: 50,
            src_height: 20,
        };
        assert_eq!(info.to_source(Point::new(20.0, 30.0)), Point::new(10.0, 10.0));
        assert_eq!(info.to_source(Point::new(500.0, 0.0)), Point::new(49.0, 0.0));
    }

    #[test]
    fn empty_image_is_rejected() {
        assert!(ResizePad::new(32, 32).apply(&RgbImage::new(0, 4)).is_err());
    }
}
