//! Resizing of cropped text lines for the classifier and the recognizer.

use crate::core::constants::PAD_VALUE;
use image::imageops::{self, FilterType};
use image::{Rgb, RgbImage};

/// Resizes every crop to one fixed size, ignoring the aspect ratio.
#[derive(Debug, Clone, Copy)]
pub struct ClsResize {
    pub width: u32,
    pub height: u32,
}

impl ClsResize {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn apply(&self, imgs: &[RgbImage]) -> Vec<RgbImage> {
        imgs.iter()
            .map(|img| imageops::resize(img, self.width, self.height, FilterType::Triangle))
            .collect()
    }
}

/// Resizes crops to a fixed height and pads them on the right to a common width.
#[derive(Debug, Clone, Copy)]
pub struct RecResize {
    pub height: u32,
}

impl RecResize {
    pub fn new(height: u32) -> Self {
        Self { height }
    }

    /// Width after scaling to the target height: `trunc(cols * height / rows)`, at least 1.
    pub fn scaled_width(&self, img: &RgbImage) -> u32 {
        let (w, h) = img.dimensions();
        if h == 0 {
            return 1;
        }
        let scale = self.height as f32 / h as f32;
        ((w as f32 * scale) as u32).max(1)
    }

    /// Returns the resized crops, all padded with white to the widest one,
    /// together with that width.
    pub fn apply(&self, imgs: &[RgbImage]) -> (Vec<RgbImage>, u32) {
        let resized: Vec<RgbImage> = imgs
            .iter()
            .map(|img| {
                imageops::resize(img, self.scaled_width(img), self.height, FilterType::Triangle)
            })
            .collect();
        let max_width = resized.iter().map(RgbImage::width).max().unwrap_or(0);

        let padded = resized
            .into_iter()
            .map(|img| {
                if img.width() == max_width {
                    return img;
                }
                let mut canvas = RgbImage::from_pixel(max_width, self.height, Rgb([PAD_VALUE; 3]));
                imageops::replace(&mut canvas, &img, 0, 0);
                canvas
            })
            .collect();

        (padded, max_width)
    }
}
