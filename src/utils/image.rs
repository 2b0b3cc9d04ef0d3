//! Image loading and saving helpers.

use crate::core::errors::{OCRError, OcrResult};
use crate::processors::Quad;
use image::{DynamicImage, RgbImage, imageops};
use std::path::Path;
use tracing::warn;

/// Converts any decoded image to 8-bit RGB.
pub fn dynamic_to_rgb(img: DynamicImage) -> RgbImage {
    img.to_rgb8()
}

/// Loads an image from disk as RGB.
///
/// # Errors
///
/// Returns `OCRError::ImageLoad` if the file cannot be opened or decoded.
pub fn load_image(path: &Path) -> OcrResult<RgbImage> {
    let img = image::open(path).map_err(OCRError::ImageLoad)?;
    Ok(dynamic_to_rgb(img))
}

/// Axis-aligned crop of the quad's bounding rectangle, clipped to the image.
///
/// Returns `None` when the clipped rectangle is empty.
pub fn bounding_crop(src: &RgbImage, quad: &Quad) -> Option<RgbImage> {
    let min_x = quad.iter().map(|p| p.x).fold(f32::INFINITY, f32::min);
    let max_x = quad.iter().map(|p| p.x).fold(f32::NEG_INFINITY, f32::max);
    let min_y = quad.iter().map(|p| p.y).fold(f32::INFINITY, f32::min);
    let max_y = quad.iter().map(|p| p.y).fold(f32::NEG_INFINITY, f32::max);

    let left = (min_x.floor().max(0.0) as u32).min(src.width());
    let top = (min_y.floor().max(0.0) as u32).min(src.height());
    // inclusive of the pixel holding the max corner
    let right = ((max_x.floor() + 1.0).max(0.0) as u32).min(src.width());
    let bottom = ((max_y.floor() + 1.0).max(0.0) as u32).min(src.height());
    if right <= left || bottom <= top {
        return None;
    }
    Some(imageops::crop_imm(src, left, top, right - left, bottom - top).to_image())
}

/// Writes a PNG, logging instead of failing.
pub fn save_image_logged(img: &RgbImage, path: &Path) {
    if let Err(e) = img.save(path) {
        warn!(path = %path.display(), error = %e, "failed to write intermediate image");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::processors::Point;
    use image::Rgb;

    #[test]
    fn load_missing_file_is_image_error() {
        let err = load_image(Path::new("/definitely/not/here.png")).unwrap_err();
        assert!(matches!(err, OCRError::ImageLoad(_)));
    }

    #[test]
    fn load_round_trips_png() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("px.png");
        RgbImage::from_pixel(3, 2, Rgb([1, 2, 3])).save(&path).unwrap();
        let img = load_image(&path).unwrap();
        assert_eq!(img.dimensions(), (3, 2));
        assert_eq!(img.get_pixel(2, 1), &Rgb([1, 2, 3]));
    }

    #[test]
    fn bounding_crop_clips_to_image() {
        let src = RgbImage::new(10, 10);
        let q = [
            Point::new(-5.0, 2.0),
            Point::new(4.0, 2.0),
            Point::new(4.0, 20.0),
            Point::new(-5.0, 20.0),
        ];
        let crop = bounding_crop(&src, &q).unwrap();
        assert_eq!(crop.dimensions(), (5, 8));
    }
}
