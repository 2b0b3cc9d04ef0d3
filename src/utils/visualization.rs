//! Drawing of detected regions for inspection.

use crate::processors::Quad;
use image::{Rgb, RgbImage};
use imageproc::drawing::draw_line_segment_mut;

const REGION_COLOR: Rgb<u8> = Rgb([255, 0, 0]);

/// Line thickness of drawn polygons, in pixels.
pub const REGION_THICKNESS: i32 = 2;

/// Returns a copy of `src` with every quad drawn as a closed red polygon.
pub fn draw_regions(src: &RgbImage, quads: &[Quad]) -> RgbImage {
    let mut canvas = src.clone();
    for quad in quads {
        for i in 0..quad.len() {
            let a = quad[i];
            let b = quad[(i + 1) % quad.len()];
            draw_thick_segment(&mut canvas, (a.x, a.y), (b.x, b.y), REGION_THICKNESS);
        }
    }
    canvas
}

/// imageproc draws 1 px lines; thicker strokes are drawn as offset copies.
fn draw_thick_segment(img: &mut RgbImage, a: (f32, f32), b: (f32, f32), thickness: i32) {
    let steep = (b.1 - a.1).abs() > (b.0 - a.0).abs();
    for k in 0..thickness.max(1) {
        let off = (k - thickness / 2) as f32;
        let (da, db) = if steep {
            ((a.0 + off, a.1), (b.0 + off, b.1))
        } else {
            ((a.0, a.1 + off), (b.0, b.1 + off))
        };
        draw_line_segment_mut(img, da, db, REGION_COLOR);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::processors::Point;

    #[test]
    fn draws_red_outline_only() {
        let src = RgbImage::from_pixel(20, 20, Rgb([255, 255, 255]));
        let quad = [
            Point::new(2.0, 2.0),
            Point::new(17.0, 2.0),
            Point::new(17.0, 17.0),
            Point::new(2.0, 17.0),
        ];
        let out = draw_regions(&src, &[quad]);
        assert_eq!(out.get_pixel(10, 2), &REGION_COLOR);
        assert_eq!(out.get_pixel(2, 10), &REGION_COLOR);
        assert_eq!(out.get_pixel(10, 10), &Rgb([255, 255, 255]));
        assert_eq!(src.get_pixel(10, 2), &Rgb([255, 255, 255]));
    }
}
