//! Perspective rectification of detected text quads.
//!
//! A detected quad is ordered, normalized to landscape, and warped onto an
//! axis-aligned `w x h` rectangle. Sampling uses bicubic interpolation with
//! replicated borders.

use crate::core::constants::MIN_CROP_SIDE;
use crate::core::errors::{OCRError, OcrResult};
use crate::processors::{Point, Quad};
use image::RgbImage;
use nalgebra::{DMatrix, DVector, Matrix3, RowDVector, Vector3};
use rayon::prelude::*;
use tracing::debug;

/// Orders four corners as top-left, top-right, bottom-right, bottom-left.
///
/// The two points with the smallest y form the top edge and the other two the
/// bottom edge; each pair is split by x.
pub fn order_points(pts: &Quad) -> Quad {
    let mut sorted = *pts;
    sorted.sort_by(|a, b| a.y.total_cmp(&b.y));

    let (tl, tr) = if sorted[0].x < sorted[1].x {
        (sorted[0], sorted[1])
    } else {
        (sorted[1], sorted[0])
    };
    let (bl, br) = if sorted[2].x < sorted[3].x {
        (sorted[2], sorted[3])
    } else {
        (sorted[3], sorted[2])
    };
    [tl, tr, br, bl]
}

/// Source corners and output size for one rectification.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RectifyPlan {
    /// Corners mapped onto `(0,0), (w-1,0), (w-1,h-1), (0,h-1)`.
    pub corners: Quad,
    pub width: f32,
    pub height: f32,
}

impl RectifyPlan {
    /// Builds the plan for a quad in image coordinates.
    pub fn new(quad: &Quad) -> Self {
        let mut pts = order_points(quad);
        let mut width = pts[0].distance(&pts[1]);
        let mut height = pts[0].distance(&pts[3]);

        if height > width {
            std::mem::swap(&mut width, &mut height);
            pts = [pts[3], pts[0], pts[1], pts[2]];
        }
        let width = width.max(MIN_CROP_SIDE);
        let height = height.max(MIN_CROP_SIDE);

        let top_mid_y = (pts[0].y + pts[1].y) * 0.5;
        let bottom_mid_y = (pts[2].y + pts[3].y) * 0.5;
        if top_mid_y > bottom_mid_y {
            pts.swap(0, 3);
            pts.swap(1, 2);
        }
        if pts[0].x + pts[3].x > pts[1].x + pts[2].x {
            pts.swap(0, 1);
            pts.swap(3, 2);
        }

        Self {
            corners: pts,
            width,
            height,
        }
    }

    pub fn destination(&self) -> Quad {
        let (w, h) = (self.width - 1.0, self.height - 1.0);
        [
            Point::new(0.0, 0.0),
            Point::new(w, 0.0),
            Point::new(w, h),
            Point::new(0.0, h),
        ]
    }

    /// Output size in whole pixels, truncated.
    pub fn output_size(&self) -> (u32, u32) {
        (self.width as u32, self.height as u32)
    }
}

/// Warps the region under `quad` into an upright, landscape crop.
///
/// # Errors
///
/// Returns a rectification error if the source image is empty or the corner
/// configuration admits no perspective transform.
pub fn rectify(src: &RgbImage, quad: &Quad) -> OcrResult<RgbImage> {
    if src.width() == 0 || src.height() == 0 {
        return Err(OCRError::rectification(&format!(
            "source image is empty ({}x{})",
            src.width(),
            src.height()
        )));
    }

    let plan = RectifyPlan::new(quad);
    let matrix = get_perspective_transform(&plan.corners, &plan.destination())?;
    let (w, h) = plan.output_size();
    debug!(width = w, height = h, "rectifying text region");
    warp_perspective(src, &matrix, w, h)
}

/// Solves the 3x3 homography taking `src[i]` to `dst[i]`.
fn get_perspective_transform(src: &Quad, dst: &Quad) -> OcrResult<Matrix3<f64>> {
    let mut a = DMatrix::<f64>::zeros(8, 8);
    let mut b = DVector::<f64>::zeros(8);

    for i in 0..4 {
        let (sx, sy) = (src[i].x as f64, src[i].y as f64);
        let (dx, dy) = (dst[i].x as f64, dst[i].y as f64);

        a.set_row(
            i * 2,
            &RowDVector::from_row_slice(&[sx, sy, 1.0, 0.0, 0.0, 0.0, -sx * dx, -sy * dx]),
        );
        b[i * 2] = dx;

        a.set_row(
            i * 2 + 1,
            &RowDVector::from_row_slice(&[0.0, 0.0, 0.0, sx, sy, 1.0, -sx * dy, -sy * dy]),
        );
        b[i * 2 + 1] = dy;
    }

    let s = a.lu().solve(&b).ok_or_else(|| {
        OCRError::rectification(&format!(
            "cannot solve perspective transform for corners {src:?}"
        ))
    })?;

    Ok(Matrix3::new(s[0], s[1], s[2], s[3], s[4], s[5], s[6], s[7], 1.0))
}

/// Inverse-maps every destination pixel through `matrix` and samples the source.
fn warp_perspective(
    src: &RgbImage,
    matrix: &Matrix3<f64>,
    dst_width: u32,
    dst_height: u32,
) -> OcrResult<RgbImage> {
    let inv = matrix
        .try_inverse()
        .ok_or_else(|| OCRError::rectification("perspective transform is not invertible"))?;

    let mut dst = RgbImage::new(dst_width, dst_height);
    if dst_width == 0 || dst_height == 0 {
        return Ok(dst);
    }

    let row_len = dst_width as usize * 3;
    let buffer: &mut [u8] = dst.as_mut();
    buffer
        .par_chunks_mut(row_len)
        .enumerate()
        .for_each(|(y, row)| {
            for x in 0..dst_width as usize {
                let p = inv * Vector3::new(x as f64, y as f64, 1.0);
                let px = if p.z.abs() > f64::EPSILON {
                    bicubic_replicate(src, p.x / p.z, p.y / p.z)
                } else {
                    [0, 0, 0]
                };
                row[x * 3..x * 3 + 3].copy_from_slice(&px);
            }
        });

    Ok(dst)
}

/// Cubic convolution weights for fractional offset `t`, `a = -0.75`.
fn cubic_weights(t: f64) -> [f64; 4] {
    const A: f64 = -0.75;
    let w0 = ((A * (t + 1.0) - 5.0 * A) * (t + 1.0) + 8.0 * A) * (t + 1.0) - 4.0 * A;
    let w1 = ((A + 2.0) * t - (A + 3.0)) * t * t + 1.0;
    let w2 = ((A + 2.0) * (1.0 - t) - (A + 3.0)) * (1.0 - t) * (1.0 - t) + 1.0;
    [w0, w1, w2, 1.0 - w0 - w1 - w2]
}

fn bicubic_replicate(img: &RgbImage, x: f64, y: f64) -> [u8; 3] {
    let (w, h) = (img.width() as i64, img.height() as i64);
    let (x0, y0) = (x.floor(), y.floor());
    let wx = cubic_weights(x - x0);
    let wy = cubic_weights(y - y0);
    let (x0, y0) = (x0 as i64, y0 as i64);

    let mut acc = [0.0f64; 3];
    for (j, wyj) in wy.iter().enumerate() {
        let sy = (y0 - 1 + j as i64).clamp(0, h - 1) as u32;
        for (i, wxi) in wx.iter().enumerate() {
            let sx = (x0 - 1 + i as i64).clamp(0, w - 1) as u32;
            let p = img.get_pixel(sx, sy);
            let weight = wxi * wyj;
            for c in 0..3 {
                acc[c] += weight * p[c] as f64;
            }
        }
    }
    acc.map(|v| v.round().clamp(0.0, 255.0) as u8)
}
