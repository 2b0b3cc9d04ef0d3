use super::{DBPostProcess, DetectedBox};
use crate::processors::geometry::BoundingBox;
use image::{GrayImage, Luma};
use imageproc::contours::find_contours;
use ndarray::ArrayView2;
use std::cmp::Ordering;

impl DBPostProcess {
    /// Foreground is 255 where `p > thresh`, background 0.
    pub(super) fn binarize(&self, pred: ArrayView2<'_, f32>) -> GrayImage {
        let (height, width) = pred.dim();
        GrayImage::from_fn(width as u32, height as u32, |x, y| {
            if pred[[y as usize, x as usize]] > self.thresh {
                Luma([255])
            } else {
                Luma([0])
            }
        })
    }

    pub(super) fn boxes_from_bitmap(
        &self,
        pred: ArrayView2<'_, f32>,
        bitmap: &GrayImage,
    ) -> Vec<DetectedBox> {
        let mut contours: Vec<(BoundingBox, f32)> = find_contours::<u32>(bitmap)
            .iter()
            .map(|c| {
                let polygon = BoundingBox::from_contour(c);
                let area = polygon.area();
                (polygon, area)
            })
            .collect();
        contours.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(Ordering::Equal));

        let mut boxes = Vec::new();
        for (contour, _) in contours.into_iter().take(self.max_candidates) {
            let Some((mini_box, sside)) = contour.mini_box() else {
                continue;
            };
            if sside < self.min_side {
                continue;
            }

            let score = self.box_score_fast(pred, &mini_box);
            if score < self.box_thresh {
                continue;
            }

            let Some(unclipped) = BoundingBox::new(mini_box.to_vec()).unclip(self.unclip_ratio)
            else {
                continue;
            };
            if unclipped.points.len() < 4 {
                continue;
            }

            let Some((quad, sside)) = unclipped.mini_box() else {
                continue;
            };
            if sside < self.min_side {
                continue;
            }

            boxes.push(DetectedBox { quad, score });
        }
        boxes
    }
}
