//! Post-processing for DB (Differentiable Binarization) text detection models.
//!
//! [`DBPostProcess`] turns the single-channel probability map into scored
//! quadrilaterals in map coordinates: threshold, trace contours, keep the
//! largest candidates, fit and score a minimum area quad, expand it, and fit
//! again. Mapping back to the source image is left to the caller, which owns
//! the resize geometry of the call.

#[path = "db_bitmap.rs"]
mod db_bitmap;
#[path = "db_score.rs"]
mod db_score;

use crate::core::config::DetectorParams;
use crate::core::constants::DEFAULT_DET_MIN_SIDE;
use crate::processors::geometry::Quad;
use ndarray::ArrayView2;
use tracing::debug;

/// A candidate text box in probability-map coordinates.
#[derive(Debug, Clone, PartialEq)]
pub struct DetectedBox {
    /// Corners ordered top-left, top-right, bottom-right, bottom-left.
    pub quad: Quad,
    /// Mean probability under the pre-expansion quad.
    pub score: f32,
}

/// Post-processor for DB text detection models.
#[derive(Debug, Clone)]
pub struct DBPostProcess {
    /// A pixel is foreground when its probability is strictly above this.
    pub thresh: f32,
    /// Candidates scoring below this are dropped.
    pub box_thresh: f32,
    /// Number of largest contours examined.
    pub max_candidates: usize,
    /// Expansion ratio applied to surviving boxes.
    pub unclip_ratio: f32,
    /// Boxes whose shorter side is below this are dropped, before and after expansion.
    pub min_side: f32,
}

impl DBPostProcess {
    pub fn new(params: &DetectorParams) -> Self {
        Self {
            thresh: params.thresh,
            box_thresh: params.box_thresh,
            max_candidates: params.max_candidates,
            unclip_ratio: params.unclip_ratio,
            min_side: DEFAULT_DET_MIN_SIDE,
        }
    }

    /// Extracts scored boxes from one probability map of shape `[H, W]`.
    pub fn apply(&self, pred: ArrayView2<'_, f32>) -> Vec<DetectedBox> {
        let bitmap = self.binarize(pred);
        let boxes = self.boxes_from_bitmap(pred, &bitmap);
        debug!(
            candidates = boxes.len(),
            height = pred.nrows(),
            width = pred.ncols(),
            "probability map decoded"
        );
        boxes
    }
}

impl Default for DBPostProcess {
    fn default() -> Self {
        Self::new(&DetectorParams::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array2;

    fn map_with_block(h: usize, w: usize, y: (usize, usize), x: (usize, usize), p: f32) -> Array2<f32> {
        let mut map = Array2::zeros((h, w));
        for r in y.0..y.1 {
            for c in x.0..x.1 {
                map[[r, c]] = p;
            }
        }
        map
    }

    #[test]
    fn blank_map_has_no_boxes() {
        let map = Array2::<f32>::zeros((64, 64));
        assert!(DBPostProcess::default().apply(map.view()).is_empty());
    }

    #[test]
    fn single_block_becomes_one_expanded_box() {
        let map = map_with_block(64, 128, (20, 30), (10, 90), 0.9);
        let boxes = DBPostProcess::default().apply(map.view());
        assert_eq!(boxes.len(), 1);
        let b = &boxes[0];
        assert!(b.score > 0.6);
        let [tl, tr, br, bl] = b.quad;
        assert!(tl.x < 10.0 && tl.y < 20.0);
        assert!(tr.x > 89.0 && tr.y < 20.0);
        assert!(br.x > 89.0 && br.y > 29.0);
        assert!(bl.x < 10.0 && bl.y > 29.0);
    }

    #[test]
    fn low_probability_block_is_filtered_by_box_thresh() {
        let map = map_with_block(64, 64, (10, 30), (10, 50), 0.4);
        assert!(DBPostProcess::default().apply(map.view()).is_empty());
    }

    #[test]
    fn thin_block_is_dropped_by_min_side() {
        let map = map_with_block(64, 64, (10, 12), (5, 60), 0.95);
        assert!(DBPostProcess::default().apply(map.view()).is_empty());
    }

    #[test]
    fn max_candidates_keeps_largest_contours() {
        let mut map = map_with_block(64, 128, (5, 25), (5, 100), 0.9);
        for r in 40..50 {
            for c in 5..30 {
                map[[r, c]] = 0.9;
            }
        }
        let post = DBPostProcess {
            max_candidates: 1,
            ..DBPostProcess::default()
        };
        let boxes = post.apply(map.view());
        assert_eq!(boxes.len(), 1);
        assert!(boxes[0].quad[1].x > 90.0);
    }
}
