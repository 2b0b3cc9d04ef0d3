use super::DBPostProcess;
use crate::processors::geometry::{Point, Quad, ScanlineBuffer};
use ndarray::ArrayView2;

impl DBPostProcess {
    /// Mean probability under the quad.
    ///
    /// The quad is rounded to integer pixels inside the clamped range
    /// `floor(min)..=ceil(max)` and rasterized with its boundary included.
    /// A degenerate range scores 0.
    pub fn box_score_fast(&self, pred: ArrayView2<'_, f32>, quad: &Quad) -> f32 {
        let (h, w) = pred.dim();
        if h == 0 || w == 0 {
            return 0.0;
        }

        let (mut min_x, mut max_x) = (f32::MAX, f32::MIN);
        let (mut min_y, mut max_y) = (f32::MAX, f32::MIN);
        for p in quad {
            min_x = min_x.min(p.x);
            max_x = max_x.max(p.x);
            min_y = min_y.min(p.y);
            max_y = max_y.max(p.y);
        }

        let xmin = (min_x.floor() as i64).max(0);
        let xmax = (max_x.ceil() as i64).min(w as i64 - 1);
        let ymin = (min_y.floor() as i64).max(0);
        let ymax = (max_y.ceil() as i64).min(h as i64 - 1);
        if xmax <= xmin || ymax <= ymin {
            return 0.0;
        }

        let local: Vec<Point> = quad
            .iter()
            .map(|p| {
                Point::new(
                    (p.x - xmin as f32).round(),
                    (p.y - ymin as f32).round(),
                )
            })
            .collect();

        let mut buffer = ScanlineBuffer::new(local.len());
        let mut total = 0.0f64;
        let mut count = 0usize;
        for row in 0..=(ymax - ymin) {
            let Some((start, end)) = buffer.row_span(row as f32, &local) else {
                continue;
            };
            let start = start.max(0);
            let end = end.min(xmax - xmin);
            for col in start..=end {
                total += pred[[(ymin + row) as usize, (xmin + col) as usize]] as f64;
                count += 1;
            }
        }

        if count == 0 {
            0.0
        } else {
            (total / count as f64) as f32
        }
    }
}
