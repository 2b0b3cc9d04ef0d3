//! Geometric utilities for text region extraction.
//!
//! Point and polygon primitives, the minimum area rectangle (rotating
//! calipers over the convex hull), the ordered "mini box" quad derived from
//! it, and the polygon offset used to expand detected boxes.

use clipper2::{EndType, JoinType, Path as ClipperPath};
use imageproc::contours::Contour;
use itertools::Itertools;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::f32::consts::PI;

/// A 2D point with floating-point coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    /// X-coordinate of the point.
    pub x: f32,
    /// Y-coordinate of the point.
    pub y: f32,
}

impl Point {
    #[inline]
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    /// Euclidean distance to another point.
    #[inline]
    pub fn distance(&self, other: &Point) -> f32 {
        ((self.x - other.x).powi(2) + (self.y - other.y).powi(2)).sqrt()
    }
}

/// A quadrilateral ordered top-left, top-right, bottom-right, bottom-left.
pub type Quad = [Point; 4];

/// A polygon represented by its vertices.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BoundingBox {
    /// The vertices, in contour order.
    pub points: Vec<Point>,
}

impl BoundingBox {
    pub fn new(points: Vec<Point>) -> Self {
        Self { points }
    }

    /// Creates a polygon from a traced contour.
    pub fn from_contour(contour: &Contour<u32>) -> Self {
        let points = contour
            .points
            .iter()
            .map(|p| Point::new(p.x as f32, p.y as f32))
            .collect();
        Self { points }
    }

    /// Calculates the area using the shoelace formula.
    ///
    /// Returns 0.0 for fewer than 3 points.
    pub fn area(&self) -> f32 {
        if self.points.len() < 3 {
            return 0.0;
        }

        let mut area = 0.0;
        let n = self.points.len();
        for i in 0..n {
            let j = (i + 1) % n;
            area += self.points[i].x * self.points[j].y;
            area -= self.points[j].x * self.points[i].y;
        }
        area.abs() / 2.0
    }

    /// Length of the closed outline.
    pub fn perimeter(&self) -> f32 {
        let n = self.points.len();
        (0..n)
            .map(|i| self.points[i].distance(&self.points[(i + 1) % n]))
            .sum()
    }

    /// Axis-aligned bounds as `(min_x, min_y, max_x, max_y)`.
    pub fn bounds(&self) -> Option<(f32, f32, f32, f32)> {
        let (min_x, max_x) = self.points.iter().map(|p| p.x).minmax().into_option()?;
        let (min_y, max_y) = self.points.iter().map(|p| p.y).minmax().into_option()?;
        Some((min_x, min_y, max_x, max_y))
    }

    /// Convex hull via Graham's scan. Fewer than 3 points are returned as-is.
    fn convex_hull(&self) -> BoundingBox {
        if self.points.len() < 3 {
            return self.clone();
        }

        let mut points = self.points.clone();

        let mut start_idx = 0;
        for i in 1..points.len() {
            if points[i].y < points[start_idx].y
                || (points[i].y == points[start_idx].y && points[i].x < points[start_idx].x)
            {
                start_idx = i;
            }
        }
        points.swap(0, start_idx);
        let start_point = points[0];

        points[1..].sort_by(|a, b| {
            let cross = Self::cross_product(&start_point, a, b);
            if cross == 0.0 {
                let dist_a = start_point.distance(a);
                let dist_b = start_point.distance(b);
                dist_a.partial_cmp(&dist_b).unwrap_or(Ordering::Equal)
            } else if cross > 0.0 {
                Ordering::Less
            } else {
                Ordering::Greater
            }
        });

        let mut hull: Vec<Point> = Vec::new();
        for point in points {
            while hull.len() > 1
                && Self::cross_product(&hull[hull.len() - 2], &hull[hull.len() - 1], &point) <= 0.0
            {
                hull.pop();
            }
            hull.push(point);
        }

        BoundingBox::new(hull)
    }

    /// Positive for a counter-clockwise turn, negative for clockwise, zero when collinear.
    fn cross_product(p1: &Point, p2: &Point, p3: &Point) -> f32 {
        (p2.x - p1.x) * (p3.y - p1.y) - (p2.y - p1.y) * (p3.x - p1.x)
    }

    /// Computes the minimum area rectangle enclosing the polygon.
    ///
    /// Uses rotating calipers on the convex hull. Collinear input degrades to
    /// the axis-aligned bounds; fewer than 3 points give an empty rectangle.
    pub fn get_min_area_rect(&self) -> MinAreaRect {
        if self.points.len() < 3 {
            return MinAreaRect::default();
        }

        let hull = self.convex_hull();
        let hull_points = &hull.points;

        if hull_points.len() < 3 {
            let Some((min_x, min_y, max_x, max_y)) = self.bounds() else {
                return MinAreaRect::default();
            };
            return MinAreaRect {
                center: Point::new((min_x + max_x) / 2.0, (min_y + max_y) / 2.0),
                width: max_x - min_x,
                height: max_y - min_y,
                angle: 0.0,
            };
        }

        let mut min_area = f32::MAX;
        let mut min_rect = MinAreaRect::default();

        let n = hull_points.len();
        for i in 0..n {
            let j = (i + 1) % n;

            let edge_x = hull_points[j].x - hull_points[i].x;
            let edge_y = hull_points[j].y - hull_points[i].y;
            let edge_length = (edge_x * edge_x + edge_y * edge_y).sqrt();
            if edge_length < f32::EPSILON {
                continue;
            }

            let nx = edge_x / edge_length;
            let ny = edge_y / edge_length;
            let px = -ny;
            let py = nx;

            let mut min_n = f32::MAX;
            let mut max_n = f32::MIN;
            let mut min_p = f32::MAX;
            let mut max_p = f32::MIN;

            for point in hull_points {
                let proj_n = nx * (point.x - hull_points[i].x) + ny * (point.y - hull_points[i].y);
                min_n = min_n.min(proj_n);
                max_n = max_n.max(proj_n);

                let proj_p = px * (point.x - hull_points[i].x) + py * (point.y - hull_points[i].y);
                min_p = min_p.min(proj_p);
                max_p = max_p.max(proj_p);
            }

            let width = max_n - min_n;
            let height = max_p - min_p;
            let area = width * height;

            if area < min_area {
                min_area = area;

                let center_n = (min_n + max_n) / 2.0;
                let center_p = (min_p + max_p) / 2.0;

                min_rect = MinAreaRect {
                    center: Point::new(
                        hull_points[i].x + center_n * nx + center_p * px,
                        hull_points[i].y + center_n * ny + center_p * py,
                    ),
                    width,
                    height,
                    angle: f32::atan2(ny, nx) * 180.0 / PI,
                };
            }
        }

        min_rect
    }

    /// Ordered quad of the minimum area rectangle together with its shorter side.
    ///
    /// Returns `None` when the polygon has fewer than 3 points.
    pub fn mini_box(&self) -> Option<(Quad, f32)> {
        if self.points.len() < 3 {
            return None;
        }
        let rect = self.get_min_area_rect();
        Some((rect.ordered_corners(), rect.min_side()))
    }

    /// Expands the polygon outward by `area * ratio / perimeter` with round joins.
    ///
    /// A zero offset returns the polygon unchanged. Returns `None` when the
    /// offset collapses or splits the polygon.
    pub fn unclip(&self, ratio: f32) -> Option<BoundingBox> {
        if self.points.len() < 3 {
            return None;
        }

        let perimeter = self.perimeter();
        if perimeter <= f32::EPSILON {
            return None;
        }
        let distance = (self.area() * ratio / perimeter) as f64;
        if distance.abs() <= f64::EPSILON {
            return Some(self.clone());
        }

        let path: ClipperPath = self
            .points
            .iter()
            .map(|p| (p.x as f64, p.y as f64))
            .collect::<Vec<_>>()
            .into();
        let offset = path.inflate(distance, JoinType::Round, EndType::Polygon, 2.0);
        let first = offset.into_iter().next()?;

        let mut points: Vec<Point> = first
            .iter()
            .map(|pt| Point::new(pt.x() as f32, pt.y() as f32))
            .collect();
        if let (Some(head), Some(tail)) = (points.first(), points.last())
            && points.len() > 1
            && head == tail
        {
            points.pop();
        }

        (points.len() >= 3).then(|| BoundingBox::new(points))
    }
}

/// A rectangle with minimum area that encloses a shape.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MinAreaRect {
    pub center: Point,
    pub width: f32,
    pub height: f32,
    /// Rotation in degrees.
    pub angle: f32,
}

impl MinAreaRect {
    /// The four corners in rotation order, unsorted.
    pub fn corner_points(&self) -> [Point; 4] {
        let cos_a = (self.angle * PI / 180.0).cos();
        let sin_a = (self.angle * PI / 180.0).sin();
        let w_2 = self.width / 2.0;
        let h_2 = self.height / 2.0;

        [(-w_2, -h_2), (w_2, -h_2), (w_2, h_2), (-w_2, h_2)].map(|(x, y)| {
            Point::new(
                x * cos_a - y * sin_a + self.center.x,
                x * sin_a + y * cos_a + self.center.y,
            )
        })
    }

    /// Corners ordered top-left, top-right, bottom-right, bottom-left.
    ///
    /// The corners are sorted by x. Of the two leftmost, the one with the
    /// larger y is bottom-left; of the two rightmost, the one with the larger
    /// y is bottom-right.
    pub fn ordered_corners(&self) -> Quad {
        let mut points = self.corner_points();
        points.sort_by(|a, b| a.x.partial_cmp(&b.x).unwrap_or(Ordering::Equal));

        let (tl, bl) = if points[1].y > points[0].y { (0, 1) } else { (1, 0) };
        let (tr, br) = if points[3].y > points[2].y { (2, 3) } else { (3, 2) };

        [points[tl], points[tr], points[br], points[bl]]
    }

    /// Length of the shorter side.
    pub fn min_side(&self) -> f32 {
        self.width.min(self.height)
    }
}

/// Row-wise filler for convex polygons, used to build score masks.
pub(crate) struct ScanlineBuffer {
    pub(crate) intersections: Vec<f32>,
}

impl ScanlineBuffer {
    pub(crate) fn new(max_polygon_points: usize) -> Self {
        Self {
            intersections: Vec::with_capacity(max_polygon_points * 2),
        }
    }

    /// Inclusive column span covered by the polygon on row `y`.
    ///
    /// Boundary pixels count as inside. Horizontal edges lying on the row
    /// contribute both of their endpoints.
    pub(crate) fn row_span(&mut self, y: f32, polygon: &[Point]) -> Option<(i64, i64)> {
        self.intersections.clear();

        let n = polygon.len();
        for i in 0..n {
            let p1 = &polygon[i];
            let p2 = &polygon[(i + 1) % n];
            let (lo, hi) = if p1.y <= p2.y { (p1.y, p2.y) } else { (p2.y, p1.y) };
            if y < lo || y > hi {
                continue;
            }
            if (p2.y - p1.y).abs() <= f32::EPSILON {
                self.intersections.push(p1.x);
                self.intersections.push(p2.x);
            } else {
                self.intersections
                    .push(p1.x + (y - p1.y) * (p2.x - p1.x) / (p2.y - p1.y));
            }
        }

        let (start, end) = self.intersections.iter().copied().minmax().into_option()?;
        let start = (start - 1e-4).ceil() as i64;
        let end = (end + 1e-4).floor() as i64;
        (start <= end).then_some((start, end))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rect(x0: f32, y0: f32, x1: f32, y1: f32) -> BoundingBox {
        BoundingBox::new(vec![
            Point::new(x0, y0),
            Point::new(x1, y0),
            Point::new(x1, y1),
            Point::new(x0, y1),
        ])
    }

    #[test]
    fn area_and_perimeter_of_rectangle() {
        let r = rect(0.0, 0.0, 10.0, 4.0);
        assert_eq!(r.area(), 40.0);
        assert_eq!(r.perimeter(), 28.0);
    }

    #[test]
    fn mini_box_orders_axis_aligned_corners() {
        let (quad, side) = rect(10.0, 10.0, 20.0, 14.0).mini_box().unwrap();
        let expected = [
            Point::new(10.0, 10.0),
            Point::new(20.0, 10.0),
            Point::new(20.0, 14.0),
            Point::new(10.0, 14.0),
        ];
        for (got, want) in quad.iter().zip(expected.iter()) {
            assert!(got.distance(want) < 1e-3, "{got:?} != {want:?}");
        }
        assert!((side - 4.0).abs() < 1e-3);
    }

    #[test]
    fn ordered_corners_use_larger_y_for_bottom() {
        let rect = MinAreaRect {
            center: Point::new(15.0, 15.0),
            width: 10.0,
            height: 10.0,
            angle: 0.0,
        };
        let [tl, tr, br, bl] = rect.ordered_corners();
        assert!(tl.y < bl.y && tl.x < tr.x);
        assert!(tr.y < br.y);
    }

    #[test]
    fn unclip_with_zero_ratio_keeps_the_quad() {
        let quad = rect(5.0, 5.0, 25.0, 11.0);
        let unclipped = quad.unclip(0.0).unwrap();
        let (again, _) = unclipped.mini_box().unwrap();
        let (orig, _) = quad.mini_box().unwrap();
        for (a, b) in again.iter().zip(orig.iter()) {
            assert!(a.distance(b) < 1e-3);
        }
    }

    #[test]
    fn unclip_expands_by_area_over_perimeter() {
        let quad = rect(0.0, 0.0, 20.0, 10.0);
        // distance = 200 * 1.5 / 60 = 5
        let unclipped = quad.unclip(1.5).unwrap();
        let (min_x, min_y, max_x, max_y) = unclipped.bounds().unwrap();
        assert!((min_x + 5.0).abs() < 0.1);
        assert!((min_y + 5.0).abs() < 0.1);
        assert!((max_x - 25.0).abs() < 0.1);
        assert!((max_y - 15.0).abs() < 0.1);
    }

    #[test]
    fn row_span_includes_boundary() {
        let mut buffer = ScanlineBuffer::new(4);
        let quad = rect(2.0, 1.0, 6.0, 3.0).points;
        assert_eq!(buffer.row_span(1.0, &quad), Some((2, 6)));
        assert_eq!(buffer.row_span(2.0, &quad), Some((2, 6)));
        assert_eq!(buffer.row_span(4.0, &quad), None);
    }

    #[test]
    fn rotated_rectangle_min_area() {
        let diamond = BoundingBox::new(vec![
            Point::new(10.0, 0.0),
            Point::new(20.0, 10.0),
            Point::new(10.0, 20.0),
            Point::new(0.0, 10.0),
        ]);
        let rect = diamond.get_min_area_rect();
        let expected = (200.0f32).sqrt();
        assert!((rect.width - expected).abs() < 1e-3);
        assert!((rect.height - expected).abs() < 1e-3);
    }
}
