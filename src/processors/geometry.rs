//! Geometric primitives for layout extraction.
//!
//! This module provides the point, contour, quadrilateral and rectangle types
//! shared by the quadrilateral detector, the rectifier and the text detectors,
//! together with the algorithms that operate on them: shoelace area, closed
//! perimeter, chain compression, Douglas-Peucker simplification, corner
//! canonicalization and box overlap measures.

use imageproc::contours::Contour as ImageProcContour;
use imageproc::point::Point as ImageProcPoint;
use itertools::Itertools;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// Two extreme values closer than this (in pixels) are treated as a tie when
/// assigning corners.
const CORNER_TIE_TOLERANCE: f32 = 0.5;

/// A 2D point with floating-point coordinates.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct Point {
    /// X-coordinate of the point.
    pub x: f32,
    /// Y-coordinate of the point.
    pub y: f32,
}

impl Point {
    /// Creates a new point with the given coordinates.
    #[inline]
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    /// Creates a point from an imageproc point with integer coordinates.
    pub fn from_imageproc_point(p: ImageProcPoint<i32>) -> Self {
        Self {
            x: p.x as f32,
            y: p.y as f32,
        }
    }

    /// Euclidean distance to another point.
    #[inline]
    pub fn distance(&self, other: &Point) -> f32 {
        (self.x - other.x).hypot(self.y - other.y)
    }
}

/// Computes the cross product of (p2 - p1) x (p3 - p1).
///
/// A positive value indicates a counter-clockwise turn in a y-up frame, a
/// negative value a clockwise turn, and zero collinearity.
#[inline]
fn cross_product(p1: &Point, p2: &Point, p3: &Point) -> f32 {
    (p2.x - p1.x) * (p3.y - p1.y) - (p2.y - p1.y) * (p3.x - p1.x)
}

/// Perpendicular distance from `point` to the infinite line through
/// `line_start` and `line_end`.
fn point_to_line_distance(point: &Point, line_start: &Point, line_end: &Point) -> f32 {
    let a = line_end.y - line_start.y;
    let b = line_start.x - line_end.x;
    let c = line_end.x * line_start.y - line_start.x * line_end.y;

    let denominator = (a * a + b * b).sqrt();
    if denominator == 0.0 {
        return point.distance(line_start);
    }

    (a * point.x + b * point.y + c).abs() / denominator
}

/// A closed polyline traced from an edge map.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Contour {
    /// Ordered boundary points; the last point connects back to the first.
    pub points: Vec<Point>,
}

impl Contour {
    /// Creates a contour from a vector of points.
    pub fn new(points: Vec<Point>) -> Self {
        Self { points }
    }

    /// Converts an imageproc contour into a contour of float points.
    pub fn from_imageproc(contour: &ImageProcContour<i32>) -> Self {
        Self {
            points: contour
                .points
                .iter()
                .map(|p| Point::from_imageproc_point(*p))
                .collect(),
        }
    }

    /// Number of vertices.
    pub fn len(&self) -> usize {
        self.points.len()
    }

    /// Returns true when the contour has no vertices.
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Removes vertices lying in the middle of straight horizontal, vertical or
    /// diagonal runs, keeping only the points where the chain changes
    /// direction.
    pub fn compress_chain(&self) -> Contour {
        let n = self.points.len();
        if n < 3 {
            return self.clone();
        }

        // Contour points sit on the pixel grid, so the integer sign is exact
        // and a zero step stays zero.
        let direction = |a: &Point, b: &Point| {
            (
                ((b.x - a.x).round() as i32).signum(),
                ((b.y - a.y).round() as i32).signum(),
            )
        };

        let kept = (0..n)
            .filter(|&i| {
                let prev = &self.points[(i + n - 1) % n];
                let cur = &self.points[i];
                let next = &self.points[(i + 1) % n];
                direction(prev, cur) != direction(cur, next)
            })
            .map(|i| self.points[i])
            .collect::<Vec<_>>();

        if kept.len() < 3 {
            self.clone()
        } else {
            Contour::new(kept)
        }
    }

    /// Calculates the enclosed area using the shoelace formula.
    ///
    /// Returns 0.0 for contours with fewer than 3 points.
    pub fn area(&self) -> f32 {
        if self.points.len() < 3 {
            return 0.0;
        }

        let n = self.points.len();
        let twice_area: f64 = (0..n)
            .map(|i| {
                let j = (i + 1) % n;
                self.points[i].x as f64 * self.points[j].y as f64
                    - self.points[j].x as f64 * self.points[i].y as f64
            })
            .sum();
        (twice_area.abs() / 2.0) as f32
    }

    /// Calculates the perimeter of the closed contour.
    pub fn perimeter(&self) -> f32 {
        let n = self.points.len();
        if n < 2 {
            return 0.0;
        }
        (0..n)
            .map(|i| self.points[i].distance(&self.points[(i + 1) % n]))
            .sum()
    }

    /// Returns true when every turn of the closed polygon has the same sign.
    pub fn is_convex(&self) -> bool {
        let n = self.points.len();
        if n < 3 {
            return false;
        }

        let mut sign = 0.0f32;
        for i in 0..n {
            let cross = cross_product(
                &self.points[i],
                &self.points[(i + 1) % n],
                &self.points[(i + 2) % n],
            );
            if cross.abs() <= f32::EPSILON {
                continue;
            }
            if sign == 0.0 {
                sign = cross.signum();
            } else if cross.signum() != sign {
                return false;
            }
        }
        sign != 0.0
    }

    /// Approximates the closed contour with a polygon using Douglas-Peucker.
    ///
    /// The closed curve is split at two anchors: the vertex `a` farthest from
    /// the first vertex, and the vertex `b` farthest from `a`. Each of the two
    /// chains between them is simplified as an open chain and the results are
    /// joined. The first traced vertex is therefore only kept when it is a
    /// real corner.
    ///
    /// # Arguments
    ///
    /// * `epsilon` - The maximum distance between the original curve and the simplified curve.
    pub fn approx_poly_dp(&self, epsilon: f32) -> Contour {
        let n = self.points.len();
        if n <= 3 {
            return self.clone();
        }

        let a = self.farthest_from(&self.points[0]);
        let b = self.farthest_from(&self.points[a]);
        if a == b {
            return self.clone();
        }
        let (lo, hi) = (a.min(b), a.max(b));

        let forward = &self.points[lo..=hi];
        let mut wrapped: Vec<Point> = self.points[hi..].to_vec();
        wrapped.extend_from_slice(&self.points[..=lo]);

        let mut simplified = douglas_peucker(forward, epsilon);
        let wrapped_simplified = douglas_peucker(&wrapped, epsilon);
        // Both chains repeat the two anchors.
        simplified.extend_from_slice(&wrapped_simplified[1..wrapped_simplified.len() - 1]);

        Contour::new(simplified)
    }

    /// Index of the vertex farthest from `origin`; the first one on ties.
    fn farthest_from(&self, origin: &Point) -> usize {
        let mut best = 0;
        let mut best_dist = f32::NEG_INFINITY;
        for (i, point) in self.points.iter().enumerate() {
            let dist = origin.distance(point);
            if dist > best_dist {
                best = i;
                best_dist = dist;
            }
        }
        best
    }
}

/// Simplifies an open chain with the Douglas-Peucker algorithm.
///
/// Both endpoints are always kept.
fn douglas_peucker(points: &[Point], epsilon: f32) -> Vec<Point> {
    if points.len() <= 2 {
        return points.to_vec();
    }

    let last = points.len() - 1;
    let mut keep = vec![false; points.len()];
    keep[0] = true;
    keep[last] = true;

    let mut stack = vec![(0usize, last)];
    while let Some((start, end)) = stack.pop() {
        if end - start <= 1 {
            continue;
        }

        let mut max_dist = 0.0;
        let mut max_index = start;
        for (i, point) in points.iter().enumerate().take(end).skip(start + 1) {
            let dist = point_to_line_distance(point, &points[start], &points[end]);
            if dist > max_dist {
                max_dist = dist;
                max_index = i;
            }
        }

        if max_dist > epsilon {
            keep[max_index] = true;
            stack.push((start, max_index));
            stack.push((max_index, end));
        }
    }

    points
        .iter()
        .zip(keep)
        .filter_map(|(p, k)| k.then_some(*p))
        .collect()
}

/// A 4-corner polygon in canonical order.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Quadrilateral {
    /// Corners ordered top-left, top-right, bottom-right, bottom-left.
    pub corners: [Point; 4],
}

impl Quadrilateral {
    /// Builds a quadrilateral from four vertices in any order.
    ///
    /// Corners are assigned with the sum/difference rule: top-left has the
    /// smallest `x + y`, bottom-right the largest, top-right the smallest
    /// `y - x` and bottom-left the largest. When the rule is ambiguous (two
    /// vertices tie on a criterion, as happens near a 45 degree rotation) or
    /// does not pick four distinct vertices, the vertices are instead sorted
    /// clockwise around their centroid starting from the top-left candidate.
    pub fn from_unordered(points: [Point; 4]) -> Self {
        let corners =
            order_by_sum_diff(&points).unwrap_or_else(|| order_by_centroid_angle(&points));
        Self { corners }
    }

    /// Builds a quadrilateral from a 4-vertex contour.
    pub fn from_contour(contour: &Contour) -> Option<Self> {
        let points: [Point; 4] = contour.points.as_slice().try_into().ok()?;
        Some(Self::from_unordered(points))
    }

    /// The top-left corner.
    pub fn top_left(&self) -> Point {
        self.corners[0]
    }

    /// The top-right corner.
    pub fn top_right(&self) -> Point {
        self.corners[1]
    }

    /// The bottom-right corner.
    pub fn bottom_right(&self) -> Point {
        self.corners[2]
    }

    /// The bottom-left corner.
    pub fn bottom_left(&self) -> Point {
        self.corners[3]
    }

    /// Longer of the top and bottom edges.
    pub fn max_width(&self) -> f32 {
        let bottom = self.bottom_left().distance(&self.bottom_right());
        let top = self.top_left().distance(&self.top_right());
        bottom.max(top)
    }

    /// Longer of the right and left edges.
    pub fn max_height(&self) -> f32 {
        let right = self.top_right().distance(&self.bottom_right());
        let left = self.top_left().distance(&self.bottom_left());
        right.max(left)
    }

    /// Enclosed area.
    pub fn area(&self) -> f32 {
        Contour::new(self.corners.to_vec()).area()
    }

    /// Returns true when the corners form a convex polygon.
    pub fn is_convex(&self) -> bool {
        Contour::new(self.corners.to_vec()).is_convex()
    }
}

/// Index of the unique extreme value, or None when the best two values are
/// within [`CORNER_TIE_TOLERANCE`] of each other.
fn unique_extreme(values: &[f32; 4], maximize: bool) -> Option<usize> {
    let mut order: Vec<usize> = (0..4).collect();
    order.sort_by(|&a, &b| {
        let ord = values[a].partial_cmp(&values[b]).unwrap_or(Ordering::Equal);
        if maximize {
            ord.reverse()
        } else {
            ord
        }
    });
    let best = order[0];
    let runner_up = order[1];
    if (values[best] - values[runner_up]).abs() < CORNER_TIE_TOLERANCE {
        None
    } else {
        Some(best)
    }
}

fn order_by_sum_diff(points: &[Point; 4]) -> Option<[Point; 4]> {
    let sums = points.map(|p| p.x + p.y);
    let diffs = points.map(|p| p.y - p.x);

    let tl = unique_extreme(&sums, false)?;
    let br = unique_extreme(&sums, true)?;
    let tr = unique_extreme(&diffs, false)?;
    let bl = unique_extreme(&diffs, true)?;

    if [tl, tr, br, bl].iter().all_unique() {
        Some([points[tl], points[tr], points[br], points[bl]])
    } else {
        None
    }
}

fn order_by_centroid_angle(points: &[Point; 4]) -> [Point; 4] {
    let cx = points.iter().map(|p| p.x).sum::<f32>() / 4.0;
    let cy = points.iter().map(|p| p.y).sum::<f32>() / 4.0;

    // Ascending atan2 in image coordinates (y down) walks the corners clockwise.
    let mut sorted = *points;
    sorted.sort_by(|a, b| {
        let angle_a = (a.y - cy).atan2(a.x - cx);
        let angle_b = (b.y - cy).atan2(b.x - cx);
        angle_a.partial_cmp(&angle_b).unwrap_or(Ordering::Equal)
    });

    // Start from the smallest x + y; ties go to the topmost, then leftmost vertex.
    let start = (0..4)
        .min_by(|&a, &b| {
            let key = |p: &Point| (p.x + p.y, p.y, p.x);
            let (sa, ya, xa) = key(&sorted[a]);
            let (sb, yb, xb) = key(&sorted[b]);
            if (sa - sb).abs() >= CORNER_TIE_TOLERANCE {
                sa.partial_cmp(&sb).unwrap_or(Ordering::Equal)
            } else {
                ya.partial_cmp(&yb)
                    .unwrap_or(Ordering::Equal)
                    .then(xa.partial_cmp(&xb).unwrap_or(Ordering::Equal))
            }
        })
        .unwrap_or(0);

    [
        sorted[start],
        sorted[(start + 1) % 4],
        sorted[(start + 2) % 4],
        sorted[(start + 3) % 4],
    ]
}

/// An axis-aligned integer rectangle `(x, y, width, height)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Rect {
    /// Left edge.
    pub x: i32,
    /// Top edge.
    pub y: i32,
    /// Width in pixels.
    pub width: i32,
    /// Height in pixels.
    pub height: i32,
}

impl Rect {
    /// Creates a rectangle from its origin and size.
    pub fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Creates a rectangle from its left/top and right/bottom edges.
    pub fn from_edges(x1: i32, y1: i32, x2: i32, y2: i32) -> Self {
        Self::new(x1, y1, x2 - x1, y2 - y1)
    }

    /// Exclusive right edge.
    pub fn right(&self) -> i32 {
        self.x + self.width
    }

    /// Exclusive bottom edge.
    pub fn bottom(&self) -> i32 {
        self.y + self.height
    }

    /// Area, zero for degenerate rectangles.
    pub fn area(&self) -> i64 {
        self.width.max(0) as i64 * self.height.max(0) as i64
    }

    /// Area of the intersection with `other`.
    pub fn intersection_area(&self, other: &Rect) -> i64 {
        let iw = (self.right().min(other.right()) - self.x.max(other.x)).max(0);
        let ih = (self.bottom().min(other.bottom()) - self.y.max(other.y)).max(0);
        iw as i64 * ih as i64
    }

    /// Intersection over union; 0.0 when the union is empty.
    pub fn iou(&self, other: &Rect) -> f32 {
        let inter = self.intersection_area(other);
        let union = self.area() + other.area() - inter;
        if union > 0 {
            inter as f32 / union as f32
        } else {
            0.0
        }
    }

    /// Orthogonal gap to `other`: the larger of the horizontal and vertical
    /// separations, zero when the rectangles touch or overlap on both axes.
    pub fn gap(&self, other: &Rect) -> i32 {
        let gap_x = (other.x - self.right()).max(self.x - other.right()).max(0);
        let gap_y = (other.y - self.bottom()).max(self.y - other.bottom()).max(0);
        gap_x.max(gap_y)
    }

    /// Smallest rectangle containing both.
    pub fn union(&self, other: &Rect) -> Rect {
        Rect::from_edges(
            self.x.min(other.x),
            self.y.min(other.y),
            self.right().max(other.right()),
            self.bottom().max(other.bottom()),
        )
    }

    /// Clips to `[0, width) x [0, height)`; None when nothing remains.
    pub fn clip(&self, width: u32, height: u32) -> Option<Rect> {
        let x1 = self.x.clamp(0, width as i32);
        let y1 = self.y.clamp(0, height as i32);
        let x2 = self.right().clamp(0, width as i32);
        let y2 = self.bottom().clamp(0, height as i32);
        (x2 > x1 && y2 > y1).then(|| Rect::from_edges(x1, y1, x2, y2))
    }
}
