//! Decoding of EAST score and geometry maps into axis-aligned boxes.
//!
//! EAST predicts, for every cell of a stride-4 grid, a text score and a
//! rotated box given as distances to its top, right, bottom and left edges
//! plus a rotation angle. Only the axis-aligned envelope anchored at the
//! rotated bottom-right corner is kept.

use crate::processors::geometry::Rect;
use ndarray::{ArrayView2, ArrayView3};

/// Output stride of the EAST feature maps.
pub const EAST_STRIDE: f32 = 4.0;

/// Boxes and confidences decoded from one image.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EastDetections {
    /// Boxes in network input coordinates.
    pub rects: Vec<Rect>,
    /// Score of each box.
    pub scores: Vec<f32>,
}

/// Decodes every cell whose score reaches `score_threshold`.
///
/// `scores` has shape `(H, W)` and `geometry` shape `(5, H, W)` with channels
/// top, right, bottom, left distances and angle.
pub fn decode_east(
    scores: ArrayView2<'_, f32>,
    geometry: ArrayView3<'_, f32>,
    score_threshold: f32,
) -> EastDetections {
    let (rows, cols) = scores.dim();
    let mut detections = EastDetections::default();
    if geometry.dim().0 < 5 || geometry.dim().1 < rows || geometry.dim().2 < cols {
        return detections;
    }

    for y in 0..rows {
        for x in 0..cols {
            let score = scores[[y, x]];
            if score < score_threshold {
                continue;
            }

            let offset_x = x as f32 * EAST_STRIDE;
            let offset_y = y as f32 * EAST_STRIDE;
            let top = geometry[[0, y, x]];
            let right = geometry[[1, y, x]];
            let bottom = geometry[[2, y, x]];
            let left = geometry[[3, y, x]];
            let angle = geometry[[4, y, x]];
            let (sin, cos) = angle.sin_cos();

            let h = top + bottom;
            let w = right + left;
            let end_x = (offset_x + cos * right + sin * bottom) as i32;
            let end_y = (offset_y - sin * right + cos * bottom) as i32;
            let start_x = (end_x as f32 - w) as i32;
            let start_y = (end_y as f32 - h) as i32;

            detections
                .rects
                .push(Rect::new(start_x, start_y, w as i32, h as i32));
            detections.scores.push(score);
        }
    }

    detections
}
