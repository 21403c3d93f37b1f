//! Greedy non-maximum suppression over axis-aligned boxes.

use crate::processors::geometry::Rect;

/// Returns the indices of the boxes kept by greedy NMS, highest score first.
///
/// Boxes scoring at or below `score_threshold` are discarded up front. The
/// remaining boxes are visited by descending score (ties keep input order) and
/// a box survives when its IoU with every kept box is at most `iou_threshold`.
pub fn nms_boxes(
    boxes: &[Rect],
    scores: &[f32],
    score_threshold: f32,
    iou_threshold: f32,
) -> Vec<usize> {
    let mut candidates: Vec<usize> = (0..boxes.len().min(scores.len()))
        .filter(|&i| scores[i] > score_threshold)
        .collect();
    candidates.sort_by(|&a, &b| scores[b].total_cmp(&scores[a]));

    let mut kept: Vec<usize> = Vec::new();
    for idx in candidates {
        if kept
            .iter()
            .all(|&k| boxes[k].iou(&boxes[idx]) <= iou_threshold)
        {
            kept.push(idx);
        }
    }
    kept
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_suppresses_overlapping_lower_score() {
        let boxes = vec![
            Rect::new(0, 0, 10, 10),
            Rect::new(1, 1, 10, 10),
            Rect::new(50, 50, 10, 10),
        ];
        let scores = vec![0.6, 0.9, 0.5];
        assert_eq!(nms_boxes(&boxes, &scores, 0.2, 0.4), vec![1, 2]);
    }

    #[test]
    fn test_score_threshold_is_strict() {
        let boxes = vec![Rect::new(0, 0, 10, 10), Rect::new(40, 0, 10, 10)];
        let scores = vec![0.2, 0.21];
        assert_eq!(nms_boxes(&boxes, &scores, 0.2, 0.4), vec![1]);
    }

    #[test]
    fn test_empty_input() {
        assert!(nms_boxes(&[], &[], 0.2, 0.4).is_empty());
    }
}
