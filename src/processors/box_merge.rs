//! Iterative merging of nearby or overlapping boxes.

use crate::processors::geometry::Rect;
use serde::{Deserialize, Serialize};

/// Merge criteria.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BoxMergeConfig {
    /// Boxes whose IoU reaches this value are merged.
    pub iou_threshold: f32,
    /// Boxes separated by at most this many pixels are merged.
    pub max_gap: i32,
}

impl Default for BoxMergeConfig {
    fn default() -> Self {
        Self {
            iou_threshold: 0.1,
            max_gap: 12,
        }
    }
}

crate::impl_config_validator!(BoxMergeConfig {
    iou_threshold: range(0.0, 1.0),
    max_gap: min(0),
});

/// Result of [`merge_boxes`].
#[derive(Debug, Clone, PartialEq)]
pub struct MergeOutcome {
    /// The merged boxes.
    pub boxes: Vec<Rect>,
    /// Number of passes run, including the final pass that merged nothing.
    pub passes: usize,
}

/// Repeatedly merges boxes until a pass changes nothing.
///
/// In each pass every box not yet consumed absorbs all other unconsumed boxes
/// that overlap it (IoU at or above the threshold) or lie within `max_gap`
/// pixels of it. Proximity is measured against the box as it was at the start
/// of the pass, and an absorbing box grows to the union rectangle. Each
/// merging pass removes at least one box, so at most `n` passes run.
pub fn merge_boxes(boxes: &[Rect], config: &BoxMergeConfig) -> MergeOutcome {
    let mut rects = boxes.to_vec();
    let mut passes = 0;
    if rects.is_empty() {
        return MergeOutcome { boxes: rects, passes };
    }

    loop {
        passes += 1;
        let mut merged = false;
        let mut used = vec![false; rects.len()];
        let mut next = Vec::with_capacity(rects.len());

        for i in 0..rects.len() {
            if used[i] {
                continue;
            }
            let anchor = rects[i];
            let mut current = anchor;
            for j in 0..rects.len() {
                if i == j || used[j] {
                    continue;
                }
                let other = rects[j];
                if anchor.iou(&other) >= config.iou_threshold || anchor.gap(&other) <= config.max_gap {
                    current = current.union(&other);
                    used[j] = true;
                    merged = true;
                }
            }
            used[i] = true;
            next.push(current);
        }

        rects = next;
        if !merged {
            break;
        }
    }

    MergeOutcome { boxes: rects, passes }
}
