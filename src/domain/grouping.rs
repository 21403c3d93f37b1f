//! Grouping of segmentation masks by the text boxes they cover.
//!
//! A mask belongs to a text box when more than `overlap_threshold` of the
//! mask's own pixels fall inside the box. Masks are matched against every box
//! independently, so one mask can appear in several groups.

use crate::core::errors::{ImageProcessError, LayoutError, LayoutResult, ProcessingStage};
use crate::domain::text_detection::TextBox;
use crate::impl_config_validator;
use crate::processors::geometry::Rect;
use image::GrayImage;
use ndarray::{Array2, s};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Stable identifier of a segmentation mask.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MaskId(pub usize);

impl std::fmt::Display for MaskId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A binary segmentation mask over the analysis image.
#[derive(Debug, Clone, PartialEq)]
pub struct SegmentationMask {
    /// Identifier reported in groups.
    pub id: MaskId,
    /// Mask pixels, indexed `[row, column]`.
    pub grid: Array2<bool>,
}

impl SegmentationMask {
    /// Wraps a grid of shape `(height, width)`.
    pub fn new(id: MaskId, grid: Array2<bool>) -> Self {
        Self { id, grid }
    }

    /// Builds a mask from a grayscale image; non-zero pixels are set.
    pub fn from_gray(id: MaskId, image: &GrayImage) -> Self {
        let (width, height) = image.dimensions();
        let grid = Array2::from_shape_fn((height as usize, width as usize), |(y, x)| {
            image.get_pixel(x as u32, y as u32)[0] > 0
        });
        Self { id, grid }
    }

    /// Grid width in pixels.
    pub fn width(&self) -> u32 {
        self.grid.ncols() as u32
    }

    /// Grid height in pixels.
    pub fn height(&self) -> u32 {
        self.grid.nrows() as u32
    }

    /// Number of set pixels.
    pub fn area(&self) -> usize {
        self.grid.iter().filter(|&&v| v).count()
    }

    /// Number of set pixels inside `rect`, clipped to the grid.
    pub fn overlap_with_rect(&self, rect: &Rect) -> usize {
        let Some(clipped) = rect.clip(self.width(), self.height()) else {
            return 0;
        };
        let rows = clipped.y as usize..clipped.bottom() as usize;
        let cols = clipped.x as usize..clipped.right() as usize;
        self.grid
            .slice(s![rows, cols])
            .iter()
            .filter(|&&v| v)
            .count()
    }

    /// Fails when the grid does not have the given image dimensions.
    pub fn ensure_dimensions(&self, width: u32, height: u32) -> LayoutResult<()> {
        if (self.width(), self.height()) == (width, height) {
            return Ok(());
        }
        Err(LayoutError::processing(
            ProcessingStage::Grouping,
            format!("mask {}", self.id),
            ImageProcessError::MaskSizeMismatch {
                mask_size: (self.width(), self.height()),
                image_size: (width, height),
            },
        ))
    }
}

/// A text box and the masks assigned to it.
#[derive(Debug, Clone, PartialEq)]
pub struct Group {
    /// The text box.
    pub text_box: TextBox,
    /// Qualifying masks in input order, without duplicates.
    pub mask_ids: Vec<MaskId>,
}

/// Serialized form of a [`Group`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupRecord {
    /// `[x, y, width, height]`.
    pub text_box: [i32; 4],
    /// Qualifying mask ids.
    pub mask_indices: Vec<MaskId>,
}

impl From<&Group> for GroupRecord {
    fn from(group: &Group) -> Self {
        let b = &group.text_box;
        Self {
            text_box: [b.x, b.y, b.width, b.height],
            mask_indices: group.mask_ids.clone(),
        }
    }
}

/// Top-level document of `groups.json`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GroupingOutput {
    /// One record per non-empty group.
    pub groups: Vec<GroupRecord>,
}

impl GroupingOutput {
    /// Converts groups to their serialized form.
    pub fn from_groups(groups: &[Group]) -> Self {
        Self {
            groups: groups.iter().map(GroupRecord::from).collect(),
        }
    }
}

/// Configuration for [`MaskTextGrouper`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GroupingConfig {
    /// A mask qualifies when its overlap ratio is strictly above this value.
    pub overlap_threshold: f32,
}

impl Default for GroupingConfig {
    fn default() -> Self {
        Self {
            overlap_threshold: 0.5,
        }
    }
}

impl_config_validator!(GroupingConfig {
    overlap_threshold: range(0.0, 1.0),
});

/// Assigns masks to the text boxes they predominantly overlap.
#[derive(Debug, Clone, Default)]
pub struct MaskTextGrouper {
    config: GroupingConfig,
}

impl MaskTextGrouper {
    /// Creates a grouper.
    pub fn new(config: GroupingConfig) -> Self {
        Self { config }
    }

    /// Fraction of the mask's pixels inside `text_box`; 0.0 for empty masks.
    pub fn overlap_ratio(mask: &SegmentationMask, text_box: &TextBox) -> f32 {
        let area = mask.area();
        if area == 0 {
            return 0.0;
        }
        mask.overlap_with_rect(&text_box.rect()) as f32 / area as f32
    }

    /// Groups masks per text box.
    ///
    /// Groups follow the order of `text_boxes`; mask ids inside a group follow
    /// the order of `masks`. Boxes without qualifying masks produce no group.
    pub fn group(&self, masks: &[SegmentationMask], text_boxes: &[TextBox]) -> Vec<Group> {
        // Areas are computed once; empty masks never qualify.
        let areas: Vec<usize> = masks.iter().map(SegmentationMask::area).collect();

        let groups: Vec<Group> = text_boxes
            .iter()
            .filter_map(|text_box| {
                let rect = text_box.rect();
                let mut mask_ids: Vec<MaskId> = Vec::new();
                for (mask, &area) in masks.iter().zip(&areas) {
                    if area == 0 || mask_ids.contains(&mask.id) {
                        continue;
                    }
                    let ratio = mask.overlap_with_rect(&rect) as f32 / area as f32;
                    if ratio > self.config.overlap_threshold {
                        mask_ids.push(mask.id);
                    }
                }
                (!mask_ids.is_empty()).then(|| Group {
                    text_box: *text_box,
                    mask_ids,
                })
            })
            .collect();

        debug!(
            masks = masks.len(),
            text_boxes = text_boxes.len(),
            groups = groups.len(),
            "Masks grouped"
        );
        groups
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mask_with_rect(id: usize, width: usize, height: usize, rect: Rect) -> SegmentationMask {
        let grid = Array2::from_shape_fn((height, width), |(y, x)| {
            let (x, y) = (x as i32, y as i32);
            x >= rect.x && x < rect.right() && y >= rect.y && y < rect.bottom()
        });
        SegmentationMask::new(MaskId(id), grid)
    }

    #[test]
    fn test_full_cover_ratio_is_one() {
        let mask = mask_with_rect(0, 100, 100, Rect::new(20, 20, 10, 10));
        let text_box = TextBox::new(0, 0, 100, 100, None);
        assert_eq!(MaskTextGrouper::overlap_ratio(&mask, &text_box), 1.0);
        let groups = MaskTextGrouper::default().group(&[mask], &[text_box]);
        assert_eq!(groups.len(), 1);
    }

    #[test]
    fn test_disjoint_ratio_is_zero() {
        let mask = mask_with_rect(0, 100, 100, Rect::new(70, 70, 10, 10));
        let text_box = TextBox::new(0, 0, 50, 50, None);
        assert_eq!(MaskTextGrouper::overlap_ratio(&mask, &text_box), 0.0);
        assert!(MaskTextGrouper::default().group(&[mask], &[text_box]).is_empty());
    }

    #[test]
    fn test_one_box_two_masks() {
        let inside = mask_with_rect(0, 100, 100, Rect::new(15, 12, 20, 10));
        let outside = mask_with_rect(1, 100, 100, Rect::new(70, 60, 20, 20));
        let text_box = TextBox::new(10, 10, 50, 20, Some(0.9));
        let groups = MaskTextGrouper::default().group(&[inside, outside], &[text_box]);
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].mask_ids, vec![MaskId(0)]);
        assert_eq!(groups[0].text_box, text_box);
    }

    #[test]
    fn test_half_overlap_does_not_qualify() {
        // Exactly half of the mask lies inside the box; the test is strict.
        let mask = mask_with_rect(3, 100, 100, Rect::new(0, 0, 20, 10));
        let text_box = TextBox::new(10, 0, 50, 50, None);
        assert_eq!(MaskTextGrouper::overlap_ratio(&mask, &text_box), 0.5);
        assert!(MaskTextGrouper::default().group(&[mask], &[text_box]).is_empty());
    }

    #[test]
    fn test_empty_mask_is_skipped() {
        let mask = SegmentationMask::new(MaskId(0), Array2::from_elem((10, 10), false));
        let text_box = TextBox::new(0, 0, 10, 10, None);
        assert_eq!(MaskTextGrouper::overlap_ratio(&mask, &text_box), 0.0);
        assert!(MaskTextGrouper::default().group(&[mask], &[text_box]).is_empty());
    }

    #[test]
    fn test_box_outside_grid_is_clipped() {
        let mask = mask_with_rect(0, 20, 20, Rect::new(10, 10, 10, 10));
        let text_box = TextBox::new(5, 5, 100, 100, None);
        assert_eq!(MaskTextGrouper::overlap_ratio(&mask, &text_box), 1.0);
    }

    #[test]
    fn test_groups_follow_box_order() {
        let a = mask_with_rect(0, 100, 100, Rect::new(0, 0, 10, 10));
        let b = mask_with_rect(1, 100, 100, Rect::new(50, 50, 10, 10));
        let boxes = [
            TextBox::new(45, 45, 20, 20, None),
            TextBox::new(0, 0, 20, 20, None),
        ];
        let groups = MaskTextGrouper::default().group(&[a, b], &boxes);
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].mask_ids, vec![MaskId(1)]);
        assert_eq!(groups[1].mask_ids, vec![MaskId(0)]);
    }

    #[test]
    fn test_record_json_shape() {
        let group = Group {
            text_box: TextBox::new(10, 10, 50, 20, None),
            mask_ids: vec![MaskId(0), MaskId(4)],
        };
        let json = serde_json::to_value(GroupingOutput::from_groups(&[group])).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"groups": [{"text_box": [10, 10, 50, 20], "mask_indices": [0, 4]}]})
        );
    }

    #[test]
    fn test_dimension_check() {
        let mask = mask_with_rect(0, 20, 10, Rect::new(0, 0, 1, 1));
        assert!(mask.ensure_dimensions(20, 10).is_ok());
        assert!(mask.ensure_dimensions(10, 20).is_err());
    }
}
