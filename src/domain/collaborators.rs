//! Interfaces to the external segmentation and inpainting models.
//!
//! Mask generation and inpainting run outside this crate. [`MaskDirectory`]
//! reads masks another process has written as `mask_NNN.png` files.

use crate::core::errors::{LayoutError, LayoutResult};
use crate::domain::grouping::{MaskId, SegmentationMask};
use image::RgbImage;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Produces segmentation masks for an image.
pub trait MaskGenerator: Send + Sync {
    /// Masks over `image`; every grid has the image's dimensions.
    fn generate(&self, image: &RgbImage) -> LayoutResult<Vec<SegmentationMask>>;
}

/// Fills a masked region of an image according to a text prompt.
pub trait Inpainter: Send + Sync {
    /// Returns a copy of `image` with the `mask` region repainted.
    fn inpaint(
        &self,
        image: &RgbImage,
        mask: &SegmentationMask,
        prompt: &str,
    ) -> LayoutResult<RgbImage>;
}

/// Precomputed masks.
impl MaskGenerator for Vec<SegmentationMask> {
    fn generate(&self, image: &RgbImage) -> LayoutResult<Vec<SegmentationMask>> {
        for mask in self {
            mask.ensure_dimensions(image.width(), image.height())?;
        }
        Ok(self.clone())
    }
}

/// Loads masks from `mask_NNN.png` files in a directory.
///
/// Non-zero pixels are set. The number in the file name becomes the
/// [`MaskId`]; masks are returned in id order.
#[derive(Debug, Clone)]
pub struct MaskDirectory {
    dir: PathBuf,
}

impl MaskDirectory {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// The directory read by [`load`](Self::load).
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Reads every mask file in the directory.
    pub fn load(&self) -> LayoutResult<Vec<SegmentationMask>> {
        if !self.dir.is_dir() {
            return Err(LayoutError::invalid_input(format!(
                "mask directory {} does not exist",
                self.dir.display()
            )));
        }

        let mut entries: Vec<(MaskId, PathBuf)> = Vec::new();
        for entry in std::fs::read_dir(&self.dir)? {
            let path = entry?.path();
            let id = path
                .file_name()
                .and_then(|name| name.to_str())
                .and_then(parse_mask_id);
            match id {
                Some(id) => entries.push((id, path)),
                None => debug!(path = %path.display(), "Skipping non-mask file"),
            }
        }
        entries.sort_by_key(|(id, _)| *id);

        let masks = entries
            .into_iter()
            .map(|(id, path)| {
                let gray = image::open(&path)?.to_luma8();
                Ok(SegmentationMask::from_gray(id, &gray))
            })
            .collect::<LayoutResult<Vec<_>>>()?;
        info!(dir = %self.dir.display(), count = masks.len(), "Masks loaded");
        Ok(masks)
    }
}

impl MaskGenerator for MaskDirectory {
    fn generate(&self, image: &RgbImage) -> LayoutResult<Vec<SegmentationMask>> {
        let masks = self.load()?;
        for mask in &masks {
            mask.ensure_dimensions(image.width(), image.height())?;
        }
        Ok(masks)
    }
}

/// `mask_007.png` -> `MaskId(7)`.
fn parse_mask_id(file_name: &str) -> Option<MaskId> {
    let digits = file_name.strip_prefix("mask_")?.strip_suffix(".png")?;
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok().map(MaskId)
}
