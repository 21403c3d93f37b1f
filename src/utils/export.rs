//! Export of masks, overlays and grouping results.
//!
//! File names match what [`MaskDirectory`](crate::domain::MaskDirectory)
//! reads back: `mask_NNN.png` for binary masks and `mask_NNN_rgba.png` for
//! cutouts.

use crate::core::errors::{ImageProcessError, LayoutResult};
use crate::domain::grouping::{Group, GroupingOutput, SegmentationMask};
use image::{GrayImage, Luma, Rgb, RgbImage, Rgba, RgbaImage};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Blend factor of mask colors in the overlay.
pub const OVERLAY_ALPHA: f32 = 0.5;

/// Seed of the per-mask overlay palette.
const PALETTE_SEED: u64 = 0x6d61736b;

fn check_size(mask: &SegmentationMask, image: &RgbImage) -> LayoutResult<()> {
    if (mask.width(), mask.height()) != image.dimensions() {
        return Err(ImageProcessError::MaskSizeMismatch {
            mask_size: (mask.width(), mask.height()),
            image_size: image.dimensions(),
        }
        .into());
    }
    Ok(())
}

/// Binary image of a mask: 255 inside, 0 outside.
pub fn mask_to_gray(mask: &SegmentationMask) -> GrayImage {
    GrayImage::from_fn(mask.width(), mask.height(), |x, y| {
        Luma([if mask.grid[[y as usize, x as usize]] { 255 } else { 0 }])
    })
}

/// The image pixels under `mask`, fully transparent elsewhere.
pub fn mask_cutout(image: &RgbImage, mask: &SegmentationMask) -> LayoutResult<RgbaImage> {
    check_size(mask, image)?;
    Ok(RgbaImage::from_fn(image.width(), image.height(), |x, y| {
        let Rgb([r, g, b]) = *image.get_pixel(x, y);
        let alpha = if mask.grid[[y as usize, x as usize]] { 255 } else { 0 };
        Rgba([r, g, b, alpha])
    }))
}

/// One pseudo-random color per mask; the same count gives the same colors.
pub fn mask_palette(count: usize) -> Vec<Rgb<u8>> {
    let mut rng = StdRng::seed_from_u64(PALETTE_SEED);
    (0..count)
        .map(|_| Rgb([rng.random(), rng.random(), rng.random()]))
        .collect()
}

/// Blends each mask's color into a copy of `image`.
///
/// Masks are applied in order, so later masks tint pixels already tinted by
/// earlier ones.
pub fn mask_overlay(
    image: &RgbImage,
    masks: &[SegmentationMask],
    alpha: f32,
) -> LayoutResult<RgbImage> {
    let mut overlay = image.clone();
    for (mask, color) in masks.iter().zip(mask_palette(masks.len())) {
        check_size(mask, image)?;
        for ((y, x), _) in mask.grid.indexed_iter().filter(|(_, set)| **set) {
            let pixel = overlay.get_pixel_mut(x as u32, y as u32);
            for c in 0..3 {
                let blended = pixel[c] as f32 * (1.0 - alpha) + color[c] as f32 * alpha;
                pixel[c] = blended as u8;
            }
        }
    }
    Ok(overlay)
}

/// Writes `mask_NNN.png`, `mask_NNN_rgba.png` and `overlaid.png` into `dir`.
///
/// `NNN` is the mask id padded to three digits. Returns the written paths.
pub fn write_mask_outputs(
    dir: &Path,
    image: &RgbImage,
    masks: &[SegmentationMask],
) -> LayoutResult<Vec<PathBuf>> {
    fs::create_dir_all(dir)?;
    let mut written = Vec::with_capacity(masks.len() * 2 + 1);
    for mask in masks {
        let binary = dir.join(format!("mask_{:03}.png", mask.id.0));
        mask_to_gray(mask).save(&binary)?;
        let cutout = dir.join(format!("mask_{:03}_rgba.png", mask.id.0));
        mask_cutout(image, mask)?.save(&cutout)?;
        written.push(binary);
        written.push(cutout);
    }

    let overlay_path = dir.join("overlaid.png");
    mask_overlay(image, masks, OVERLAY_ALPHA)?.save(&overlay_path)?;
    written.push(overlay_path);

    debug!(dir = %dir.display(), masks = masks.len(), "Mask outputs written");
    Ok(written)
}

/// Writes `groups.json` (pretty-printed) when `groups` is non-empty.
///
/// Returns the path written, or `None` when there was nothing to write.
pub fn write_groups_json(dir: &Path, groups: &[Group]) -> LayoutResult<Option<PathBuf>> {
    if groups.is_empty() {
        return Ok(None);
    }
    fs::create_dir_all(dir)?;
    let path = dir.join("groups.json");
    let json = serde_json::to_string_pretty(&GroupingOutput::from_groups(groups))?;
    fs::write(&path, json)?;
    info!(path = %path.display(), groups = groups.len(), "Wrote groups.json");
    Ok(Some(path))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::grouping::MaskId;
    use crate::domain::text_detection::TextBox;
    use ndarray::Array2;

    fn corner_mask(id: usize) -> SegmentationMask {
        SegmentationMask::new(MaskId(id), Array2::from_shape_fn((4, 6), |(y, x)| x < 2 && y < 2))
    }

    #[test]
    fn test_cutout_alpha() {
        let image = RgbImage::from_pixel(6, 4, Rgb([10, 20, 30]));
        let cutout = mask_cutout(&image, &corner_mask(0)).unwrap();
        assert_eq!(*cutout.get_pixel(0, 0), Rgba([10, 20, 30, 255]));
        assert_eq!(cutout.get_pixel(5, 3)[3], 0);
    }

    #[test]
    fn test_cutout_size_mismatch() {
        let image = RgbImage::new(4, 6);
        assert!(mask_cutout(&image, &corner_mask(0)).is_err());
    }

    #[test]
    fn test_overlay_blends_only_masked_pixels() {
        let image = RgbImage::from_pixel(6, 4, Rgb([100, 100, 100]));
        let overlay = mask_overlay(&image, &[corner_mask(0)], 0.5).unwrap();
        let color = mask_palette(1)[0];
        let expected = Rgb(color.0.map(|c| (100.0 * 0.5 + c as f32 * 0.5) as u8));
        assert_eq!(*overlay.get_pixel(1, 1), expected);
        assert_eq!(*overlay.get_pixel(4, 3), Rgb([100, 100, 100]));
    }

    #[test]
    fn test_palette_is_deterministic() {
        assert_eq!(mask_palette(5), mask_palette(5));
        assert_eq!(mask_palette(5)[..3], mask_palette(3)[..]);
    }

    #[test]
    fn test_write_mask_outputs_names() {
        let dir = tempfile::tempdir().unwrap();
        let image = RgbImage::new(6, 4);
        let written = write_mask_outputs(dir.path(), &image, &[corner_mask(0), corner_mask(7)]).unwrap();
        assert_eq!(written.len(), 5);
        for name in [
            "mask_000.png",
            "mask_000_rgba.png",
            "mask_007.png",
            "mask_007_rgba.png",
            "overlaid.png",
        ] {
            assert!(dir.path().join(name).is_file(), "missing {name}");
        }
    }

    #[test]
    fn test_groups_json_only_when_non_empty() {
        let dir = tempfile::tempdir().unwrap();
        assert!(write_groups_json(dir.path(), &[]).unwrap().is_none());
        assert!(!dir.path().join("groups.json").exists());

        let group = Group {
            text_box: TextBox::new(1, 2, 3, 4, None),
            mask_ids: vec![MaskId(2)],
        };
        let path = write_groups_json(dir.path(), &[group]).unwrap().unwrap();
        let text = std::fs::read_to_string(path).unwrap();
        assert!(text.contains("\n  \"groups\""));
        let parsed: GroupingOutput = serde_json::from_str(&text).unwrap();
        assert_eq!(parsed.groups[0].text_box, [1, 2, 3, 4]);
        assert_eq!(parsed.groups[0].mask_indices, vec![MaskId(2)]);
    }
}
