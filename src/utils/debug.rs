//! Writing of intermediate images for inspection.

use crate::core::config::DebugConfig;
use crate::processors::edges::EdgeMaps;
use crate::processors::geometry::Rect;
use image::{GrayImage, ImageResult, Rgb, RgbImage};
use imageproc::drawing::draw_hollow_rect_mut;
use imageproc::rect::Rect as DrawRect;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

const BOX_COLOR: Rgb<u8> = Rgb([0, 255, 0]);

/// Writes debug artifacts when enabled by its [`DebugConfig`].
///
/// Failures are logged and otherwise ignored; debug output never interrupts
/// processing.
#[derive(Debug, Clone, Default)]
pub struct DebugArtifacts {
    config: DebugConfig,
}

impl DebugArtifacts {
    /// Creates a writer for the given configuration.
    pub fn new(config: DebugConfig) -> Self {
        Self { config }
    }

    /// Returns true when artifacts are written.
    pub fn is_enabled(&self) -> bool {
        self.config.enabled
    }

    /// Target directory.
    pub fn dir(&self) -> &Path {
        &self.config.dir
    }

    fn write(&self, file_name: &str, save: impl FnOnce(&Path) -> ImageResult<()>) -> Option<PathBuf> {
        if !self.config.enabled {
            return None;
        }
        if let Err(e) = std::fs::create_dir_all(&self.config.dir) {
            warn!(dir = %self.config.dir.display(), error = %e, "Cannot create debug directory");
            return None;
        }
        let path = self.config.dir.join(file_name);
        match save(&path) {
            Ok(()) => {
                debug!(path = %path.display(), "Debug artifact written");
                Some(path)
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Cannot write debug artifact");
                None
            }
        }
    }

    /// Writes a grayscale image.
    pub fn save_gray(&self, file_name: &str, image: &GrayImage) -> Option<PathBuf> {
        self.write(file_name, |path| image.save(path))
    }

    /// Writes an RGB image.
    pub fn save_rgb(&self, file_name: &str, image: &RgbImage) -> Option<PathBuf> {
        self.write(file_name, |path| image.save(path))
    }

    /// Writes the edge maps of one image under `<stem>_*.png`.
    pub fn save_edge_maps(&self, stem: &str, maps: &EdgeMaps) {
        if !self.is_enabled() {
            return;
        }
        self.save_gray(&format!("{stem}_edges_raw.png"), &maps.raw_edges);
        self.save_gray(&format!("{stem}_edges_closed.png"), &maps.raw_closed);
        self.save_rgb(&format!("{stem}_posterized.png"), &maps.posterized);
        self.save_gray(&format!("{stem}_edges_poster.png"), &maps.posterized_edges);
        self.save_gray(&format!("{stem}_edges_poster_closed.png"), &maps.posterized_closed);
    }

    /// Writes the normalized document as `cropped_<stem>.png`.
    pub fn save_document(&self, stem: &str, document: &RgbImage) -> Option<PathBuf> {
        self.save_rgb(&format!("cropped_{stem}.png"), document)
    }

    /// Writes `image` annotated with `boxes` as `<stem>_text_boxes.png`.
    pub fn save_text_boxes(&self, stem: &str, image: &RgbImage, boxes: &[Rect]) -> Option<PathBuf> {
        if !self.is_enabled() {
            return None;
        }
        self.save_rgb(&format!("{stem}_text_boxes.png"), &draw_boxes(image, boxes))
    }
}

/// Draws each box as a 2-pixel green outline on a copy of `image`.
pub fn draw_boxes(image: &RgbImage, boxes: &[Rect]) -> RgbImage {
    let mut canvas = image.clone();
    for rect in boxes.iter().filter(|r| r.width > 0 && r.height > 0) {
        draw_hollow_rect_mut(
            &mut canvas,
            DrawRect::at(rect.x, rect.y).of_size(rect.width as u32, rect.height as u32),
            BOX_COLOR,
        );
        if rect.width > 2 && rect.height > 2 {
            draw_hollow_rect_mut(
                &mut canvas,
                DrawRect::at(rect.x + 1, rect.y + 1)
                    .of_size(rect.width as u32 - 2, rect.height as u32 - 2),
                BOX_COLOR,
            );
        }
    }
    canvas
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::processors::edges::EdgeMapBuilder;

    #[test]
    fn test_disabled_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let artifacts = DebugArtifacts::new(DebugConfig {
            enabled: false,
            dir: dir.path().join("debug"),
        });
        assert!(artifacts.save_rgb("x.png", &RgbImage::new(2, 2)).is_none());
        assert!(!dir.path().join("debug").exists());
    }

    #[test]
    fn test_edge_map_artifact_names() {
        let dir = tempfile::tempdir().unwrap();
        let artifacts = DebugArtifacts::new(DebugConfig::enabled_in(dir.path()));
        let maps = EdgeMapBuilder::default().build(&RgbImage::new(16, 16));
        artifacts.save_edge_maps("banner", &maps);
        for name in [
            "banner_edges_raw.png",
            "banner_edges_closed.png",
            "banner_posterized.png",
            "banner_edges_poster.png",
            "banner_edges_poster_closed.png",
        ] {
            assert!(dir.path().join(name).is_file(), "missing {name}");
        }
    }

    #[test]
    fn test_draw_boxes_outline() {
        let image = RgbImage::new(20, 20);
        let drawn = draw_boxes(&image, &[Rect::new(2, 2, 10, 10)]);
        assert_eq!(*drawn.get_pixel(2, 2), BOX_COLOR);
        assert_eq!(*drawn.get_pixel(3, 3), BOX_COLOR);
        assert_eq!(*drawn.get_pixel(6, 6), Rgb([0, 0, 0]));
    }

    #[test]
    fn test_unwritable_dir_is_ignored() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("file");
        std::fs::write(&blocker, b"x").unwrap();
        let artifacts = DebugArtifacts::new(DebugConfig::enabled_in(blocker.join("sub")));
        assert!(artifacts.save_rgb("x.png", &RgbImage::new(2, 2)).is_none());
    }
}
