//! End-to-end layout extraction.
//!
//! [`LayoutPipeline`] wires the stages together. An input image is first
//! downscaled to the analysis size. Document normalization (edge maps, quad
//! search, rectification) and text detection both run on that analysis
//! image, as does mask generation, so text boxes and masks share one
//! coordinate frame.

mod config;

pub use config::PipelineConfig;

use crate::core::config::ConfigValidator;
use crate::core::errors::{LayoutError, LayoutResult};
use crate::domain::collaborators::MaskGenerator;
use crate::domain::grouping::{Group, MaskTextGrouper, SegmentationMask};
use crate::domain::quad_detection::QuadDetector;
use crate::domain::rectification::PerspectiveRectifier;
use crate::domain::text_detection::{TextBox, TextRegionDetector};
use crate::processors::edges::EdgeMapBuilder;
use crate::processors::geometry::Rect;
use crate::utils::debug::DebugArtifacts;
use crate::utils::image::{downscale_to_max_dimension, load_image};
use image::RgbImage;
use rayon::prelude::*;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Result of [`LayoutPipeline::run`].
#[derive(Debug, Clone)]
pub struct PipelineOutput {
    /// The downscaled image every stage worked on.
    pub analysis: RgbImage,
    /// Rectified, portrait-normalized document.
    pub document: RgbImage,
    /// Text regions in analysis image coordinates.
    pub text_boxes: Vec<TextBox>,
    /// Masks returned by the mask generator.
    pub masks: Vec<SegmentationMask>,
    /// Masks grouped by text region.
    pub groups: Vec<Group>,
}

/// The layout extraction pipeline.
#[derive(Debug)]
pub struct LayoutPipeline {
    config: PipelineConfig,
    edges: EdgeMapBuilder,
    quads: QuadDetector,
    rectifier: PerspectiveRectifier,
    text_detector: TextRegionDetector,
    grouper: MaskTextGrouper,
    debug: DebugArtifacts,
}

impl LayoutPipeline {
    /// Validates `config` and builds every stage.
    pub fn new(config: PipelineConfig) -> LayoutResult<Self> {
        config.validate()?;
        Ok(Self {
            edges: EdgeMapBuilder::new(config.edges.clone()),
            quads: QuadDetector::new(config.quad.clone()),
            rectifier: PerspectiveRectifier::new(config.rectification.clone()),
            text_detector: TextRegionDetector::from_config(&config.text_detection),
            grouper: MaskTextGrouper::new(config.grouping.clone()),
            debug: DebugArtifacts::new(config.debug.clone()),
            config,
        })
    }

    /// The configuration in use.
    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Downscales `image` to the analysis size.
    pub fn prepare(&self, image: &RgbImage) -> RgbImage {
        match self.config.max_dimension {
            Some(max) => downscale_to_max_dimension(image, max),
            None => image.clone(),
        }
    }

    /// Finds and rectifies the document in `image`.
    ///
    /// When no document boundary is found, or the found one cannot be
    /// warped, the whole image is returned portrait-normalized.
    pub fn normalize_document(&self, image: &RgbImage, stem: &str) -> RgbImage {
        let maps = self.edges.build(image);
        self.debug.save_edge_maps(stem, &maps);

        let document = match self.quads.detect(&maps, image.dimensions()) {
            Some(quad) => match self.rectifier.rectify(image, &quad) {
                Ok(document) => document,
                Err(e) => {
                    warn!(image = stem, error = %e, "Rectification failed, using full image");
                    self.rectifier.to_portrait(image)
                }
            },
            None => {
                info!(image = stem, "No document boundary found, using full image");
                self.rectifier.to_portrait(image)
            }
        };

        self.debug.save_document(stem, &document);
        document
    }

    /// Detects text regions in `image`.
    pub fn detect_text(&self, image: &RgbImage, stem: &str) -> Vec<TextBox> {
        let boxes = self.text_detector.detect(image);
        if self.debug.is_enabled() {
            let rects: Vec<Rect> = boxes.iter().map(TextBox::rect).collect();
            self.debug.save_text_boxes(stem, image, &rects);
        }
        boxes
    }

    /// Groups `masks` by the text boxes they overlap.
    pub fn group(&self, masks: &[SegmentationMask], text_boxes: &[TextBox]) -> Vec<Group> {
        self.grouper.group(masks, text_boxes)
    }

    /// Runs every stage on one image.
    ///
    /// `name` identifies the image in logs and debug file names; its file
    /// stem is used.
    pub fn run(
        &self,
        image: &RgbImage,
        name: &str,
        masks: &dyn MaskGenerator,
    ) -> LayoutResult<PipelineOutput> {
        if image.width() == 0 || image.height() == 0 {
            return Err(LayoutError::invalid_input(format!("image '{name}' is empty")));
        }
        let stem = file_stem(name);
        let analysis = self.prepare(image);
        debug!(
            image = stem,
            width = analysis.width(),
            height = analysis.height(),
            "Analysis image ready"
        );

        let document = self.normalize_document(&analysis, stem);
        let text_boxes = self.detect_text(&analysis, stem);
        let masks = masks.generate(&analysis)?;
        let groups = self.group(&masks, &text_boxes);

        info!(
            image = stem,
            text_boxes = text_boxes.len(),
            masks = masks.len(),
            groups = groups.len(),
            "Layout extracted"
        );
        Ok(PipelineOutput {
            analysis,
            document,
            text_boxes,
            masks,
            groups,
        })
    }

    /// Loads, downscales and normalizes one image file.
    pub fn process_file(&self, path: &Path) -> LayoutResult<RgbImage> {
        let image = load_image(path)?;
        let stem = path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("image");
        Ok(self.normalize_document(&self.prepare(&image), stem))
    }

    /// Normalizes a batch of image files.
    ///
    /// Images are processed in parallel when the batch is larger than the
    /// policy's threshold. Results are in input order and one failure does
    /// not affect the others.
    pub fn process_batch(&self, paths: &[PathBuf]) -> Vec<LayoutResult<RgbImage>> {
        let process = |path: &PathBuf| {
            let result = self.process_file(path);
            if let Err(e) = &result {
                warn!(path = %path.display(), error = %e, "Image failed");
            }
            result
        };

        if self.config.parallel.should_parallelize(paths.len()) {
            paths.par_iter().map(process).collect()
        } else {
            paths.iter().map(process).collect()
        }
    }
}

fn file_stem(name: &str) -> &str {
    Path::new(name)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::DebugConfig;
    use crate::domain::grouping::MaskId;
    use crate::domain::text_detection::{TextDetectionConfig, TextDetectorKind};
    use image::Rgb;
    use imageproc::drawing::draw_filled_rect_mut;
    use imageproc::rect::Rect as DrawRect;
    use ndarray::Array2;

    fn mser_only() -> PipelineConfig {
        PipelineConfig {
            text_detection: TextDetectionConfig {
                strategies: vec![TextDetectorKind::Mser],
                ..Default::default()
            },
            ..Default::default()
        }
    }

    #[test]
    fn test_uniform_image_returns_portrait_original() {
        let pipeline = LayoutPipeline::new(mser_only()).unwrap();
        let image = RgbImage::from_pixel(120, 80, Rgb([128, 128, 128]));
        let output = pipeline.run(&image, "plain.png", &Vec::<SegmentationMask>::new()).unwrap();
        assert_eq!(output.document.dimensions(), (80, 120));
        assert!(output.text_boxes.is_empty());
        assert!(output.groups.is_empty());
    }

    #[test]
    fn test_document_is_rectified() {
        let pipeline = LayoutPipeline::new(mser_only()).unwrap();
        let mut image = RgbImage::from_pixel(300, 200, Rgb([25, 25, 25]));
        draw_filled_rect_mut(&mut image, DrawRect::at(60, 50).of_size(100, 130), Rgb([240, 240, 240]));
        let document = pipeline.normalize_document(&image, "doc");
        let (w, h) = document.dimensions();
        assert!((w as i32 - 100).abs() <= 6, "{w}x{h}");
        assert!((h as i32 - 130).abs() <= 6, "{w}x{h}");
    }

    #[test]
    fn test_large_input_is_downscaled() {
        let config = PipelineConfig {
            max_dimension: Some(100),
            ..mser_only()
        };
        let pipeline = LayoutPipeline::new(config).unwrap();
        let prepared = pipeline.prepare(&RgbImage::new(400, 200));
        assert_eq!(prepared.dimensions(), (100, 50));
    }

    #[test]
    fn test_run_groups_masks_with_text() {
        let pipeline = LayoutPipeline::new(mser_only()).unwrap();
        let mut image = RgbImage::from_pixel(200, 100, Rgb([255, 255, 255]));
        draw_filled_rect_mut(&mut image, DrawRect::at(30, 30).of_size(20, 30), Rgb([0, 0, 0]));

        let inside = Array2::from_shape_fn((100, 200), |(y, x)| {
            (32..48).contains(&x) && (35..55).contains(&y)
        });
        let outside = Array2::from_shape_fn((100, 200), |(y, x)| x > 150 && y > 70);
        let masks = vec![
            SegmentationMask::new(MaskId(0), inside),
            SegmentationMask::new(MaskId(1), outside),
        ];

        let output = pipeline.run(&image, "banner.jpg", &masks).unwrap();
        assert_eq!(output.text_boxes.len(), 1);
        assert_eq!(output.groups.len(), 1);
        assert_eq!(output.groups[0].mask_ids, vec![MaskId(0)]);
    }

    #[test]
    fn test_mismatched_masks_fail_run() {
        let pipeline = LayoutPipeline::new(mser_only()).unwrap();
        let image = RgbImage::new(40, 30);
        let masks = vec![SegmentationMask::new(MaskId(0), Array2::from_elem((10, 10), true))];
        assert!(pipeline.run(&image, "x.png", &masks).is_err());
    }

    #[test]
    fn test_batch_isolates_failures() {
        let dir = tempfile::tempdir().unwrap();
        let good = dir.path().join("good.png");
        RgbImage::from_pixel(40, 60, Rgb([90, 90, 90])).save(&good).unwrap();
        let missing = dir.path().join("missing.png");

        let pipeline = LayoutPipeline::new(mser_only()).unwrap();
        let results = pipeline.process_batch(&[good, missing]);
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].as_ref().unwrap().dimensions(), (40, 60));
        assert!(results[1].is_err());
    }

    #[test]
    fn test_debug_artifacts_written() {
        let dir = tempfile::tempdir().unwrap();
        let config = PipelineConfig {
            debug: DebugConfig::enabled_in(dir.path()),
            ..mser_only()
        };
        let pipeline = LayoutPipeline::new(config).unwrap();
        let image = RgbImage::from_pixel(64, 48, Rgb([200, 200, 200]));
        pipeline.run(&image, "photos/sign.jpg", &Vec::<SegmentationMask>::new()).unwrap();
        for name in ["sign_edges_raw.png", "cropped_sign.png", "sign_text_boxes.png"] {
            assert!(dir.path().join(name).is_file(), "missing {name}");
        }
    }

    #[test]
    fn test_invalid_config_rejected() {
        let config = PipelineConfig {
            max_dimension: Some(0),
            ..Default::default()
        };
        assert!(LayoutPipeline::new(config).is_err());
    }
}
