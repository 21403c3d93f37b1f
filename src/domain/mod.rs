//! Layout extraction stages.
//!
//! - [`quad_detection`] finds the document boundary in edge maps
//! - [`rectification`] warps the document to an upright rectangle
//! - [`text_detection`] locates text regions with an ordered strategy list
//! - [`grouping`] assigns segmentation masks to text regions
//! - [`collaborators`] declares the external mask and inpainting models

pub mod collaborators;
pub mod grouping;
pub mod quad_detection;
pub mod rectification;
pub mod text_detection;

pub use collaborators::{Inpainter, MaskDirectory, MaskGenerator};
pub use grouping::{
    Group, GroupRecord, GroupingConfig, GroupingOutput, MaskId, MaskTextGrouper, SegmentationMask,
};
pub use quad_detection::{QuadDetectionConfig, QuadDetector};
pub use rectification::{PerspectiveRectifier, RectificationConfig};
pub use text_detection::{
    EastConfig, EastDetector, MserConfig, MserDetector, TextBox, TextDetectionConfig,
    TextDetectorKind, TextDetectorStrategy, TextRegionDetector,
};
