//! # layout-extract
//!
//! Extracts the layout of photographed documents and banners: finds the
//! document boundary, warps it upright, locates text regions and groups
//! segmentation masks by the text region they cover.
//!
//! ## Components
//!
//! - **Edge maps**: Canny edges of the raw and k-means posterized image, closed
//!   with a morphological kernel
//! - **Quadrilateral detection**: ranked search over the largest external
//!   contours for a convex four-vertex outline
//! - **Rectification**: perspective warp to an axis-aligned, portrait image
//! - **Text detection**: EAST over ONNX Runtime, falling back to MSER regions
//! - **Grouping**: masks assigned to each text box they mostly lie inside
//!
//! ## Modules
//!
//! * [`core`] - Errors, configuration and ONNX Runtime sessions
//! * [`domain`] - Detection, rectification and grouping stages
//! * [`pipeline`] - The end-to-end pipeline and its configuration
//! * [`processors`] - Model-free image processing building blocks
//! * [`utils`] - Image loading, transforms, model cache, debug and export
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use layout_extract::prelude::*;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let pipeline = LayoutPipeline::new(PipelineConfig::default())?;
//! let image = load_image("banner.jpg")?;
//! let masks = MaskDirectory::new("masks");
//!
//! let output = pipeline.run(&image, "banner.jpg", &masks)?;
//! for group in &output.groups {
//!     println!("{:?} -> {:?}", group.text_box, group.mask_ids);
//! }
//! # Ok(())
//! # }
//! ```

pub mod core;
pub mod domain;
pub mod pipeline;
pub mod processors;
pub mod utils;

/// Prelude module for convenient imports.
///
/// ```rust
/// use layout_extract::prelude::*;
/// ```
pub mod prelude {
    pub use crate::pipeline::{LayoutPipeline, PipelineConfig, PipelineOutput};

    pub use crate::domain::{
        Group, MaskDirectory, MaskGenerator, MaskId, SegmentationMask, TextBox,
    };

    pub use crate::core::{LayoutError, LayoutResult};

    pub use crate::utils::load_image;
}
