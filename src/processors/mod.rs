//! Image processing building blocks.
//!
//! Everything here is deterministic and model-free: geometry, edge maps,
//! color quantization, MSER, box suppression and merging, and the EAST map
//! decoder.

pub mod box_merge;
pub mod east_decode;
pub mod edges;
pub mod geometry;
pub mod kmeans;
pub mod mser;
pub mod nms;
pub mod types;

pub use box_merge::{BoxMergeConfig, MergeOutcome, merge_boxes};
pub use east_decode::{EastDetections, decode_east};
pub use edges::{EdgeConfig, EdgeMapBuilder, EdgeMaps};
pub use geometry::{Contour, Point, Quadrilateral, Rect};
pub use kmeans::{KMeansConfig, posterize};
pub use mser::{MserParams, MserRegion, detect_regions, detect_regions_both};
pub use nms::nms_boxes;
pub use types::{ChannelOrder, ColorOrder, ImageScaleInfo};
