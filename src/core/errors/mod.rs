//! Error handling for the layout extraction pipeline.

mod types;

pub use types::{ImageProcessError, LayoutError, LayoutResult, ProcessingStage};
