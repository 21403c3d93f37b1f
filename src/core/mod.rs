//! The core module of the layout pipeline.
//!
//! This module contains the pieces shared by every stage:
//! - Configuration types and validation
//! - Error handling
//! - ONNX Runtime session loading
//!
//! It also re-exports the most commonly used types.

pub mod config;
pub mod errors;
pub mod inference;

pub use config::{
    ConfigError, ConfigValidator, DebugConfig, OrtGraphOptimizationLevel, OrtSessionConfig,
    ParallelPolicy,
};
pub use errors::{ImageProcessError, LayoutError, LayoutResult, ProcessingStage};
pub use inference::load_session;
