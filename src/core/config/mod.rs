//! Configuration management for the layout pipeline.
//!
//! This module provides the shared configuration types and the validation
//! trait implemented by every component configuration.

pub mod debug;
#[macro_use]
pub mod derive;
pub mod errors;
pub mod onnx;
pub mod parallel;

pub use debug::DebugConfig;
pub use errors::{ConfigError, ConfigValidator};
pub use onnx::*;
pub use parallel::ParallelPolicy;
