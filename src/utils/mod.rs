//! Utility functions for the layout pipeline.
//!
//! This module provides image loading and resizing, projective warps, the
//! model weight cache, debug artifact and export writers, and logging setup.

pub mod debug;
pub mod export;
pub mod image;
pub mod model_cache;
pub mod transform;

pub use self::image::{downscale_to_max_dimension, load_image};
pub use debug::{DebugArtifacts, draw_boxes};
pub use export::{
    OVERLAY_ALPHA, mask_cutout, mask_overlay, mask_palette, mask_to_gray, write_groups_json,
    write_mask_outputs,
};
pub use model_cache::{download_to, ensure_model};
pub use transform::{perspective_transform, to_portrait, warp_perspective};

/// Initializes the tracing subscriber for logging.
///
/// The log level is read from the `RUST_LOG` environment variable, e.g.
/// `RUST_LOG=layout_extract=debug`.
pub fn init_tracing() {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer())
        .init();
}
