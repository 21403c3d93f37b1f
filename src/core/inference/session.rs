use crate::core::config::{OrtGraphOptimizationLevel as OG, OrtSessionConfig};
use crate::core::errors::LayoutError;
use ort::logging::LogLevel;
use ort::session::Session;
use ort::session::builder::{GraphOptimizationLevel as GOL, SessionBuilder};
use std::path::Path;

/// Loads an ONNX model file into a session configured by `cfg`.
///
/// Any failure, whether the file is missing or the graph is rejected, is
/// reported as [`LayoutError::ModelUnavailable`] so callers can fall back to
/// a model-free strategy.
pub fn load_session(
    model_name: &str,
    model_path: impl AsRef<Path>,
    cfg: &OrtSessionConfig,
) -> Result<Session, LayoutError> {
    let path = model_path.as_ref();
    if !path.is_file() {
        return Err(LayoutError::model_unavailable(
            model_name,
            format!("weights not found at {}", path.display()),
        ));
    }

    Session::builder()
        .and_then(|b| b.with_log_level(LogLevel::Error))
        .and_then(|b| apply_ort_config(b, cfg))
        .and_then(|b| b.commit_from_file(path))
        .map_err(|e| {
            LayoutError::model_unavailable(
                model_name,
                format!("failed to create ONNX session from {}: {e}", path.display()),
            )
        })
}

fn apply_ort_config(
    mut builder: SessionBuilder,
    cfg: &OrtSessionConfig,
) -> Result<SessionBuilder, ort::Error> {
    if let Some(intra) = cfg.intra_threads {
        builder = builder.with_intra_threads(intra)?;
    }
    if let Some(inter) = cfg.inter_threads {
        builder = builder.with_inter_threads(inter)?;
    }
    if let Some(level) = cfg.optimization_level {
        let mapped = match level {
            OG::DisableAll => GOL::Disable,
            OG::Level1 => GOL::Level1,
            OG::Level2 => GOL::Level2,
            OG::Level3 => GOL::Level3,
        };
        builder = builder.with_optimization_level(mapped)?;
    }
    Ok(builder)
}
