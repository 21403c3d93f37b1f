//! EAST text detector backed by ONNX Runtime.
//!
//! The image is resized to multiples of 32, mean-subtracted and fed to the
//! network, which returns a stride-4 score map and a 5-channel geometry map.
//! Decoded boxes go through NMS, are mapped back to the source image and get
//! a small margin.

use super::{TextBox, TextDetectorStrategy};
use crate::core::config::{ConfigError, ConfigValidator, OrtSessionConfig};
use crate::core::errors::{LayoutError, LayoutResult};
use crate::core::inference::load_session;
use crate::processors::east_decode::{EastDetections, decode_east};
use crate::processors::geometry::Rect;
use crate::processors::nms::nms_boxes;
use crate::processors::types::{ChannelOrder, ColorOrder, ImageScaleInfo};
use crate::utils::model_cache::ensure_model;
use image::RgbImage;
use image::imageops::{self, FilterType};
use ndarray::{Array3, Array4, ArrayView, Axis, Ix2, Ix3, IxDyn};
use once_cell::sync::OnceCell;
use ort::session::Session;
use ort::value::TensorRef;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Mutex;
use tracing::{debug, info};

const MODEL_NAME: &str = "east";

/// Input sides are rounded up to a multiple of this.
const SIZE_MULTIPLE: u32 = 32;

/// Configuration for [`EastDetector`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EastConfig {
    /// Local ONNX weight file.
    pub model_path: PathBuf,
    /// Where to fetch the weights when `model_path` is missing.
    ///
    /// There is no default: the published EAST weights are a frozen
    /// TensorFlow graph that ONNX Runtime cannot load, so a converted ONNX
    /// export has to be hosted somewhere. Set it (`--east-url` on the command
    /// line) to enable the download path; otherwise EAST is reported as
    /// unavailable and detection falls back to MSER.
    pub model_url: Option<String>,
    /// Allow fetching the weights over the network.
    pub allow_download: bool,
    /// Name of the image input.
    pub input_name: String,
    /// Name of the score map output.
    pub score_output: String,
    /// Name of the geometry map output.
    pub geometry_output: String,
    /// Tensor layout of the input and both outputs.
    pub layout: ChannelOrder,
    /// Channel order expected by the network.
    pub color_order: ColorOrder,
    /// Per-channel means subtracted from the input, in R, G, B order.
    pub mean: [f32; 3],
    /// Cells scoring below this are not decoded.
    pub score_threshold: f32,
    /// IoU above which a lower-scoring box is suppressed.
    pub nms_threshold: f32,
    /// Margin added on each side, as a fraction of the box side.
    pub padding_ratio: f32,
    /// Smallest margin in pixels.
    pub min_padding: i32,
    /// ONNX Runtime session settings.
    pub session: OrtSessionConfig,
}

impl Default for EastConfig {
    fn default() -> Self {
        Self {
            model_path: PathBuf::from("models/east_text_detection.onnx"),
            model_url: None,
            allow_download: true,
            input_name: "input_images:0".to_string(),
            score_output: "feature_fusion/Conv_7/Sigmoid:0".to_string(),
            geometry_output: "feature_fusion/concat_3:0".to_string(),
            layout: ChannelOrder::HWC,
            color_order: ColorOrder::BGR,
            mean: [123.68, 116.78, 103.94],
            score_threshold: 0.2,
            nms_threshold: 0.4,
            padding_ratio: 0.02,
            min_padding: 2,
            session: OrtSessionConfig::default(),
        }
    }
}

impl ConfigValidator for EastConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        self.validate_unit_interval("score_threshold", self.score_threshold)?;
        self.validate_unit_interval("nms_threshold", self.nms_threshold)?;
        if !(0.0..0.5).contains(&self.padding_ratio) {
            return Err(ConfigError::InvalidConfig {
                message: format!("padding_ratio must be in [0, 0.5), got {}", self.padding_ratio),
            });
        }
        if self.min_padding < 0 {
            return Err(ConfigError::InvalidConfig {
                message: format!("min_padding must be non-negative, got {}", self.min_padding),
            });
        }
        for (field, name) in [
            ("input_name", &self.input_name),
            ("score_output", &self.score_output),
            ("geometry_output", &self.geometry_output),
        ] {
            if name.is_empty() {
                return Err(ConfigError::InvalidConfig {
                    message: format!("{field} must not be empty"),
                });
            }
        }
        Ok(())
    }
}

/// EAST detector.
///
/// The session is created on first use. When the weights cannot be found,
/// fetched or loaded, the detector reports itself unavailable from then on
/// without retrying.
pub struct EastDetector {
    config: EastConfig,
    session: OnceCell<Result<Mutex<Session>, String>>,
}

impl std::fmt::Debug for EastDetector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = match self.session.get() {
            None => "uninitialized",
            Some(Ok(_)) => "ready",
            Some(Err(_)) => "unavailable",
        };
        f.debug_struct("EastDetector")
            .field("config", &self.config)
            .field("session", &state)
            .finish()
    }
}

impl EastDetector {
    /// Creates a detector; nothing is loaded until the first detection.
    pub fn new(config: EastConfig) -> Self {
        Self {
            config,
            session: OnceCell::new(),
        }
    }

    fn session(&self) -> LayoutResult<&Mutex<Session>> {
        let cell = self.session.get_or_init(|| {
            let cfg = &self.config;
            ensure_model(
                MODEL_NAME,
                &cfg.model_path,
                cfg.model_url.as_deref(),
                cfg.allow_download,
            )
            .and_then(|path| load_session(MODEL_NAME, path, &cfg.session))
            .map(|session| {
                info!(path = %cfg.model_path.display(), "EAST session ready");
                Mutex::new(session)
            })
            .map_err(|e| e.to_string())
        });
        cell.as_ref()
            .map_err(|reason| LayoutError::model_unavailable(MODEL_NAME, reason.clone()))
    }

    /// Resizes and normalizes `image` into the network input tensor.
    fn preprocess(&self, image: &RgbImage) -> (Array4<f32>, ImageScaleInfo) {
        let (src_w, src_h) = image.dimensions();
        let dst_w = src_w.div_ceil(SIZE_MULTIPLE).max(1) * SIZE_MULTIPLE;
        let dst_h = src_h.div_ceil(SIZE_MULTIPLE).max(1) * SIZE_MULTIPLE;
        let resized = imageops::resize(image, dst_w, dst_h, FilterType::Triangle);

        let map = self.config.color_order.channel_map();
        let mean = self.config.mean;
        let value = |x: usize, y: usize, c: usize| {
            let src = map[c];
            resized.get_pixel(x as u32, y as u32)[src] as f32 - mean[src]
        };

        let (h, w) = (dst_h as usize, dst_w as usize);
        let tensor = match self.config.layout {
            ChannelOrder::HWC => Array4::from_shape_fn((1, h, w, 3), |(_, y, x, c)| value(x, y, c)),
            ChannelOrder::CHW => Array4::from_shape_fn((1, 3, h, w), |(_, c, y, x)| value(x, y, c)),
        };
        (tensor, ImageScaleInfo::from_sizes(src_w, src_h, dst_w, dst_h))
    }

    /// Runs the network and decodes its maps.
    fn infer(&self, input: &Array4<f32>) -> LayoutResult<EastDetections> {
        let cfg = &self.config;
        let mut session = self.session()?.lock().map_err(|_| {
            LayoutError::inference(
                MODEL_NAME,
                "session lock poisoned",
                std::io::Error::other("poisoned mutex"),
            )
        })?;

        for name in [&cfg.score_output, &cfg.geometry_output] {
            if !session.outputs.iter().any(|o| &o.name == name) {
                return Err(LayoutError::model_unavailable(
                    MODEL_NAME,
                    format!("model has no output named '{name}'"),
                ));
            }
        }

        let tensor = TensorRef::from_array_view(input.view())
            .map_err(|e| LayoutError::inference(MODEL_NAME, "input tensor conversion", e))?;
        let inputs = ort::inputs![cfg.input_name.as_str() => tensor];
        let outputs = session
            .run(inputs)
            .map_err(|e| LayoutError::inference(MODEL_NAME, "forward pass", e))?;

        let (score_shape, score_data) = outputs[cfg.score_output.as_str()]
            .try_extract_tensor::<f32>()
            .map_err(|e| LayoutError::inference(MODEL_NAME, "score map extraction", e))?;
        let score_dims: Vec<usize> = score_shape.iter().map(|&d| d as usize).collect();
        let scores = ArrayView::from_shape(IxDyn(&score_dims), score_data)?;

        let (geo_shape, geo_data) = outputs[cfg.geometry_output.as_str()]
            .try_extract_tensor::<f32>()
            .map_err(|e| LayoutError::inference(MODEL_NAME, "geometry map extraction", e))?;
        let geo_dims: Vec<usize> = geo_shape.iter().map(|&d| d as usize).collect();
        let geometry = ArrayView::from_shape(IxDyn(&geo_dims), geo_data)?;

        let (scores, geometry) = split_maps(scores, geometry, cfg.layout)?;
        Ok(decode_east(scores.view(), geometry.view(), cfg.score_threshold))
    }
}

/// Brings both outputs to `(H, W)` scores and `(5, H, W)` geometry.
fn split_maps(
    scores: ArrayView<'_, f32, IxDyn>,
    geometry: ArrayView<'_, f32, IxDyn>,
    layout: ChannelOrder,
) -> LayoutResult<(ndarray::Array2<f32>, Array3<f32>)> {
    if scores.ndim() != 4 || geometry.ndim() != 4 {
        return Err(LayoutError::invalid_input(format!(
            "EAST outputs must be 4D, got {:?} and {:?}",
            scores.shape(),
            geometry.shape()
        )));
    }
    let scores = scores.index_axis_move(Axis(0), 0);
    let geometry = geometry.index_axis_move(Axis(0), 0);
    let (scores, geometry) = match layout {
        ChannelOrder::HWC => (
            scores.index_axis_move(Axis(2), 0),
            geometry.permuted_axes(IxDyn(&[2, 0, 1])),
        ),
        ChannelOrder::CHW => (scores.index_axis_move(Axis(0), 0), geometry),
    };
    Ok((
        scores.into_dimensionality::<Ix2>()?.to_owned(),
        geometry.into_dimensionality::<Ix3>()?.to_owned(),
    ))
}

/// Maps network-space boxes to the source image.
///
/// Kept boxes are scaled, clipped and padded by `max(min_padding,
/// padding_ratio * side)` on each side. When `kept` is empty every decoded
/// box is returned scaled and clipped but without padding.
fn finalize_boxes(
    detections: &EastDetections,
    kept: &[usize],
    scale: &ImageScaleInfo,
    config: &EastConfig,
) -> Vec<TextBox> {
    let (img_w, img_h) = (scale.src_w as i32, scale.src_h as i32);
    let rescale = |rect: &Rect| {
        let x = scale.to_source_x(rect.x as f32).max(0.0) as i32;
        let y = scale.to_source_y(rect.y as f32).max(0.0) as i32;
        let w = ((img_w - x) as f32).min(scale.to_source_x(rect.width as f32)) as i32;
        let h = ((img_h - y) as f32).min(scale.to_source_y(rect.height as f32)) as i32;
        Rect::new(x, y, w, h)
    };
    let pad = |rect: Rect| {
        let pad_x = config.min_padding.max((config.padding_ratio * rect.width as f32) as i32);
        let pad_y = config.min_padding.max((config.padding_ratio * rect.height as f32) as i32);
        let x = (rect.x - pad_x).max(0);
        let y = (rect.y - pad_y).max(0);
        let w = (img_w - x).min(rect.width + 2 * pad_x);
        let h = (img_h - y).min(rect.height + 2 * pad_y);
        Rect::new(x, y, w, h)
    };

    let boxes: Vec<(Rect, f32)> = if kept.is_empty() {
        detections
            .rects
            .iter()
            .zip(&detections.scores)
            .map(|(r, &s)| (rescale(r), s))
            .collect()
    } else {
        kept.iter()
            .map(|&i| (pad(rescale(&detections.rects[i])), detections.scores[i]))
            .collect()
    };

    boxes
        .into_iter()
        .filter(|(r, _)| r.width > 0 && r.height > 0)
        .map(|(r, s)| TextBox::from_rect(r, Some(s)))
        .collect()
}

impl TextDetectorStrategy for EastDetector {
    fn name(&self) -> &str {
        MODEL_NAME
    }

    fn detect(&self, image: &RgbImage) -> Result<Vec<TextBox>, LayoutError> {
        if image.width() == 0 || image.height() == 0 {
            return Ok(Vec::new());
        }
        // Fail fast before preprocessing when the model is unavailable.
        self.session()?;

        let (input, scale) = self.preprocess(image);
        let detections = self.infer(&input)?;
        let kept = nms_boxes(
            &detections.rects,
            &detections.scores,
            self.config.score_threshold,
            self.config.nms_threshold,
        );
        debug!(
            decoded = detections.rects.len(),
            kept = kept.len(),
            "EAST boxes suppressed"
        );
        Ok(finalize_boxes(&detections, &kept, &scale, &self.config))
    }
}
