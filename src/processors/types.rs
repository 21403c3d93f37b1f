//! Types used in image processing operations
//!
//! This module defines the enums and small records describing how images are
//! laid out as tensors and how a resize maps back to the source image.

use serde::{Deserialize, Serialize};

/// Specifies the order of dimensions in an image tensor
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChannelOrder {
    /// Channel, Height, Width order (common in PyTorch exports)
    #[serde(alias = "nchw")]
    CHW,
    /// Height, Width, Channel order (common in TensorFlow exports)
    #[default]
    #[serde(alias = "nhwc")]
    HWC,
}

/// Specifies the color channel order in an image
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColorOrder {
    /// Red, Green, Blue order (default for image-rs buffers)
    RGB,
    /// Blue, Green, Red order (expected by models trained through OpenCV)
    #[default]
    BGR,
}

impl ColorOrder {
    /// Source channel index for each output channel.
    pub fn channel_map(&self) -> [usize; 3] {
        match self {
            ColorOrder::RGB => [0, 1, 2],
            ColorOrder::BGR => [2, 1, 0],
        }
    }
}

/// Information about image scaling during preprocessing
///
/// This struct captures the original dimensions and scaling ratios applied
/// during image resizing operations.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ImageScaleInfo {
    /// Original image height before resizing
    pub src_h: f32,
    /// Original image width before resizing
    pub src_w: f32,
    /// Height scaling ratio (resized_height / original_height)
    pub ratio_h: f32,
    /// Width scaling ratio (resized_width / original_width)
    pub ratio_w: f32,
}

impl ImageScaleInfo {
    /// Creates a new `ImageScaleInfo` from original dimensions and ratios
    pub fn new(src_h: f32, src_w: f32, ratio_h: f32, ratio_w: f32) -> Self {
        Self {
            src_h,
            src_w,
            ratio_h,
            ratio_w,
        }
    }

    /// Describes a resize from `(src_w, src_h)` to `(dst_w, dst_h)`.
    pub fn from_sizes(src_w: u32, src_h: u32, dst_w: u32, dst_h: u32) -> Self {
        Self::new(
            src_h as f32,
            src_w as f32,
            dst_h as f32 / src_h as f32,
            dst_w as f32 / src_w as f32,
        )
    }

    /// Maps a horizontal coordinate from the resized image back to the source.
    pub fn to_source_x(&self, x: f32) -> f32 {
        x / self.ratio_w
    }

    /// Maps a vertical coordinate from the resized image back to the source.
    pub fn to_source_y(&self, y: f32) -> f32 {
        y / self.ratio_h
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scale_round_trip() {
        let info = ImageScaleInfo::from_sizes(100, 50, 128, 64);
        assert!((info.to_source_x(128.0) - 100.0).abs() < 1e-4);
        assert!((info.to_source_y(64.0) - 50.0).abs() < 1e-4);
    }

    #[test]
    fn test_channel_map() {
        assert_eq!(ColorOrder::BGR.channel_map(), [2, 1, 0]);
        let order: ChannelOrder = serde_json::from_str("\"nchw\"").unwrap();
        assert_eq!(order, ChannelOrder::CHW);
    }
}
