//! Canonical image normalization.
//!
//! Every image, whether it is being indexed or queried, goes through the same
//! [`Preprocessor`]: decode, convert to 8-bit RGB, resize to a fixed square with
//! the Triangle (bilinear) filter, then scale and standardize each channel into
//! a planar CHW `f32` tensor.

use image::imageops::FilterType;
use image::{DynamicImage, ImageReader};
use imgsim_core::{Error, Result};
use serde::{Deserialize, Serialize};
use std::io::Cursor;
use std::path::Path;

/// Bumped whenever the transform below changes output for the same input
pub const PREPROCESS_VERSION: u32 = 1;

/// Default input resolution (ResNet-style 224x224)
pub const DEFAULT_IMAGE_SIZE: u32 = 224;

const CHANNELS: usize = 3;
const FILTER: FilterType = FilterType::Triangle;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChannelOrder {
    Rgb,
    Bgr,
}

/// Per-channel value transform: `(pixel * scale - mean[c]) / std[c]`.
///
/// `mean` and `std` are given in the output channel order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizationParams {
    pub order: ChannelOrder,
    pub scale: f32,
    pub mean: [f32; 3],
    pub std: [f32; 3],
}

impl NormalizationParams {
    /// torchvision-style: RGB in [0, 1], ImageNet mean/std
    pub fn imagenet() -> Self {
        Self {
            order: ChannelOrder::Rgb,
            scale: 1.0 / 255.0,
            mean: [0.485, 0.456, 0.406],
            std: [0.229, 0.224, 0.225],
        }
    }

    /// Caffe-style: BGR, raw 0..255 with the ImageNet mean pixel subtracted
    pub fn caffe() -> Self {
        Self {
            order: ChannelOrder::Bgr,
            scale: 1.0,
            mean: [103.939, 116.779, 123.68],
            std: [1.0, 1.0, 1.0],
        }
    }
}

impl Default for NormalizationParams {
    fn default() -> Self {
        Self::imagenet()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PreprocessConfig {
    /// Output width and height in pixels
    pub image_size: u32,
    pub normalization: NormalizationParams,
}

impl Default for PreprocessConfig {
    fn default() -> Self {
        Self {
            image_size: DEFAULT_IMAGE_SIZE,
            normalization: NormalizationParams::default(),
        }
    }
}

impl PreprocessConfig {
    pub fn validate(&self) -> Result<()> {
        if self.image_size == 0 {
            return Err(Error::InvalidConfig("image_size must be positive".into()));
        }
        let n = &self.normalization;
        if !n.scale.is_finite() || n.scale == 0.0 {
            return Err(Error::InvalidConfig("normalization scale must be finite and non-zero".into()));
        }
        if n.std.iter().any(|s| !s.is_finite() || *s == 0.0) || n.mean.iter().any(|m| !m.is_finite()) {
            return Err(Error::InvalidConfig("normalization mean/std must be finite, std non-zero".into()));
        }
        Ok(())
    }

    /// Stable textual identity of this transform, stamped onto every index
    pub fn fingerprint(&self) -> String {
        let n = &self.normalization;
        format!(
            "pre/v{} {}x{} triangle {:?} scale={} mean={:?} std={:?}",
            PREPROCESS_VERSION, self.image_size, self.image_size, n.order, n.scale, n.mean, n.std
        )
        .to_lowercase()
    }
}

/// Planar (CHW) float tensor of a single image
#[derive(Debug, Clone, PartialEq)]
pub struct ImageTensor {
    width: usize,
    height: usize,
    data: Vec<f32>,
}

impl ImageTensor {
    pub fn new(width: usize, height: usize, data: Vec<f32>) -> Result<Self> {
        if data.len() != CHANNELS * width * height {
            return Err(Error::InvalidConfig(format!(
                "tensor data length {} does not match {}x{}x{}",
                data.len(),
                CHANNELS,
                height,
                width
            )));
        }
        Ok(Self { width, height, data })
    }

    pub fn channels(&self) -> usize {
        CHANNELS
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.data
    }

    /// One channel's plane, row-major
    pub fn plane(&self, channel: usize) -> &[f32] {
        let len = self.width * self.height;
        &self.data[channel * len..(channel + 1) * len]
    }
}

#[derive(Debug, Clone)]
pub struct Preprocessor {
    config: PreprocessConfig,
}

impl Preprocessor {
    pub fn new(config: PreprocessConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &PreprocessConfig {
        &self.config
    }

    pub fn fingerprint(&self) -> String {
        self.config.fingerprint()
    }

    /// Decode raw bytes, sniffing the format from content rather than a file name.
    pub fn decode(bytes: &[u8]) -> Result<DynamicImage> {
        let reader = ImageReader::new(Cursor::new(bytes))
            .with_guessed_format()
            .map_err(|e| Error::UnsupportedImage(e.to_string()))?;
        reader
            .decode()
            .map_err(|e| Error::UnsupportedImage(e.to_string()))
    }

    /// Decode a file. Open failures are IO errors, undecodable content is `UnsupportedImage`.
    pub fn decode_path(path: &Path) -> Result<DynamicImage> {
        let bytes = std::fs::read(path)?;
        Self::decode(&bytes)
    }

    pub fn normalize(&self, image: &DynamicImage) -> ImageTensor {
        let size = self.config.image_size;
        let rgb = image.to_rgb8();
        let resized = image::imageops::resize(&rgb, size, size, FILTER);

        let n = &self.config.normalization;
        let plane = (size * size) as usize;
        let mut data = vec![0.0f32; CHANNELS * plane];

        for (i, pixel) in resized.pixels().enumerate() {
            for c in 0..CHANNELS {
                let source = match n.order {
                    ChannelOrder::Rgb => c,
                    ChannelOrder::Bgr => CHANNELS - 1 - c,
                };
                let value = pixel[source] as f32 * n.scale;
                data[c * plane + i] = (value - n.mean[c]) / n.std[c];
            }
        }

        ImageTensor {
            width: size as usize,
            height: size as usize,
            data,
        }
    }

    pub fn normalize_bytes(&self, bytes: &[u8]) -> Result<ImageTensor> {
        let image = Self::decode(bytes)?;
        Ok(self.normalize(&image))
    }
}
