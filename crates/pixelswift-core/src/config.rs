//! Transcoder configuration.
//!
//! Every key is optional when deserializing; omitted keys take the
//! defaults below.
//!
//! ```json
//! {
//!   "defaultQuality": 85,
//!   "defaultFormat": "jpg",
//!   "resizeFilter": "bilinear",
//!   "applyOrientation": true,
//!   "jpeg": { "progressive": true },
//!   "png": { "sampleFactor": 10, "optimizationLevel": 2 }
//! }
//! ```

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::decode::FilterType;
use crate::format::Format;

/// Configuration validation errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("defaultQuality must be within 1..=100, got {0}")]
    Quality(u8),

    #[error("defaultFormat must be an encodable format, got {0}")]
    DefaultFormat(Format),

    #[error("png.sampleFactor must be within 1..=30, got {0}")]
    SampleFactor(i32),

    #[error("png.optimizationLevel must be within 0..=6, got {0}")]
    OptimizationLevel(u8),
}

/// Settings shared by every job a transcoder runs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct TranscodeConfig {
    /// Quality used when a request doesn't specify one.
    pub default_quality: u8,
    /// Output format when none is requested and the source can't be re-encoded.
    pub default_format: Format,
    /// Resampling filter for resize.
    pub resize_filter: FilterType,
    /// Honour the EXIF orientation tag when decoding.
    pub apply_orientation: bool,
    pub jpeg: JpegConfig,
    pub png: PngConfig,
}

impl Default for TranscodeConfig {
    fn default() -> Self {
        Self {
            default_quality: 85,
            default_format: Format::Jpeg,
            resize_filter: FilterType::Bilinear,
            apply_orientation: true,
            jpeg: JpegConfig::default(),
            png: PngConfig::default(),
        }
    }
}

impl TranscodeConfig {
    /// Check every value is in range.
    ///
    /// # Errors
    ///
    /// Returns the first out-of-range value found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(1..=100).contains(&self.default_quality) {
            return Err(ConfigError::Quality(self.default_quality));
        }
        if !self.default_format.is_encodable() {
            return Err(ConfigError::DefaultFormat(self.default_format));
        }
        if !(1..=30).contains(&self.png.sample_factor) {
            return Err(ConfigError::SampleFactor(self.png.sample_factor));
        }
        if self.png.optimization_level > 6 {
            return Err(ConfigError::OptimizationLevel(self.png.optimization_level));
        }
        Ok(())
    }
}

/// Quality JPEG encoder settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct JpegConfig {
    pub progressive: bool,
}

impl Default for JpegConfig {
    fn default() -> Self {
        Self { progressive: true }
    }
}

/// Palette PNG encoder settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PngConfig {
    /// NeuQuant sampling factor, 1 (every pixel) to 30 (fastest).
    pub sample_factor: i32,
    /// Lossless re-optimizer preset, 0-6.
    pub optimization_level: u8,
}

impl Default for PngConfig {
    fn default() -> Self {
        Self {
            sample_factor: 10,
            optimization_level: 2,
        }
    }
}
