//! Encoder backends for the transcode pipeline.
//!
//! This module provides:
//! - [`NativeFastEncoder`] - delegates to the host's native pipeline
//! - [`QualityJpegEncoder`] - optimized-Huffman, progressive JPEG for compress mode
//! - [`PaletteOptimizingPngEncoder`] - palette quantization plus lossless re-optimization
//! - [`QualityWebpEncoder`] - lossy WebP at the requested quality
//! - [`select_backend`] / [`EncoderRegistry`] - the selection policy and the
//!   lazily-populated set of backend instances
//!
//! # Architecture
//!
//! Every backend is bound to a single output format and implements
//! [`EncoderBackend`]. Backends take RGBA rasters and never resample.

mod jpeg;
mod native;
mod png;
mod select;
mod webp;

use thiserror::Error;

use crate::decode::RasterImage;
use crate::format::Format;

pub use self::jpeg::QualityJpegEncoder;
pub use self::native::NativeFastEncoder;
pub use self::png::{palette_size, PaletteOptimizingPngEncoder};
pub use self::select::{select_backend, BackendKind, EncoderRegistry, COMPRESS_BACKENDS};
pub use self::webp::QualityWebpEncoder;

/// Errors that can occur while encoding a raster.
#[derive(Debug, Error)]
pub enum EncodeError {
    /// Pixel data length doesn't match expected dimensions
    #[error("Invalid pixel data: expected {expected} bytes (width * height * 4), got {actual}")]
    InvalidPixelData { expected: usize, actual: usize },

    /// Width or height is zero, or too large for the format
    #[error("Invalid dimensions: {width}x{height}")]
    InvalidDimensions { width: u32, height: u32 },

    /// The host produced a different format than the backend is bound to
    #[error("Requested {requested} but the native pipeline produced {produced}")]
    FormatMismatch { requested: Format, produced: Format },

    /// The underlying codec failed
    #[error("{backend} encoding failed: {message}")]
    EncodingFailed {
        backend: &'static str,
        message: String,
    },
}

impl EncodeError {
    pub(crate) fn failed(backend: &'static str, message: impl Into<String>) -> Self {
        EncodeError::EncodingFailed {
            backend,
            message: message.into(),
        }
    }
}

/// An encoder bound to one output format.
pub trait EncoderBackend: Send + Sync {
    /// Short name used in logs and errors.
    fn name(&self) -> &'static str;

    /// The format every successful `encode` produces.
    fn format(&self) -> Format;

    /// Encode `image` at `quality` (1-100).
    fn encode(&self, image: &RasterImage, quality: u8) -> Result<Vec<u8>, EncodeError>;
}

/// Check that a raster is non-empty and its buffer matches its dimensions.
pub(crate) fn validate_raster(image: &RasterImage) -> Result<(), EncodeError> {
    if image.width == 0 || image.height == 0 {
        return Err(EncodeError::InvalidDimensions {
            width: image.width,
            height: image.height,
        });
    }

    let expected = image.pixel_count() * RasterImage::CHANNELS;
    if image.pixels.len() != expected {
        return Err(EncodeError::InvalidPixelData {
            expected,
            actual: image.pixels.len(),
        });
    }

    Ok(())
}

/// Composite RGBA over opaque white, dropping the alpha channel.
pub(crate) fn flatten_to_rgb(image: &RasterImage) -> Vec<u8> {
    let mut rgb = Vec::with_capacity(image.pixel_count() * 3);
    for px in image.pixels.chunks_exact(RasterImage::CHANNELS) {
        let alpha = px[3] as u32;
        for &channel in &px[..3] {
            let blended = (channel as u32 * alpha + 255 * (255 - alpha) + 127) / 255;
            rgb.push(blended as u8);
        }
    }
    rgb
}

/// Drop the alpha channel without compositing.
pub(crate) fn strip_alpha(image: &RasterImage) -> Vec<u8> {
    image
        .pixels
        .chunks_exact(RasterImage::CHANNELS)
        .flat_map(|px| [px[0], px[1], px[2]])
        .collect()
}
