//! The host's built-in raster encode facility.
//!
//! A [`NativePipeline`] is whatever the host environment offers to turn a
//! raster into encoded bytes without a bundled codec. Hosts are allowed to
//! answer a request with a different format than the one asked for (some
//! browsers hand back PNG when asked for WebP), so every blob carries the
//! format the host *declares* it produced.

use std::io::Cursor;

use image::codecs::bmp::BmpEncoder;
use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::PngEncoder;
use image::codecs::tiff::TiffEncoder;
use image::codecs::webp::WebPEncoder;
use image::{ExtendedColorType, ImageEncoder};
use thiserror::Error;

use crate::decode::RasterImage;
use crate::encode::flatten_to_rgb;
use crate::format::Format;

/// Errors raised by a native pipeline.
#[derive(Debug, Error)]
pub enum NativeError {
    /// The host has no encoder for the requested format.
    #[error("Native pipeline cannot encode {0}")]
    Unsupported(Format),

    /// The host encoder failed.
    #[error("Native encoding failed: {0}")]
    Failed(String),
}

/// Bytes produced by a native pipeline along with their declared format.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NativeBlob {
    /// The format the host says it produced.
    pub format: Format,
    pub bytes: Vec<u8>,
}

/// The host's built-in raster encoder.
pub trait NativePipeline: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &'static str;

    /// Encode `image` requesting `format` at `quality` (1-100).
    ///
    /// Hosts that ignore quality for a format (lossless ones) may do so.
    fn encode(
        &self,
        image: &RasterImage,
        format: Format,
        quality: u8,
    ) -> Result<NativeBlob, NativeError>;
}

/// Native pipeline backed by the `image` crate's built-in encoders.
///
/// JPEG honours quality, PNG/BMP/TIFF are lossless, WebP is written
/// losslessly. JPEG and BMP have no alpha and are composited over white.
/// Always declares the format it was asked for.
#[derive(Debug, Clone, Copy, Default)]
pub struct ImageCratePipeline;

impl NativePipeline for ImageCratePipeline {
    fn name(&self) -> &'static str {
        "image"
    }

    fn encode(
        &self,
        image: &RasterImage,
        format: Format,
        quality: u8,
    ) -> Result<NativeBlob, NativeError> {
        let (width, height) = (image.width, image.height);

        // The image crate asserts on buffer length, so reject up front
        let expected = image.pixel_count() * RasterImage::CHANNELS;
        if image.is_empty() || image.pixels.len() != expected {
            return Err(NativeError::Failed(format!(
                "expected {expected} bytes for {width}x{height}, got {}",
                image.pixels.len()
            )));
        }

        let mut buffer = Cursor::new(Vec::new());

        let written = match format {
            Format::Jpeg => {
                let rgb = flatten_to_rgb(image);
                JpegEncoder::new_with_quality(&mut buffer, quality.clamp(1, 100)).write_image(
                    &rgb,
                    width,
                    height,
                    ExtendedColorType::Rgb8,
                )
            }
            Format::Png => PngEncoder::new(&mut buffer).write_image(
                &image.pixels,
                width,
                height,
                ExtendedColorType::Rgba8,
            ),
            Format::WebP => WebPEncoder::new_lossless(&mut buffer).write_image(
                &image.pixels,
                width,
                height,
                ExtendedColorType::Rgba8,
            ),
            Format::Bmp => {
                let rgb = flatten_to_rgb(image);
                BmpEncoder::new(&mut buffer).write_image(
                    &rgb,
                    width,
                    height,
                    ExtendedColorType::Rgb8,
                )
            }
            Format::Tiff => TiffEncoder::new(&mut buffer).write_image(
                &image.pixels,
                width,
                height,
                ExtendedColorType::Rgba8,
            ),
            Format::Pdf | Format::Unknown => return Err(NativeError::Unsupported(format)),
        };

        written.map_err(|e| NativeError::Failed(e.to_string()))?;

        Ok(NativeBlob {
            format,
            bytes: buffer.into_inner(),
        })
    }
}
