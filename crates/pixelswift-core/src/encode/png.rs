//! Palette-optimizing PNG encoding for compress mode.
//!
//! Two stages:
//! 1. NeuQuant quantization to a palette whose size grows linearly with
//!    quality, written as an indexed PNG (with a `tRNS` chunk for alpha).
//! 2. A lossless `oxipng` re-optimization pass. Its output is kept only if
//!    strictly smaller; if it fails the quantized bytes are returned as-is.

use color_quant::NeuQuant;
use log::{debug, warn};
use png::{BitDepth, ColorType};

use super::{validate_raster, EncodeError, EncoderBackend};
use crate::decode::RasterImage;
use crate::format::Format;

const NAME: &str = "palette-png";

/// Smallest palette, used at quality 0.
pub const MIN_COLORS: usize = 16;
/// Largest palette, reached at quality 100.
pub const MAX_COLORS: usize = 256;

/// Palette size for a quality value: `round(16 + q / 100 * 240)`.
///
/// Quality is clamped to 1-100 first.
pub fn palette_size(quality: u8) -> usize {
    let q = quality.clamp(1, 100) as f64;
    let span = (MAX_COLORS - MIN_COLORS) as f64;
    (MIN_COLORS as f64 + q / 100.0 * span).round() as usize
}

/// PNG backend that trades colour depth for size.
#[derive(Debug, Clone, Copy)]
pub struct PaletteOptimizingPngEncoder {
    sample_factor: i32,
    optimization_level: u8,
}

impl PaletteOptimizingPngEncoder {
    /// # Arguments
    ///
    /// * `sample_factor` - NeuQuant sampling factor (1 = every pixel, 30 = fastest)
    /// * `optimization_level` - `oxipng` preset, 0-6
    pub fn new(sample_factor: i32, optimization_level: u8) -> Self {
        Self {
            sample_factor: sample_factor.clamp(1, 30),
            optimization_level: optimization_level.min(6),
        }
    }

    /// Stage one: quantize and write an indexed PNG.
    pub fn quantize(&self, image: &RasterImage, quality: u8) -> Result<Vec<u8>, EncodeError> {
        validate_raster(image)?;

        let colors = palette_size(quality);
        let quantizer = NeuQuant::new(self.sample_factor, colors, &image.pixels);

        let indices: Vec<u8> = image
            .pixels
            .chunks_exact(RasterImage::CHANNELS)
            .map(|px| quantizer.index_of(px) as u8)
            .collect();

        let rgba_palette = quantizer.color_map_rgba();
        let mut palette = Vec::with_capacity(colors * 3);
        let mut alphas = Vec::with_capacity(colors);
        for entry in rgba_palette.chunks_exact(4) {
            palette.extend_from_slice(&entry[..3]);
            alphas.push(entry[3]);
        }

        let mut out = Vec::new();
        {
            let mut encoder = png::Encoder::new(&mut out, image.width, image.height);
            encoder.set_color(ColorType::Indexed);
            encoder.set_depth(BitDepth::Eight);
            encoder.set_palette(palette);
            if alphas.iter().any(|&a| a != u8::MAX) {
                encoder.set_trns(alphas);
            }

            let mut writer = encoder
                .write_header()
                .map_err(|e| EncodeError::failed(NAME, e.to_string()))?;
            writer
                .write_image_data(&indices)
                .map_err(|e| EncodeError::failed(NAME, e.to_string()))?;
            writer
                .finish()
                .map_err(|e| EncodeError::failed(NAME, e.to_string()))?;
        }

        Ok(out)
    }

    /// Stage two: lossless re-optimization, never larger than the input.
    pub fn reoptimize(&self, quantized: Vec<u8>) -> Vec<u8> {
        let options = oxipng::Options::from_preset(self.optimization_level);

        match oxipng::optimize_from_memory(&quantized, &options) {
            Ok(optimized) if optimized.len() < quantized.len() => {
                debug!(
                    "re-optimized PNG {} -> {} bytes",
                    quantized.len(),
                    optimized.len()
                );
                optimized
            }
            Ok(_) => quantized,
            Err(e) => {
                warn!("PNG re-optimization failed, keeping quantized output: {e}");
                quantized
            }
        }
    }
}

impl Default for PaletteOptimizingPngEncoder {
    fn default() -> Self {
        Self::new(10, 2)
    }
}

impl EncoderBackend for PaletteOptimizingPngEncoder {
    fn name(&self) -> &'static str {
        NAME
    }

    fn format(&self) -> Format {
        Format::Png
    }

    fn encode(&self, image: &RasterImage, quality: u8) -> Result<Vec<u8>, EncodeError> {
        let quantized = self.quantize(image, quality)?;
        Ok(self.reoptimize(quantized))
    }
}
