//! Lossy WebP encoding through libwebp.

use super::{strip_alpha, validate_raster, EncodeError, EncoderBackend};
use crate::decode::RasterImage;
use crate::format::Format;

const NAME: &str = "quality-webp";

/// Largest width or height libwebp accepts.
pub const MAX_DIMENSION: u32 = 16383;

/// Software WebP backend driven by the requested quality.
///
/// Used for every WebP compress job and for convert/resize jobs when the
/// native pipeline cannot encode WebP truthfully.
#[derive(Debug, Clone, Copy, Default)]
pub struct QualityWebpEncoder;

impl EncoderBackend for QualityWebpEncoder {
    fn name(&self) -> &'static str {
        NAME
    }

    fn format(&self) -> Format {
        Format::WebP
    }

    fn encode(&self, image: &RasterImage, quality: u8) -> Result<Vec<u8>, EncodeError> {
        validate_raster(image)?;
        if image.width > MAX_DIMENSION || image.height > MAX_DIMENSION {
            return Err(EncodeError::InvalidDimensions {
                width: image.width,
                height: image.height,
            });
        }

        let quality = quality.clamp(1, 100) as f32;

        // An alpha plane costs bytes even when fully opaque
        let encoded = if image.is_opaque() {
            let rgb = strip_alpha(image);
            webp::Encoder::from_rgb(&rgb, image.width, image.height).encode_simple(false, quality)
        } else {
            webp::Encoder::from_rgba(&image.pixels, image.width, image.height)
                .encode_simple(false, quality)
        };
        let memory = encoded.map_err(|e| EncodeError::failed(NAME, format!("{e:?}")))?;

        Ok(memory.to_vec())
    }
}
