//! Quality-oriented JPEG encoding for compress mode.
//!
//! Uses `jpeg-encoder` with optimized Huffman tables and 4:2:0 chroma
//! subsampling, optionally progressive. Transparent pixels are composited
//! over white since JPEG has no alpha channel.

use jpeg_encoder::{ColorType, Encoder, SamplingFactor};

use super::{flatten_to_rgb, validate_raster, EncodeError, EncoderBackend};
use crate::decode::RasterImage;
use crate::format::Format;

const NAME: &str = "quality-jpeg";

/// JPEG backend tuned for size at a given quality.
#[derive(Debug, Clone, Copy)]
pub struct QualityJpegEncoder {
    progressive: bool,
}

impl QualityJpegEncoder {
    pub fn new(progressive: bool) -> Self {
        Self { progressive }
    }

    pub fn progressive(&self) -> bool {
        self.progressive
    }
}

impl Default for QualityJpegEncoder {
    fn default() -> Self {
        Self::new(true)
    }
}

impl EncoderBackend for QualityJpegEncoder {
    fn name(&self) -> &'static str {
        NAME
    }

    fn format(&self) -> Format {
        Format::Jpeg
    }

    /// Encode a raster to JPEG bytes.
    ///
    /// # Arguments
    ///
    /// * `image` - RGBA raster; alpha is flattened over white
    /// * `quality` - JPEG quality, clamped to 1-100
    ///
    /// # Errors
    ///
    /// Returns `InvalidDimensions` for empty rasters or an axis beyond
    /// 65535, `InvalidPixelData` for a mismatched buffer.
    fn encode(&self, image: &RasterImage, quality: u8) -> Result<Vec<u8>, EncodeError> {
        validate_raster(image)?;

        let (Ok(width), Ok(height)) = (u16::try_from(image.width), u16::try_from(image.height))
        else {
            return Err(EncodeError::InvalidDimensions {
                width: image.width,
                height: image.height,
            });
        };

        let rgb = flatten_to_rgb(image);
        let mut out = Vec::new();

        let mut encoder = Encoder::new(&mut out, quality.clamp(1, 100));
        encoder.set_progressive(self.progressive);
        encoder.set_optimized_huffman_tables(true);
        encoder.set_sampling_factor(SamplingFactor::R_4_2_0);

        encoder
            .encode(&rgb, width, height, ColorType::Rgb)
            .map_err(|e| EncodeError::failed(NAME, e.to_string()))?;

        Ok(out)
    }
}


#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        /// Property: valid rasters always produce framed JPEG data.
        #[test]
        fn prop_valid_input_produces_valid_jpeg(
            width in 1u32..=50,
            height in 1u32..=50,
            quality in 1u8..=100,
            progressive in any::<bool>(),
        ) {
            let img = RasterImage::filled(width, height, [128, 64, 32, 255]);
            let jpeg = QualityJpegEncoder::new(progressive).encode(&img, quality).unwrap();

            let len = jpeg.len();
            prop_assert!(len >= 4);
            prop_assert_eq!(&jpeg[0..2], &[0xFF, 0xD8]);
            prop_assert_eq!(&jpeg[len - 2..], &[0xFF, 0xD9]);
        }

        /// Property: same input always produces same output.
        #[test]
        fn prop_deterministic_output(
            width in 1u32..=20,
            height in 1u32..=20,
            quality in 1u8..=100,
        ) {
            let img = RasterImage::filled(width, height, [100, 100, 100, 255]);
            let encoder = QualityJpegEncoder::default();
            prop_assert_eq!(encoder.encode(&img, quality).unwrap(), encoder.encode(&img, quality).unwrap());
        }

        /// Property: mismatched buffers are rejected, never encoded.
        #[test]
        fn prop_invalid_pixel_length_returns_error(
            width in 1u32..=50,
            height in 1u32..=50,
            delta in prop_oneof![-10i32..=-1, 1i32..=10],
        ) {
            let expected = (width * height * 4) as i64;
            let actual = (expected + delta as i64).max(0) as usize;
            prop_assume!(actual as i64 != expected);

            let img = RasterImage { width, height, pixels: vec![128u8; actual] };
            let result = QualityJpegEncoder::default().encode(&img, 90);
            let rejected = matches!(result, Err(EncodeError::InvalidPixelData { .. }));
            prop_assert!(rejected, "expected InvalidPixelData, got {:?}", result);
        }

        /// Property: every quality byte works after clamping.
        #[test]
        fn prop_all_quality_values_work(quality in any::<u8>()) {
            let img = RasterImage::filled(10, 10, [128, 128, 128, 255]);
            prop_assert!(QualityJpegEncoder::default().encode(&img, quality).is_ok());
        }
    }
}
