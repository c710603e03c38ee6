//! Backend that delegates to the host's native pipeline.

use std::sync::Arc;

use super::{validate_raster, EncodeError, EncoderBackend};
use crate::decode::RasterImage;
use crate::format::Format;
use crate::native::NativePipeline;

/// Fast-path encoder bound to one format on a [`NativePipeline`].
///
/// The host may substitute a different format than requested; that case is
/// surfaced as [`EncodeError::FormatMismatch`] rather than mislabeled bytes.
#[derive(Clone)]
pub struct NativeFastEncoder {
    pipeline: Arc<dyn NativePipeline>,
    format: Format,
}

impl NativeFastEncoder {
    pub fn new(pipeline: Arc<dyn NativePipeline>, format: Format) -> Self {
        Self { pipeline, format }
    }
}

impl std::fmt::Debug for NativeFastEncoder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NativeFastEncoder")
            .field("pipeline", &self.pipeline.name())
            .field("format", &self.format)
            .finish()
    }
}

impl EncoderBackend for NativeFastEncoder {
    fn name(&self) -> &'static str {
        "native"
    }

    fn format(&self) -> Format {
        self.format
    }

    fn encode(&self, image: &RasterImage, quality: u8) -> Result<Vec<u8>, EncodeError> {
        validate_raster(image)?;

        let blob = self
            .pipeline
            .encode(image, self.format, quality.clamp(1, 100))
            .map_err(|e| EncodeError::failed(self.pipeline.name(), e.to_string()))?;

        if blob.format != self.format {
            return Err(EncodeError::FormatMismatch {
                requested: self.format,
                produced: blob.format,
            });
        }

        Ok(blob.bytes)
    }
}
