//! Rasterization: the single resample step of a transcode.

use super::{DecodeError, FilterType, RasterImage};
use crate::geometry::within_limit;

/// Draw `image` into a raster of exactly `width` x `height`.
///
/// Consumes the decoded raster. When the dimensions already match, the
/// input is returned untouched so no operation resamples twice.
///
/// # Errors
///
/// Returns `DecodeError::InvalidTarget` for a zero dimension or a target
/// over [`MAX_OUTPUT_PIXELS`](crate::geometry::MAX_OUTPUT_PIXELS), and
/// `DecodeError::CorruptedFile` if the pixel buffer does not match the
/// declared dimensions.
pub fn rasterize(
    image: RasterImage,
    width: u32,
    height: u32,
    filter: FilterType,
) -> Result<RasterImage, DecodeError> {
    if !within_limit(width, height) {
        return Err(DecodeError::InvalidTarget { width, height });
    }

    // Fast path: nothing to resample
    if image.width == width && image.height == height {
        return Ok(image);
    }

    let view = image
        .as_view()
        .ok_or_else(|| DecodeError::CorruptedFile("Pixel buffer size mismatch".to_string()))?;

    let resized = image::imageops::resize(&view, width, height, filter.to_image_filter());

    Ok(RasterImage::from_rgba_image(resized))
}
