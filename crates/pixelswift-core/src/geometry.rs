//! Output dimension resolution.
//!
//! # Rules
//!
//! | requested        | preserve aspect | output                                   |
//! |------------------|-----------------|------------------------------------------|
//! | neither          | any             | source dimensions                        |
//! | width and height | any             | exactly the requested pair               |
//! | width only       | true            | `(w, round(w / ratio))`                  |
//! | height only      | true            | `(round(h * ratio), h)`                  |
//! | one only         | false           | the other axis keeps its source length   |
//!
//! where `ratio = source_width / source_height`. A result with a zero axis,
//! or with more than [`MAX_OUTPUT_PIXELS`] pixels, is rejected before any
//! raster is allocated.

use thiserror::Error;

/// Largest output raster, in pixels: 512 MiB of RGBA, the same ceiling the
/// image crate applies to decoder allocations.
pub const MAX_OUTPUT_PIXELS: u64 = 128 * 1024 * 1024;

/// Whether a `width` x `height` RGBA raster may be allocated.
pub fn within_limit(width: u32, height: u32) -> bool {
    width > 0 && height > 0 && u64::from(width) * u64::from(height) <= MAX_OUTPUT_PIXELS
}

/// The resolved output has a zero dimension or is too large to allocate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("Invalid output dimensions: {width}x{height}")]
pub struct InvalidDimensions {
    pub width: u32,
    pub height: u32,
}

/// Compute output pixel dimensions.
///
/// # Example
///
/// ```
/// use pixelswift_core::geometry::resolve;
///
/// assert_eq!(resolve(1000, 500, Some(400), None, true), Ok((400, 200)));
/// assert_eq!(resolve(1000, 500, Some(400), Some(300), true), Ok((400, 300)));
/// ```
pub fn resolve(
    source_width: u32,
    source_height: u32,
    width: Option<u32>,
    height: Option<u32>,
    preserve_aspect: bool,
) -> Result<(u32, u32), InvalidDimensions> {
    let (out_width, out_height) = match (width, height) {
        (None, None) => (source_width, source_height),
        (Some(w), Some(h)) => (w, h),
        (Some(w), None) if preserve_aspect => {
            (w, to_pixels(w as f64 / aspect(source_width, source_height)))
        }
        (None, Some(h)) if preserve_aspect => {
            (to_pixels(h as f64 * aspect(source_width, source_height)), h)
        }
        (Some(w), None) => (w, source_height),
        (None, Some(h)) => (source_width, h),
    };

    if !within_limit(out_width, out_height) {
        return Err(InvalidDimensions {
            width: out_width,
            height: out_height,
        });
    }

    Ok((out_width, out_height))
}

/// Width over height; NaN or infinite for a degenerate source.
fn aspect(width: u32, height: u32) -> f64 {
    width as f64 / height as f64
}

/// Round to the nearest pixel count. Non-finite values collapse to zero
/// so they are rejected as invalid dimensions.
fn to_pixels(length: f64) -> u32 {
    let rounded = length.round();
    if rounded.is_finite() && rounded >= 0.0 {
        rounded.min(u32::MAX as f64) as u32
    } else {
        0
    }
}
