//! Decoding and rasterization for the transcode pipeline.
//!
//! This module provides functionality for:
//! - Decoding JPEG, PNG, WebP, BMP and TIFF sources into RGBA rasters
//! - Applying EXIF orientation so rasters have their displayed dimensions
//! - Resampling a raster to the resolved output geometry
//!
//! # Architecture
//!
//! Decoding runs inside the worker execution context. All operations are
//! synchronous and single-threaded; the decoded raster is owned by the job
//! and moved, not copied, into rasterization.

mod resize;
mod source;
mod types;

pub use resize::rasterize;
pub use source::{decode, extract_orientation};
pub use types::{DecodeError, FilterType, Orientation, RasterImage};
