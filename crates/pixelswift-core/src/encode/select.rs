//! Backend selection policy and the lazily-populated backend registry.

use std::sync::{Arc, OnceLock};

use log::debug;

use super::{
    EncoderBackend, NativeFastEncoder, PaletteOptimizingPngEncoder, QualityJpegEncoder,
    QualityWebpEncoder,
};
use crate::config::TranscodeConfig;
use crate::format::Format;
use crate::native::NativePipeline;
use crate::request::Operation;

/// Which backend a job will run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BackendKind {
    /// The host pipeline, bound to a format.
    Native(Format),
    QualityJpeg,
    PalettePng,
    QualityWebp,
}

impl BackendKind {
    /// The format the backend produces.
    pub fn format(self) -> Format {
        match self {
            BackendKind::Native(format) => format,
            BackendKind::QualityJpeg => Format::Jpeg,
            BackendKind::PalettePng => Format::Png,
            BackendKind::QualityWebp => Format::WebP,
        }
    }
}

/// Specialized backends that take precedence for compress jobs.
pub const COMPRESS_BACKENDS: [(Format, BackendKind); 3] = [
    (Format::Jpeg, BackendKind::QualityJpeg),
    (Format::Png, BackendKind::PalettePng),
    (Format::WebP, BackendKind::QualityWebp),
];

/// Pick the backend for an operation and output format.
///
/// `native_webp` is consulted only for convert/resize to WebP, so compress
/// jobs never trigger a capability probe.
///
/// Returns `None` when nothing can produce `format`.
pub fn select_backend(
    operation: Operation,
    format: Format,
    native_webp: impl FnOnce() -> bool,
) -> Option<BackendKind> {
    if !format.is_encodable() {
        return None;
    }

    let kind = match operation {
        Operation::Compress => COMPRESS_BACKENDS
            .iter()
            .find(|(f, _)| *f == format)
            .map_or(BackendKind::Native(format), |&(_, kind)| kind),
        Operation::Convert | Operation::Resize => {
            if format == Format::WebP && !native_webp() {
                BackendKind::QualityWebp
            } else {
                BackendKind::Native(format)
            }
        }
    };

    Some(kind)
}

/// Backend instances, created on first use.
///
/// Specialized encoders are only built when a job first selects them; a
/// session that only converts never constructs them.
pub struct EncoderRegistry {
    native: Arc<dyn NativePipeline>,
    jpeg_progressive: bool,
    png_sample_factor: i32,
    png_optimization_level: u8,
    jpeg: OnceLock<Arc<dyn EncoderBackend>>,
    png: OnceLock<Arc<dyn EncoderBackend>>,
    webp: OnceLock<Arc<dyn EncoderBackend>>,
}

impl EncoderRegistry {
    pub fn new(native: Arc<dyn NativePipeline>, config: &TranscodeConfig) -> Self {
        Self {
            native,
            jpeg_progressive: config.jpeg.progressive,
            png_sample_factor: config.png.sample_factor,
            png_optimization_level: config.png.optimization_level,
            jpeg: OnceLock::new(),
            png: OnceLock::new(),
            webp: OnceLock::new(),
        }
    }

    /// The native pipeline native backends delegate to.
    pub fn native(&self) -> &Arc<dyn NativePipeline> {
        &self.native
    }

    /// Get (building if needed) the backend for `kind`.
    pub fn get(&self, kind: BackendKind) -> Arc<dyn EncoderBackend> {
        match kind {
            BackendKind::Native(format) => {
                Arc::new(NativeFastEncoder::new(Arc::clone(&self.native), format))
            }
            BackendKind::QualityJpeg => Arc::clone(self.jpeg.get_or_init(|| {
                debug!("loading quality JPEG encoder");
                Arc::new(QualityJpegEncoder::new(self.jpeg_progressive))
            })),
            BackendKind::PalettePng => Arc::clone(self.png.get_or_init(|| {
                debug!("loading palette PNG encoder");
                Arc::new(PaletteOptimizingPngEncoder::new(
                    self.png_sample_factor,
                    self.png_optimization_level,
                ))
            })),
            BackendKind::QualityWebp => Arc::clone(self.webp.get_or_init(|| {
                debug!("loading quality WebP encoder");
                Arc::new(QualityWebpEncoder)
            })),
        }
    }

    /// Whether a specialized backend has been built yet. Native backends
    /// are always available.
    pub fn is_loaded(&self, kind: BackendKind) -> bool {
        match kind {
            BackendKind::Native(_) => true,
            BackendKind::QualityJpeg => self.jpeg.get().is_some(),
            BackendKind::PalettePng => self.png.get().is_some(),
            BackendKind::QualityWebp => self.webp.get().is_some(),
        }
    }
}
