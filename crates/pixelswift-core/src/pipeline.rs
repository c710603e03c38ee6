//! The per-job transcode state machine.
//!
//! ```text
//! Received -> Decoding -> GeometryResolved -> Rasterized -> Encoding -> Complete
//!     \__________\______________\________________\____________\-----> Failed
//! ```
//!
//! A progress milestone is reported on entering each non-terminal state
//! and on completion. Exactly one encoder backend runs per job; a failing
//! backend fails the job without trying another.

use std::any::Any;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use log::{debug, warn};

use crate::capability::CapabilityCache;
use crate::config::{ConfigError, TranscodeConfig};
use crate::decode::{decode, rasterize};
use crate::encode::{select_backend, EncodeError, EncoderRegistry};
use crate::error::TranscodeError;
use crate::format;
use crate::geometry;
use crate::native::{ImageCratePipeline, NativePipeline};
use crate::request::{ProcessRequest, ProcessResult};

/// Milliseconds since an arbitrary epoch.
pub type Clock = fn() -> f64;

/// Wall clock in milliseconds since the Unix epoch.
pub fn system_clock() -> f64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs_f64() * 1000.0)
        .unwrap_or(0.0)
}

/// Where a job is in the state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobState {
    Received,
    Decoding,
    GeometryResolved,
    Rasterized,
    Encoding,
    Complete,
    Failed,
}

impl JobState {
    /// Progress percentage reported on entering the state.
    pub fn milestone(self) -> Option<u8> {
        match self {
            JobState::Received | JobState::Failed => None,
            JobState::Decoding => Some(10),
            JobState::GeometryResolved => Some(30),
            JobState::Rasterized => Some(60),
            JobState::Encoding => Some(90),
            JobState::Complete => Some(100),
        }
    }
}

/// Runs transcode jobs. Cheap to share behind an `Arc`.
pub struct Transcoder {
    config: TranscodeConfig,
    registry: EncoderRegistry,
    capabilities: Arc<CapabilityCache>,
    clock: Clock,
}

impl Transcoder {
    /// A transcoder on the `image`-crate native pipeline and the
    /// process-wide capability cache.
    ///
    /// # Errors
    ///
    /// Returns an error if `config` fails validation.
    pub fn new(config: TranscodeConfig) -> Result<Self, ConfigError> {
        Self::with_native(config, Arc::new(ImageCratePipeline), CapabilityCache::global())
    }

    /// A transcoder on a custom host pipeline.
    ///
    /// The capability cache answers for one pipeline, so a host other than
    /// the default should come with its own cache.
    pub fn with_native(
        config: TranscodeConfig,
        native: Arc<dyn NativePipeline>,
        capabilities: Arc<CapabilityCache>,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            registry: EncoderRegistry::new(native, &config),
            config,
            capabilities,
            clock: system_clock,
        })
    }

    /// Replace the clock used for `duration_ms`.
    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    pub fn config(&self) -> &TranscodeConfig {
        &self.config
    }

    pub fn registry(&self) -> &EncoderRegistry {
        &self.registry
    }

    /// Run one job to completion without progress reporting.
    pub fn process(&self, request: ProcessRequest) -> Result<ProcessResult, TranscodeError> {
        self.process_with_progress(request, &mut |_| {})
    }

    /// Run one job, reporting milestones to `on_progress`.
    ///
    /// Milestones are non-decreasing; 100 is reported only on success.
    pub fn process_with_progress(
        &self,
        request: ProcessRequest,
        on_progress: &mut dyn FnMut(u8),
    ) -> Result<ProcessResult, TranscodeError> {
        let id = request.id();
        let mut state = JobState::Received;

        let result = self.run(request, &mut state, on_progress);
        if let Err(e) = &result {
            warn!("{id} failed during {state:?}: {e}");
        }
        result
    }

    fn run(
        &self,
        request: ProcessRequest,
        state: &mut JobState,
        on_progress: &mut dyn FnMut(u8),
    ) -> Result<ProcessResult, TranscodeError> {
        let start = (self.clock)();
        let id = request.id();
        let operation = request.operation();
        let options = request.options().clone();

        let source_format = format::detect(request.source(), request.file_name());
        let output_format = options.output_format.unwrap_or(self.config.default_format);
        if !output_format.is_encodable() {
            return Err(TranscodeError::UnsupportedFormat(output_format));
        }

        let mut enter = |next: JobState| {
            *state = next;
            debug!("{id} -> {next:?}");
            if let Some(pct) = next.milestone() {
                on_progress(pct);
            }
        };

        enter(JobState::Decoding);
        let source = request.into_source();
        let original_size = source.len();
        let decoded = decode(&source, source_format, self.config.apply_orientation)?;
        drop(source);

        let (width, height) = geometry::resolve(
            decoded.width,
            decoded.height,
            options.target_width,
            options.target_height,
            options.preserve_aspect_ratio,
        )?;
        enter(JobState::GeometryResolved);

        let raster = rasterize(decoded, width, height, self.config.resize_filter)?;
        enter(JobState::Rasterized);

        let kind = select_backend(operation, output_format, || {
            self.capabilities
                .supports_native_webp_encode(self.registry.native().as_ref())
        })
        .ok_or(TranscodeError::UnsupportedFormat(output_format))?;
        let backend = self.registry.get(kind);
        let quality = options.effective_quality(self.config.default_quality);
        debug!(
            "{id}: {operation} to {output_format} via {} at quality {quality}",
            backend.name()
        );

        enter(JobState::Encoding);
        let output = catch_unwind(AssertUnwindSafe(|| backend.encode(&raster, quality)))
            .map_err(|payload| {
                EncodeError::failed(
                    backend.name(),
                    format!("panicked: {}", panic_message(payload.as_ref())),
                )
            })??;
        drop(raster);

        let duration_ms = ((self.clock)() - start).max(0.0);
        enter(JobState::Complete);

        Ok(ProcessResult {
            output,
            width,
            height,
            format: backend.format(),
            original_size,
            duration_ms,
        })
    }
}

/// Best-effort text of a caught panic payload.
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capability::testing::{PanickingHost, SubstitutingHost};
    use crate::decode::DecodeError;
    use crate::encode::fixtures::gradient;
    use crate::encode::BackendKind;
    use crate::format::Format;
    use crate::request::{Operation, ProcessOptions};

    fn encoded(width: u32, height: u32, format: Format) -> Vec<u8> {
        ImageCratePipeline
            .encode(&gradient(width, height), format, 90)
            .unwrap()
            .bytes
    }

    fn transcoder() -> Transcoder {
        Transcoder::with_native(
            TranscodeConfig::default(),
            Arc::new(ImageCratePipeline),
            Arc::new(CapabilityCache::new()),
        )
        .unwrap()
    }

    #[test]
    fn test_resize_full_hd_jpeg() {
        let source = encoded(1920, 1080, Format::Jpeg);
        let request = ProcessRequest::new(
            Operation::Resize,
            source.clone(),
            ProcessOptions::new().width(800).preserve_aspect_ratio(true),
        );

        let result = transcoder().process(request).unwrap();
        assert_eq!((result.width, result.height), (800, 450));
        assert_eq!(result.format, Format::Jpeg);
        assert_eq!(result.format.extension(), "jpg");
        assert!(result.processed_size() > 0);
        assert_eq!(result.processed_size(), result.output.len());
        assert_eq!(result.original_size, source.len());
        assert!(result.duration_ms >= 0.0);

        let decoded = image::load_from_memory(&result.output).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (800, 450));
    }

    #[test]
    fn test_convert_keeps_dimensions() {
        let request = ProcessRequest::new(
            Operation::Convert,
            encoded(40, 30, Format::Png),
            ProcessOptions::new().format(Format::Bmp),
        );
        let result = transcoder().process(request).unwrap();
        assert_eq!((result.width, result.height), (40, 30));
        assert_eq!(result.format, Format::Bmp);
        assert_eq!(format::detect(&result.output, None), Format::Bmp);
    }

    #[test]
    fn test_compress_uses_specialized_backend() {
        let t = transcoder();
        let request = ProcessRequest::new(
            Operation::Compress,
            encoded(32, 32, Format::Png),
            ProcessOptions::new().format(Format::Png).quality(30),
        );
        let result = t.process(request).unwrap();
        assert_eq!(result.format, Format::Png);
        assert!(t.registry().is_loaded(BackendKind::PalettePng));
        assert!(!t.registry().is_loaded(BackendKind::QualityJpeg));
    }

    #[test]
    fn test_webp_falls_back_to_software_when_host_substitutes() {
        let t = Transcoder::with_native(
            TranscodeConfig::default(),
            Arc::new(SubstitutingHost::default()),
            Arc::new(CapabilityCache::new()),
        )
        .unwrap();

        let request = ProcessRequest::new(
            Operation::Convert,
            encoded(24, 24, Format::Png),
            ProcessOptions::new().format(Format::WebP),
        );
        let result = t.process(request).unwrap();
        assert_eq!(result.format, Format::WebP);
        assert_eq!(format::detect(&result.output, None), Format::WebP);
        assert!(t.registry().is_loaded(BackendKind::QualityWebp));
    }

    #[test]
    fn test_webp_uses_native_when_truthful() {
        let t = transcoder();
        let request = ProcessRequest::new(
            Operation::Resize,
            encoded(24, 24, Format::Png),
            ProcessOptions::new().format(Format::WebP).height(12),
        );
        let result = t.process(request).unwrap();
        assert_eq!(result.format, Format::WebP);
        assert_eq!((result.width, result.height), (12, 12));
        assert!(!t.registry().is_loaded(BackendKind::QualityWebp));
    }

    #[test]
    fn test_output_format_defaults_to_jpeg() {
        let request = ProcessRequest::new(
            Operation::Resize,
            encoded(10, 10, Format::Png),
            ProcessOptions::new().width(5),
        );
        let result = transcoder().process(request).unwrap();
        assert_eq!(result.format, Format::Jpeg);
        assert_eq!(format::detect(&result.output, None), Format::Jpeg);
    }

    #[test]
    fn test_output_format_follows_configured_default() {
        let config = TranscodeConfig {
            default_format: Format::WebP,
            ..TranscodeConfig::default()
        };
        let t = Transcoder::with_native(
            config,
            Arc::new(ImageCratePipeline),
            Arc::new(CapabilityCache::new()),
        )
        .unwrap();
        let request = ProcessRequest::new(
            Operation::Convert,
            encoded(10, 10, Format::Png),
            ProcessOptions::new(),
        );
        assert_eq!(t.process(request).unwrap().format, Format::WebP);
    }

    #[test]
    fn test_oversized_resize_rejected_before_progress_past_decode() {
        let mut progress = Vec::new();
        let request = ProcessRequest::new(
            Operation::Resize,
            encoded(2, 2, Format::Png),
            ProcessOptions::new().width(400_000).height(400_000),
        );
        let result = transcoder().process_with_progress(request, &mut |p| progress.push(p));
        assert!(matches!(result, Err(TranscodeError::InvalidDimensions(_))));
        assert_eq!(progress, vec![10]);
    }

    #[test]
    fn test_pdf_output_unsupported() {
        let mut progress = Vec::new();
        let request = ProcessRequest::new(
            Operation::Convert,
            encoded(10, 10, Format::Png),
            ProcessOptions::new().format(Format::Pdf),
        );
        let result = transcoder().process_with_progress(request, &mut |p| progress.push(p));
        assert!(matches!(
            result,
            Err(TranscodeError::UnsupportedFormat(Format::Pdf))
        ));
        assert!(progress.is_empty());
    }

    #[test]
    fn test_corrupt_source_is_decode_error() {
        let mut source = encoded(16, 16, Format::Jpeg);
        source.truncate(40);
        let request = ProcessRequest::new(Operation::Convert, source, ProcessOptions::new());
        let result = transcoder().process(request);
        assert!(matches!(result, Err(TranscodeError::Decode(_))));
    }

    #[test]
    fn test_file_name_identifies_unsigned_source() {
        let request =
            ProcessRequest::new(Operation::Convert, b"%PDF-1.7".to_vec(), ProcessOptions::new())
                .with_file_name("scan.pdf");
        assert!(matches!(
            transcoder().process(request),
            Err(TranscodeError::Decode(DecodeError::UnsupportedFormat(Format::Pdf)))
        ));
    }

    #[test]
    fn test_empty_source() {
        let request = ProcessRequest::new(Operation::Compress, vec![], ProcessOptions::new());
        assert!(matches!(
            transcoder().process(request),
            Err(TranscodeError::Decode(DecodeError::Empty))
        ));
    }

    #[test]
    fn test_zero_dimension_rejected() {
        let request = ProcessRequest::new(
            Operation::Resize,
            encoded(10, 10, Format::Png),
            ProcessOptions::new().width(0),
        );
        assert!(matches!(
            transcoder().process(request),
            Err(TranscodeError::InvalidDimensions(_))
        ));
    }

    #[test]
    fn test_backend_panic_becomes_encode_error() {
        let t = Transcoder::with_native(
            TranscodeConfig::default(),
            Arc::new(PanickingHost),
            Arc::new(CapabilityCache::new()),
        )
        .unwrap();
        let request = ProcessRequest::new(
            Operation::Convert,
            encoded(8, 8, Format::Png),
            ProcessOptions::new().format(Format::Png),
        );
        match t.process(request) {
            Err(TranscodeError::Encode(EncodeError::EncodingFailed { message, .. })) => {
                assert!(message.contains("host blew up"));
            }
            other => panic!("expected encode failure, got {other:?}"),
        }
    }

    #[test]
    fn test_progress_milestones() {
        let mut progress = Vec::new();
        let request = ProcessRequest::new(
            Operation::Resize,
            encoded(20, 20, Format::Jpeg),
            ProcessOptions::new().width(10),
        );
        transcoder()
            .process_with_progress(request, &mut |p| progress.push(p))
            .unwrap();
        assert_eq!(progress, vec![10, 30, 60, 90, 100]);
    }

    #[test]
    fn test_progress_stops_on_failure() {
        let mut progress = Vec::new();
        let request = ProcessRequest::new(
            Operation::Resize,
            encoded(10, 10, Format::Png),
            ProcessOptions::new().height(0),
        );
        let _ = transcoder().process_with_progress(request, &mut |p| progress.push(p));
        assert_eq!(progress, vec![10]);
    }

    #[test]
    fn test_injected_clock() {
        let request = ProcessRequest::new(
            Operation::Convert,
            encoded(4, 4, Format::Png),
            ProcessOptions::new(),
        );
        let result = transcoder().with_clock(|| 42.0).process(request).unwrap();
        assert_eq!(result.duration_ms, 0.0);
    }

    #[test]
    fn test_invalid_config_rejected() {
        let config = TranscodeConfig {
            default_quality: 0,
            ..TranscodeConfig::default()
        };
        assert!(Transcoder::new(config).is_err());
    }

    #[test]
    fn test_orientation_can_be_disabled() {
        let config = TranscodeConfig {
            apply_orientation: false,
            ..TranscodeConfig::default()
        };
        let t = Transcoder::with_native(
            config,
            Arc::new(ImageCratePipeline),
            Arc::new(CapabilityCache::new()),
        )
        .unwrap();
        let request = ProcessRequest::new(
            Operation::Convert,
            encoded(30, 10, Format::Jpeg),
            ProcessOptions::new(),
        );
        let result = t.process(request).unwrap();
        assert_eq!((result.width, result.height), (30, 10));
    }

    #[test]
    fn test_panic_message() {
        let payload: Box<dyn Any + Send> = Box::new("static");
        assert_eq!(panic_message(payload.as_ref()), "static");
        let payload: Box<dyn Any + Send> = Box::new(String::from("owned"));
        assert_eq!(panic_message(payload.as_ref()), "owned");
        let payload: Box<dyn Any + Send> = Box::new(7u32);
        assert_eq!(panic_message(payload.as_ref()), "unknown panic");
    }

    #[test]
    fn test_milestones_non_decreasing() {
        let states = [
            JobState::Decoding,
            JobState::GeometryResolved,
            JobState::Rasterized,
            JobState::Encoding,
            JobState::Complete,
        ];
        let pcts: Vec<u8> = states.iter().filter_map(|s| s.milestone()).collect();
        assert!(pcts.windows(2).all(|w| w[0] <= w[1]));
        assert_eq!(JobState::Failed.milestone(), None);
    }
}
