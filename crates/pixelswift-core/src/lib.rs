//! PixelSwift Core - client-side image transcoding
//!
//! This crate provides the transcoding core for PixelSwift: format
//! sniffing, decoding, output geometry, encoder backend selection and the
//! worker channel that runs jobs off the interactive thread.
//!
//! # Example
//!
//! ```ignore
//! use pixelswift_core::{Operation, ProcessOptions, ProcessRequest, TranscodeConfig, Transcoder};
//!
//! let transcoder = Transcoder::new(TranscodeConfig::default())?;
//! let request = ProcessRequest::new(Operation::Resize, bytes, ProcessOptions::new().width(800));
//! let result = transcoder.process(request)?;
//! ```

pub mod capability;
pub mod channel;
pub mod config;
pub mod decode;
pub mod encode;
pub mod error;
pub mod format;
pub mod geometry;
pub mod naming;
pub mod native;
pub mod pipeline;
pub mod request;

pub use capability::CapabilityCache;
pub use channel::{JobError, JobFailure, JobHandle, Worker, WorkerEvent, WorkerMessage};
pub use config::{ConfigError, TranscodeConfig};
pub use error::{ErrorKind, TranscodeError};
pub use format::{detect, Format};
pub use naming::{batch_archive_name, suggested_file_name};
pub use native::{ImageCratePipeline, NativePipeline};
pub use pipeline::{Clock, JobState, Transcoder};
pub use request::{
    CompressionPreset, CorrelationId, Operation, ProcessOptions, ProcessRequest, ProcessResult,
};

/// Crate version, as reported to the host.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_is_set() {
        assert!(!VERSION.is_empty());
    }

    #[test]
    fn test_public_surface_round_trip() {
        let transcoder = Transcoder::new(TranscodeConfig::default()).unwrap();
        let source = ImageCratePipeline
            .encode(
                &decode::RasterImage::filled(20, 10, [0, 128, 255, 255]),
                Format::Png,
                90,
            )
            .unwrap()
            .bytes;

        let request = ProcessRequest::new(Operation::Compress, source, ProcessOptions::new())
            .with_file_name("banner.png");
        let result = transcoder.process(request).unwrap();

        // No output format requested, so the configured default applies
        assert_eq!(result.format, Format::Jpeg);
        assert_eq!(
            result.suggested_file_name("banner.png", Operation::Compress),
            "banner_compressed.jpg"
        );
    }
}
