//! Job data model: requests, options and results.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::ser::SerializeStruct;
use serde::{Deserialize, Serialize, Serializer};

use crate::format::Format;
use crate::naming;

static NEXT_ID: AtomicU64 = AtomicU64::new(1);

/// Identifies one in-flight job across the worker channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CorrelationId(u64);

impl CorrelationId {
    /// A process-unique id.
    pub fn next() -> Self {
        Self(NEXT_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// Wrap an id assigned by the caller (e.g. a JS-side counter).
    pub fn from_raw(id: u64) -> Self {
        Self(id)
    }

    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for CorrelationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "job-{}", self.0)
    }
}

/// What the caller wants done to the image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Operation {
    /// Change the format, keep the dimensions.
    Convert,
    /// Re-encode for size, preferring the specialized encoders.
    Compress,
    /// Change the dimensions.
    Resize,
}

impl Operation {
    pub fn as_str(self) -> &'static str {
        match self {
            Operation::Convert => "convert",
            Operation::Compress => "compress",
            Operation::Resize => "resize",
        }
    }

    /// Parse the lowercase action name used on the wire.
    pub fn parse(action: &str) -> Option<Operation> {
        match action {
            "convert" => Some(Operation::Convert),
            "compress" => Some(Operation::Compress),
            "resize" => Some(Operation::Resize),
            _ => None,
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Named quality levels offered for compress jobs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CompressionPreset {
    Extreme,
    #[default]
    Recommended,
    Light,
    Lossless,
}

impl CompressionPreset {
    /// Quality percentage for the preset.
    pub fn quality(self) -> u8 {
        match self {
            CompressionPreset::Extreme => 30,
            CompressionPreset::Recommended => 60,
            CompressionPreset::Light => 80,
            CompressionPreset::Lossless => 95,
        }
    }
}

/// Per-job options. Every field is optional on the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ProcessOptions {
    /// Target format; defaults to the source format when re-encodable.
    pub output_format: Option<Format>,
    /// Quality 1-100; out-of-range values are clamped.
    pub quality: Option<i32>,
    #[serde(alias = "width")]
    pub target_width: Option<u32>,
    #[serde(alias = "height")]
    pub target_height: Option<u32>,
    #[serde(alias = "keepAspectRatio")]
    pub preserve_aspect_ratio: bool,
}

impl Default for ProcessOptions {
    fn default() -> Self {
        Self {
            output_format: None,
            quality: None,
            target_width: None,
            target_height: None,
            preserve_aspect_ratio: true,
        }
    }
}

impl ProcessOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn format(mut self, format: Format) -> Self {
        self.output_format = Some(format);
        self
    }

    pub fn quality(mut self, quality: i32) -> Self {
        self.quality = Some(quality);
        self
    }

    pub fn preset(self, preset: CompressionPreset) -> Self {
        self.quality(preset.quality() as i32)
    }

    pub fn width(mut self, width: u32) -> Self {
        self.target_width = Some(width);
        self
    }

    pub fn height(mut self, height: u32) -> Self {
        self.target_height = Some(height);
        self
    }

    pub fn preserve_aspect_ratio(mut self, preserve: bool) -> Self {
        self.preserve_aspect_ratio = preserve;
        self
    }

    /// The quality to encode at: the requested one clamped to 1-100, or
    /// `default` when none was given.
    pub fn effective_quality(&self, default: u8) -> u8 {
        match self.quality {
            Some(q) => q.clamp(1, 100) as u8,
            None => default.clamp(1, 100),
        }
    }
}

/// One image to transcode. Consumed exactly once by the transcoder.
#[derive(Debug, Clone)]
pub struct ProcessRequest {
    id: CorrelationId,
    operation: Operation,
    source: Vec<u8>,
    options: ProcessOptions,
    file_name: Option<String>,
}

impl ProcessRequest {
    /// Create a request with a fresh correlation id.
    pub fn new(operation: Operation, source: Vec<u8>, options: ProcessOptions) -> Self {
        Self::with_id(CorrelationId::next(), operation, source, options)
    }

    pub fn with_id(
        id: CorrelationId,
        operation: Operation,
        source: Vec<u8>,
        options: ProcessOptions,
    ) -> Self {
        Self {
            id,
            operation,
            source,
            options,
            file_name: None,
        }
    }

    /// Attach the original file name, used only as a format hint when the
    /// content matches no known signature.
    pub fn with_file_name(mut self, name: impl Into<String>) -> Self {
        self.file_name = Some(name.into());
        self
    }

    pub fn id(&self) -> CorrelationId {
        self.id
    }

    pub fn operation(&self) -> Operation {
        self.operation
    }

    pub fn source(&self) -> &[u8] {
        &self.source
    }

    pub fn options(&self) -> &ProcessOptions {
        &self.options
    }

    pub fn file_name(&self) -> Option<&str> {
        self.file_name.as_deref()
    }

    /// Take the source buffer out without copying it.
    pub fn into_source(self) -> Vec<u8> {
        self.source
    }
}

/// The encoded output of a successful job.
#[derive(Debug, Clone, PartialEq)]
pub struct ProcessResult {
    pub output: Vec<u8>,
    pub width: u32,
    pub height: u32,
    /// The format the encoder that ran actually produced.
    pub format: Format,
    pub original_size: usize,
    pub duration_ms: f64,
}

impl ProcessResult {
    /// Always the exact length of `output`.
    pub fn processed_size(&self) -> usize {
        self.output.len()
    }

    /// Download name for this result, see [`naming::suggested_file_name`].
    pub fn suggested_file_name(&self, original: &str, operation: Operation) -> String {
        naming::suggested_file_name(
            original,
            operation,
            Some(self.format),
            Some((self.width, self.height)),
        )
    }
}

impl Serialize for ProcessResult {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("ProcessResult", 7)?;
        state.serialize_field("buffer", &self.output)?;
        state.serialize_field("width", &self.width)?;
        state.serialize_field("height", &self.height)?;
        state.serialize_field("format", &self.format)?;
        state.serialize_field("originalSize", &self.original_size)?;
        state.serialize_field("processedSize", &self.processed_size())?;
        state.serialize_field("durationMs", &self.duration_ms)?;
        state.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_correlation_ids_are_unique() {
        let a = CorrelationId::next();
        let b = CorrelationId::next();
        assert_ne!(a, b);
        assert!(b.get() > a.get());
        assert_eq!(CorrelationId::from_raw(7).to_string(), "job-7");
    }

    #[test]
    fn test_operation_names() {
        for op in [Operation::Convert, Operation::Compress, Operation::Resize] {
            assert_eq!(Operation::parse(op.as_str()), Some(op));
        }
        assert_eq!(Operation::parse("rotate"), None);
        assert_eq!(
            serde_json::to_string(&Operation::Compress).unwrap(),
            "\"compress\""
        );
    }

    #[test]
    fn test_presets() {
        assert_eq!(CompressionPreset::Extreme.quality(), 30);
        assert_eq!(CompressionPreset::Recommended.quality(), 60);
        assert_eq!(CompressionPreset::Light.quality(), 80);
        assert_eq!(CompressionPreset::Lossless.quality(), 95);
        assert_eq!(CompressionPreset::default(), CompressionPreset::Recommended);

        let opts = ProcessOptions::new().preset(CompressionPreset::Extreme);
        assert_eq!(opts.quality, Some(30));
    }

    #[test]
    fn test_options_defaults() {
        let opts = ProcessOptions::default();
        assert!(opts.preserve_aspect_ratio);
        assert_eq!(opts.output_format, None);
        assert_eq!(opts.effective_quality(85), 85);
    }

    #[test]
    fn test_quality_clamped() {
        assert_eq!(ProcessOptions::new().quality(0).effective_quality(85), 1);
        assert_eq!(ProcessOptions::new().quality(-20).effective_quality(85), 1);
        assert_eq!(ProcessOptions::new().quality(150).effective_quality(85), 100);
        assert_eq!(ProcessOptions::new().quality(42).effective_quality(85), 42);
    }

    #[test]
    fn test_options_from_wire() {
        let opts: ProcessOptions = serde_json::from_str(
            r#"{"outputFormat":"jpeg","quality":70,"width":800,"keepAspectRatio":false}"#,
        )
        .unwrap();
        assert_eq!(opts.output_format, Some(Format::Jpeg));
        assert_eq!(opts.quality, Some(70));
        assert_eq!(opts.target_width, Some(800));
        assert_eq!(opts.target_height, None);
        assert!(!opts.preserve_aspect_ratio);

        let opts: ProcessOptions = serde_json::from_str(r#"{"targetHeight":300}"#).unwrap();
        assert_eq!(opts.target_height, Some(300));
        assert!(opts.preserve_aspect_ratio);
    }

    #[test]
    fn test_request_accessors() {
        let req = ProcessRequest::new(Operation::Resize, vec![1, 2, 3], ProcessOptions::new().width(10))
            .with_file_name("cat.png");
        assert_eq!(req.operation(), Operation::Resize);
        assert_eq!(req.source(), &[1, 2, 3]);
        assert_eq!(req.options().target_width, Some(10));
        assert_eq!(req.file_name(), Some("cat.png"));
        assert_eq!(req.into_source(), vec![1, 2, 3]);
    }

    #[test]
    fn test_result_serialization() {
        let result = ProcessResult {
            output: vec![9, 9, 9],
            width: 4,
            height: 2,
            format: Format::WebP,
            original_size: 100,
            duration_ms: 1.5,
        };
        assert_eq!(result.processed_size(), 3);

        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["processedSize"], 3);
        assert_eq!(json["originalSize"], 100);
        assert_eq!(json["format"], "webp");
        assert_eq!(json["buffer"], serde_json::json!([9, 9, 9]));
    }

    #[test]
    fn test_result_file_name() {
        let result = ProcessResult {
            output: vec![0],
            width: 800,
            height: 450,
            format: Format::Jpeg,
            original_size: 1,
            duration_ms: 0.0,
        };
        assert_eq!(
            result.suggested_file_name("holiday.photo.png", Operation::Resize),
            "holiday.photo_800x450.jpg"
        );
    }
}
