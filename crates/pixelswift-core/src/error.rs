//! Terminal job errors.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::decode::DecodeError;
use crate::encode::EncodeError;
use crate::format::Format;
use crate::geometry::InvalidDimensions;

/// Why a transcode job failed.
#[derive(Debug, Error)]
pub enum TranscodeError {
    /// The source bytes are malformed or not a decodable image.
    #[error(transparent)]
    Decode(#[from] DecodeError),

    /// The resolved output has a zero dimension.
    #[error(transparent)]
    InvalidDimensions(#[from] InvalidDimensions),

    /// The selected backend failed.
    #[error(transparent)]
    Encode(#[from] EncodeError),

    /// No backend can produce the requested format.
    #[error("No encoder available for {0}")]
    UnsupportedFormat(Format),
}

/// Wire-level error category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ErrorKind {
    DecodeError,
    InvalidDimensions,
    EncodeError,
    UnsupportedFormat,
}

impl ErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorKind::DecodeError => "decodeError",
            ErrorKind::InvalidDimensions => "invalidDimensions",
            ErrorKind::EncodeError => "encodeError",
            ErrorKind::UnsupportedFormat => "unsupportedFormat",
        }
    }
}

impl TranscodeError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            TranscodeError::Decode(_) => ErrorKind::DecodeError,
            TranscodeError::InvalidDimensions(_) => ErrorKind::InvalidDimensions,
            TranscodeError::Encode(_) => ErrorKind::EncodeError,
            TranscodeError::UnsupportedFormat(_) => ErrorKind::UnsupportedFormat,
        }
    }
}
