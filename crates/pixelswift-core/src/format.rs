//! Image format identification from content.
//!
//! The format of a source image is derived from its leading bytes, never
//! from the file name alone. Signatures are checked against an ordered
//! table ([`SIGNATURES`]); the first entry whose every part matches wins.
//! Only when no signature matches is the declared file extension
//! consulted.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Number of leading bytes inspected by [`detect`].
pub const SNIFF_LEN: usize = 12;

/// Closed set of image formats known to the transcoder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Format {
    #[serde(rename = "jpg", alias = "jpeg")]
    Jpeg,
    Png,
    #[serde(rename = "webp")]
    WebP,
    Bmp,
    #[serde(alias = "tif")]
    Tiff,
    /// Output-only; no backend in the core can produce it.
    Pdf,
    Unknown,
}

impl Format {
    /// Canonical file extension (without the dot).
    pub fn extension(self) -> &'static str {
        match self {
            Format::Jpeg => "jpg",
            Format::Png => "png",
            Format::WebP => "webp",
            Format::Bmp => "bmp",
            Format::Tiff => "tiff",
            Format::Pdf => "pdf",
            Format::Unknown => "unknown",
        }
    }

    /// MIME type used when handing bytes to a host pipeline or a download.
    pub fn mime_type(self) -> &'static str {
        match self {
            Format::Jpeg => "image/jpeg",
            Format::Png => "image/png",
            Format::WebP => "image/webp",
            Format::Bmp => "image/bmp",
            Format::Tiff => "image/tiff",
            Format::Pdf => "application/pdf",
            Format::Unknown => "application/octet-stream",
        }
    }

    /// Map a file extension (case-insensitive, without the dot) to a format.
    pub fn from_extension(ext: &str) -> Format {
        match ext.to_ascii_lowercase().as_str() {
            "jpg" | "jpeg" => Format::Jpeg,
            "png" => Format::Png,
            "webp" => Format::WebP,
            "bmp" => Format::Bmp,
            "tif" | "tiff" => Format::Tiff,
            "pdf" => Format::Pdf,
            _ => Format::Unknown,
        }
    }

    /// Map a MIME type to a format.
    pub fn from_mime_type(mime: &str) -> Format {
        match mime.trim().to_ascii_lowercase().as_str() {
            "image/jpeg" | "image/jpg" => Format::Jpeg,
            "image/png" => Format::Png,
            "image/webp" => Format::WebP,
            "image/bmp" => Format::Bmp,
            "image/tiff" => Format::Tiff,
            "application/pdf" => Format::Pdf,
            _ => Format::Unknown,
        }
    }

    /// Whether the format is accepted as a source image.
    pub fn is_supported_input(self) -> bool {
        matches!(
            self,
            Format::Jpeg | Format::Png | Format::WebP | Format::Bmp | Format::Tiff
        )
    }

    /// Whether at least one encoder backend can produce this format.
    pub fn is_encodable(self) -> bool {
        matches!(
            self,
            Format::Jpeg | Format::Png | Format::WebP | Format::Bmp | Format::Tiff
        )
    }

    /// The `image` crate's view of this format, when it has one.
    pub(crate) fn image_format(self) -> Option<image::ImageFormat> {
        match self {
            Format::Jpeg => Some(image::ImageFormat::Jpeg),
            Format::Png => Some(image::ImageFormat::Png),
            Format::WebP => Some(image::ImageFormat::WebP),
            Format::Bmp => Some(image::ImageFormat::Bmp),
            Format::Tiff => Some(image::ImageFormat::Tiff),
            Format::Pdf | Format::Unknown => None,
        }
    }
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

/// A magic-number signature. Every `(offset, bytes)` part must match.
#[derive(Debug, Clone, Copy)]
pub struct Signature {
    pub format: Format,
    pub parts: &'static [(usize, &'static [u8])],
}

impl Signature {
    /// Check the signature against a byte prefix.
    pub fn matches(&self, bytes: &[u8]) -> bool {
        self.parts.iter().all(|&(offset, magic)| {
            bytes
                .get(offset..offset + magic.len())
                .is_some_and(|window| window == magic)
        })
    }
}

/// Signatures in priority order. First match wins.
pub const SIGNATURES: [Signature; 6] = [
    Signature {
        format: Format::Jpeg,
        parts: &[(0, &[0xFF, 0xD8, 0xFF])],
    },
    Signature {
        format: Format::Png,
        parts: &[(0, &[0x89, 0x50, 0x4E, 0x47])],
    },
    Signature {
        format: Format::WebP,
        parts: &[(0, b"RIFF"), (8, b"WEBP")],
    },
    Signature {
        format: Format::Bmp,
        parts: &[(0, b"BM")],
    },
    // Little-endian TIFF ("II*\0")
    Signature {
        format: Format::Tiff,
        parts: &[(0, &[0x49, 0x49, 0x2A, 0x00])],
    },
    // Big-endian TIFF ("MM\0*")
    Signature {
        format: Format::Tiff,
        parts: &[(0, &[0x4D, 0x4D, 0x00, 0x2A])],
    },
];

/// Identify a format from magic numbers only.
///
/// Returns `None` when no signature in [`SIGNATURES`] matches the first
/// [`SNIFF_LEN`] bytes.
pub fn sniff(bytes: &[u8]) -> Option<Format> {
    let prefix = &bytes[..bytes.len().min(SNIFF_LEN)];
    SIGNATURES
        .iter()
        .find(|signature| signature.matches(prefix))
        .map(|signature| signature.format)
}

/// Identify the true format of an image.
///
/// Magic numbers take precedence over the file name. If nothing matches,
/// the lowercased extension of `file_name` is used; otherwise the result
/// is [`Format::Unknown`]. Never fails.
pub fn detect(bytes: &[u8], file_name: Option<&str>) -> Format {
    if let Some(format) = sniff(bytes) {
        return format;
    }

    file_name
        .and_then(|name| name.rsplit_once('.'))
        .map(|(_, ext)| Format::from_extension(ext))
        .unwrap_or(Format::Unknown)
}


#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        /// Property: a known signature decides the format whatever follows it
        /// and whatever the file is called.
        #[test]
        fn prop_signature_beats_extension(
            index in 0usize..SIGNATURES.len(),
            tail in prop::collection::vec(any::<u8>(), 0..32),
            ext in "[a-z]{1,4}",
        ) {
            let signature = SIGNATURES[index];
            let mut bytes = vec![0u8; SNIFF_LEN];
            for &(offset, magic) in signature.parts {
                bytes[offset..offset + magic.len()].copy_from_slice(magic);
            }
            bytes.extend_from_slice(&tail);

            let name = format!("file.{ext}");
            prop_assert_eq!(detect(&bytes, Some(&name)), signature.format);
        }

        /// Property: detection never panics on arbitrary input.
        #[test]
        fn prop_detect_total(bytes in prop::collection::vec(any::<u8>(), 0..64)) {
            let _ = detect(&bytes, Some("x.bin"));
        }
    }
}
