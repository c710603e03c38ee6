//! Source image decoding with EXIF orientation handling.

use std::io::Cursor;

use exif::{In, Reader, Tag};
use image::{DynamicImage, ImageReader};

use super::{DecodeError, Orientation, RasterImage};
use crate::format::Format;

/// Decode source bytes into an RGBA raster.
///
/// `hint` is the sniffed format. Known formats are decoded with that
/// decoder directly; [`Format::Unknown`] falls back to the image crate's
/// own content guessing. When `orient` is set, the EXIF orientation tag is
/// applied so the raster has the image's displayed dimensions.
///
/// # Errors
///
/// Returns `DecodeError::Empty` for an empty buffer,
/// `DecodeError::UnsupportedFormat` for formats that are never decodable
/// (PDF) and `DecodeError::CorruptedFile` for anything the decoder rejects.
pub fn decode(bytes: &[u8], hint: Format, orient: bool) -> Result<RasterImage, DecodeError> {
    if bytes.is_empty() {
        return Err(DecodeError::Empty);
    }
    if hint == Format::Pdf {
        return Err(DecodeError::UnsupportedFormat(hint));
    }

    let mut reader = ImageReader::new(Cursor::new(bytes));
    match hint.image_format() {
        Some(format) => reader.set_format(format),
        None => {
            reader = reader
                .with_guessed_format()
                .map_err(|e| DecodeError::CorruptedFile(e.to_string()))?;
        }
    }

    let img = reader
        .decode()
        .map_err(|e| DecodeError::CorruptedFile(e.to_string()))?;

    let img = if orient {
        apply_orientation(img, extract_orientation(bytes))
    } else {
        img
    };

    Ok(RasterImage::from_rgba_image(img.into_rgba8()))
}

/// Extract EXIF orientation from a JPEG, TIFF, PNG or WebP container.
///
/// Returns `Orientation::Normal` if no EXIF data is found or orientation
/// cannot be determined.
pub fn extract_orientation(bytes: &[u8]) -> Orientation {
    let mut cursor = Cursor::new(bytes);

    match Reader::new().read_from_container(&mut cursor) {
        Ok(exif) => exif
            .get_field(Tag::Orientation, In::PRIMARY)
            .and_then(|field| field.value.get_uint(0))
            .map(Orientation::from)
            .unwrap_or_default(),
        Err(_) => Orientation::Normal,
    }
}

/// Apply EXIF orientation transformation to an image.
fn apply_orientation(img: DynamicImage, orientation: Orientation) -> DynamicImage {
    match orientation {
        Orientation::Normal => img,
        Orientation::FlipHorizontal => img.fliph(),
        Orientation::Rotate180 => img.rotate180(),
        Orientation::FlipVertical => img.flipv(),
        Orientation::Transpose => img.rotate90().fliph(),
        Orientation::Rotate90CW => img.rotate90(),
        Orientation::Transverse => img.rotate270().fliph(),
        Orientation::Rotate270CW => img.rotate270(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::ImageFormat;

    fn encoded(width: u32, height: u32, format: ImageFormat) -> Vec<u8> {
        let img = image::RgbImage::from_fn(width, height, |x, y| {
            image::Rgb([(x * 7 % 256) as u8, (y * 5 % 256) as u8, 90])
        });
        let mut buf = Cursor::new(Vec::new());
        DynamicImage::ImageRgb8(img)
            .write_to(&mut buf, format)
            .unwrap();
        buf.into_inner()
    }

    #[test]
    fn test_decode_jpeg() {
        let bytes = encoded(16, 8, ImageFormat::Jpeg);
        let img = decode(&bytes, Format::Jpeg, true).unwrap();

        assert_eq!((img.width, img.height), (16, 8));
        assert_eq!(img.pixels.len(), 16 * 8 * 4);
        assert!(img.is_opaque());
    }

    #[test]
    fn test_decode_png_and_bmp() {
        for (format, hint) in [(ImageFormat::Png, Format::Png), (ImageFormat::Bmp, Format::Bmp)] {
            let bytes = encoded(5, 7, format);
            let img = decode(&bytes, hint, true).unwrap();
            assert_eq!((img.width, img.height), (5, 7));
            // Lossless formats keep pixel values exactly
            assert_eq!(&img.pixels[0..4], &[0, 0, 90, 255]);
        }
    }

    #[test]
    fn test_decode_unknown_hint_guesses() {
        let bytes = encoded(4, 4, ImageFormat::Png);
        let img = decode(&bytes, Format::Unknown, false).unwrap();
        assert_eq!((img.width, img.height), (4, 4));
    }

    #[test]
    fn test_decode_empty_bytes() {
        assert!(matches!(
            decode(&[], Format::Jpeg, true),
            Err(DecodeError::Empty)
        ));
    }

    #[test]
    fn test_decode_garbage() {
        let result = decode(&[0x00, 0x01, 0x02, 0x03], Format::Unknown, true);
        assert!(matches!(result, Err(DecodeError::CorruptedFile(_))));
    }

    #[test]
    fn test_decode_truncated_jpeg() {
        let bytes = encoded(32, 32, ImageFormat::Jpeg);
        let result = decode(&bytes[..20], Format::Jpeg, true);
        assert!(result.is_err());
    }

    #[test]
    fn test_decode_pdf_rejected() {
        let result = decode(b"%PDF-1.7", Format::Pdf, true);
        assert!(matches!(
            result,
            Err(DecodeError::UnsupportedFormat(Format::Pdf))
        ));
    }

    #[test]
    fn test_orientation_extraction_no_exif() {
        let bytes = encoded(2, 2, ImageFormat::Jpeg);
        assert_eq!(extract_orientation(&bytes), Orientation::Normal);
        assert_eq!(extract_orientation(&[0x00, 0x01, 0x02]), Orientation::Normal);
    }

    #[test]
    fn test_apply_orientation_rotate90() {
        let pixels = vec![
            255, 0, 0, // Red (left)
            0, 255, 0, // Green (right)
        ];
        let img = DynamicImage::ImageRgb8(image::RgbImage::from_raw(2, 1, pixels).unwrap());

        let rotated = apply_orientation(img, Orientation::Rotate90CW).into_rgb8();
        assert_eq!(rotated.dimensions(), (1, 2));
    }

    #[test]
    fn test_apply_orientation_flip_horizontal() {
        let pixels = vec![255, 0, 0, 0, 255, 0];
        let img = DynamicImage::ImageRgb8(image::RgbImage::from_raw(2, 1, pixels).unwrap());

        let flipped = apply_orientation(img, Orientation::FlipHorizontal).into_rgb8();
        assert_eq!(flipped.get_pixel(0, 0).0, [0, 255, 0]);
        assert_eq!(flipped.get_pixel(1, 0).0, [255, 0, 0]);
    }
}
