//! Download file names for transcoded output.

use crate::format::Format;
use crate::request::Operation;

/// Name for a single transcoded file.
///
/// The last extension of `original` is replaced:
/// - convert: `base.ext`
/// - compress: `base_compressed.ext`
/// - resize: `base_{w}x{h}.ext`, or `base_resized.ext` without dimensions
///
/// `ext` is the output format's extension, else the original's, else `jpg`.
pub fn suggested_file_name(
    original: &str,
    operation: Operation,
    format: Option<Format>,
    dimensions: Option<(u32, u32)>,
) -> String {
    let (base, original_ext) = split_extension(original);

    let ext = match format {
        Some(f) if f != Format::Unknown => f.extension(),
        _ => original_ext.unwrap_or("jpg"),
    };

    match operation {
        Operation::Convert => format!("{base}.{ext}"),
        Operation::Compress => format!("{base}_compressed.{ext}"),
        Operation::Resize => match dimensions {
            Some((w, h)) if w > 0 && h > 0 => format!("{base}_{w}x{h}.{ext}"),
            _ => format!("{base}_resized.{ext}"),
        },
    }
}

/// Zip name for a batch download: `pixelswift_{operation}_{YYYYMMDD}.zip`.
pub fn batch_archive_name(operation: Operation, (year, month, day): (u16, u8, u8)) -> String {
    format!("pixelswift_{operation}_{year:04}{month:02}{day:02}.zip")
}

/// Split off the last `.ext`, if there is a non-empty one.
fn split_extension(name: &str) -> (&str, Option<&str>) {
    match name.rsplit_once('.') {
        Some((base, ext)) if !ext.is_empty() => (base, Some(ext)),
        _ => (name, None),
    }
}
