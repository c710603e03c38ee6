//! Format sniffing and file naming bindings.

use pixelswift_core::{format, naming, Format};
use wasm_bindgen::prelude::*;

use crate::transcoder::parse_action;

/// Detect the format of a file from its leading bytes.
///
/// Falls back to the extension of `file_name` when no signature matches.
/// Returns the canonical extension (`"jpg"`, `"png"`, ...) or `"unknown"`.
#[wasm_bindgen]
pub fn detect_format(bytes: &[u8], file_name: Option<String>) -> String {
    format::detect(bytes, file_name.as_deref())
        .extension()
        .to_string()
}

/// Whether the file looks like an image the transcoder can read.
#[wasm_bindgen]
pub fn is_supported_input(bytes: &[u8], file_name: Option<String>) -> bool {
    format::detect(bytes, file_name.as_deref()).is_supported_input()
}

/// MIME type for an extension or format name, for download blobs.
#[wasm_bindgen]
pub fn mime_type(format: &str) -> String {
    Format::from_extension(format).mime_type().to_string()
}

/// Download name for a transcoded file.
///
/// # Errors
///
/// Returns an error for an unknown action.
#[wasm_bindgen]
pub fn suggested_file_name(
    original: &str,
    action: &str,
    format: Option<String>,
    width: Option<u32>,
    height: Option<u32>,
) -> Result<String, JsValue> {
    let operation = parse_action(action).map_err(|e| JsValue::from_str(&e))?;
    let format = format.as_deref().map(Format::from_extension);
    let dimensions = width.zip(height);
    Ok(naming::suggested_file_name(
        original, operation, format, dimensions,
    ))
}

/// Zip name for a batch download, dated today (UTC).
///
/// # Errors
///
/// Returns an error for an unknown action.
#[wasm_bindgen]
pub fn batch_archive_name(action: &str) -> Result<String, JsValue> {
    let operation = parse_action(action).map_err(|e| JsValue::from_str(&e))?;
    let now = js_sys::Date::new_0();
    let date = (
        now.get_utc_full_year() as u16,
        (now.get_utc_month() + 1) as u8,
        now.get_utc_date() as u8,
    );
    Ok(naming::batch_archive_name(operation, date))
}
