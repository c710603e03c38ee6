//! PixelSwift WASM - WebAssembly bindings for PixelSwift
//!
//! This crate exposes the pixelswift-core transcoder to the browser Web
//! Worker that runs image jobs off the main thread.
//!
//! # Module Structure
//!
//! - `transcoder` - The [`WasmTranscoder`] job runner
//! - `message` - `{id, type, ...}` protocol messages as JS objects
//! - `naming` - Format sniffing and download file names
//!
//! # Usage
//!
//! ```typescript
//! import init, { WasmTranscoder, detect_format } from '@pixelswift/wasm';
//!
//! // Initialize WASM module (must call first)
//! await init();
//!
//! const bytes = new Uint8Array(await file.arrayBuffer());
//! console.log(`Detected ${detect_format(bytes, file.name)}`);
//! ```

use wasm_bindgen::prelude::*;

mod message;
mod naming;
mod transcoder;

pub use naming::{
    batch_archive_name, detect_format, is_supported_input, mime_type, suggested_file_name,
};
pub use transcoder::WasmTranscoder;

/// Initialize the WASM module (called automatically on load).
///
/// Routes core log records to the browser console and installs a panic
/// hook so panics show a readable message instead of `unreachable`.
#[wasm_bindgen(start)]
pub fn init() {
    console_error_panic_hook::set_once();
    wasm_logger::init(wasm_logger::Config::new(log::Level::Info));
}

/// Get the version of the WASM module
#[wasm_bindgen]
pub fn version() -> String {
    pixelswift_core::VERSION.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!version().is_empty());
        assert_eq!(version(), env!("CARGO_PKG_VERSION"));
    }
}
