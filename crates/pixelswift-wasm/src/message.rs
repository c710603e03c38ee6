//! Worker protocol messages as plain JavaScript objects.
//!
//! Mirrors [`pixelswift_core::WorkerMessage`]'s wire shape, except that the
//! output buffer is handed over as a `Uint8Array` so the JS worker can
//! transfer it to the main thread without copying.

use js_sys::{Object, Reflect, Uint8Array};
use pixelswift_core::{CorrelationId, JobError, ProcessResult};
use wasm_bindgen::prelude::*;

fn set(target: &Object, key: &str, value: &JsValue) {
    // Reflect::set only fails on frozen objects or proxies
    let _ = Reflect::set(target, &JsValue::from_str(key), value);
}

fn envelope(id: CorrelationId, kind: &str) -> Object {
    let message = Object::new();
    set(&message, "id", &JsValue::from_f64(id.get() as f64));
    set(&message, "type", &JsValue::from_str(kind));
    message
}

/// `{id, type: "progress", progress}`
pub(crate) fn progress(id: CorrelationId, pct: u8) -> Object {
    let message = envelope(id, "progress");
    set(&message, "progress", &JsValue::from(pct));
    message
}

/// `{id, type: "complete", result: {buffer, width, height, format, ...}}`
pub(crate) fn complete(id: CorrelationId, result: ProcessResult) -> Object {
    let payload = Object::new();
    set(&payload, "width", &JsValue::from(result.width));
    set(&payload, "height", &JsValue::from(result.height));
    set(&payload, "format", &JsValue::from_str(result.format.extension()));
    set(&payload, "mimeType", &JsValue::from_str(result.format.mime_type()));
    set(
        &payload,
        "originalSize",
        &JsValue::from_f64(result.original_size as f64),
    );
    set(
        &payload,
        "processedSize",
        &JsValue::from_f64(result.processed_size() as f64),
    );
    set(&payload, "durationMs", &JsValue::from_f64(result.duration_ms));
    let buffer = Uint8Array::from(result.output.as_slice());
    set(&payload, "buffer", &buffer.into());

    let message = envelope(id, "complete");
    set(&message, "result", &payload.into());
    message
}

/// `{id, type: "error", error, kind}`
pub(crate) fn error(id: CorrelationId, error: &JobError) -> Object {
    let message = envelope(id, "error");
    set(&message, "error", &JsValue::from_str(&error.to_string()));
    set(&message, "kind", &JsValue::from_str(error.kind_str()));
    message
}
