//! Transcoder bindings for the browser Web Worker.
//!
//! The JS worker owns the message loop: it receives `{id, action, buffer,
//! options}` from the main thread, calls [`WasmTranscoder::process`] and
//! posts back whatever that returns. Jobs run synchronously inside the
//! worker, one at a time, so arrival order is execution order.
//!
//! # Example
//!
//! ```typescript
//! import init, { WasmTranscoder } from '@pixelswift/wasm';
//!
//! await init();
//! const transcoder = new WasmTranscoder({ defaultQuality: 85 });
//!
//! self.onmessage = (e) => {
//!   const { id, action, buffer, options, fileName } = e.data;
//!   const message = transcoder.process(id, action, new Uint8Array(buffer), options,
//!     (progress) => postMessage(progress), fileName);
//!   const transfer = message.type === 'complete' ? [message.result.buffer.buffer] : [];
//!   postMessage(message, transfer);
//! };
//! ```

use js_sys::Function;
use pixelswift_core::{
    CorrelationId, JobError, Operation, ProcessOptions, ProcessRequest, TranscodeConfig,
    Transcoder,
};
use wasm_bindgen::prelude::*;

use crate::message;

/// Parse the worker's `action` string.
pub(crate) fn parse_action(action: &str) -> Result<Operation, String> {
    Operation::parse(action).ok_or_else(|| format!("Unknown action: {action}"))
}

/// A transcoder configured once per worker.
#[wasm_bindgen]
pub struct WasmTranscoder {
    inner: Transcoder,
}

#[wasm_bindgen]
impl WasmTranscoder {
    /// Create a transcoder from a config object. Omitted keys (or an
    /// omitted object) take the defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if the config has unknown value types or fails
    /// validation.
    #[wasm_bindgen(constructor)]
    pub fn new(config: JsValue) -> Result<WasmTranscoder, JsValue> {
        let config: TranscodeConfig = if config.is_undefined() || config.is_null() {
            TranscodeConfig::default()
        } else {
            serde_wasm_bindgen::from_value(config)
                .map_err(|e| JsValue::from_str(&format!("Invalid config: {}", e)))?
        };

        let inner = Transcoder::new(config)
            .map_err(|e| JsValue::from_str(&e.to_string()))?
            .with_clock(js_sys::Date::now);

        Ok(WasmTranscoder { inner })
    }

    /// Run one job and return its terminal protocol message.
    ///
    /// # Arguments
    ///
    /// * `id` - Correlation id assigned by the main thread
    /// * `action` - `"convert"`, `"compress"` or `"resize"`
    /// * `buffer` - Source file bytes
    /// * `options` - `{outputFormat?, quality?, width?, height?, keepAspectRatio?}`
    /// * `on_progress` - Called with each `{id, type: "progress", progress}` message
    /// * `file_name` - Original file name; its extension identifies sources
    ///   with no recognizable signature
    ///
    /// Job failures are returned as `{type: "error"}` messages, not thrown.
    ///
    /// # Errors
    ///
    /// Throws only for an unknown action or malformed options.
    pub fn process(
        &self,
        id: u32,
        action: &str,
        buffer: Vec<u8>,
        options: JsValue,
        on_progress: Option<Function>,
        file_name: Option<String>,
    ) -> Result<JsValue, JsValue> {
        let operation = parse_action(action).map_err(|e| JsValue::from_str(&e))?;
        let options: ProcessOptions = if options.is_undefined() || options.is_null() {
            ProcessOptions::default()
        } else {
            serde_wasm_bindgen::from_value(options)
                .map_err(|e| JsValue::from_str(&format!("Invalid options: {}", e)))?
        };

        let id = CorrelationId::from_raw(id as u64);
        let mut request = ProcessRequest::with_id(id, operation, buffer, options);
        if let Some(name) = file_name {
            request = request.with_file_name(name);
        }

        let mut report = |pct: u8| {
            if let Some(callback) = &on_progress {
                if let Err(e) = callback.call1(&JsValue::NULL, &message::progress(id, pct)) {
                    log::warn!("progress callback for {id} threw: {:?}", e);
                }
            }
        };

        let reply = match self.inner.process_with_progress(request, &mut report) {
            Ok(result) => message::complete(id, result),
            Err(e) => message::error(id, &JobError::from(e)),
        };
        Ok(reply.into())
    }

    /// Default quality applied when a job doesn't set one.
    #[wasm_bindgen(getter, js_name = defaultQuality)]
    pub fn default_quality(&self) -> u8 {
        self.inner.config().default_quality
    }
}
