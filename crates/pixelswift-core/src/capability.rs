//! Runtime capability probing.
//!
//! The only capability the transcoder needs to know about is whether the
//! native pipeline truthfully encodes WebP. The answer is probed once and
//! memoized in a [`CapabilityCache`] for the life of the process.
//!
//! Probes are not serialized: two jobs racing on a cold cache may both
//! probe, but the probe is idempotent and the first stored answer wins, so
//! every reader observes the same value.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, LazyLock};

use log::debug;

use crate::decode::RasterImage;
use crate::format::Format;
use crate::native::NativePipeline;

const UNSET: u8 = 0;
const UNSUPPORTED: u8 = 1;
const SUPPORTED: u8 = 2;

static GLOBAL: LazyLock<Arc<CapabilityCache>> = LazyLock::new(|| Arc::new(CapabilityCache::new()));

/// Write-once memo of the native WebP encode capability.
#[derive(Debug, Default)]
pub struct CapabilityCache {
    webp_encode: AtomicU8,
}

impl CapabilityCache {
    /// An empty cache. Most callers want [`CapabilityCache::global`].
    pub const fn new() -> Self {
        Self {
            webp_encode: AtomicU8::new(UNSET),
        }
    }

    /// The canonical per-process cache.
    pub fn global() -> Arc<CapabilityCache> {
        Arc::clone(&GLOBAL)
    }

    /// The cached answer, if a probe has completed.
    pub fn cached(&self) -> Option<bool> {
        match self.webp_encode.load(Ordering::Acquire) {
            SUPPORTED => Some(true),
            UNSUPPORTED => Some(false),
            _ => None,
        }
    }

    /// Whether `pipeline` can encode WebP natively, probing on first use.
    pub fn supports_native_webp_encode(&self, pipeline: &dyn NativePipeline) -> bool {
        if let Some(supported) = self.cached() {
            return supported;
        }

        let probed = probe_native_webp(pipeline);
        let value = if probed { SUPPORTED } else { UNSUPPORTED };

        match self
            .webp_encode
            .compare_exchange(UNSET, value, Ordering::AcqRel, Ordering::Acquire)
        {
            Ok(_) => {
                debug!(
                    "native WebP encode via {}: {}",
                    pipeline.name(),
                    if probed { "supported" } else { "unsupported" }
                );
                probed
            }
            // Another probe finished first; its answer is the cached one
            Err(existing) => existing == SUPPORTED,
        }
    }
}

/// Encode a 1x1 surface as WebP and check what the host declares.
///
/// Hosts may silently substitute another format instead of failing, so the
/// declared format is the signal, not the absence of an error. Errors and
/// panics count as unsupported.
pub fn probe_native_webp(pipeline: &dyn NativePipeline) -> bool {
    let surface = RasterImage::filled(1, 1, [255, 0, 0, 255]);

    match catch_unwind(AssertUnwindSafe(|| pipeline.encode(&surface, Format::WebP, 50))) {
        Ok(Ok(blob)) => blob.format == Format::WebP,
        Ok(Err(e)) => {
            debug!("WebP probe on {} failed: {e}", pipeline.name());
            false
        }
        Err(_) => {
            debug!("WebP probe on {} panicked", pipeline.name());
            false
        }
    }
}
