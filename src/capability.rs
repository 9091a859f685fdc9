/*!
 * Accelerator Capability Detection
 *
 * Whether the native runtime can take accelerator (device) memory buffers
 * directly. Resolution order:
 *
 * 1. Explicit override from configuration
 * 2. Vendor probe exposed by the native runtime
 * 3. `false`
 *
 * Detection runs as a post-init hook so the vendor probe sees a live
 * runtime; the answer is cached for the rest of the process.
 */

use crate::native::NativeRuntime;
use serde::Serialize;
use std::sync::OnceLock;
use tracing::debug;

/// Where a detection result came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DetectionSource {
    Override,
    VendorProbe,
    Default,
}

/// Resolved accelerator-memory support
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct AcceleratorSupport {
    pub supported: bool,
    pub source: DetectionSource,
}

/// Resolve support without caching
pub fn detect(override_flag: Option<bool>, native: &dyn NativeRuntime) -> AcceleratorSupport {
    let support = if let Some(supported) = override_flag {
        AcceleratorSupport {
            supported,
            source: DetectionSource::Override,
        }
    } else if let Some(supported) = native.accelerator_support() {
        AcceleratorSupport {
            supported,
            source: DetectionSource::VendorProbe,
        }
    } else {
        AcceleratorSupport {
            supported: false,
            source: DetectionSource::Default,
        }
    };

    debug!(
        vendor = %native.vendor(),
        supported = support.supported,
        source = ?support.source,
        "Accelerator memory support resolved"
    );
    support
}

/// Detect-once cache
#[derive(Debug, Default)]
pub struct AcceleratorCapability {
    resolved: OnceLock<AcceleratorSupport>,
}

impl AcceleratorCapability {
    pub const fn new() -> Self {
        Self {
            resolved: OnceLock::new(),
        }
    }

    /// Cached answer, detecting on first use
    pub fn get_or_detect(
        &self,
        override_flag: Option<bool>,
        native: &dyn NativeRuntime,
    ) -> AcceleratorSupport {
        *self
            .resolved
            .get_or_init(|| detect(override_flag, native))
    }

    /// Cached answer if detection already ran
    pub fn cached(&self) -> Option<AcceleratorSupport> {
        self.resolved.get().copied()
    }
}
