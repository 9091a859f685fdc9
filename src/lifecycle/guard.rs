/*!
 * Runtime Reference Guards
 *
 * RAII handle on one runtime reference. Communicators, windows, files and
 * requests embed one so the runtime stays up for as long as they do,
 * whatever order they are dropped in.
 */

use super::coordinator::Lifecycle;
use std::time::Instant;
use thiserror::Error;
use tracing::trace;

/// Errors from manual guard operations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum GuardError {
    #[error("Runtime reference already released")]
    AlreadyReleased,
}

pub type GuardResult<T> = Result<T, GuardError>;

/// Guard metadata for observability
#[derive(Debug, Clone)]
pub struct GuardMetadata {
    pub resource_type: &'static str,
    pub creation_time: Instant,
}

impl GuardMetadata {
    #[inline]
    pub fn new(resource_type: &'static str) -> Self {
        Self {
            resource_type,
            creation_time: Instant::now(),
        }
    }

    #[inline]
    pub fn lifetime_micros(&self) -> u64 {
        self.creation_time.elapsed().as_micros() as u64
    }
}

/// Core guard trait
pub trait Guard {
    /// Resource type name for logging/debugging
    fn resource_type(&self) -> &'static str;

    fn metadata(&self) -> &GuardMetadata;

    /// Check if guard still holds its reference
    fn is_active(&self) -> bool;

    /// Manually release the reference
    ///
    /// Returns `Err` if already released
    fn release(&mut self) -> GuardResult<()>;
}

/// One outstanding reference on a [`Lifecycle`]
///
/// Construction acquires, `Clone` acquires again, and the reference is
/// released exactly once: on `release`, `release_early`, or drop.
pub struct RuntimeRef<'a> {
    lifecycle: &'a Lifecycle,
    metadata: GuardMetadata,
    active: bool,
}

impl<'a> RuntimeRef<'a> {
    /// Acquire a reference for a resource of kind `resource_type`
    pub fn new(lifecycle: &'a Lifecycle, resource_type: &'static str) -> Self {
        lifecycle.acquire();
        trace!(resource = resource_type, "Runtime reference guard created");
        Self {
            lifecycle,
            metadata: GuardMetadata::new(resource_type),
            active: true,
        }
    }

    /// Coordinator this reference is held on
    #[inline]
    pub fn lifecycle(&self) -> &'a Lifecycle {
        self.lifecycle
    }

    /// Release without waiting for Drop
    pub fn release_early(mut self) -> GuardResult<()> {
        self.release()
    }
}

impl Guard for RuntimeRef<'_> {
    fn resource_type(&self) -> &'static str {
        self.metadata.resource_type
    }

    fn metadata(&self) -> &GuardMetadata {
        &self.metadata
    }

    fn is_active(&self) -> bool {
        self.active
    }

    fn release(&mut self) -> GuardResult<()> {
        if !self.active {
            return Err(GuardError::AlreadyReleased);
        }
        self.active = false;
        trace!(
            resource = self.metadata.resource_type,
            lifetime_us = self.metadata.lifetime_micros(),
            "Runtime reference guard released"
        );
        self.lifecycle.release();
        Ok(())
    }
}

impl Clone for RuntimeRef<'_> {
    fn clone(&self) -> Self {
        RuntimeRef::new(self.lifecycle, self.metadata.resource_type)
    }
}

impl Drop for RuntimeRef<'_> {
    fn drop(&mut self) {
        if self.active {
            let _ = self.release();
        }
    }
}

impl std::fmt::Debug for RuntimeRef<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RuntimeRef")
            .field("resource_type", &self.metadata.resource_type)
            .field("active", &self.active)
            .finish()
    }
}
