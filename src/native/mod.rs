/*!
 * Native Runtime Boundary
 *
 * The handful of native message-passing calls the lifecycle layer needs.
 * Everything else (point-to-point, collectives, one-sided, file I/O) lives
 * in collaborators that only touch acquire/release and the queries below.
 *
 * ## Backends
 *
 * - **LocalRuntime**: in-process world of size one, always available
 * - **MpichRuntime**: libmpich bindings (`mpich` feature)
 */

mod local;
#[cfg(feature = "mpich")]
mod mpich;

pub use local::{LocalRuntime, LocalRuntimeStats};
#[cfg(feature = "mpich")]
pub use mpich::MpichRuntime;

use crate::core::types::{ErrorCode, ScopeHandle, ThreadLevel, Vendor};

/// Native runtime calls used by the lifecycle coordinator
///
/// Implementations must be callable from any thread. `finalize` may block
/// (it can act as a barrier across cooperating processes).
pub trait NativeRuntime: Send + Sync {
    /// Which runtime implementation this is
    fn vendor(&self) -> Vendor;

    /// Non-threaded initialization
    fn init(&self) -> Result<(), ErrorCode>;

    /// Threaded initialization, returns the level actually provided
    fn init_thread(&self, required: ThreadLevel) -> Result<ThreadLevel, ErrorCode>;

    /// Thread level currently in effect
    fn query_thread(&self) -> Result<ThreadLevel, ErrorCode>;

    /// Whether the calling thread is the one that initialized the runtime
    fn is_thread_main(&self) -> Result<bool, ErrorCode>;

    /// Collective shutdown
    fn finalize(&self) -> Result<(), ErrorCode>;

    /// Terminate every participant in `scope`
    fn abort(&self, scope: ScopeHandle, code: i32) -> Result<(), ErrorCode>;

    /// Ground-truth initialization flag
    fn initialized(&self) -> bool;

    /// Ground-truth finalization flag
    fn finalized(&self) -> bool;

    /// Wall-clock seconds since an arbitrary origin
    fn wtime(&self) -> f64;

    /// Resolution of `wtime` in seconds
    fn wtick(&self) -> f64;

    /// Vendor-specific accelerator-memory probe
    ///
    /// `None` when the runtime has no way to report it.
    fn accelerator_support(&self) -> Option<bool> {
        None
    }
}

impl<T: NativeRuntime + ?Sized> NativeRuntime for std::sync::Arc<T> {
    fn vendor(&self) -> Vendor {
        (**self).vendor()
    }

    fn init(&self) -> Result<(), ErrorCode> {
        (**self).init()
    }

    fn init_thread(&self, required: ThreadLevel) -> Result<ThreadLevel, ErrorCode> {
        (**self).init_thread(required)
    }

    fn query_thread(&self) -> Result<ThreadLevel, ErrorCode> {
        (**self).query_thread()
    }

    fn is_thread_main(&self) -> Result<bool, ErrorCode> {
        (**self).is_thread_main()
    }

    fn finalize(&self) -> Result<(), ErrorCode> {
        (**self).finalize()
    }

    fn abort(&self, scope: ScopeHandle, code: i32) -> Result<(), ErrorCode> {
        (**self).abort(scope, code)
    }

    fn initialized(&self) -> bool {
        (**self).initialized()
    }

    fn finalized(&self) -> bool {
        (**self).finalized()
    }

    fn wtime(&self) -> f64 {
        (**self).wtime()
    }

    fn wtick(&self) -> f64 {
        (**self).wtick()
    }

    fn accelerator_support(&self) -> Option<bool> {
        (**self).accelerator_support()
    }
}

/// Backend used when nothing else was installed
#[cfg(feature = "mpich")]
pub fn default_runtime() -> Box<dyn NativeRuntime> {
    Box::new(MpichRuntime::new())
}

/// Backend used when nothing else was installed
#[cfg(not(feature = "mpich"))]
pub fn default_runtime() -> Box<dyn NativeRuntime> {
    Box::new(LocalRuntime::new())
}
