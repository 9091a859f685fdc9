/*!
 * MPI Lifecycle
 *
 * Process-wide init/finalize coordination for a native message-passing
 * runtime. The runtime is initialized once and finalized once, after
 * every communicator, window, file and request backed by it has let go,
 * and never from a process that is already crashing.
 *
 * ```ignore
 * let _guard = mpi_lifecycle::guard_main();
 * mpi_lifecycle::init_thread(ThreadLevel::Multiple)?;
 * let comm = mpi_lifecycle::runtime_ref("communicator");
 * // ...
 * mpi_lifecycle::finalize()?;   // native finalize waits for `comm`
 * ```
 */

pub mod capability;
pub mod config;
pub mod core;
pub mod global;
pub mod lifecycle;
pub mod monitoring;
pub mod native;

// Re-exports
pub use crate::core::{ErrorCode, LifecycleError, LifecycleResult, ScopeHandle, ThreadLevel, Vendor};
pub use capability::{AcceleratorSupport, DetectionSource};
pub use config::LifecycleConfig;
pub use global::{
    abort, acquire, config as lifecycle_config, finalize, has_accelerator_memory, init,
    init_from_env, init_thread, init_with, install_runtime, is_finalized, is_started,
    is_thread_main, query_thread, register_post_init_hook, release, runtime, runtime_ref, stats,
    wtick, wtime, ProcessExitHooks,
};
pub use lifecycle::{
    guard_main, run_main, CounterState, ExitHook, ExitHookStack, Guard, InitOptions, Lifecycle,
    LifecycleStats, MainGuard, PanicProbe, RuntimeRef, ScriptedExitHooks, UnwindProbe,
};
pub use monitoring::init_tracing;
pub use native::{LocalRuntime, NativeRuntime};
