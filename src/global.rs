/*!
 * Process-Wide Runtime
 *
 * The one coordinator every runtime-backed object in the process shares.
 * It is created on first use with the default native backend unless
 * another backend was installed first, and its exit hooks go onto the
 * C runtime's `atexit` stack.
 */

use crate::capability::{AcceleratorCapability, AcceleratorSupport};
use crate::config::LifecycleConfig;
use crate::core::errors::{LifecycleError, LifecycleResult};
use crate::core::types::{ScopeHandle, ThreadLevel};
use crate::lifecycle::{
    ExitHook, ExitHookStack, InitOptions, Lifecycle, LifecycleStats, PanicProbe, RuntimeRef,
};
use crate::native::{self, NativeRuntime};
use std::panic::{self, AssertUnwindSafe};
use std::sync::OnceLock;
use tracing::{debug, error};

static RUNTIME: OnceLock<Lifecycle> = OnceLock::new();
static CONFIG: OnceLock<LifecycleConfig> = OnceLock::new();
static ACCELERATOR: AcceleratorCapability = AcceleratorCapability::new();

/// Exit stack backed by `atexit(3)`
#[derive(Debug, Default, Clone, Copy)]
pub struct ProcessExitHooks;

extern "C" fn release_at_exit() {
    run_at_exit(ExitHook::Release);
}

extern "C" fn acquire_at_exit() {
    run_at_exit(ExitHook::Acquire);
}

fn run_at_exit(hook: ExitHook) {
    // Unwinding out of an extern "C" fn aborts; nothing may escape here
    let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
        if let Some(lifecycle) = RUNTIME.get() {
            lifecycle.run_exit_hooks([hook]);
        }
    }));
    if outcome.is_err() {
        error!(?hook, "Exit hook panicked");
    }
}

impl ExitHookStack for ProcessExitHooks {
    fn push(&self, hook: ExitHook) -> bool {
        let callback: extern "C" fn() = match hook {
            ExitHook::Release => release_at_exit,
            ExitHook::Acquire => acquire_at_exit,
        };
        // SAFETY: registering a plain function pointer; atexit has no other
        // preconditions.
        let status = unsafe { libc::atexit(callback) };
        if status != 0 {
            error!(?hook, status, "Failed to register exit hook");
            return false;
        }
        debug!(?hook, "Exit hook registered");
        true
    }
}

fn build(native: Box<dyn NativeRuntime>) -> Lifecycle {
    let lifecycle = Lifecycle::builder_boxed(native)
        .with_exit_hooks(ProcessExitHooks)
        .with_unwind_probe(PanicProbe)
        .build();

    lifecycle.register_post_init_hook("accelerator-capability", || {
        if let Some(lifecycle) = RUNTIME.get() {
            ACCELERATOR.get_or_detect(config().accelerator_override, lifecycle.native());
        }
    });

    lifecycle
}

/// The process-wide coordinator
pub fn runtime() -> &'static Lifecycle {
    RUNTIME.get_or_init(|| build(native::default_runtime()))
}

/// Use `native` as the process backend
///
/// Must happen before anything touches the global coordinator; fails with
/// `AlreadyInitialized` otherwise.
pub fn install_runtime(native: impl NativeRuntime + 'static) -> LifecycleResult<()> {
    let mut candidate = Some(Box::new(native) as Box<dyn NativeRuntime>);
    RUNTIME.get_or_init(|| build(candidate.take().unwrap_or_else(native::default_runtime)));
    if candidate.is_some() {
        return Err(LifecycleError::AlreadyInitialized);
    }
    Ok(())
}

/// Configuration read from the environment on first use
pub fn config() -> &'static LifecycleConfig {
    CONFIG.get_or_init(LifecycleConfig::from_env)
}

pub fn init() -> LifecycleResult<()> {
    runtime().init()
}

pub fn init_thread(required: ThreadLevel) -> LifecycleResult<ThreadLevel> {
    runtime().init_thread(required)
}

pub fn init_with(options: InitOptions) -> LifecycleResult<Option<ThreadLevel>> {
    runtime().init_with(options)
}

/// Initialize using the thread level and exit behaviour from the environment
pub fn init_from_env() -> LifecycleResult<ThreadLevel> {
    let options = config().init_options();
    let provided = runtime().init_with(options)?;
    Ok(provided.unwrap_or(ThreadLevel::Single))
}

pub fn finalize() -> LifecycleResult<()> {
    runtime().finalize()
}

#[inline]
pub fn acquire() {
    runtime().acquire()
}

#[inline]
pub fn release() {
    runtime().release()
}

/// RAII reference on the process-wide runtime
pub fn runtime_ref(resource_type: &'static str) -> RuntimeRef<'static> {
    RuntimeRef::new(runtime(), resource_type)
}

pub fn is_started() -> bool {
    runtime().is_started()
}

pub fn is_finalized() -> bool {
    runtime().is_finalized()
}

pub fn abort(scope: ScopeHandle, code: i32) -> LifecycleResult<()> {
    runtime().abort(scope, code)
}

pub fn query_thread() -> LifecycleResult<ThreadLevel> {
    runtime().query_thread()
}

pub fn is_thread_main() -> LifecycleResult<bool> {
    runtime().is_thread_main()
}

pub fn wtime() -> f64 {
    runtime().wtime()
}

pub fn wtick() -> f64 {
    runtime().wtick()
}

pub fn register_post_init_hook<F>(name: &'static str, hook: F)
where
    F: Fn() + Send + Sync + 'static,
{
    runtime().register_post_init_hook(name, hook)
}

/// Accelerator-memory support, detecting now if init has not done so yet
pub fn has_accelerator_memory() -> AcceleratorSupport {
    ACCELERATOR.get_or_detect(config().accelerator_override, runtime().native())
}

pub fn stats() -> LifecycleStats {
    runtime().stats()
}
