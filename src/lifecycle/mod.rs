/*!
 * Runtime Lifecycle
 *
 * Reference-counted init/finalize coordination for the native runtime.
 *
 * ## Components
 *
 * - **LifecycleCounter**: the single atomic integer holding the state
 * - **Lifecycle**: init entry points, acquire/release, explicit finalize
 * - **Hooks**: post-init collaborator hooks and the host exit stack
 * - **Unwind guard**: skips the blocking finalize during a fatal unwind
 * - **RuntimeRef**: RAII reference for runtime-backed objects
 */

mod coordinator;
pub mod counter;
mod guard;
pub mod hooks;
pub mod unwind;

pub use coordinator::{InitOptions, Lifecycle, LifecycleBuilder, LifecycleStats};
pub use counter::{CounterState, LifecycleCounter, ReleaseOutcome, UNSTARTED};
pub use guard::{Guard, GuardError, GuardMetadata, GuardResult, RuntimeRef};
pub use hooks::{ExitHook, ExitHookStack, PostInitHook, PostInitHooks, ScriptedExitHooks};
pub use unwind::{guard_main, run_main, MainGuard, PanicProbe, UnwindProbe, UnwindState};
