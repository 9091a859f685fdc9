/*!
 * Fatal-Unwind Guard
 *
 * Point-in-time answer to "is this process tearing down because of an
 * unrelated fatal error?". The terminal release asks it right before the
 * blocking finalize call; a collective shutdown issued while the process
 * is crashing would wait on peers that may never arrive.
 *
 * A panic that is caught and recovered from does not count. Exit hooks
 * run after `main` has returned, when `thread::panicking()` is false
 * again, so a panic that escapes `main` is recorded by a [`MainGuard`]
 * dropped during that unwind.
 */

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use tracing::error;

static PROCESS: UnwindState = UnwindState::new();

/// Source of the fatal-unwind answer
pub trait UnwindProbe: Send + Sync {
    fn is_unwinding(&self) -> bool;
}

impl<T: UnwindProbe + ?Sized> UnwindProbe for Arc<T> {
    fn is_unwinding(&self) -> bool {
        (**self).is_unwinding()
    }
}

/// Abnormal-teardown markers
///
/// The process-wide instance backs [`PanicProbe`]; separate instances
/// exist so embedders and tests can observe a teardown in isolation.
#[derive(Debug, Default)]
pub struct UnwindState {
    escaped_main: AtomicBool,
    fatal_teardown: AtomicBool,
}

impl UnwindState {
    pub const fn new() -> Self {
        Self {
            escaped_main: AtomicBool::new(false),
            fatal_teardown: AtomicBool::new(false),
        }
    }

    #[inline]
    pub fn process() -> &'static UnwindState {
        &PROCESS
    }

    /// Current thread is panicking, a panic escaped a guarded `main`, or
    /// a fatal teardown was declared
    pub fn fatal_unwind_in_progress(&self) -> bool {
        thread::panicking()
            || self.escaped_main.load(Ordering::Acquire)
            || self.fatal_teardown.load(Ordering::Acquire)
    }

    /// Declare that the process is going down abnormally
    pub fn mark_fatal_teardown(&self) {
        self.fatal_teardown.store(true, Ordering::Release);
    }

    /// Guard to hold for the whole body of `main`
    pub fn guard_main(&self) -> MainGuard<'_> {
        MainGuard { state: self }
    }
}

impl UnwindProbe for UnwindState {
    fn is_unwinding(&self) -> bool {
        self.fatal_unwind_in_progress()
    }
}

/// Records a panic unwinding past the scope that owns it
///
/// Dropped normally (including after a caught panic) it leaves no trace.
#[must_use = "the guard only observes panics while it is alive"]
#[derive(Debug)]
pub struct MainGuard<'a> {
    state: &'a UnwindState,
}

impl Drop for MainGuard<'_> {
    fn drop(&mut self) {
        if thread::panicking() {
            error!("Panic escaped main; exit-time finalize will be skipped");
            self.state.escaped_main.store(true, Ordering::Release);
        }
    }
}

/// Default probe backed by the process-wide [`UnwindState`]
#[derive(Debug, Default, Clone, Copy)]
pub struct PanicProbe;

impl UnwindProbe for PanicProbe {
    fn is_unwinding(&self) -> bool {
        PROCESS.fatal_unwind_in_progress()
    }
}

pub fn fatal_unwind_in_progress() -> bool {
    PROCESS.fatal_unwind_in_progress()
}

/// Declare a process-wide fatal teardown
///
/// Used by abort paths so exit hooks that run afterwards skip the
/// collective shutdown.
pub fn mark_fatal_teardown() {
    PROCESS.mark_fatal_teardown();
}

/// Guard `main` against the process-wide state
///
/// ```ignore
/// fn main() {
///     let _guard = mpi_lifecycle::guard_main();
///     // ...
/// }
/// ```
pub fn guard_main() -> MainGuard<'static> {
    PROCESS.guard_main()
}

/// Run `body` under a [`guard_main`] guard
pub fn run_main<R>(body: impl FnOnce() -> R) -> R {
    let _guard = guard_main();
    body()
}
