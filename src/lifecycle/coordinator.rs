/*!
 * Lifecycle Coordinator
 *
 * Ties the reference counter to the native runtime:
 *
 * - **Init**: one-time move from unstarted to live, registers the exit
 *   release and runs post-init hooks
 * - **Acquire/Release**: the pair every runtime-backed object wraps around
 *   its own lifetime
 * - **Terminal release**: the release that drops the last reference calls
 *   the native finalize, at most once, unless a fatal unwind is in progress
 * - **Finalize**: explicit shutdown, modelled as release-now plus a
 *   compensating acquire scheduled on the exit stack
 *
 * # Example
 *
 * ```ignore
 * let lifecycle = Lifecycle::builder(LocalRuntime::new()).build();
 * lifecycle.init()?;
 * let comm = RuntimeRef::new(&lifecycle, "communicator");
 * lifecycle.finalize()?;   // deferred: comm still holds a reference
 * drop(comm);              // terminal release, native finalize runs here
 * ```
 */

use super::counter::{CounterState, LifecycleCounter, ReleaseOutcome};
use super::hooks::{ExitHook, ExitHookStack, PostInitHooks, ScriptedExitHooks};
use super::unwind::{PanicProbe, UnwindProbe};
use crate::core::errors::{LifecycleError, LifecycleResult, ThreadLevelInsufficient};
use crate::core::types::{ScopeHandle, ThreadLevel, Vendor};
use crate::native::NativeRuntime;
use serde::Serialize;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use tracing::{debug, error, info, trace, warn};

/// Options for a single initialization
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InitOptions {
    /// `None` uses the non-threaded init call
    pub thread_level: Option<ThreadLevel>,
    /// Register the exit-time release of the runtime's own reference
    pub finalize_at_exit: bool,
}

impl Default for InitOptions {
    fn default() -> Self {
        Self {
            thread_level: None,
            finalize_at_exit: true,
        }
    }
}

impl InitOptions {
    #[inline]
    #[must_use]
    pub fn with_thread_level(mut self, level: ThreadLevel) -> Self {
        self.thread_level = Some(level);
        self
    }

    /// Leave shutdown entirely to an explicit `finalize()`
    #[inline]
    #[must_use]
    pub fn without_finalize_at_exit(mut self) -> Self {
        self.finalize_at_exit = false;
        self
    }
}

/// Point-in-time view of the coordinator
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LifecycleStats {
    pub vendor: Vendor,
    pub counter: CounterState,
    pub acquires: u64,
    pub releases: u64,
    pub unbalanced_releases: u64,
    pub finalize_requested: bool,
    pub finalize_attempts: u64,
    pub finalize_skipped: u64,
}

/// Builder for [`Lifecycle`]
pub struct LifecycleBuilder {
    native: Box<dyn NativeRuntime>,
    exit_hooks: Option<Box<dyn ExitHookStack>>,
    probe: Option<Box<dyn UnwindProbe>>,
}

impl LifecycleBuilder {
    /// Exit stack the coordinator pushes onto (default: in-memory stack)
    #[must_use]
    pub fn with_exit_hooks(mut self, stack: impl ExitHookStack + 'static) -> Self {
        self.exit_hooks = Some(Box::new(stack));
        self
    }

    /// Fatal-unwind probe (default: [`PanicProbe`])
    #[must_use]
    pub fn with_unwind_probe(mut self, probe: impl UnwindProbe + 'static) -> Self {
        self.probe = Some(Box::new(probe));
        self
    }

    pub fn build(self) -> Lifecycle {
        Lifecycle {
            counter: LifecycleCounter::new(),
            native: self.native,
            exit_hooks: self
                .exit_hooks
                .unwrap_or_else(|| Box::new(ScriptedExitHooks::new())),
            probe: self.probe.unwrap_or_else(|| Box::new(PanicProbe)),
            post_init: PostInitHooks::new(),
            init_claimed: AtomicBool::new(false),
            exit_release_registered: AtomicBool::new(false),
            finalize_requested: AtomicBool::new(false),
            terminated: AtomicBool::new(false),
            acquires: AtomicU64::new(0),
            releases: AtomicU64::new(0),
            unbalanced_releases: AtomicU64::new(0),
            finalize_attempts: AtomicU64::new(0),
            finalize_skipped: AtomicU64::new(0),
        }
    }
}

/// Reference-counted shutdown coordinator for one native runtime
pub struct Lifecycle {
    counter: LifecycleCounter,
    native: Box<dyn NativeRuntime>,
    exit_hooks: Box<dyn ExitHookStack>,
    probe: Box<dyn UnwindProbe>,
    post_init: PostInitHooks,
    init_claimed: AtomicBool,
    exit_release_registered: AtomicBool,
    finalize_requested: AtomicBool,
    /// One-shot latch: the terminal shutdown sequence has been entered
    terminated: AtomicBool,
    acquires: AtomicU64,
    releases: AtomicU64,
    unbalanced_releases: AtomicU64,
    finalize_attempts: AtomicU64,
    finalize_skipped: AtomicU64,
}

impl Lifecycle {
    pub fn builder(native: impl NativeRuntime + 'static) -> LifecycleBuilder {
        LifecycleBuilder {
            native: Box::new(native),
            exit_hooks: None,
            probe: None,
        }
    }

    /// Same as `builder`, for an already boxed runtime
    pub fn builder_boxed(native: Box<dyn NativeRuntime>) -> LifecycleBuilder {
        LifecycleBuilder {
            native,
            exit_hooks: None,
            probe: None,
        }
    }

    // ------------------------------------------------------------------
    // Initialization
    // ------------------------------------------------------------------

    /// Non-threaded initialization
    pub fn init(&self) -> LifecycleResult<()> {
        self.init_with(InitOptions::default()).map(|_| ())
    }

    /// Threaded initialization
    ///
    /// Returns the level the runtime actually provided, which may be below
    /// `required`. A shortfall is reported as a warning, not an error.
    pub fn init_thread(&self, required: ThreadLevel) -> LifecycleResult<ThreadLevel> {
        let provided = self.init_with(InitOptions::default().with_thread_level(required))?;
        Ok(provided.unwrap_or(ThreadLevel::Single))
    }

    /// Initialize with explicit options
    ///
    /// Returns the provided thread level when one was requested.
    pub fn init_with(&self, options: InitOptions) -> LifecycleResult<Option<ThreadLevel>> {
        // The claim makes racing initializers fail instead of double-initializing
        if self.init_claimed.swap(true, Ordering::AcqRel) {
            return Err(LifecycleError::AlreadyInitialized);
        }
        if self.native.initialized() {
            warn!("Native runtime was initialized outside the lifecycle coordinator");
            return Err(LifecycleError::AlreadyInitialized);
        }

        let result = match options.thread_level {
            None => self.native.init().map(|()| None),
            Some(required) => self.native.init_thread(required).map(Some),
        };

        let provided = match result {
            Ok(provided) => provided,
            Err(code) => {
                self.init_claimed.store(false, Ordering::Release);
                error!(%code, "Native runtime initialization failed");
                return Err(LifecycleError::InitializationFailed(code));
            }
        };

        if let (Some(required), Some(provided)) = (options.thread_level, provided) {
            if !provided.satisfies(required) {
                let shortfall = ThreadLevelInsufficient { required, provided };
                warn!(
                    code = "thread_level_insufficient",
                    %required,
                    %provided,
                    "{}",
                    shortfall
                );
            }
        }

        let live = self.counter.go_live();

        if options.finalize_at_exit {
            if self.exit_hooks.push(ExitHook::Release) {
                self.exit_release_registered.store(true, Ordering::Release);
            } else {
                warn!("Exit-time release refused by host; call finalize() explicitly");
            }
        }

        info!(
            vendor = %self.native.vendor(),
            thread_level = ?provided,
            references = live,
            finalize_at_exit = options.finalize_at_exit,
            "Runtime initialized"
        );

        let ran = self.post_init.run_all();
        if ran > 0 {
            debug!(hooks = ran, "Post-init hooks complete");
        }

        Ok(provided)
    }

    /// Register a collaborator hook to run after init
    ///
    /// Hooks registered after init has already happened never run.
    pub fn register_post_init_hook<F>(&self, name: &'static str, hook: F)
    where
        F: Fn() + Send + Sync + 'static,
    {
        if self.init_claimed.load(Ordering::Acquire) {
            debug!(hook = name, "Post-init hook registered after initialization; it will not run");
        }
        self.post_init.register(name, hook);
    }

    // ------------------------------------------------------------------
    // Reference protocol
    // ------------------------------------------------------------------

    /// Take a reference on the runtime
    #[inline]
    pub fn acquire(&self) {
        let prev = self.counter.acquire();
        self.acquires.fetch_add(1, Ordering::Relaxed);
        trace!(references = prev + 1, "Runtime reference acquired");
    }

    /// Drop a reference; the last one shuts the runtime down
    ///
    /// Shutdown errors are logged, never propagated: this is also the
    /// path taken by exit hooks and drop glue, where nobody can handle them.
    #[inline]
    pub fn release(&self) {
        let _ = self.release_reference();
    }

    fn release_reference(&self) -> LifecycleResult<()> {
        match self.counter.release() {
            ReleaseOutcome::Retained(remaining) => {
                self.releases.fetch_add(1, Ordering::Relaxed);
                trace!(references = remaining, "Runtime reference released");
                Ok(())
            }
            ReleaseOutcome::Last => {
                self.releases.fetch_add(1, Ordering::Relaxed);
                self.shutdown()
            }
            ReleaseOutcome::Unbalanced(raw) => {
                self.unbalanced_releases.fetch_add(1, Ordering::Relaxed);
                warn!(counter = raw, "Unbalanced runtime release ignored");
                Ok(())
            }
        }
    }

    /// Terminal shutdown sequence, entered by the release that hit zero
    fn shutdown(&self) -> LifecycleResult<()> {
        if !self.native.initialized() {
            error!("Last runtime reference released before initialization");
            return Ok(());
        }
        if self.terminated.swap(true, Ordering::AcqRel) {
            debug!("Terminal release after shutdown; nothing to do");
            return Ok(());
        }
        if self.native.finalized() {
            debug!("Native runtime already finalized");
            return Ok(());
        }

        // Must be checked before the blocking call, never during it
        if self.probe.is_unwinding() {
            self.finalize_skipped.fetch_add(1, Ordering::Relaxed);
            warn!("Fatal unwind in progress; skipping native finalize");
            return Ok(());
        }

        self.finalize_attempts.fetch_add(1, Ordering::Relaxed);
        info!("Last runtime reference released; finalizing native runtime");

        self.native.finalize().map_err(|code| {
            error!(%code, "Native finalize failed");
            LifecycleError::native("finalize", code)
        })
    }

    // ------------------------------------------------------------------
    // Explicit shutdown
    // ------------------------------------------------------------------

    /// Request shutdown now
    ///
    /// Drops the runtime's own reference immediately and schedules a
    /// compensating acquire on the exit stack, so the exit-time release
    /// pushed at init has something to consume. Native finalize happens
    /// here only if no other references are outstanding; otherwise it runs
    /// when the last one is released. No-op before init, idempotent after
    /// the first call.
    pub fn finalize(&self) -> LifecycleResult<()> {
        if self.counter.state() == CounterState::Unstarted || !self.native.initialized() {
            debug!("Finalize requested before initialization; ignoring");
            return Ok(());
        }
        if self.finalize_requested.swap(true, Ordering::AcqRel) {
            debug!("Finalize already requested");
            return Ok(());
        }

        // Push before releasing: the exit stack runs newest first
        if self.exit_release_registered.load(Ordering::Acquire)
            && !self.exit_hooks.push(ExitHook::Acquire)
        {
            error!("Compensating exit acquire refused; exit-time release is now unbalanced");
        }

        self.release_reference()?;

        if !self.native.finalized() && !self.terminated.load(Ordering::Acquire) {
            info!(
                references = ?self.counter.state(),
                "Finalize deferred until outstanding references are released"
            );
        }
        Ok(())
    }

    /// Run exit hooks in the order given
    ///
    /// The process exit stack calls this one hook at a time; embedders
    /// using [`ScriptedExitHooks`] pass its drained hooks.
    pub fn run_exit_hooks(&self, hooks: impl IntoIterator<Item = ExitHook>) {
        for hook in hooks {
            debug!(?hook, "Running exit hook");
            match hook {
                ExitHook::Release => self.release(),
                ExitHook::Acquire => self.acquire(),
            }
        }
    }

    // ------------------------------------------------------------------
    // Queries and pass-throughs
    // ------------------------------------------------------------------

    /// Whether the runtime has been started (ground truth from the runtime)
    #[inline]
    pub fn is_started(&self) -> bool {
        self.native.initialized()
    }

    /// Whether the native finalize has completed
    #[inline]
    pub fn is_finalized(&self) -> bool {
        self.native.finalized()
    }

    /// Terminate every participant in `scope`
    pub fn abort(&self, scope: ScopeHandle, code: i32) -> LifecycleResult<()> {
        warn!(?scope, code, "Abort requested");
        self.native
            .abort(scope, code)
            .map_err(|err| LifecycleError::native("abort", err))
    }

    pub fn query_thread(&self) -> LifecycleResult<ThreadLevel> {
        self.require_started()?;
        self.native
            .query_thread()
            .map_err(|code| LifecycleError::native("query_thread", code))
    }

    pub fn is_thread_main(&self) -> LifecycleResult<bool> {
        self.require_started()?;
        self.native
            .is_thread_main()
            .map_err(|code| LifecycleError::native("is_thread_main", code))
    }

    #[inline]
    fn require_started(&self) -> LifecycleResult<()> {
        if self.native.initialized() {
            Ok(())
        } else {
            Err(LifecycleError::NotInitialized)
        }
    }

    /// Pass-through timer; only meaningful while the runtime is live
    #[inline]
    pub fn wtime(&self) -> f64 {
        self.native.wtime()
    }

    #[inline]
    pub fn wtick(&self) -> f64 {
        self.native.wtick()
    }

    #[inline]
    pub fn vendor(&self) -> Vendor {
        self.native.vendor()
    }

    /// Native runtime this coordinator drives
    #[inline]
    pub fn native(&self) -> &dyn NativeRuntime {
        self.native.as_ref()
    }

    #[inline]
    pub fn counter_state(&self) -> CounterState {
        self.counter.state()
    }

    pub fn stats(&self) -> LifecycleStats {
        LifecycleStats {
            vendor: self.native.vendor(),
            counter: self.counter.state(),
            acquires: self.acquires.load(Ordering::Relaxed),
            releases: self.releases.load(Ordering::Relaxed),
            unbalanced_releases: self.unbalanced_releases.load(Ordering::Relaxed),
            finalize_requested: self.finalize_requested.load(Ordering::Acquire),
            finalize_attempts: self.finalize_attempts.load(Ordering::Relaxed),
            finalize_skipped: self.finalize_skipped.load(Ordering::Relaxed),
        }
    }
}

impl std::fmt::Debug for Lifecycle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Lifecycle")
            .field("vendor", &self.native.vendor())
            .field("counter", &self.counter.state())
            .field("terminated", &self.terminated.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}
