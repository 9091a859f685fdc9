/*!
 * Local Runtime
 *
 * In-process runtime with a world of exactly one participant. Used when no
 * native library is linked, and as the reference behaviour for the
 * lifecycle layer's bookkeeping.
 */

use super::NativeRuntime;
use crate::core::types::{ErrorCode, ScopeHandle, ThreadLevel, Vendor};
use crate::lifecycle::unwind;
use parking_lot::Mutex;
use serde::Serialize;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::thread::{self, ThreadId};
use std::time::Instant;
use tracing::{debug, error};

/// Call statistics for the local runtime
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct LocalRuntimeStats {
    pub init_calls: u64,
    pub finalize_calls: u64,
    pub abort_calls: u64,
}

struct Session {
    main_thread: ThreadId,
    provided: ThreadLevel,
}

/// Single-participant runtime living entirely inside this process
pub struct LocalRuntime {
    epoch: Instant,
    max_level: ThreadLevel,
    initialized: AtomicBool,
    finalized: AtomicBool,
    session: Mutex<Option<Session>>,
    init_calls: AtomicU64,
    finalize_calls: AtomicU64,
    abort_calls: AtomicU64,
}

impl LocalRuntime {
    /// Create a runtime that can provide every thread level
    pub fn new() -> Self {
        Self::with_max_thread_level(ThreadLevel::Multiple)
    }

    /// Create a runtime whose thread support is capped at `max_level`
    pub fn with_max_thread_level(max_level: ThreadLevel) -> Self {
        Self {
            epoch: Instant::now(),
            max_level,
            initialized: AtomicBool::new(false),
            finalized: AtomicBool::new(false),
            session: Mutex::new(None),
            init_calls: AtomicU64::new(0),
            finalize_calls: AtomicU64::new(0),
            abort_calls: AtomicU64::new(0),
        }
    }

    #[inline]
    pub fn max_thread_level(&self) -> ThreadLevel {
        self.max_level
    }

    pub fn stats(&self) -> LocalRuntimeStats {
        LocalRuntimeStats {
            init_calls: self.init_calls.load(Ordering::Relaxed),
            finalize_calls: self.finalize_calls.load(Ordering::Relaxed),
            abort_calls: self.abort_calls.load(Ordering::Relaxed),
        }
    }

    fn start(&self, provided: ThreadLevel) -> Result<ThreadLevel, ErrorCode> {
        self.init_calls.fetch_add(1, Ordering::Relaxed);

        let mut session = self.session.lock();
        if session.is_some() || self.finalized.load(Ordering::Acquire) {
            return Err(ErrorCode::OTHER);
        }
        *session = Some(Session {
            main_thread: thread::current().id(),
            provided,
        });
        self.initialized.store(true, Ordering::Release);

        debug!(provided = %provided, "Local runtime started");
        Ok(provided)
    }

    fn with_session<T>(&self, f: impl FnOnce(&Session) -> T) -> Result<T, ErrorCode> {
        match self.session.lock().as_ref() {
            Some(session) if !self.finalized.load(Ordering::Acquire) => Ok(f(session)),
            _ => Err(ErrorCode::OTHER),
        }
    }
}

impl Default for LocalRuntime {
    fn default() -> Self {
        Self::new()
    }
}

impl NativeRuntime for LocalRuntime {
    fn vendor(&self) -> Vendor {
        Vendor::Local
    }

    fn init(&self) -> Result<(), ErrorCode> {
        self.start(ThreadLevel::Single).map(|_| ())
    }

    fn init_thread(&self, required: ThreadLevel) -> Result<ThreadLevel, ErrorCode> {
        self.start(required.min(self.max_level))
    }

    fn query_thread(&self) -> Result<ThreadLevel, ErrorCode> {
        self.with_session(|session| session.provided)
    }

    fn is_thread_main(&self) -> Result<bool, ErrorCode> {
        self.with_session(|session| session.main_thread == thread::current().id())
    }

    fn finalize(&self) -> Result<(), ErrorCode> {
        self.finalize_calls.fetch_add(1, Ordering::Relaxed);

        if !self.initialized.load(Ordering::Acquire) {
            return Err(ErrorCode::OTHER);
        }
        if self.finalized.swap(true, Ordering::AcqRel) {
            return Err(ErrorCode::OTHER);
        }

        debug!("Local runtime finalized");
        Ok(())
    }

    fn abort(&self, scope: ScopeHandle, code: i32) -> Result<(), ErrorCode> {
        self.abort_calls.fetch_add(1, Ordering::Relaxed);

        if let ScopeHandle::Raw(raw) = scope {
            debug!(raw, "Abort requested on unknown scope");
            return Err(ErrorCode::COMM);
        }

        // World and Process coincide when there is a single participant
        error!(?scope, code, "Aborting local runtime");
        unwind::mark_fatal_teardown();
        std::process::exit(code)
    }

    fn initialized(&self) -> bool {
        self.initialized.load(Ordering::Acquire)
    }

    fn finalized(&self) -> bool {
        self.finalized.load(Ordering::Acquire)
    }

    fn wtime(&self) -> f64 {
        self.epoch.elapsed().as_secs_f64()
    }

    fn wtick(&self) -> f64 {
        1e-9
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_local_lifecycle() {
        let runtime = LocalRuntime::new();
        assert!(!runtime.initialized());
        assert!(!runtime.finalized());
        assert_eq!(runtime.query_thread(), Err(ErrorCode::OTHER));

        runtime.init().unwrap();
        assert!(runtime.initialized());
        assert_eq!(runtime.query_thread(), Ok(ThreadLevel::Single));
        assert_eq!(runtime.is_thread_main(), Ok(true));

        runtime.finalize().unwrap();
        assert!(runtime.initialized());
        assert!(runtime.finalized());
        assert_eq!(runtime.finalize(), Err(ErrorCode::OTHER));
        assert_eq!(runtime.stats().finalize_calls, 2);
    }

    #[test]
    fn test_local_rejects_second_init() {
        let runtime = LocalRuntime::new();
        runtime.init().unwrap();
        assert_eq!(runtime.init(), Err(ErrorCode::OTHER));
        assert_eq!(
            runtime.init_thread(ThreadLevel::Multiple),
            Err(ErrorCode::OTHER)
        );
        assert_eq!(runtime.stats().init_calls, 3);
    }

    #[test]
    fn test_local_caps_thread_level() {
        let runtime = LocalRuntime::with_max_thread_level(ThreadLevel::Funneled);
        assert_eq!(
            runtime.init_thread(ThreadLevel::Multiple),
            Ok(ThreadLevel::Funneled)
        );
        assert_eq!(runtime.query_thread(), Ok(ThreadLevel::Funneled));
    }

    #[test]
    fn test_local_thread_main() {
        let runtime = std::sync::Arc::new(LocalRuntime::new());
        runtime.init_thread(ThreadLevel::Multiple).unwrap();

        let remote = runtime.clone();
        let on_other = std::thread::spawn(move || remote.is_thread_main())
            .join()
            .unwrap();
        assert_eq!(on_other, Ok(false));
        assert_eq!(runtime.is_thread_main(), Ok(true));
    }

    #[test]
    fn test_local_abort_unknown_scope() {
        let runtime = LocalRuntime::new();
        runtime.init().unwrap();
        assert_eq!(runtime.abort(ScopeHandle::Raw(42), 1), Err(ErrorCode::COMM));
        assert_eq!(runtime.stats().abort_calls, 1);
    }

    #[test]
    fn test_local_timers() {
        let runtime = LocalRuntime::new();
        let first = runtime.wtime();
        let second = runtime.wtime();
        assert!(second >= first);
        assert!(runtime.wtick() > 0.0);
    }
}
