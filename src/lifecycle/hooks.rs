/*!
 * Lifecycle Hooks
 *
 * Two hook surfaces:
 *
 * - **Post-init hooks**: collaborator callbacks run once, in registration
 *   order, right after the runtime goes live
 * - **Exit hooks**: the host's last-in-first-out exit stack. The
 *   coordinator only ever pushes the two reference operations onto it.
 */

use parking_lot::Mutex;
use std::sync::Arc;
use tracing::debug;

/// Callback run after a successful init
pub type PostInitHook = Box<dyn Fn() + Send + Sync>;

/// Ordered post-init hook registry
#[derive(Default)]
pub struct PostInitHooks {
    hooks: Mutex<Vec<(&'static str, PostInitHook)>>,
}

impl PostInitHooks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a hook; `name` is only used for logging
    pub fn register<F>(&self, name: &'static str, hook: F)
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.hooks.lock().push((name, Box::new(hook)));
    }

    pub fn len(&self) -> usize {
        self.hooks.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Run every hook in registration order, consuming them
    ///
    /// Hooks run with the registry unlocked, so a hook may register
    /// further hooks. Those are kept but not run by this pass.
    pub fn run_all(&self) -> usize {
        let hooks = std::mem::take(&mut *self.hooks.lock());
        for (name, hook) in &hooks {
            debug!(hook = name, "Running post-init hook");
            hook();
        }
        hooks.len()
    }
}

/// Reference operation scheduled for process exit
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitHook {
    /// Drop the runtime's own reference (pushed at init)
    Release,
    /// Compensating increment (pushed at explicit finalize)
    Acquire,
}

/// Host exit-hook stack
///
/// Hooks pushed later run earlier. There is no way to remove a hook.
pub trait ExitHookStack: Send + Sync {
    /// Register `hook`; `false` if the host refused it
    fn push(&self, hook: ExitHook) -> bool;
}

impl<T: ExitHookStack + ?Sized> ExitHookStack for Arc<T> {
    fn push(&self, hook: ExitHook) -> bool {
        (**self).push(hook)
    }
}

/// In-memory exit stack for embedding hosts that drive shutdown themselves
///
/// `drain` pops hooks newest first, mirroring process exit order.
#[derive(Debug, Default)]
pub struct ScriptedExitHooks {
    stack: Mutex<Vec<ExitHook>>,
}

impl ScriptedExitHooks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pending hooks, oldest first
    pub fn pending(&self) -> Vec<ExitHook> {
        self.stack.lock().clone()
    }

    /// Remove and return every pending hook in execution order
    pub fn drain(&self) -> Vec<ExitHook> {
        let mut stack = self.stack.lock();
        let mut hooks: Vec<_> = stack.drain(..).collect();
        hooks.reverse();
        hooks
    }
}

impl ExitHookStack for ScriptedExitHooks {
    fn push(&self, hook: ExitHook) -> bool {
        self.stack.lock().push(hook);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_post_init_hooks_run_in_order() {
        let hooks = PostInitHooks::new();
        let order = Arc::new(Mutex::new(Vec::new()));

        for tag in ["first", "second", "third"] {
            let order = order.clone();
            hooks.register(tag, move || order.lock().push(tag));
        }

        assert_eq!(hooks.len(), 3);
        assert_eq!(hooks.run_all(), 3);
        assert_eq!(*order.lock(), vec!["first", "second", "third"]);
    }

    #[test]
    fn test_post_init_hooks_empty() {
        let hooks = PostInitHooks::new();
        assert!(hooks.is_empty());
        assert_eq!(hooks.run_all(), 0);

        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        hooks.register("count", move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        hooks.run_all();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_post_init_hook_may_register_another() {
        let hooks = Arc::new(PostInitHooks::new());
        let registry = hooks.clone();
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        hooks.register("outer", move || {
            counter.fetch_add(1, Ordering::SeqCst);
            registry.register("inner", || {});
        });

        assert_eq!(hooks.run_all(), 1);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        // The outer hook was consumed; the one it registered is pending
        assert_eq!(hooks.len(), 1);
    }

    #[test]
    fn test_scripted_exit_hooks_are_lifo() {
        let stack = ScriptedExitHooks::new();
        assert!(stack.push(ExitHook::Release));
        assert!(stack.push(ExitHook::Acquire));

        assert_eq!(stack.pending(), vec![ExitHook::Release, ExitHook::Acquire]);
        assert_eq!(stack.drain(), vec![ExitHook::Acquire, ExitHook::Release]);
        assert!(stack.pending().is_empty());
    }
}
