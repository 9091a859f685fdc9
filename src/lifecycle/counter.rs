/*!
 * Lifecycle Counter
 *
 * One signed atomic integer encoding the runtime's state:
 *
 * - `-1`: unstarted
 * - `n >= 0`: live with `n` outstanding references
 *
 * The release that moves the count from 1 to 0 is the terminal release.
 * Every mutation is a single atomic read-modify-write, so concurrent
 * releases can never both observe the "last reference" condition.
 */

use serde::Serialize;
use std::sync::atomic::{AtomicIsize, Ordering};

/// Raw value before initialization
pub const UNSTARTED: isize = -1;

/// Decoded counter value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "state", content = "references", rename_all = "snake_case")]
pub enum CounterState {
    Unstarted,
    Live(usize),
}

impl CounterState {
    #[inline]
    pub fn from_raw(raw: isize) -> Self {
        if raw < 0 {
            CounterState::Unstarted
        } else {
            CounterState::Live(raw as usize)
        }
    }
}

/// What a release observed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReleaseOutcome {
    /// Other references remain (count after the decrement)
    Retained(usize),
    /// This was the last reference; shutdown is due
    Last,
    /// Counter was not positive; nothing was decremented
    Unbalanced(isize),
}

/// Process-wide reference counter
#[derive(Debug)]
pub struct LifecycleCounter {
    value: AtomicIsize,
}

impl LifecycleCounter {
    pub const fn new() -> Self {
        Self {
            value: AtomicIsize::new(UNSTARTED),
        }
    }

    /// Increment, returning the previous raw value
    #[inline]
    pub fn acquire(&self) -> isize {
        self.value.fetch_add(1, Ordering::AcqRel)
    }

    /// Decrement if positive, reporting whether this was the last reference
    ///
    /// The positivity test and the decrement form one atomic step.
    #[inline]
    pub fn release(&self) -> ReleaseOutcome {
        match self
            .value
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| (n > 0).then(|| n - 1))
        {
            Ok(1) => ReleaseOutcome::Last,
            Ok(prev) => ReleaseOutcome::Retained((prev - 1) as usize),
            Err(current) => ReleaseOutcome::Unbalanced(current),
        }
    }

    /// Move from unstarted to live, carrying references taken ahead of time
    ///
    /// Adding 2 turns `-1` into `1` (the runtime's own reference) and
    /// `-1 + k` into `1 + k` for `k` early acquires. Returns the new count.
    #[inline]
    pub fn go_live(&self) -> usize {
        let prev = self.value.fetch_add(2, Ordering::AcqRel);
        (prev + 2).max(0) as usize
    }

    #[inline]
    pub fn raw(&self) -> isize {
        self.value.load(Ordering::Acquire)
    }

    #[inline]
    pub fn state(&self) -> CounterState {
        CounterState::from_raw(self.raw())
    }
}

impl Default for LifecycleCounter {
    fn default() -> Self {
        Self::new()
    }
}
