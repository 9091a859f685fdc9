/*!
 * Lifecycle Coordinator Integration Tests
 *
 * Reference protocol, explicit finalize and exit-stack ordering against
 * the local runtime
 */

use mpi_lifecycle::lifecycle::{
    CounterState, ExitHook, Lifecycle, RuntimeRef, ScriptedExitHooks, UnwindProbe,
};
use mpi_lifecycle::{LifecycleError, LocalRuntime, ThreadLevel};
use pretty_assertions::assert_eq;
use proptest::prelude::*;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Barrier};
use std::thread;

struct Calm;

impl UnwindProbe for Calm {
    fn is_unwinding(&self) -> bool {
        false
    }
}

/// Probe whose answer the test flips mid-scenario
#[derive(Clone, Default)]
struct Switch(Arc<AtomicBool>);

impl UnwindProbe for Switch {
    fn is_unwinding(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

fn setup() -> (Arc<Lifecycle>, Arc<LocalRuntime>, Arc<ScriptedExitHooks>) {
    let native = Arc::new(LocalRuntime::new());
    let stack = Arc::new(ScriptedExitHooks::new());
    let lifecycle = Lifecycle::builder(native.clone())
        .with_exit_hooks(stack.clone())
        .with_unwind_probe(Calm)
        .build();
    (Arc::new(lifecycle), native, stack)
}

#[test]
fn test_two_objects_scenario() {
    let (lifecycle, native, stack) = setup();
    lifecycle.init().unwrap();

    let a = RuntimeRef::new(&lifecycle, "communicator");
    let b = RuntimeRef::new(&lifecycle, "window");
    lifecycle.finalize().unwrap();
    assert_eq!(lifecycle.counter_state(), CounterState::Live(2));

    drop(a);
    assert!(!lifecycle.is_finalized());
    assert_eq!(native.stats().finalize_calls, 0);

    drop(b);
    assert!(lifecycle.is_finalized());
    assert_eq!(native.stats().finalize_calls, 1);

    lifecycle.run_exit_hooks(stack.drain());
    assert_eq!(native.stats().finalize_calls, 1);
}

#[test]
fn test_is_finalized_false_while_reference_outstanding() {
    let (lifecycle, _native, stack) = setup();
    lifecycle.init().unwrap();
    assert!(!lifecycle.is_finalized());

    lifecycle.acquire();
    lifecycle.run_exit_hooks(stack.drain());
    assert!(!lifecycle.is_finalized());

    lifecycle.release();
    assert!(lifecycle.is_finalized());
}

#[test]
fn test_exit_stack_order_after_finalize() {
    let (lifecycle, native, stack) = setup();
    lifecycle.init().unwrap();
    lifecycle.finalize().unwrap();
    lifecycle.finalize().unwrap();

    assert_eq!(stack.pending(), vec![ExitHook::Release, ExitHook::Acquire]);

    let hooks = stack.drain();
    assert_eq!(hooks, vec![ExitHook::Acquire, ExitHook::Release]);
    lifecycle.run_exit_hooks(hooks);

    let stats = lifecycle.stats();
    assert_eq!(stats.finalize_attempts, 1);
    assert_eq!(stats.unbalanced_releases, 0);
    assert_eq!(stats.counter, CounterState::Live(0));
    assert_eq!(native.stats().finalize_calls, 1);
}

#[test]
fn test_init_thread_then_init_rejected() {
    let (lifecycle, _native, _stack) = setup();
    assert_eq!(
        lifecycle.init_thread(ThreadLevel::Funneled),
        Ok(ThreadLevel::Funneled)
    );
    assert_eq!(lifecycle.init(), Err(LifecycleError::AlreadyInitialized));
    assert_eq!(lifecycle.counter_state(), CounterState::Live(1));
    assert_eq!(lifecycle.query_thread(), Ok(ThreadLevel::Funneled));
    assert_eq!(lifecycle.is_thread_main(), Ok(true));
}

#[test]
fn test_racing_initializers_single_winner() {
    let (lifecycle, native, _stack) = setup();
    let barrier = Arc::new(Barrier::new(8));

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let lifecycle = lifecycle.clone();
            let barrier = barrier.clone();
            thread::spawn(move || {
                barrier.wait();
                lifecycle.init_thread(ThreadLevel::Multiple)
            })
        })
        .collect();

    let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    let winners = results.iter().filter(|r| r.is_ok()).count();
    assert_eq!(winners, 1);
    assert!(results
        .iter()
        .filter(|r| r.is_err())
        .all(|r| *r == Err(LifecycleError::AlreadyInitialized)));
    assert_eq!(native.stats().init_calls, 1);
    assert_eq!(lifecycle.counter_state(), CounterState::Live(1));
}

#[test]
fn test_unwind_at_terminal_release_skips_finalize() {
    let native = Arc::new(LocalRuntime::new());
    let probe = Switch::default();
    let lifecycle = Lifecycle::builder(native.clone())
        .with_unwind_probe(probe.clone())
        .build();

    lifecycle.init().unwrap();
    let request = RuntimeRef::new(&lifecycle, "request");
    lifecycle.finalize().unwrap();

    // The crash starts after finalize was requested but before the last drop
    probe.0.store(true, Ordering::SeqCst);
    drop(request);

    assert!(!lifecycle.is_finalized());
    assert_eq!(native.stats().finalize_calls, 0);
    assert_eq!(lifecycle.stats().finalize_skipped, 1);
    assert_eq!(lifecycle.counter_state(), CounterState::Live(0));
}

#[test]
fn test_drop_during_panic_skips_finalize() {
    let native = Arc::new(LocalRuntime::new());
    let lifecycle = Arc::new(Lifecycle::builder(native.clone()).build());
    lifecycle.init().unwrap();
    lifecycle.acquire();
    lifecycle.finalize().unwrap();

    let worker = lifecycle.clone();
    let outcome = thread::Builder::new()
        .name("solver".into())
        .spawn(move || {
            let _file = RuntimeRef::new(&worker, "file");
            worker.release();
            panic!("solver diverged");
        })
        .unwrap()
        .join();

    assert!(outcome.is_err());
    assert!(!lifecycle.is_finalized());
    assert_eq!(native.stats().finalize_calls, 0);
}

#[test]
fn test_stats_snapshot_serializes() {
    let (lifecycle, _native, _stack) = setup();
    lifecycle.init().unwrap();
    let _comm = RuntimeRef::new(&lifecycle, "communicator");

    let value = serde_json::to_value(lifecycle.stats()).unwrap();
    assert_eq!(value["vendor"], "local");
    assert_eq!(value["counter"]["state"], "live");
    assert_eq!(value["counter"]["references"], 2);
    assert_eq!(value["acquires"], 1);
    assert_eq!(value["finalize_requested"], false);
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn prop_concurrent_pairs_finalize_exactly_once(
        threads in 1usize..8,
        per_thread in 1usize..32,
    ) {
        let (lifecycle, native, stack) = setup();
        lifecycle.init().unwrap();

        let total = threads * per_thread;
        for _ in 0..total {
            lifecycle.acquire();
        }
        lifecycle.finalize().unwrap();

        let barrier = Arc::new(Barrier::new(threads));
        let handles: Vec<_> = (0..threads)
            .map(|_| {
                let lifecycle = lifecycle.clone();
                let barrier = barrier.clone();
                thread::spawn(move || {
                    barrier.wait();
                    for _ in 0..per_thread {
                        // This thread still owes a release, so shutdown cannot have run
                        prop_assert!(!lifecycle.is_finalized());
                        lifecycle.release();
                    }
                    Ok(())
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap()?;
        }

        prop_assert!(lifecycle.is_finalized());
        lifecycle.run_exit_hooks(stack.drain());
        prop_assert_eq!(native.stats().finalize_calls, 1);
        prop_assert_eq!(lifecycle.stats().releases, total as u64 + 2);
    }

    #[test]
    fn prop_finalize_waits_for_last_release(outstanding in 1usize..16) {
        let (lifecycle, native, _stack) = setup();
        lifecycle.init().unwrap();

        let refs: Vec<_> = (0..outstanding)
            .map(|_| RuntimeRef::new(&lifecycle, "request"))
            .collect();
        lifecycle.finalize().unwrap();

        for (released, guard) in refs.into_iter().enumerate() {
            prop_assert!(!lifecycle.is_finalized());
            drop(guard);
            prop_assert_eq!(lifecycle.is_finalized(), released + 1 == outstanding);
        }
        prop_assert_eq!(native.stats().finalize_calls, 1);
    }
}
