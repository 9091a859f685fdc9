/*!
 * Reference Counting Benchmarks
 *
 * Acquire/release cost, uncontended and under thread contention
 */

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use mpi_lifecycle::lifecycle::{Lifecycle, RuntimeRef};
use mpi_lifecycle::LocalRuntime;
use std::sync::Arc;
use std::thread;

fn live_lifecycle() -> Arc<Lifecycle> {
    let lifecycle = Lifecycle::builder(LocalRuntime::new()).build();
    lifecycle.init().expect("local runtime init");
    Arc::new(lifecycle)
}

fn bench_uncontended(c: &mut Criterion) {
    let lifecycle = live_lifecycle();
    let mut group = c.benchmark_group("uncontended");

    group.bench_function("acquire_release", |b| {
        b.iter(|| {
            lifecycle.acquire();
            lifecycle.release();
        });
    });

    group.bench_function("runtime_ref", |b| {
        b.iter(|| black_box(RuntimeRef::new(&lifecycle, "request")));
    });

    group.finish();
}

fn bench_contended(c: &mut Criterion) {
    let lifecycle = live_lifecycle();
    let mut group = c.benchmark_group("contended");

    for threads in [2usize, 4, 8] {
        group.bench_with_input(
            BenchmarkId::from_parameter(threads),
            &threads,
            |b, &threads| {
                b.iter(|| {
                    let handles: Vec<_> = (0..threads)
                        .map(|_| {
                            let lifecycle = lifecycle.clone();
                            thread::spawn(move || {
                                for _ in 0..1_000 {
                                    lifecycle.acquire();
                                    lifecycle.release();
                                }
                            })
                        })
                        .collect();
                    for handle in handles {
                        handle.join().unwrap();
                    }
                });
            },
        );
    }

    group.finish();
}

criterion_group!(benches, bench_uncontended, bench_contended);
criterion_main!(benches);
