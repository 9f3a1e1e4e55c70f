//! Basic benchmarks for the `pooled_fn` crate.
#![allow(
    missing_docs,
    reason = "No need for API documentation in benchmark code"
)]

use std::hint::black_box;
use std::time::Instant;

use alloc_tracker::Allocator;
use criterion::{Criterion, criterion_group, criterion_main};
use new_zealand::nz;
use pooled_fn::{Function, FunctionPools};

criterion_group!(benches, entrypoint);
criterion_main!(benches);

#[global_allocator]
static ALLOCATOR: Allocator<std::alloc::System> = Allocator::system();

fn add(a: u64, b: u64) -> u64 {
    a.wrapping_add(b)
}

fn entrypoint(c: &mut Criterion) {
    let allocs = alloc_tracker::Session::new();

    // Every benchmark below must report zero allocations per iteration once the pools are warm.
    let pools = FunctionPools::builder()
        .static_slots(nz!(16), 16)
        .functor_slots(nz!(16), 16)
        .build();

    let mut group = c.benchmark_group("pooled_fn_basic");

    let allocs_op = allocs.operation("from_fn_drop");
    group.bench_function("from_fn_drop", |b| {
        b.iter_custom(|iters| {
            let _span = allocs_op.measure_thread().iterations(iters);

            let start = Instant::now();

            for _ in 0..iters {
                drop(black_box(Function::from_fn(
                    &pools,
                    add as fn(u64, u64) -> u64,
                )));
            }

            start.elapsed()
        });
    });

    let allocs_op = allocs.operation("from_closure_drop");
    group.bench_function("from_closure_drop", |b| {
        b.iter_custom(|iters| {
            let offset = black_box(7_u64);

            let _span = allocs_op.measure_thread().iterations(iters);

            let start = Instant::now();

            for _ in 0..iters {
                drop(black_box(Function::from_closure(&pools, move |x: u64| {
                    x.wrapping_add(offset)
                })));
            }

            start.elapsed()
        });
    });

    let allocs_op = allocs.operation("clone_drop");
    group.bench_function("clone_drop", |b| {
        let f = Function::from_fn(&pools, add as fn(u64, u64) -> u64);

        b.iter_custom(|iters| {
            let _span = allocs_op.measure_thread().iterations(iters);

            let start = Instant::now();

            for _ in 0..iters {
                drop(black_box(f.clone()));
            }

            start.elapsed()
        });
    });

    let allocs_op = allocs.operation("call_static");
    group.bench_function("call_static", |b| {
        let f = Function::from_fn(&pools, add as fn(u64, u64) -> u64);

        b.iter_custom(|iters| {
            let _span = allocs_op.measure_thread().iterations(iters);

            let start = Instant::now();

            for i in 0..iters {
                _ = black_box(f.call(black_box((i, 1))));
            }

            start.elapsed()
        });
    });

    let allocs_op = allocs.operation("call_bound");
    group.bench_function("call_bound", |b| {
        let f = Function::from_fn(&pools, add as fn(u64, u64) -> u64).bind_first((1,));

        b.iter_custom(|iters| {
            let _span = allocs_op.measure_thread().iterations(iters);

            let start = Instant::now();

            for i in 0..iters {
                _ = black_box(f.call(black_box((i,))));
            }

            start.elapsed()
        });
    });

    let allocs_op = allocs.operation("bind_first_drop");
    group.bench_function("bind_first_drop", |b| {
        let f = Function::from_fn(&pools, add as fn(u64, u64) -> u64);

        b.iter_custom(|iters| {
            let _span = allocs_op.measure_thread().iterations(iters);

            let start = Instant::now();

            for i in 0..iters {
                drop(black_box(f.bind_first((i,))));
            }

            start.elapsed()
        });
    });

    group.finish();

    allocs.print_to_stdout();
}
