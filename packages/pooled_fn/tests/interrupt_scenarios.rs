//! Integration tests that exercise `Function` handles the way firmware does: pools sized up
//! front, callbacks shared between a task and an interrupt handler, and slots recycled as
//! handles come and go.

use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use std::sync::{Arc, Barrier};
use std::thread;

use new_zealand::nz;
use pooled_fn::{ContainerKind, Error, Function, FunctionPools};

fn double(value: u32) -> u32 {
    value.wrapping_mul(2)
}

struct Counter {
    hits: AtomicUsize,
}

impl Counter {
    fn hit(&self, by: usize) -> usize {
        self.hits.fetch_add(by, Ordering::Relaxed)
    }
}

#[test]
fn fixed_static_pool_refuses_fifth_handle_until_one_is_dropped() {
    let pools = FunctionPools::builder().static_slots(nz!(4), 0).build();
    let f = double as fn(u32) -> u32;

    let mut handles = (0..4)
        .map(|_| Function::try_from_fn(&pools, f).unwrap())
        .collect::<Vec<Function<'_, (u32,), u32>>>();

    let fifth = Function::<(u32,), u32>::try_from_fn(&pools, f);
    assert!(matches!(
        fifth,
        Err(Error::PoolExhausted {
            pool: "static",
            capacity: 4
        })
    ));

    // Clones share a container, so they need no slot of their own.
    let extra_clone = handles[0].clone();
    assert_eq!(extra_clone.ref_count(), 2);
    drop(extra_clone);

    handles.pop();
    assert_eq!(pools.pool(ContainerKind::Static).outstanding(), 3);

    let replacement = Function::try_from_fn(&pools, f).unwrap();
    assert_eq!(replacement.call((21,)), 42);
    assert_eq!(pools.pool(ContainerKind::Static).capacity(), 4);
}

#[test]
fn interrupt_calls_closure_while_task_clones_and_drops() {
    // Under Miri, test runtime scales with the number of operations.
    const CALLS: u32 = if cfg!(miri) { 50 } else { 2_000 };
    const CLONES: usize = if cfg!(miri) { 50 } else { 2_000 };

    let pools = FunctionPools::builder().functor_slots(nz!(4), 0).build();
    let total = AtomicU32::new(0);

    let (a, b, c) = (1_u32, 2_u32, 3_u32);
    let total_ref = &total;
    let callback = Function::from_closure(&pools, move || {
        total_ref.fetch_add(a + b + c, Ordering::Relaxed);
    });

    let barrier = Barrier::new(2);

    thread::scope(|s| {
        s.spawn(|| {
            barrier.wait();

            for _ in 0..CALLS {
                callback.call(());
            }
        });

        s.spawn(|| {
            barrier.wait();

            for _ in 0..CLONES {
                let copy = callback.clone();
                assert!(copy.ptr_eq(&callback));
                drop(copy);
            }
        });
    });

    assert_eq!(total.load(Ordering::Relaxed), CALLS * 6);
    assert_eq!(callback.ref_count(), 1);
    assert_eq!(pools.pool(ContainerKind::Functor).outstanding(), 1);
}

#[test]
fn slots_are_recycled_across_many_lifetimes() {
    // Under Miri, test runtime scales with the number of operations.
    const ROUNDS: usize = if cfg!(miri) { 20 } else { 500 };

    let pools = FunctionPools::builder()
        .static_slots(nz!(2), 0)
        .member_slots(nz!(2), 0)
        .functor_slots(nz!(2), 0)
        .build();

    let counter = Counter {
        hits: AtomicUsize::new(0),
    };

    for round in 0..ROUNDS {
        let by_fn = Function::from_fn(&pools, double as fn(u32) -> u32);
        let by_method =
            Function::from_method(&pools, &counter, Counter::hit as fn(&Counter, usize) -> usize);
        let by_closure = Function::from_closure(&pools, move |x: usize| x.wrapping_add(round));

        assert_eq!(by_fn.call((3,)), 6);
        by_method.call((1,));
        assert_eq!(by_closure.call((1,)), round + 1);
    }

    assert_eq!(counter.hits.load(Ordering::Relaxed), ROUNDS);

    for kind in [
        ContainerKind::Static,
        ContainerKind::Member,
        ContainerKind::Functor,
    ] {
        assert_eq!(pools.pool(kind).outstanding(), 0);
        assert_eq!(pools.pool(kind).capacity(), 2);
        assert_eq!(pools.pool(kind).chunk_count(), 1);
    }
}

#[test]
fn bound_handles_can_be_sent_to_other_threads() {
    let pools = FunctionPools::new();
    let seen = Arc::new(AtomicU32::new(0));

    let seen_for_closure = Arc::clone(&seen);
    let store = Function::from_closure(&pools, move |slot: u32, value: u32| {
        seen_for_closure.fetch_add(slot * 100 + value, Ordering::Relaxed);
    });

    thread::scope(|s| {
        for slot in 1..=4_u32 {
            let bound = store.bind_first((slot,));
            s.spawn(move || bound.call((7,)));
        }
    });

    assert_eq!(seen.load(Ordering::Relaxed), 100 + 200 + 300 + 400 + 4 * 7);
    assert_eq!(store.ref_count(), 1);
    assert_eq!(pools.pool(ContainerKind::Functor).outstanding(), 1);
}

#[test]
fn reserve_provisions_pool_that_cannot_grow() {
    let pools = FunctionPools::builder().member_slots(nz!(1), 0).build();

    pools.reserve(ContainerKind::Member, 4).unwrap();
    assert_eq!(pools.pool(ContainerKind::Member).available(), 4);

    let value = 5_u32;
    let method = |v: &u32, by: u32| v.wrapping_add(by);

    let handles = (0..4_u32)
        .map(|by| {
            Function::from_method(&pools, &value, method as fn(&u32, u32) -> u32).bind_last((by,))
        })
        .collect::<Vec<_>>();

    let results = handles.iter().map(|h| h.call(())).collect::<Vec<_>>();
    assert_eq!(results, vec![5, 6, 7, 8]);
}
