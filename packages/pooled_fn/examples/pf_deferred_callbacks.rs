//! Deferred callbacks raised from a simulated interrupt handler:
//!
//! * Sizing the pools up front so that no allocation happens after startup.
//! * Keeping the pools in a `static` so handles can live anywhere.
//! * Registering callbacks from the main task and firing them from another thread.
//! * Handling pool exhaustion without panicking.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Mutex, OnceLock, mpsc};
use std::thread;

use new_zealand::nz;
use pooled_fn::{ContainerKind, Function, FunctionPools};

static POOLS: OnceLock<FunctionPools> = OnceLock::new();

static BUTTON_PRESSES: AtomicU32 = AtomicU32::new(0);

type Callback = Function<'static, (u32,)>;

fn pools() -> &'static FunctionPools {
    POOLS.get_or_init(|| {
        FunctionPools::builder()
            .static_slots(nz!(2), 0)
            .functor_slots(nz!(4), 0)
            .build()
    })
}

fn on_button(pin: u32) {
    BUTTON_PRESSES.fetch_add(1, Ordering::Relaxed);
    println!("button on pin {pin} pressed");
}

fn main() {
    let registry: Mutex<Vec<Callback>> = Mutex::new(Vec::new());

    registry
        .lock()
        .expect("registry lock is never poisoned in this example")
        .push(Function::from_fn(pools(), on_button as fn(u32)));

    for threshold in [3_u32, 7] {
        match Function::try_from_closure(pools(), move |pin: u32| {
            if pin >= threshold {
                println!("pin {pin} is at or above threshold {threshold}");
            }
        }) {
            Ok(callback) => registry
                .lock()
                .expect("registry lock is never poisoned in this example")
                .push(callback),
            Err(error) => println!("could not register callback: {error}"),
        }
    }

    // The functor pool has four slots and cannot grow, so with two closures registered,
    // two spares fill it and the next closure is refused.
    let mut spare = Vec::new();
    for _ in 0..2 {
        spare.push(Function::<'static, ()>::from_closure(pools(), || {}));
    }

    if let Err(error) = Function::<'static, ()>::try_from_closure(pools(), || {}) {
        println!("expected refusal: {error}");
    }

    drop(spare);

    let (interrupt_tx, interrupt_rx) = mpsc::channel::<u32>();

    thread::scope(|s| {
        // Stands in for the interrupt handler: it only calls handles it was given.
        s.spawn(|| {
            let callbacks = registry
                .lock()
                .expect("registry lock is never poisoned in this example")
                .clone();

            for pin in interrupt_rx {
                for callback in &callbacks {
                    callback.call((pin,));
                }
            }
        });

        for pin in [1, 5, 9] {
            interrupt_tx
                .send(pin)
                .expect("receiver lives until the sender is dropped");
        }

        drop(interrupt_tx);
    });

    println!(
        "{} button presses handled",
        BUTTON_PRESSES.load(Ordering::Relaxed)
    );

    drop(registry);

    for kind in [ContainerKind::Static, ContainerKind::Functor] {
        println!(
            "{kind} pool: {} of {} slots in use after shutdown",
            pools().pool(kind).outstanding(),
            pools().pool(kind).capacity()
        );
    }
}
