//! Basic usage of the `pooled_fn` crate:
//!
//! * Creating the function pools.
//! * Wrapping a plain function, a method and a closure.
//! * Binding arguments.
//! * Observing slots return to the pools as handles are dropped.

use pooled_fn::{ContainerKind, Function, FunctionPools};

struct Thermometer {
    offset: i32,
}

impl Thermometer {
    fn calibrate(&self, raw: i32) -> i32 {
        raw.saturating_add(self.offset)
    }
}

fn clamp(value: i32, low: i32, high: i32) -> i32 {
    value.clamp(low, high)
}

fn main() {
    let pools = FunctionPools::new();
    let thermometer = Thermometer { offset: -3 };

    // Function items and methods are cast to function pointers before wrapping.
    let clamp_fn = Function::from_fn(&pools, clamp as fn(i32, i32, i32) -> i32);
    let calibrate = Function::from_method(
        &pools,
        &thermometer,
        Thermometer::calibrate as fn(&Thermometer, i32) -> i32,
    );

    // Closures are stored inline in their slot.
    let scale = 10;
    let to_tenths = Function::from_closure(&pools, move |value: i32| value.saturating_mul(scale));

    // Binding the trailing bounds turns a three-argument function into a one-argument one.
    let clamp_reading = clamp_fn.bind_last((-40, 85));

    for raw in [20, 95, -60] {
        let calibrated = calibrate.call((raw,));
        let clamped = clamp_reading.call((calibrated,));
        println!(
            "raw {raw} -> calibrated {calibrated} -> clamped {clamped} -> tenths {}",
            to_tenths.call((clamped,))
        );
    }

    for kind in [
        ContainerKind::Static,
        ContainerKind::Member,
        ContainerKind::Functor,
    ] {
        let pool = pools.pool(kind);
        println!(
            "{kind} pool: {} of {} slots in use",
            pool.outstanding(),
            pool.capacity()
        );
    }

    // The bound handle keeps the original alive, so dropping ours releases no slot yet.
    drop(clamp_fn);
    println!(
        "After dropping the original clamp handle: {} static slots in use",
        pools.pool(ContainerKind::Static).outstanding()
    );

    drop(clamp_reading);
    println!(
        "After dropping the bound handle: {} static slots in use",
        pools.pool(ContainerKind::Static).outstanding()
    );
}
