//! Using a `TailQueue` as the free list of a tiny fixed-size block allocator:
//!
//! * Threading vacant blocks onto the queue.
//! * Taking blocks off the queue and returning them.
//! * Inspecting the queue length.

use std::ptr::{self, NonNull};

use tail_queue::{QueueElement, TailQueue};

fn main() {
    let queue = TailQueue::new();

    // Each element carries its block index as the opaque payload.
    let blocks: Vec<QueueElement> = (0..4)
        .map(|index| QueueElement::new(ptr::without_provenance_mut(index)))
        .collect();

    for block in &blocks {
        // SAFETY: The blocks outlive every use of the queue and are pushed once each.
        unsafe {
            queue.push_tail(NonNull::from(block));
        }
    }

    println!("Free list holds {} blocks", queue.count());

    let first = queue.pop_head().expect("we just filled the free list");
    let second = queue.pop_head().expect("we just filled the free list");

    // SAFETY: Popped elements are still owned by `blocks`.
    let first_index = unsafe { first.as_ref() }.data().addr();
    // SAFETY: As above.
    let second_index = unsafe { second.as_ref() }.data().addr();
    println!("Allocated blocks {first_index} and {second_index}");

    // SAFETY: Both elements were popped and are unlinked.
    unsafe {
        queue.push_tail(first);
    }
    println!(
        "Returned block {first_index}, free list now holds {} blocks",
        queue.count()
    );

    while let Some(element) = queue.pop_head() {
        // SAFETY: Popped elements are still owned by `blocks`.
        let index = unsafe { element.as_ref() }.data().addr();
        println!("Draining block {index}");
    }

    println!("Free list is empty: {}", queue.is_empty());
}
