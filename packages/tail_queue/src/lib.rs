#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

//! An intrusive, lock-free singly linked queue that maintains only a tail pointer.
//!
//! [`TailQueue`] threads caller-owned [`QueueElement`]s into a chain. Pushing links a new element
//! in front of the current tail with a single compare-and-swap. Popping walks from the tail to the
//! structural head (the element whose `next` link is null) and unlinks it, which makes a pop
//! O(n) in the queue length. Keeping a single pointer means there is never a second pointer
//! that must be updated atomically together with the first, so the queue works on targets
//! that only offer single-word compare-and-swap.
//!
//! The queue is designed to be the free list of a fixed-size slot pool, where queues are short
//! and pops happen off the hot path.
//!
//! # Concurrency discipline
//!
//! * Any number of pushers may race with each other and with a pop in progress. Pushes never
//!   block.
//! * Pops (and [`TailQueue::count()`]) are serialized through a [`CriticalSection`]. On a
//!   microcontroller that is an interrupt-disable section; on a hosted target it is
//!   [`HostCriticalSection`], a process-wide reentrant lock.
//!
//! # Example
//!
//! ```
//! use std::ptr::NonNull;
//!
//! use tail_queue::{QueueElement, TailQueue};
//!
//! let queue = TailQueue::new();
//! let first = QueueElement::new(std::ptr::null_mut());
//! let second = QueueElement::new(std::ptr::null_mut());
//!
//! // SAFETY: Both elements outlive the queue usage and are not linked anywhere else.
//! unsafe {
//!     queue.push_tail(NonNull::from(&first));
//!     queue.push_tail(NonNull::from(&second));
//! }
//!
//! // The structural head is the element that was pushed first.
//! assert_eq!(queue.pop_head(), Some(NonNull::from(&first)));
//! assert_eq!(queue.pop_head(), Some(NonNull::from(&second)));
//! assert!(queue.pop_head().is_none());
//! ```

mod critical_section;
mod element;
mod queue;

pub use critical_section::*;
pub use element::*;
pub use queue::*;
