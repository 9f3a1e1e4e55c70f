#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

//! Reference-counted callable handles whose storage comes from fixed-size slot pools, so that
//! creating, cloning, calling and dropping them never touches a general-purpose heap allocator.
//!
//! This makes callbacks usable from interrupt context on a microcontroller, where the heap is
//! either absent or not reentrant.
//!
//! # Building blocks
//!
//! * [`SlotPool`] hands out fixed-size slots from chunks it obtains from a [`RawAllocator`].
//!   Vacant slots sit on a lock-free [`tail_queue::TailQueue`], so taking and returning a slot is
//!   interrupt-safe. Only growing the pool calls the raw allocator.
//! * [`FunctionPools`] groups one slot pool per kind of callable: plain function pointers,
//!   object-method pairs and closures.
//! * [`Function`] is the handle. It points at a callable container in one of those pools and
//!   shares it between clones through an atomic reference count. The last clone to be dropped
//!   returns the slot.
//! * [`Function::bind_first()`] and [`Function::bind_last()`] create new handles with some
//!   arguments already supplied.
//!
//! Functions take their arguments as a tuple, so `Function<'a, (u32, bool), u8>` stands for a
//! callable `fn(u32, bool) -> u8`. Arities up to six are supported.
//!
//! # Example
//!
//! ```
//! use pooled_fn::{ContainerKind, Function, FunctionPools};
//!
//! struct Led {
//!     pin: u8,
//! }
//!
//! impl Led {
//!     fn describe(&self, on: bool) -> String {
//!         format!("pin {} -> {}", self.pin, if on { "on" } else { "off" })
//!     }
//! }
//!
//! let pools = FunctionPools::new();
//! let led = Led { pin: 13 };
//!
//! let toggle = Function::from_method(&pools, &led, Led::describe as fn(&Led, bool) -> String);
//! let switch_on = toggle.bind_last((true,));
//!
//! assert_eq!(switch_on.call(()), "pin 13 -> on");
//! assert_eq!(switch_on.kind(), Some(ContainerKind::Capture));
//!
//! // Clones share one container. Dropping the last handle returns the slots to the pools.
//! let also_on = switch_on.clone();
//! drop(switch_on);
//! drop(toggle);
//! assert_eq!(also_on.call(()), "pin 13 -> on");
//! ```
//!
//! # Interrupt context
//!
//! Pools grow on demand by default, which calls the raw allocator and is not interrupt-safe.
//! Size pools up front with [`FunctionPoolsBuilder`] (a growth of zero disables growth
//! entirely) or top them up with [`FunctionPools::reserve()`] before enabling interrupts. On a
//! microcontroller, also supply a [`tail_queue::CriticalSection`] that masks interrupts via
//! [`FunctionPoolsBuilder::critical_section()`].

mod alloc_traits;
mod args;
mod capture;
mod container;
mod error;
mod function;
mod functor_container;
mod member_container;
mod pools;
mod raw_allocator;
mod signature;
mod slot_pool;
mod slot_pool_builder;
mod static_container;

pub use alloc_traits::*;
pub use args::*;
pub(crate) use capture::*;
pub use container::*;
pub use error::*;
pub use function::*;
pub(crate) use functor_container::*;
pub(crate) use member_container::*;
pub use pools::*;
pub use raw_allocator::*;
pub use signature::*;
pub use slot_pool::*;
pub use slot_pool_builder::*;
pub(crate) use static_container::*;
