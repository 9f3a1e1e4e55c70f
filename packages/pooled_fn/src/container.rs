use std::fmt;
use std::sync::atomic::{self, AtomicUsize, Ordering};

use crate::{FunctionPools, SLOT_ALIGN, SlotPool};

/// Identifies what a [`Function`][crate::Function] handle points at, which also determines the
/// pool its container lives in.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
#[non_exhaustive]
pub enum ContainerKind {
    /// A plain function pointer. Lives in the static pool.
    Static,

    /// An object reference plus a method pointer. Lives in the member pool.
    Member,

    /// An inline closure. Lives in the functor pool.
    Functor,

    /// Captured arguments plus a handle to the function they are passed to. Lives in the
    /// functor pool.
    Capture,
}

impl fmt::Display for ContainerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Static => "static",
            Self::Member => "member",
            Self::Functor => "functor",
            Self::Capture => "capture",
        };

        f.write_str(name)
    }
}

/// Reference counts above this are treated as a leak gone wild. Same bound as `Arc` uses.
const MAX_REFS: usize = usize::MAX >> 1;

/// The state every callable container starts with: the shared reference count and the pool set
/// the container was allocated from.
pub(crate) struct ContainerHeader<'a> {
    refs: AtomicUsize,
    pools: &'a FunctionPools,
}

impl<'a> ContainerHeader<'a> {
    /// A header for a container referenced by exactly one handle.
    pub(crate) fn new(pools: &'a FunctionPools) -> Self {
        Self {
            refs: AtomicUsize::new(1),
            pools,
        }
    }

    pub(crate) fn pools(&self) -> &'a FunctionPools {
        self.pools
    }

    pub(crate) fn inc(&self) {
        // A new handle can only be created from an existing one, which already synchronizes
        // access to the container, so no ordering is needed here.
        let previous = self.refs.fetch_add(1, Ordering::Relaxed);

        assert!(
            previous < MAX_REFS,
            "callable container reference count overflow"
        );
    }

    /// Decrements the reference count and returns the new value. When this returns zero, all
    /// writes made through other handles are visible to the caller.
    pub(crate) fn dec(&self) -> usize {
        let previous = self.refs.fetch_sub(1, Ordering::Release);

        debug_assert!(previous > 0, "callable container reference count underflow");

        if previous == 1 {
            atomic::fence(Ordering::Acquire);
        }

        previous.wrapping_sub(1)
    }

    #[cfg_attr(test, mutants::skip)] // Advisory value, only used for diagnostics.
    pub(crate) fn refs(&self) -> usize {
        self.refs.load(Ordering::Relaxed)
    }
}

/// A callable stored in a pool slot and shared between [`Function`][crate::Function] handles.
///
/// The handle only ever sees this trait, so every container kind can sit behind the same
/// handle type.
pub(crate) trait CallableInterface<'a, Args, R>: Send + Sync {
    /// Calls the target with the given arguments.
    fn invoke(&self, args: Args) -> R;

    fn header(&self) -> &ContainerHeader<'a>;

    fn kind(&self) -> ContainerKind;

    /// The address of the target function, for containers that hold a plain function pointer.
    fn static_address(&self) -> Option<*const ()> {
        None
    }

    fn inc(&self) {
        self.header().inc();
    }

    /// Returns the reference count after decrementing it.
    fn dec(&self) -> usize {
        self.header().dec()
    }

    /// The pool that owns the slot this container lives in.
    fn get_allocator(&self) -> &'a SlotPool {
        self.header().pools().pool(self.kind())
    }
}

/// Ties a container type to the pool it is allocated from and checks at compile time that it
/// fits that pool's slots.
pub(crate) trait PooledContainer: Sized {
    const KIND: ContainerKind;

    const SLOT_SIZE: usize;

    /// Evaluating this fails compilation if the container does not fit its slot. The failure
    /// surfaces only once the using function is monomorphized, which `cargo check` skips.
    const FITS: () = assert!(
        size_of::<Self>() <= Self::SLOT_SIZE && align_of::<Self>() <= SLOT_ALIGN,
        "callable is too large or too aligned for its pool slot"
    );
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use static_assertions::assert_impl_all;

    use super::*;

    assert_impl_all!(ContainerKind: Send, Sync, fmt::Debug, fmt::Display, Copy);

    #[test]
    fn kind_names() {
        assert_eq!(ContainerKind::Static.to_string(), "static");
        assert_eq!(ContainerKind::Member.to_string(), "member");
        assert_eq!(ContainerKind::Functor.to_string(), "functor");
        assert_eq!(ContainerKind::Capture.to_string(), "capture");
    }

    #[test]
    fn header_counts_references() {
        let pools = FunctionPools::new();
        let header = ContainerHeader::new(&pools);

        assert_eq!(header.refs(), 1);

        header.inc();
        header.inc();
        assert_eq!(header.refs(), 3);

        assert_eq!(header.dec(), 2);
        assert_eq!(header.dec(), 1);
        assert_eq!(header.dec(), 0);
    }

    #[test]
    fn header_remembers_pools() {
        let pools = FunctionPools::new();
        let header = ContainerHeader::new(&pools);

        assert!(std::ptr::eq(header.pools(), &pools));
    }
}
