use std::alloc::Layout;
use std::any::Any;
use std::cell::Cell;
use std::marker::PhantomData;
use std::num::NonZero;
use std::sync::Arc;

use tail_queue::{CriticalSection, HOST_CRITICAL_SECTION};
use tracing::debug;

use crate::slot_pool_builder::{DEFAULT_GROWTH_SLOTS, DEFAULT_INITIAL_SLOTS};
use crate::{
    AllocTraits, ContainerHeader, ContainerKind, MemberContainer, RawAllocator, Result, SlotPool,
    StaticContainer, SystemAllocator,
};

/// Alignment of every callable container slot. Callables that need stricter alignment are
/// rejected at compile time.
pub const SLOT_ALIGN: usize = 8;

/// Bytes of closure state a functor slot can hold: four pointers plus 16 bytes, enough for an
/// IPv6 address and a pointer with room to spare.
///
/// Closures that capture more than this fail to compile when turned into a
/// [`Function`][crate::Function]. The error comes from evaluating a constant during code
/// generation, so `cargo build` reports it while `cargo check` does not:
///
/// ```compile_fail
/// use pooled_fn::{Function, FunctionPools};
///
/// let pools = FunctionPools::new();
/// let big = [0_u64; 64];
///
/// let f = Function::from_closure(&pools, move || big.len());
/// ```
pub const FUNCTOR_CAPACITY: usize = 4 * size_of::<usize>() + 16;

/// Size of a slot in the static pool: room for one function pointer.
pub const STATIC_SLOT_SIZE: usize = size_of::<StaticContainer<'static, fn()>>();

/// Size of a slot in the member pool.
///
/// Sized for the largest object reference, a two-word trait object reference, plus a method
/// pointer. Method pointers are always a single word.
pub const MEMBER_SLOT_SIZE: usize =
    size_of::<MemberContainer<'static, dyn Any + Sync, fn(&(dyn Any + Sync))>>();

/// Size of a slot in the functor pool: [`FUNCTOR_CAPACITY`] bytes of closure state plus the
/// shared container bookkeeping.
pub const FUNCTOR_SLOT_SIZE: usize = size_of::<ContainerHeader<'static>>() + FUNCTOR_CAPACITY;

const fn slot_layout(size: usize) -> Layout {
    match Layout::from_size_align(size, SLOT_ALIGN) {
        Ok(layout) => layout,
        Err(_) => panic!("callable slot size and alignment do not form a valid layout"),
    }
}

const STATIC_SLOT_LAYOUT: Layout = slot_layout(STATIC_SLOT_SIZE);
const MEMBER_SLOT_LAYOUT: Layout = slot_layout(MEMBER_SLOT_SIZE);
const FUNCTOR_SLOT_LAYOUT: Layout = slot_layout(FUNCTOR_SLOT_SIZE);

/// The pools that back [`Function`][crate::Function] handles, one per container size class.
///
/// Every handle remembers the pool set it was created from and returns its slot there when the
/// last clone is dropped, so the pool set must outlive all handles created from it. For
/// handles stored in statics, keep the pool set in a `static` initialized once, for example
/// through [`std::sync::OnceLock`].
///
/// # Examples
///
/// ```
/// use new_zealand::nz;
/// use pooled_fn::{ContainerKind, FunctionPools};
///
/// let pools = FunctionPools::builder()
///     .static_slots(nz!(4), 0)
///     .functor_slots(nz!(16), 16)
///     .build();
///
/// assert_eq!(pools.pool(ContainerKind::Static).capacity(), 4);
/// assert_eq!(pools.pool(ContainerKind::Functor).capacity(), 16);
/// ```
#[derive(Debug)]
pub struct FunctionPools {
    static_pool: SlotPool,
    member_pool: SlotPool,
    functor_pool: SlotPool,
}

impl FunctionPools {
    /// Creates a pool set with default sizing: 8 slots per kind, growing by 8 at a time.
    ///
    /// # Panics
    ///
    /// Panics if the system allocator cannot provide the initial chunks.
    #[must_use]
    pub fn new() -> Self {
        Self::builder().build()
    }

    /// Creates a builder for configuring a new pool set.
    #[inline]
    pub fn builder() -> FunctionPoolsBuilder {
        FunctionPoolsBuilder::new()
    }

    /// The pool that holds containers of the given kind.
    ///
    /// Capture adapters share the functor pool.
    #[must_use]
    #[inline]
    pub fn pool(&self, kind: ContainerKind) -> &SlotPool {
        match kind {
            ContainerKind::Static => &self.static_pool,
            ContainerKind::Member => &self.member_pool,
            ContainerKind::Functor | ContainerKind::Capture => &self.functor_pool,
        }
    }

    /// Ensures at least `additional` slots are vacant in the pool for the given kind.
    ///
    /// Call this outside interrupt context so that handle creation inside interrupt context
    /// never needs to grow a pool.
    ///
    /// # Errors
    ///
    /// Returns an error if the pool cannot grow. See [`SlotPool::reserve()`].
    pub fn reserve(&self, kind: ContainerKind, additional: usize) -> Result<()> {
        self.pool(kind).reserve(additional)
    }
}

impl Default for FunctionPools {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Clone, Copy, Debug)]
struct SlotCounts {
    initial: NonZero<usize>,
    growth: usize,
}

impl Default for SlotCounts {
    fn default() -> Self {
        Self {
            initial: DEFAULT_INITIAL_SLOTS,
            growth: DEFAULT_GROWTH_SLOTS,
        }
    }
}

/// Builder for creating an instance of [`FunctionPools`].
///
/// Every pool starts with 8 slots and grows by 8 slots at a time unless configured otherwise.
/// A growth of zero makes the pool report [`Error::PoolExhausted`][crate::Error::PoolExhausted]
/// once full, which is what interrupt-only workloads usually want.
#[derive(Debug)]
#[must_use]
pub struct FunctionPoolsBuilder {
    static_slots: SlotCounts,
    member_slots: SlotCounts,
    functor_slots: SlotCounts,
    traits: AllocTraits,
    raw_allocator: Option<Arc<dyn RawAllocator>>,
    critical_section: &'static dyn CriticalSection,

    // Prevents Sync while allowing Send - builders are thread-mobile but not thread-safe
    _not_sync: PhantomData<Cell<()>>,
}

impl FunctionPoolsBuilder {
    #[inline]
    pub(crate) fn new() -> Self {
        Self {
            static_slots: SlotCounts::default(),
            member_slots: SlotCounts::default(),
            functor_slots: SlotCounts::default(),
            traits: AllocTraits::default(),
            raw_allocator: None,
            critical_section: &HOST_CRITICAL_SECTION,
            _not_sync: PhantomData,
        }
    }

    /// Sets the initial and growth slot counts of the pool for plain function pointers.
    #[inline]
    pub fn static_slots(mut self, initial: NonZero<usize>, growth: usize) -> Self {
        self.static_slots = SlotCounts { initial, growth };
        self
    }

    /// Sets the initial and growth slot counts of the pool for object-method pairs.
    #[inline]
    pub fn member_slots(mut self, initial: NonZero<usize>, growth: usize) -> Self {
        self.member_slots = SlotCounts { initial, growth };
        self
    }

    /// Sets the initial and growth slot counts of the pool for closures and bound arguments.
    #[inline]
    pub fn functor_slots(mut self, initial: NonZero<usize>, growth: usize) -> Self {
        self.functor_slots = SlotCounts { initial, growth };
        self
    }

    /// Sets the hints passed to the raw allocator by all three pools.
    #[inline]
    pub fn traits(mut self, traits: AllocTraits) -> Self {
        self.traits = traits;
        self
    }

    /// Sets the allocator that provides chunks to all three pools.
    #[inline]
    pub fn raw_allocator(mut self, raw_allocator: Arc<dyn RawAllocator>) -> Self {
        self.raw_allocator = Some(raw_allocator);
        self
    }

    /// Sets the critical section that all three pools use to serialize taking slots.
    #[inline]
    pub fn critical_section(mut self, critical_section: &'static dyn CriticalSection) -> Self {
        self.critical_section = critical_section;
        self
    }

    /// Builds the pool set and allocates the initial chunk of every pool.
    ///
    /// # Errors
    ///
    /// Returns an error if any pool cannot obtain its initial chunk.
    pub fn try_build(self) -> Result<FunctionPools> {
        let raw_allocator = self
            .raw_allocator
            .unwrap_or_else(|| Arc::new(SystemAllocator));

        let build_pool = |name: &'static str, layout: Layout, counts: SlotCounts| {
            SlotPool::builder()
                .name(name)
                .layout(layout)
                .initial_slots(counts.initial)
                .growth_slots(counts.growth)
                .traits(self.traits)
                .raw_allocator(Arc::clone(&raw_allocator))
                .critical_section(self.critical_section)
                .try_build()
        };

        let pools = FunctionPools {
            static_pool: build_pool("static", STATIC_SLOT_LAYOUT, self.static_slots)?,
            member_pool: build_pool("member", MEMBER_SLOT_LAYOUT, self.member_slots)?,
            functor_pool: build_pool("functor", FUNCTOR_SLOT_LAYOUT, self.functor_slots)?,
        };

        debug!(
            static_slots = pools.static_pool.capacity(),
            static_slot_bytes = pools.static_pool.slot_layout().size(),
            member_slots = pools.member_pool.capacity(),
            member_slot_bytes = pools.member_pool.slot_layout().size(),
            functor_slots = pools.functor_pool.capacity(),
            functor_slot_bytes = pools.functor_pool.slot_layout().size(),
            "function pools built"
        );

        Ok(pools)
    }

    /// Builds the pool set and allocates the initial chunk of every pool.
    ///
    /// # Panics
    ///
    /// Panics if any pool cannot obtain its initial chunk.
    #[must_use]
    pub fn build(self) -> FunctionPools {
        self.try_build()
            .unwrap_or_else(|error| panic!("failed to build function pools: {error}"))
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use std::fmt::Debug;

    use new_zealand::nz;
    use static_assertions::{assert_impl_all, assert_not_impl_any, const_assert};

    use super::*;
    use crate::{BudgetAllocator, Error};

    assert_impl_all!(FunctionPools: Send, Sync, Debug, Default);
    assert_impl_all!(FunctionPoolsBuilder: Send, Debug);
    assert_not_impl_any!(FunctionPoolsBuilder: Sync);

    const_assert!(STATIC_SLOT_SIZE < MEMBER_SLOT_SIZE);
    const_assert!(MEMBER_SLOT_SIZE < FUNCTOR_SLOT_SIZE);

    #[test]
    fn slot_sizes() {
        let word = size_of::<usize>();

        // Reference count and pool set reference come first in every container.
        assert_eq!(STATIC_SLOT_SIZE, 3 * word);
        assert_eq!(MEMBER_SLOT_SIZE, 5 * word);
        assert_eq!(FUNCTOR_SLOT_SIZE, 6 * word + 16);
    }

    #[test]
    fn default_pools() {
        let pools = FunctionPools::new();

        for kind in [
            ContainerKind::Static,
            ContainerKind::Member,
            ContainerKind::Functor,
        ] {
            let pool = pools.pool(kind);

            assert_eq!(pool.capacity(), 8);
            assert_eq!(pool.growth_slots(), 8);
            assert_eq!(pool.name(), kind.to_string());
            assert!(pool.slot_layout().align() >= SLOT_ALIGN);
        }

        assert!(std::ptr::eq(
            pools.pool(ContainerKind::Capture),
            pools.pool(ContainerKind::Functor)
        ));
    }

    #[test]
    fn builder_sizes_each_pool() {
        let pools = FunctionPools::builder()
            .static_slots(nz!(1), 0)
            .member_slots(nz!(2), 1)
            .functor_slots(nz!(3), 2)
            .traits(AllocTraits::RECLAIMABLE)
            .build();

        assert_eq!(pools.pool(ContainerKind::Static).capacity(), 1);
        assert_eq!(pools.pool(ContainerKind::Static).growth_slots(), 0);
        assert_eq!(pools.pool(ContainerKind::Member).capacity(), 2);
        assert_eq!(pools.pool(ContainerKind::Functor).capacity(), 3);
        assert!(!pools.pool(ContainerKind::Functor).traits().is_never_free());
    }

    #[test]
    fn reserve_grows_one_kind() {
        let pools = FunctionPools::builder().static_slots(nz!(2), 0).build();

        pools.reserve(ContainerKind::Static, 6).unwrap();

        assert_eq!(pools.pool(ContainerKind::Static).capacity(), 6);
        assert_eq!(pools.pool(ContainerKind::Member).capacity(), 8);
    }

    #[test]
    fn shared_raw_allocator_failure() {
        let result = FunctionPools::builder()
            .raw_allocator(Arc::new(BudgetAllocator::new(Arc::new(SystemAllocator), 0)))
            .try_build();

        assert!(matches!(
            result,
            Err(Error::RawAllocationFailed { pool: "static", .. })
        ));
    }
}
