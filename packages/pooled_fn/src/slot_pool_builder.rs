use std::alloc::Layout;
use std::cell::Cell;
use std::marker::PhantomData;
use std::num::NonZero;
use std::sync::Arc;

use new_zealand::nz;
use tail_queue::{CriticalSection, HOST_CRITICAL_SECTION, QueueElement, TailQueue};

use crate::{AllocTraits, Error, RawAllocator, Result, SlotPool, SystemAllocator};

/// Number of slots a pool starts with unless configured otherwise.
pub(crate) const DEFAULT_INITIAL_SLOTS: NonZero<usize> = nz!(8);

/// Number of slots a pool grows by unless configured otherwise.
pub(crate) const DEFAULT_GROWTH_SLOTS: usize = 8;

/// Builder for creating an instance of [`SlotPool`].
///
/// The slot layout is mandatory; use either `.layout()` or `.layout_of::<T>()`. Other settings
/// are optional:
///
/// * `name` defaults to `"slot"`.
/// * `initial_slots` defaults to 8.
/// * `growth_slots` defaults to 8. Zero disables growth.
/// * `traits` defaults to [`AllocTraits::NEVER_FREE`].
/// * `raw_allocator` defaults to [`SystemAllocator`].
/// * `critical_section` defaults to [`HOST_CRITICAL_SECTION`].
///
/// # Examples
///
/// ```
/// use new_zealand::nz;
/// use pooled_fn::{AllocTraits, SlotPool};
///
/// let pool = SlotPool::builder()
///     .name("timers")
///     .layout_of::<[usize; 3]>()
///     .initial_slots(nz!(16))
///     .growth_slots(0)
///     .traits(AllocTraits::RECLAIMABLE)
///     .build();
///
/// assert_eq!(pool.capacity(), 16);
/// ```
#[derive(Debug)]
#[must_use]
pub struct SlotPoolBuilder {
    name: &'static str,
    item_layout: Option<Layout>,
    initial_slots: NonZero<usize>,
    growth_slots: usize,
    traits: AllocTraits,
    raw_allocator: Option<Arc<dyn RawAllocator>>,
    critical_section: &'static dyn CriticalSection,

    // Prevents Sync while allowing Send - builders are thread-mobile but not thread-safe
    _not_sync: PhantomData<Cell<()>>,
}

impl SlotPoolBuilder {
    #[inline]
    pub(crate) fn new() -> Self {
        Self {
            name: "slot",
            item_layout: None,
            initial_slots: DEFAULT_INITIAL_SLOTS,
            growth_slots: DEFAULT_GROWTH_SLOTS,
            traits: AllocTraits::default(),
            raw_allocator: None,
            critical_section: &HOST_CRITICAL_SECTION,
            _not_sync: PhantomData,
        }
    }

    /// Sets the name used to identify the pool in errors and log events.
    #[inline]
    pub fn name(mut self, name: &'static str) -> Self {
        self.name = name;
        self
    }

    /// Sets the memory layout of the items stored in the slots.
    ///
    /// Slots may end up larger and more aligned than this, as every vacant slot also has to hold
    /// a free list element.
    #[inline]
    pub fn layout(mut self, layout: Layout) -> Self {
        self.item_layout = Some(layout);
        self
    }

    /// Sets the memory layout of the items stored in the slots based on a type.
    #[inline]
    pub fn layout_of<T>(mut self) -> Self {
        self.item_layout = Some(Layout::new::<T>());
        self
    }

    /// Sets the number of slots in the chunk allocated when the pool is built.
    #[inline]
    pub fn initial_slots(mut self, slots: NonZero<usize>) -> Self {
        self.initial_slots = slots;
        self
    }

    /// Sets the number of slots added whenever the pool runs out. Zero disables growth, making
    /// the pool report [`Error::PoolExhausted`] instead.
    #[inline]
    pub fn growth_slots(mut self, slots: usize) -> Self {
        self.growth_slots = slots;
        self
    }

    /// Sets the hints passed to the raw allocator with every chunk request.
    #[inline]
    pub fn traits(mut self, traits: AllocTraits) -> Self {
        self.traits = traits;
        self
    }

    /// Sets the allocator that provides chunks of slots.
    #[inline]
    pub fn raw_allocator(mut self, raw_allocator: Arc<dyn RawAllocator>) -> Self {
        self.raw_allocator = Some(raw_allocator);
        self
    }

    /// Sets the critical section that serializes taking slots off the free list.
    ///
    /// On a microcontroller this is where an interrupt-disabling implementation goes.
    #[inline]
    pub fn critical_section(mut self, critical_section: &'static dyn CriticalSection) -> Self {
        self.critical_section = critical_section;
        self
    }

    /// Builds the pool and allocates its initial chunk.
    ///
    /// # Errors
    ///
    /// Returns [`Error::RawAllocationFailed`] if the raw allocator cannot provide the initial
    /// chunk and [`Error::LayoutOverflow`] if the initial chunk does not fit in the address
    /// space.
    ///
    /// # Panics
    ///
    /// Panics if no layout has been set using either [`layout`](Self::layout) or
    /// [`layout_of`](Self::layout_of).
    pub fn try_build(self) -> Result<SlotPool> {
        let item_layout = self
            .item_layout
            .expect("SlotPool requires a layout to be set via layout() or layout_of()");

        let slot_layout = slot_layout_for(item_layout).ok_or(Error::LayoutOverflow {
            pool: self.name,
            slots: self.initial_slots.get(),
        })?;

        let raw_allocator = self
            .raw_allocator
            .unwrap_or_else(|| Arc::new(SystemAllocator));

        let pool = SlotPool::new(
            self.name,
            slot_layout,
            self.growth_slots,
            self.traits,
            raw_allocator,
            TailQueue::with_critical_section(self.critical_section),
        );

        pool.grow(self.initial_slots.get())?;

        Ok(pool)
    }

    /// Builds the pool and allocates its initial chunk.
    ///
    /// # Panics
    ///
    /// Panics if no layout has been set or if the initial chunk cannot be allocated.
    #[must_use]
    pub fn build(self) -> SlotPool {
        let name = self.name;

        self.try_build()
            .unwrap_or_else(|error| panic!("failed to build slot pool '{name}': {error}"))
    }
}

/// Widens an item layout so that a vacant slot can hold a free list element, then pads it so
/// that it can be used as the stride of a slot array.
fn slot_layout_for(item_layout: Layout) -> Option<Layout> {
    let free_list_layout = Layout::new::<QueueElement>();

    Layout::from_size_align(
        item_layout.size().max(free_list_layout.size()),
        item_layout.align().max(free_list_layout.align()),
    )
    .ok()
    .map(|layout| layout.pad_to_align())
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use std::fmt::Debug;

    use static_assertions::{assert_impl_all, assert_not_impl_any};

    use super::*;

    assert_impl_all!(SlotPoolBuilder: Send, Debug);
    assert_not_impl_any!(SlotPoolBuilder: Sync);

    #[test]
    fn defaults() {
        let pool = SlotPool::builder().layout_of::<u32>().build();

        assert_eq!(pool.name(), "slot");
        assert_eq!(pool.capacity(), DEFAULT_INITIAL_SLOTS.get());
        assert_eq!(pool.growth_slots(), DEFAULT_GROWTH_SLOTS);
        assert!(pool.traits().is_never_free());
    }

    #[test]
    #[should_panic(expected = "requires a layout")]
    fn build_without_layout_panics() {
        drop(SlotPool::builder().build());
    }

    #[test]
    fn explicit_layout_is_widened() {
        let pool = SlotPool::builder()
            .layout(Layout::from_size_align(1, 1).unwrap())
            .build();

        assert_eq!(pool.slot_layout(), Layout::new::<QueueElement>().pad_to_align());
    }

    #[test]
    fn zero_sized_items_still_get_slots() {
        let pool = SlotPool::builder().layout_of::<()>().build();

        assert_eq!(pool.slot_layout().size(), size_of::<QueueElement>());
        assert!(pool.allocate().is_some());
    }

    #[test]
    fn slot_layout_keeps_large_sizes() {
        let item = Layout::from_size_align(100, 4).unwrap();
        let slot = slot_layout_for(item).unwrap();

        assert_eq!(slot.align(), align_of::<QueueElement>().max(4));
        assert!(slot.size() >= 100);
        assert_eq!(slot.size() % slot.align(), 0);
    }

    #[test]
    fn build_failure_panics_with_pool_name() {
        let result = std::panic::catch_unwind(|| {
            SlotPool::builder()
                .name("tiny")
                .layout_of::<u64>()
                .raw_allocator(Arc::new(crate::BudgetAllocator::new(
                    Arc::new(SystemAllocator),
                    0,
                )))
                .build()
        });

        let payload = result.unwrap_err();
        let message = payload.downcast_ref::<String>().unwrap();
        assert!(message.contains("'tiny'"));
    }
}
