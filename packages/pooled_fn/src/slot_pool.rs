use std::alloc::Layout;
use std::fmt;
use std::iter;
use std::ptr::{self, NonNull};
use std::sync::Arc;
use std::sync::atomic::{AtomicPtr, AtomicUsize, Ordering};

use tail_queue::{QueueElement, TailQueue};
use tracing::{debug, trace, warn};

use crate::{AllocTraits, Error, RawAllocator, Result, SlotPoolBuilder};

/// Hands out fixed-size slots of memory from chunks obtained from a [`RawAllocator`].
///
/// Every vacant slot embeds a [`QueueElement`] and sits on a lock-free free list, so allocating
/// and freeing a slot never calls the raw allocator and is safe to do from interrupt context.
/// When the free list runs dry the pool grows by one chunk of
/// [`growth_slots()`][Self::growth_slots] slots, which does call the raw allocator and is
/// therefore only safe where the raw allocator is. A pool configured with zero growth slots
/// never grows on its own and reports [`Error::PoolExhausted`] instead.
///
/// Chunks are never removed while the pool exists, so a slot address stays valid until the
/// pool is dropped. With [`AllocTraits::NEVER_FREE`] (the default) chunks outlive even the pool.
///
/// The pool deals in raw memory only. It never reads or drops what callers place in a slot.
///
/// # Examples
///
/// ```
/// use new_zealand::nz;
/// use pooled_fn::SlotPool;
///
/// let pool = SlotPool::builder()
///     .name("packets")
///     .layout_of::<[u8; 48]>()
///     .initial_slots(nz!(4))
///     .growth_slots(0)
///     .build();
///
/// let slot = pool.allocate().expect("the pool starts with four vacant slots");
/// assert_eq!(pool.outstanding(), 1);
///
/// // SAFETY: The slot came from this pool and is not used after being freed.
/// unsafe {
///     pool.free(slot);
/// }
/// assert_eq!(pool.outstanding(), 0);
/// ```
pub struct SlotPool {
    name: &'static str,

    /// Size and alignment of one slot. Always large enough to hold a `QueueElement` and padded
    /// to its own alignment, so it is also the stride between slots in a chunk.
    slot_layout: Layout,

    growth_slots: usize,
    traits: AllocTraits,
    raw_allocator: Arc<dyn RawAllocator>,

    free_slots: TailQueue,

    /// Most recently added chunk. Chunks form a singly linked list through their headers.
    chunks: AtomicPtr<ChunkHeader>,

    capacity: AtomicUsize,
    outstanding: AtomicUsize,
}

/// Stored at the start of every chunk, followed by the slot array.
struct ChunkHeader {
    next: *mut ChunkHeader,
    slot_count: usize,
    slots_offset: usize,
    layout: Layout,
}

impl ChunkHeader {
    fn first_slot(chunk: NonNull<Self>) -> NonNull<u8> {
        // SAFETY: Chunk headers are only created by `SlotPool::grow()`, which writes them at the
        // start of a live chunk.
        let offset = unsafe { chunk.as_ref() }.slots_offset;

        // SAFETY: The slot array starts `slots_offset` bytes into the same chunk allocation.
        unsafe { chunk.cast::<u8>().add(offset) }
    }
}

/// Computes the layout of a chunk holding `slots` slots, plus the offset of the first slot.
fn chunk_layout(slot_layout: Layout, slots: usize) -> Option<(Layout, usize)> {
    let array_size = slot_layout.size().checked_mul(slots)?;
    let array_layout = Layout::from_size_align(array_size, slot_layout.align()).ok()?;

    let (chunk_layout, slots_offset) = Layout::new::<ChunkHeader>().extend(array_layout).ok()?;

    Some((chunk_layout.pad_to_align(), slots_offset))
}

impl SlotPool {
    /// Creates a builder for configuring a new slot pool.
    #[inline]
    pub fn builder() -> SlotPoolBuilder {
        SlotPoolBuilder::new()
    }

    /// Creates an empty pool. The builder adds the initial chunk.
    pub(crate) fn new(
        name: &'static str,
        slot_layout: Layout,
        growth_slots: usize,
        traits: AllocTraits,
        raw_allocator: Arc<dyn RawAllocator>,
        free_slots: TailQueue,
    ) -> Self {
        Self {
            name,
            slot_layout,
            growth_slots,
            traits,
            raw_allocator,
            free_slots,
            chunks: AtomicPtr::new(ptr::null_mut()),
            capacity: AtomicUsize::new(0),
            outstanding: AtomicUsize::new(0),
        }
    }

    /// Takes a vacant slot, growing the pool if needed and permitted.
    ///
    /// The returned memory has the pool's [`slot_layout()`][Self::slot_layout] and holds no
    /// meaningful value. Return it with [`free()`][Self::free] once done.
    ///
    /// # Errors
    ///
    /// * [`Error::PoolExhausted`] if no slot is vacant and the pool does not grow on its own.
    /// * [`Error::RawAllocationFailed`] if growing failed because the raw allocator is out of
    ///   memory.
    /// * [`Error::LayoutOverflow`] if a chunk of [`growth_slots()`][Self::growth_slots] slots
    ///   does not fit in the address space.
    pub fn try_allocate(&self) -> Result<NonNull<u8>> {
        loop {
            if let Some(element) = self.free_slots.pop_head() {
                // Cannot overflow because outstanding slots never exceed the capacity.
                self.outstanding.fetch_add(1, Ordering::Relaxed);

                return Ok(element.cast());
            }

            if self.growth_slots == 0 {
                let capacity = self.capacity();
                warn!(pool = self.name, capacity, "slot pool exhausted");

                return Err(Error::PoolExhausted {
                    pool: self.name,
                    capacity,
                });
            }

            self.grow(self.growth_slots)?;
        }
    }

    /// Takes a vacant slot, growing the pool if needed and permitted.
    ///
    /// Returns `None` where [`try_allocate()`][Self::try_allocate] returns an error.
    #[must_use]
    #[inline]
    pub fn allocate(&self) -> Option<NonNull<u8>> {
        self.try_allocate().ok()
    }

    /// Returns a slot to the free list.
    ///
    /// Whatever was stored in the slot is overwritten without being dropped.
    ///
    /// # Safety
    ///
    /// The caller must pass a slot obtained from this pool that has not been freed since, and
    /// must not access the slot afterwards.
    pub unsafe fn free(&self, slot: NonNull<u8>) {
        debug_assert!(
            self.owns(slot),
            "slot {slot:p} does not belong to pool '{}'",
            self.name
        );

        let element = slot.cast::<QueueElement>();

        // SAFETY: The slot layout is at least as large and as aligned as a `QueueElement` and
        // the caller guarantees the slot is ours and no longer in use.
        unsafe {
            element.write(QueueElement::new(ptr::null_mut()));
        }

        self.outstanding.fetch_sub(1, Ordering::Relaxed);

        // SAFETY: The element lives in one of our chunks, which stay in place while the pool
        // exists, and it was not linked because the slot was in use.
        unsafe {
            self.free_slots.push_tail(element);
        }
    }

    /// Ensures at least `additional` slots are vacant, growing by one chunk if needed.
    ///
    /// Use this to provision the pool ahead of time, outside interrupt context, so that later
    /// allocations never need to grow. This works even if the pool does not grow on its own.
    ///
    /// # Errors
    ///
    /// Returns [`Error::RawAllocationFailed`] or [`Error::LayoutOverflow`] if growing fails.
    pub fn reserve(&self, additional: usize) -> Result<()> {
        let shortfall = additional.saturating_sub(self.available());

        if shortfall == 0 {
            return Ok(());
        }

        self.grow(shortfall)
    }

    /// Adds a chunk of `slots` slots to the pool and puts all of them on the free list.
    pub(crate) fn grow(&self, slots: usize) -> Result<()> {
        let (layout, slots_offset) =
            chunk_layout(self.slot_layout, slots).ok_or(Error::LayoutOverflow {
                pool: self.name,
                slots,
            })?;

        let Some(chunk) = self.raw_allocator.allocate(layout, self.traits) else {
            warn!(
                pool = self.name,
                slots,
                bytes = layout.size(),
                "raw allocator refused to provide a chunk"
            );

            return Err(Error::RawAllocationFailed {
                pool: self.name,
                bytes: layout.size(),
            });
        };

        let header = chunk.cast::<ChunkHeader>();
        let mut previous = self.chunks.load(Ordering::Relaxed);

        loop {
            // SAFETY: The chunk is freshly allocated with a layout that starts with a
            // `ChunkHeader`, and nobody else can see it until the exchange below succeeds.
            unsafe {
                header.write(ChunkHeader {
                    next: previous,
                    slot_count: slots,
                    slots_offset,
                    layout,
                });
            }

            match self.chunks.compare_exchange_weak(
                previous,
                header.as_ptr(),
                Ordering::Release,
                Ordering::Relaxed,
            ) {
                Ok(_) => break,
                Err(actual) => previous = actual,
            }
        }

        // Cannot overflow because that would imply more slots than fit in the address space.
        let capacity = self
            .capacity
            .fetch_add(slots, Ordering::Relaxed)
            .wrapping_add(slots);

        let first_slot = ChunkHeader::first_slot(header);

        for index in 0..slots {
            // Cannot overflow because the whole slot array fits in the chunk layout.
            let offset = index.wrapping_mul(self.slot_layout.size());

            // SAFETY: The offset is within the slot array of the chunk we just allocated.
            let slot = unsafe { first_slot.add(offset) };

            // The slot layout is aligned for `QueueElement` and padded to its own alignment.
            let element = slot.cast::<QueueElement>();

            // SAFETY: The slot is within our chunk and suitably sized and aligned.
            unsafe {
                element.write(QueueElement::new(ptr::null_mut()));
            }

            // SAFETY: The element lives in a chunk that stays in place while the pool exists.
            unsafe {
                self.free_slots.push_tail(element);
            }
        }

        debug!(
            pool = self.name,
            slots,
            bytes = layout.size(),
            capacity,
            "slot pool grew"
        );

        Ok(())
    }

    /// Whether `ptr` is the start of a slot in one of this pool's chunks.
    ///
    /// This walks the chunk list, so it is intended for diagnostics and debug assertions.
    #[must_use]
    pub fn owns(&self, ptr: NonNull<u8>) -> bool {
        let address = ptr.as_ptr().addr();

        self.chunk_headers().any(|chunk| {
            // SAFETY: Chunk headers stay valid while the pool exists.
            let slot_count = unsafe { chunk.as_ref() }.slot_count;

            let start = ChunkHeader::first_slot(chunk).as_ptr().addr();

            // Cannot overflow because the slot array fits in the chunk allocation.
            let end = start.wrapping_add(slot_count.wrapping_mul(self.slot_layout.size()));

            address >= start
                && address < end
                && address
                    .wrapping_sub(start)
                    .checked_rem(self.slot_layout.size())
                    == Some(0)
        })
    }

    fn chunk_headers(&self) -> impl Iterator<Item = NonNull<ChunkHeader>> + '_ {
        let mut current = NonNull::new(self.chunks.load(Ordering::Acquire));

        iter::from_fn(move || {
            let chunk = current?;

            // SAFETY: Chunk headers stay valid while the pool exists and are immutable once
            // published.
            current = NonNull::new(unsafe { chunk.as_ref() }.next);

            Some(chunk)
        })
    }

    /// Name of the pool, used in diagnostics.
    #[must_use]
    #[inline]
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Size and alignment of every slot.
    #[must_use]
    #[inline]
    pub fn slot_layout(&self) -> Layout {
        self.slot_layout
    }

    /// Number of slots the pool adds each time it runs out. Zero if the pool never grows on its
    /// own.
    #[must_use]
    #[inline]
    pub fn growth_slots(&self) -> usize {
        self.growth_slots
    }

    /// Hints passed to the raw allocator with every chunk request.
    #[must_use]
    #[inline]
    pub fn traits(&self) -> AllocTraits {
        self.traits
    }

    /// Total number of slots, vacant or not.
    #[must_use]
    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity.load(Ordering::Relaxed)
    }

    /// Number of slots currently handed out.
    #[must_use]
    #[inline]
    pub fn outstanding(&self) -> usize {
        self.outstanding.load(Ordering::Relaxed)
    }

    /// Number of vacant slots.
    ///
    /// Advisory only, as slots may be taken or returned concurrently. This walks the free list.
    #[must_use]
    #[cfg_attr(test, mutants::skip)] // Advisory value, only used for diagnostics and reserve().
    pub fn available(&self) -> usize {
        self.free_slots.count()
    }

    /// Number of chunks obtained from the raw allocator.
    #[must_use]
    pub fn chunk_count(&self) -> usize {
        self.chunk_headers().count()
    }
}

impl Drop for SlotPool {
    fn drop(&mut self) {
        let outstanding = self.outstanding();

        if outstanding > 0 {
            // Something may still point into our chunks, so we cannot give them back.
            warn!(
                pool = self.name,
                outstanding, "slot pool dropped with slots still in use, retaining its chunks"
            );
            return;
        }

        if self.traits.is_never_free() {
            trace!(
                pool = self.name,
                chunks = self.chunk_count(),
                "retaining never-free chunks of dropped slot pool"
            );
            return;
        }

        let mut current = NonNull::new(*self.chunks.get_mut());

        while let Some(chunk) = current {
            // SAFETY: Chunk headers stay valid until deallocated right below.
            let header = unsafe { chunk.as_ref() };
            current = NonNull::new(header.next);
            let layout = header.layout;

            // SAFETY: The chunk came from our raw allocator with this layout and nothing is
            // using any of its slots, as there are no outstanding allocations.
            unsafe {
                self.raw_allocator.deallocate(chunk.cast(), layout);
            }
        }
    }
}

impl fmt::Debug for SlotPool {
    #[cfg_attr(coverage_nightly, coverage(off))] // No API contract to test.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SlotPool")
            .field("name", &self.name)
            .field("slot_layout", &self.slot_layout)
            .field("growth_slots", &self.growth_slots)
            .field("traits", &self.traits)
            .field("capacity", &self.capacity())
            .field("outstanding", &self.outstanding())
            .field("raw_allocator", &self.raw_allocator)
            .finish_non_exhaustive()
    }
}
