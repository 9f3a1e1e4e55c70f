use std::alloc::{self, Layout};
use std::fmt;
use std::ptr::NonNull;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::AllocTraits;

/// Provides the chunks of memory that a [`SlotPool`][crate::SlotPool] carves into slots.
///
/// A pool only calls the raw allocator when it grows, never on the steady-state
/// allocate/free path. On an embedded target the implementation typically hands out memory from
/// a static region; on a hosted target [`SystemAllocator`] forwards to the global allocator.
pub trait RawAllocator: Send + Sync + fmt::Debug {
    /// Allocates a chunk with the given layout, or returns `None` if no memory is available.
    ///
    /// The layout always has a non-zero size.
    fn allocate(&self, layout: Layout, traits: AllocTraits) -> Option<NonNull<u8>>;

    /// Returns a chunk to the allocator.
    ///
    /// Pools only call this for chunks allocated with [`AllocTraits::RECLAIMABLE`].
    ///
    /// # Safety
    ///
    /// The caller must pass a chunk returned by [`allocate()`][Self::allocate] on this same
    /// allocator with the same `layout`, and must not use the chunk afterwards.
    unsafe fn deallocate(&self, chunk: NonNull<u8>, layout: Layout);
}

/// Forwards chunk requests to the Rust global allocator.
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemAllocator;

impl RawAllocator for SystemAllocator {
    #[inline]
    fn allocate(&self, layout: Layout, _traits: AllocTraits) -> Option<NonNull<u8>> {
        if layout.size() == 0 {
            return None;
        }

        // SAFETY: The layout has a non-zero size, checked above.
        NonNull::new(unsafe { alloc::alloc(layout) })
    }

    #[inline]
    unsafe fn deallocate(&self, chunk: NonNull<u8>, layout: Layout) {
        // SAFETY: Forwarding the caller's guarantee that the chunk came from `allocate()` with
        // this layout, which got it from the global allocator.
        unsafe {
            alloc::dealloc(chunk.as_ptr(), layout);
        }
    }
}

/// Wraps another raw allocator and refuses requests once a fixed byte budget is spent.
///
/// This models the fixed-size heap of a microcontroller, which makes it possible to exercise
/// the out-of-memory behavior of a pool on a hosted target. Bytes of deallocated chunks are
/// returned to the budget.
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
///
/// use pooled_fn::{BudgetAllocator, SlotPool, SystemAllocator};
///
/// let allocator = Arc::new(BudgetAllocator::new(Arc::new(SystemAllocator), 4096));
///
/// let pool = SlotPool::builder()
///     .layout_of::<u64>()
///     .raw_allocator(Arc::<BudgetAllocator>::clone(&allocator))
///     .build();
///
/// assert!(allocator.remaining() < 4096);
/// # drop(pool);
/// ```
pub struct BudgetAllocator {
    inner: Arc<dyn RawAllocator>,
    remaining: AtomicUsize,
}

impl BudgetAllocator {
    /// Creates an allocator that forwards up to `budget_bytes` bytes worth of chunks to `inner`.
    #[must_use]
    pub fn new(inner: Arc<dyn RawAllocator>, budget_bytes: usize) -> Self {
        Self {
            inner,
            remaining: AtomicUsize::new(budget_bytes),
        }
    }

    /// Number of bytes still available for new chunks.
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.remaining.load(Ordering::Relaxed)
    }
}

impl RawAllocator for BudgetAllocator {
    fn allocate(&self, layout: Layout, traits: AllocTraits) -> Option<NonNull<u8>> {
        self.remaining
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |remaining| {
                remaining.checked_sub(layout.size())
            })
            .ok()?;

        let chunk = self.inner.allocate(layout, traits);

        if chunk.is_none() {
            // Cannot overflow because we just subtracted the same amount.
            self.remaining.fetch_add(layout.size(), Ordering::Relaxed);
        }

        chunk
    }

    unsafe fn deallocate(&self, chunk: NonNull<u8>, layout: Layout) {
        // SAFETY: Forwarding the caller's guarantee. Every chunk we hand out came from `inner`.
        unsafe {
            self.inner.deallocate(chunk, layout);
        }

        // Cannot overflow because these bytes were subtracted when the chunk was allocated.
        self.remaining.fetch_add(layout.size(), Ordering::Relaxed);
    }
}

impl fmt::Debug for BudgetAllocator {
    #[cfg_attr(coverage_nightly, coverage(off))] // No API contract to test.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BudgetAllocator")
            .field("inner", &self.inner)
            .field("remaining", &self.remaining())
            .finish()
    }
}
