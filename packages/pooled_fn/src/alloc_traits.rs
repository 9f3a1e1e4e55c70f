/// Hints passed to a [`RawAllocator`][crate::RawAllocator] along with every chunk request.
///
/// By default, chunks are never freed: a pool keeps its chunks for the rest of the process
/// lifetime, even after the pool itself is dropped. This lets an embedded raw allocator serve
/// them from a region that has no free operation at all.
///
/// # Examples
///
/// ```
/// use pooled_fn::{AllocTraits, SlotPool};
///
/// // A short-lived pool that gives its memory back when dropped.
/// let pool = SlotPool::builder()
///     .layout_of::<[u64; 4]>()
///     .traits(AllocTraits::RECLAIMABLE)
///     .build();
///
/// assert!(!pool.traits().is_never_free());
/// ```
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub struct AllocTraits {
    never_free: bool,
}

impl AllocTraits {
    /// Chunks are retained for the process lifetime. This is the default.
    pub const NEVER_FREE: Self = Self { never_free: true };

    /// Chunks are returned to the raw allocator when the pool is dropped.
    pub const RECLAIMABLE: Self = Self { never_free: false };

    /// Whether chunks obtained with these traits are never returned to the raw allocator.
    #[must_use]
    #[inline]
    pub const fn is_never_free(self) -> bool {
        self.never_free
    }
}

impl Default for AllocTraits {
    #[inline]
    fn default() -> Self {
        Self::NEVER_FREE
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;

    #[test]
    fn default_is_never_free() {
        assert_eq!(AllocTraits::default(), AllocTraits::NEVER_FREE);
        assert!(AllocTraits::NEVER_FREE.is_never_free());
        assert!(!AllocTraits::RECLAIMABLE.is_never_free());
    }
}
