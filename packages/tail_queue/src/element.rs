use std::fmt;
use std::ptr;
use std::sync::atomic::{AtomicPtr, Ordering};

/// A link in a [`TailQueue`][crate::TailQueue], embedded in memory owned by the caller.
///
/// The element carries an opaque payload pointer that the queue never dereferences. The `next`
/// link is only ever touched by the queue, through atomic operations.
///
/// An element must not move or be dropped while it is linked into a queue.
pub struct QueueElement {
    /// Points toward the head of the queue (the element pushed before this one).
    /// Null when this element is the head.
    pub(crate) next: AtomicPtr<QueueElement>,

    data: *mut (),
}

impl QueueElement {
    /// Creates an unlinked element carrying the given payload pointer.
    #[must_use]
    #[inline]
    pub const fn new(data: *mut ()) -> Self {
        Self {
            next: AtomicPtr::new(ptr::null_mut()),
            data,
        }
    }

    /// The payload pointer this element was created with.
    #[must_use]
    #[inline]
    pub fn data(&self) -> *mut () {
        self.data
    }

    /// Replaces the payload pointer. Exclusive access guarantees the element is not linked.
    #[inline]
    pub fn set_data(&mut self, data: *mut ()) {
        self.data = data;
    }
}

impl fmt::Debug for QueueElement {
    #[cfg_attr(coverage_nightly, coverage(off))] // No API contract to test.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueueElement")
            .field("next", &self.next.load(Ordering::Relaxed))
            .field("data", &self.data)
            .finish()
    }
}

// SAFETY: The payload pointer is opaque to us and never dereferenced; the link is atomic.
unsafe impl Send for QueueElement {}
// SAFETY: Shared access only reads the payload pointer and uses atomics for the link.
unsafe impl Sync for QueueElement {}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use std::fmt::Debug;

    use static_assertions::assert_impl_all;

    use super::*;

    assert_impl_all!(QueueElement: Send, Sync, Debug);

    #[test]
    fn new_element_is_unlinked() {
        let element = QueueElement::new(ptr::null_mut());

        assert!(element.next.load(Ordering::Relaxed).is_null());
        assert!(element.data().is_null());
    }

    #[test]
    fn set_data_replaces_payload() {
        let mut payload = 42_u32;
        let mut element = QueueElement::new(ptr::null_mut());

        element.set_data((&raw mut payload).cast());

        assert_eq!(element.data(), (&raw mut payload).cast::<()>());
    }
}
