use std::fmt;
use std::ptr::{self, NonNull};
use std::sync::atomic::{AtomicPtr, Ordering};

use crate::{CriticalSection, CriticalSectionGuard, HOST_CRITICAL_SECTION, QueueElement};

/// An intrusive queue that tracks only its most recently pushed element.
///
/// Elements are linked from the tail toward the head: every element points at the element that
/// was pushed before it, and the structural head (the oldest element) has a null `next` link.
///
/// Pushing is lock-free and may happen from any number of execution contexts at once. Popping
/// and counting walk the chain and are serialized through the queue's [`CriticalSection`].
///
/// The queue never owns the elements. Callers keep each element alive and in place from the
/// moment it is pushed until a pop returns it.
pub struct TailQueue {
    tail: AtomicPtr<QueueElement>,

    critical_section: &'static dyn CriticalSection,
}

impl TailQueue {
    /// Creates an empty queue that serializes pops with [`HOST_CRITICAL_SECTION`].
    #[must_use]
    pub const fn new() -> Self {
        Self::with_critical_section(&HOST_CRITICAL_SECTION)
    }

    /// Creates an empty queue that serializes pops with the given critical section.
    #[must_use]
    pub const fn with_critical_section(critical_section: &'static dyn CriticalSection) -> Self {
        Self {
            tail: AtomicPtr::new(ptr::null_mut()),
            critical_section,
        }
    }

    /// Links `element` into the queue as the new tail.
    ///
    /// Never blocks. Concurrent pushes retry their compare-and-swap until they land.
    ///
    /// # Safety
    ///
    /// The caller must guarantee that `element` is valid, is not currently linked into any
    /// queue, and stays valid and in place until it is returned by [`pop_head()`][Self::pop_head].
    pub unsafe fn push_tail(&self, element: NonNull<QueueElement>) {
        // SAFETY: The caller guarantees the element is valid.
        let element_ref = unsafe { element.as_ref() };

        let mut observed_tail = self.tail.load(Ordering::Relaxed);

        loop {
            // The element is not yet reachable by anyone else, so a plain store is enough. The
            // release on the tail exchange below publishes it.
            element_ref.next.store(observed_tail, Ordering::Relaxed);

            match self.tail.compare_exchange_weak(
                observed_tail,
                element.as_ptr(),
                Ordering::Release,
                Ordering::Relaxed,
            ) {
                Ok(_) => return,
                Err(actual) => observed_tail = actual,
            }
        }
    }

    /// Unlinks and returns the structural head of the queue (the oldest element).
    ///
    /// Returns `None` if the queue is empty. Walks the whole chain, so this is O(n) in the
    /// queue length.
    #[must_use]
    pub fn pop_head(&self) -> Option<NonNull<QueueElement>> {
        let _guard = CriticalSectionGuard::enter(self.critical_section);

        loop {
            let mut current = NonNull::new(self.tail.load(Ordering::Acquire))?;

            // The link that points at `current`. Only the tail link is ever written by pushers;
            // interior links only change under the critical section we are holding.
            let mut link = &self.tail;

            loop {
                // SAFETY: Linked elements stay valid until popped and we are the only popper.
                let current_ref = unsafe { current.as_ref() };

                match NonNull::new(current_ref.next.load(Ordering::Acquire)) {
                    Some(next) => {
                        link = &current_ref.next;
                        current = next;
                    }
                    None => break,
                }
            }

            // If `link` is the tail, a push may have landed since we read it. The exchange then
            // fails and we walk again from the new tail.
            if link
                .compare_exchange(
                    current.as_ptr(),
                    ptr::null_mut(),
                    Ordering::AcqRel,
                    Ordering::Acquire,
                )
                .is_ok()
            {
                return Some(current);
            }
        }
    }

    /// Whether the queue has no elements.
    ///
    /// Advisory only: concurrent pushes and pops may change the answer immediately.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tail.load(Ordering::Relaxed).is_null()
    }

    /// Counts the elements in the queue.
    ///
    /// Advisory only: pushes may land while counting. Walks the whole chain inside the critical
    /// section, so avoid this on hot paths.
    #[must_use]
    #[cfg_attr(test, mutants::skip)] // Advisory value, only used for diagnostics.
    pub fn count(&self) -> usize {
        let _guard = CriticalSectionGuard::enter(self.critical_section);

        let mut count: usize = 0;
        let mut current = self.tail.load(Ordering::Acquire);

        while let Some(element) = NonNull::new(current) {
            // Cannot overflow because every element occupies distinct memory.
            count = count.wrapping_add(1);

            // SAFETY: Linked elements stay valid until popped and popping is excluded by the
            // critical section we are holding.
            current = unsafe { element.as_ref() }.next.load(Ordering::Acquire);
        }

        count
    }
}

impl Default for TailQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for TailQueue {
    #[cfg_attr(coverage_nightly, coverage(off))] // No API contract to test.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TailQueue")
            .field("tail", &self.tail.load(Ordering::Relaxed))
            .field("critical_section", &self.critical_section)
            .finish()
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use std::collections::HashSet;
    use std::fmt::Debug;
    use std::sync::atomic::AtomicUsize;
    use std::thread;

    use static_assertions::assert_impl_all;

    use super::*;
    use crate::RestoreState;

    assert_impl_all!(TailQueue: Send, Sync, Debug, Default);

    fn elements(count: usize) -> Box<[QueueElement]> {
        (0..count)
            .map(|index| QueueElement::new(ptr::without_provenance_mut(index)))
            .collect()
    }

    #[test]
    fn new_queue_is_empty() {
        let queue = TailQueue::new();

        assert!(queue.is_empty());
        assert_eq!(queue.count(), 0);
        assert!(queue.pop_head().is_none());
    }

    #[test]
    fn pops_in_push_order() {
        let queue = TailQueue::new();
        let elements = elements(3);

        for element in &elements {
            // SAFETY: The elements outlive the queue usage and are pushed once each.
            unsafe {
                queue.push_tail(NonNull::from(element));
            }
        }

        assert!(!queue.is_empty());
        assert_eq!(queue.count(), 3);

        for element in &elements {
            assert_eq!(queue.pop_head(), Some(NonNull::from(element)));
        }

        assert!(queue.is_empty());
        assert!(queue.pop_head().is_none());
    }

    #[test]
    fn popped_element_is_unlinked_and_can_be_pushed_again() {
        let queue = TailQueue::new();
        let elements = elements(2);
        let mut iter = elements.iter();
        let first = iter.next().unwrap();
        let second = iter.next().unwrap();

        // SAFETY: The elements outlive the queue usage and are not linked elsewhere.
        unsafe {
            queue.push_tail(NonNull::from(first));
        }
        // SAFETY: As above.
        unsafe {
            queue.push_tail(NonNull::from(second));
        }

        let popped = queue.pop_head().unwrap();
        assert_eq!(popped, NonNull::from(first));
        assert!(first.next.load(Ordering::Relaxed).is_null());

        // SAFETY: `first` was just popped, so it is no longer linked.
        unsafe {
            queue.push_tail(popped);
        }

        assert_eq!(queue.pop_head(), Some(NonNull::from(second)));
        assert_eq!(queue.pop_head(), Some(NonNull::from(first)));
        assert!(queue.pop_head().is_none());
    }

    #[test]
    fn payload_survives_the_trip() {
        let queue = TailQueue::new();
        let elements = elements(5);

        for element in &elements {
            // SAFETY: The elements outlive the queue usage and are pushed once each.
            unsafe {
                queue.push_tail(NonNull::from(element));
            }
        }

        let payloads: Vec<usize> = std::iter::from_fn(|| queue.pop_head())
            // SAFETY: Every popped element is one of ours and still alive.
            .map(|element| unsafe { element.as_ref() }.data().addr())
            .collect();

        assert_eq!(payloads, vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn concurrent_pushes_lose_nothing() {
        const THREADS: usize = 4;
        // Under Miri, test runtime scales with the number of operations.
        const PER_THREAD: usize = if cfg!(miri) { 10 } else { 250 };

        let queue = TailQueue::new();
        let elements = elements(THREADS * PER_THREAD);

        thread::scope(|scope| {
            for chunk in elements.chunks(PER_THREAD) {
                let queue = &queue;

                scope.spawn(move || {
                    for element in chunk {
                        // SAFETY: Every element is pushed exactly once and outlives the scope.
                        unsafe {
                            queue.push_tail(NonNull::from(element));
                        }
                    }
                });
            }
        });

        assert_eq!(queue.count(), THREADS * PER_THREAD);

        let mut seen = HashSet::new();
        while let Some(element) = queue.pop_head() {
            assert!(seen.insert(element), "element returned twice");
        }

        assert_eq!(seen.len(), THREADS * PER_THREAD);
    }

    #[test]
    fn concurrent_push_and_pop_never_duplicate() {
        const THREADS: usize = 4;
        // Under Miri, test runtime scales with the number of operations.
        const PER_THREAD: usize = if cfg!(miri) { 20 } else { 500 };

        let queue = TailQueue::new();
        let elements = elements(THREADS * PER_THREAD);

        // Every element is cycled through the queue by its owning thread. A duplicate pop would
        // hand the same element to two threads, which would then both hold it as "in hand".
        let in_hand: Box<[AtomicUsize]> = (0..elements.len()).map(|_| AtomicUsize::new(0)).collect();

        for element in &elements {
            // SAFETY: Every element is pushed once and outlives the queue usage.
            unsafe {
                queue.push_tail(NonNull::from(element));
            }
        }

        thread::scope(|scope| {
            for _ in 0..THREADS {
                let queue = &queue;
                let in_hand = &in_hand;

                scope.spawn(move || {
                    for _ in 0..PER_THREAD {
                        let Some(element) = queue.pop_head() else {
                            continue;
                        };

                        // SAFETY: Popped elements are ours and still alive.
                        let index = unsafe { element.as_ref() }.data().addr();
                        let marker = in_hand.get(index).unwrap();

                        assert_eq!(marker.fetch_add(1, Ordering::Relaxed), 0);
                        assert_eq!(marker.fetch_sub(1, Ordering::Relaxed), 1);

                        // SAFETY: We just popped it, so it is unlinked and still alive.
                        unsafe {
                            queue.push_tail(element);
                        }
                    }
                });
            }
        });

        assert_eq!(queue.count(), elements.len());
    }

    #[derive(Debug, Default)]
    struct CountingSection {
        entered: AtomicUsize,
    }

    // SAFETY: Only used single-threaded in tests, so exclusion holds trivially.
    unsafe impl CriticalSection for CountingSection {
        fn enter(&self) -> RestoreState {
            self.entered.fetch_add(1, Ordering::Relaxed);
            RestoreState::default()
        }

        unsafe fn exit(&self, _restore: RestoreState) {}
    }

    #[test]
    fn pops_go_through_custom_critical_section() {
        static SECTION: CountingSection = CountingSection {
            entered: AtomicUsize::new(0),
        };

        let queue = TailQueue::with_critical_section(&SECTION);
        let element = QueueElement::new(ptr::null_mut());

        // SAFETY: The element outlives the queue usage and is not linked elsewhere.
        unsafe {
            queue.push_tail(NonNull::from(&element));
        }

        assert_eq!(SECTION.entered.load(Ordering::Relaxed), 0);

        _ = queue.pop_head();
        _ = queue.pop_head();
        _ = queue.count();

        assert_eq!(SECTION.entered.load(Ordering::Relaxed), 3);
    }
}
