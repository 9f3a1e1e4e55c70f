use std::fmt;
use std::marker::PhantomData;

use parking_lot::lock_api::RawReentrantMutex;
use parking_lot::{RawMutex, RawThreadId};

/// Opaque state captured when entering a critical section and restored when leaving it.
///
/// On a microcontroller this is typically the interrupt mask register value observed on entry,
/// so that nested sections restore the interrupt-enable state that was in effect before the
/// outermost one.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct RestoreState(usize);

impl RestoreState {
    /// Wraps a raw platform-specific state value.
    #[must_use]
    #[inline]
    pub const fn new(raw: usize) -> Self {
        Self(raw)
    }

    /// The raw platform-specific state value.
    #[must_use]
    #[inline]
    pub const fn raw(self) -> usize {
        self.0
    }
}

/// Excludes all other execution contexts that use the same implementation.
///
/// Sections nest: every [`enter()`][Self::enter] must be paired with an
/// [`exit()`][Self::exit] on the same execution context, in reverse order, and the state
/// returned by `enter()` must be passed back to the matching `exit()`.
///
/// Prefer [`CriticalSectionGuard`], which pairs the calls automatically.
///
/// # Safety
///
/// While any context is between `enter()` and the matching `exit()`, no other context may
/// complete an `enter()` on the same implementation. Code relying on this trait (such as the
/// pop path of [`TailQueue`][crate::TailQueue]) is only sound if this holds.
pub unsafe trait CriticalSection: Sync + fmt::Debug {
    /// Enters the critical section, returning the state to restore on exit.
    fn enter(&self) -> RestoreState;

    /// Leaves the critical section, restoring the state captured by the matching `enter()`.
    ///
    /// # Safety
    ///
    /// The caller must pass the state returned by the most recent unmatched `enter()` made by
    /// the current execution context.
    unsafe fn exit(&self, restore: RestoreState);
}

/// Keeps a critical section entered for as long as the guard is alive.
///
/// The guard is not [`Send`] because a critical section must be left by the
/// execution context that entered it.
pub struct CriticalSectionGuard<'a> {
    section: &'a dyn CriticalSection,
    restore: RestoreState,

    _not_send: PhantomData<*const ()>,
}

impl<'a> CriticalSectionGuard<'a> {
    /// Enters `section` and returns a guard that leaves it on drop.
    #[must_use]
    #[inline]
    pub fn enter(section: &'a dyn CriticalSection) -> Self {
        let restore = section.enter();

        Self {
            section,
            restore,
            _not_send: PhantomData,
        }
    }
}

impl Drop for CriticalSectionGuard<'_> {
    #[inline]
    fn drop(&mut self) {
        // SAFETY: The guard is !Send and guards are dropped in reverse order of creation on
        // the same context, so this is the matching exit for the enter() in the constructor.
        unsafe {
            self.section.exit(self.restore);
        }
    }
}

impl fmt::Debug for CriticalSectionGuard<'_> {
    #[cfg_attr(coverage_nightly, coverage(off))] // No API contract to test.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CriticalSectionGuard")
            .field("section", &self.section)
            .field("restore", &self.restore)
            .finish()
    }
}

/// Process-wide lock shared by every [`HostCriticalSection`].
static HOST_LOCK: RawReentrantMutex<RawMutex, RawThreadId> = RawReentrantMutex::INIT;

/// Critical section for hosted targets, where there are threads instead of interrupts.
///
/// All instances share one process-wide reentrant lock, so sections nest on the same thread and
/// exclude every other thread. The restore state is unused.
#[derive(Clone, Copy, Debug, Default)]
pub struct HostCriticalSection;

/// The shared [`HostCriticalSection`] instance used by [`TailQueue::new()`][crate::TailQueue::new].
pub static HOST_CRITICAL_SECTION: HostCriticalSection = HostCriticalSection;

// SAFETY: The reentrant lock admits only the owning thread until it has been fully released.
unsafe impl CriticalSection for HostCriticalSection {
    #[inline]
    fn enter(&self) -> RestoreState {
        HOST_LOCK.lock();
        RestoreState::default()
    }

    #[inline]
    unsafe fn exit(&self, _restore: RestoreState) {
        // SAFETY: Forwarding the pairing requirement to the caller, which guarantees this thread
        // holds the lock from the matching enter().
        unsafe {
            HOST_LOCK.unlock();
        }
    }
}
