use core::hint::spin_loop;
use core::sync::atomic::{AtomicBool, Ordering};

#[cfg(debug_assertions)]
use core::sync::atomic::{AtomicPtr, AtomicU32};

/// Owner marker stored while nobody holds the lock.
#[cfg(debug_assertions)]
const NO_OWNER: u32 = u32::MAX;

/// Function used in debug builds to tag the holder of a [`Spinlock`].
///
/// Stored type-erased; `null` means no source was registered and every
/// acquisition is tagged with core `0`.
#[cfg(debug_assertions)]
static CORE_ID_SOURCE: AtomicPtr<()> = AtomicPtr::new(core::ptr::null_mut());

/// Registers the function that reports the id of the executing core.
///
/// Debug builds record its result as the owner marker of every acquired
/// [`Spinlock`]. Release builds ignore the registration.
pub fn set_core_id_source(source: fn() -> u32) {
    #[cfg(debug_assertions)]
    CORE_ID_SOURCE.store(source as *mut (), Ordering::Release);
    #[cfg(not(debug_assertions))]
    let _ = source;
}

#[cfg(debug_assertions)]
fn current_core_id() -> u32 {
    let ptr = CORE_ID_SOURCE.load(Ordering::Acquire);
    if ptr.is_null() {
        return 0;
    }

    // SAFETY: only `set_core_id_source` writes this slot, always with a `fn() -> u32`.
    let source: fn() -> u32 = unsafe { core::mem::transmute(ptr) };
    source()
}

/// A word-sized busy-wait lock without associated data.
///
/// States are **Free** and **Held**. [`acquire`](Self::acquire) is the only
/// Free→Held transition and [`release`](Self::release) the only Held→Free one.
/// There is no queueing: contenders race on every release, so starvation is
/// possible.
///
/// In debug builds the lock remembers which core holds it and dropping a
/// lock that is still held fails a debug assertion, since it means a critical
/// section was leaked.
pub struct Spinlock {
    held: AtomicBool,
    #[cfg(debug_assertions)]
    owner: AtomicU32,
}

impl Default for Spinlock {
    fn default() -> Self {
        Self::new()
    }
}

impl Spinlock {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            held: AtomicBool::new(false),
            #[cfg(debug_assertions)]
            owner: AtomicU32::new(NO_OWNER),
        }
    }

    /// Spins until the lock is taken by the caller.
    #[inline]
    pub fn acquire(&self) {
        // Test-and-test-and-set: only retry the CAS once the flag reads free.
        while self
            .held
            .compare_exchange_weak(false, true, Ordering::Acquire, Ordering::Relaxed)
            .is_err()
        {
            while self.held.load(Ordering::Relaxed) {
                spin_loop();
            }
        }
        self.mark_owner();
    }

    /// Attempts the Free→Held transition once.
    #[inline]
    #[must_use]
    pub fn try_acquire(&self) -> bool {
        let acquired = self
            .held
            .compare_exchange(false, true, Ordering::Acquire, Ordering::Relaxed)
            .is_ok();
        if acquired {
            self.mark_owner();
        }
        acquired
    }

    /// Stores Free.
    ///
    /// # Safety
    /// The caller must hold the lock. Releasing a lock held by someone else
    /// breaks mutual exclusion for whatever data the lock protects.
    #[inline]
    pub unsafe fn release(&self) {
        debug_assert!(self.is_held(), "release of a spinlock that is not held");
        #[cfg(debug_assertions)]
        self.owner.store(NO_OWNER, Ordering::Relaxed);
        self.held.store(false, Ordering::Release);
    }

    /// Whether the lock is currently Held. Only a snapshot.
    #[inline]
    #[must_use]
    pub fn is_held(&self) -> bool {
        self.held.load(Ordering::Relaxed)
    }

    /// The core that holds the lock, if any (debug builds only).
    #[cfg(debug_assertions)]
    #[must_use]
    pub fn holder(&self) -> Option<u32> {
        match self.owner.load(Ordering::Relaxed) {
            NO_OWNER => None,
            id => Some(id),
        }
    }

    #[inline]
    #[allow(clippy::unused_self)]
    fn mark_owner(&self) {
        #[cfg(debug_assertions)]
        self.owner.store(current_core_id(), Ordering::Relaxed);
    }
}

impl Drop for Spinlock {
    fn drop(&mut self) {
        debug_assert!(
            !*self.held.get_mut(),
            "spinlock dropped while held (leaked critical section)"
        );
    }
}

#[cfg(all(test, debug_assertions))]
mod tests {
    use super::*;

    #[test]
    fn owner_defaults_to_core_zero_without_a_source() {
        let lock = Spinlock::new();
        assert_eq!(lock.holder(), None);
        lock.acquire();
        assert!(lock.holder().is_some());
        unsafe { lock.release() };
        assert_eq!(lock.holder(), None);
    }
}
