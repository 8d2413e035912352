use crate::CoreCounter;
use core::hint::spin_loop;
use core::sync::atomic::{AtomicUsize, Ordering};

/// Rendezvous point for a known number of cores.
///
/// The barrier is seeded with the number of expected participants. Every core
/// calling [`reach`](Self::reach) decrements the counter and then spins until
/// it observes zero, so nobody proceeds before the last participant arrived.
///
/// # Rounds
/// A barrier can be reused, but [`reset`](Self::reset) must only run after the
/// previous round has opened and no participant is still spinning in `reach`.
/// In practice only the bootstrap core resets, after it has itself observed
/// [`is_open`](Self::is_open). Resetting with stragglers fails a debug
/// assertion and is undefined in release builds.
///
/// # Single-core builds
/// Without the `smp` feature the barrier is a plain flag: `reset` sets it to
/// one and `reach` clears it without waiting.
pub struct SmpBarrier {
    remaining: AtomicUsize,
}

impl SmpBarrier {
    /// Creates a barrier expecting `participants` cores.
    #[must_use]
    pub const fn new(participants: usize) -> Self {
        Self {
            remaining: AtomicUsize::new(participants),
        }
    }

    /// Re-arms the barrier for `participants` cores.
    #[cfg(feature = "smp")]
    pub fn reset(&self, participants: usize) {
        debug_assert!(
            self.is_open(),
            "barrier reset while {} core(s) are still expected",
            self.value()
        );
        self.remaining.store(participants, Ordering::Release);
    }

    /// Re-arms the barrier for a single core.
    #[cfg(not(feature = "smp"))]
    pub fn reset(&self, _participants: usize) {
        self.remaining.store(1, Ordering::Release);
    }

    /// Re-arms the barrier for every core currently registered in `cores`.
    pub fn reset_to_active(&self, cores: &CoreCounter) {
        self.reset(cores.active());
    }

    /// Arrives at the barrier and waits for all other participants.
    #[cfg(feature = "smp")]
    pub fn reach(&self) {
        let before = self.remaining.fetch_sub(1, Ordering::AcqRel);
        debug_assert!(before > 0, "more cores reached the barrier than expected");

        while self.remaining.load(Ordering::Acquire) != 0 {
            spin_loop();
        }
    }

    /// Arrives at the barrier. With one core there is nobody to wait for.
    #[cfg(not(feature = "smp"))]
    pub fn reach(&self) {
        self.remaining.store(0, Ordering::Release);
    }

    /// Whether all expected participants have arrived.
    #[inline]
    #[must_use]
    pub fn is_open(&self) -> bool {
        self.value() == 0
    }

    /// Number of participants still expected.
    #[inline]
    #[must_use]
    pub fn value(&self) -> usize {
        self.remaining.load(Ordering::Acquire)
    }
}

impl Default for SmpBarrier {
    /// An open barrier; call [`reset`](Self::reset) before the first round.
    fn default() -> Self {
        Self::new(0)
    }
}
