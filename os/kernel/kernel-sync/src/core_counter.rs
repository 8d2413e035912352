use core::fmt;
use core::sync::atomic::{AtomicUsize, Ordering};

/// Logical core number, dense from `0` in registration order.
///
/// The bootstrap core registers first and therefore is always `CoreId(0)`.
/// This is unrelated to the hardware APIC id, which may be sparse.
#[repr(transparent)]
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CoreId(pub usize);

impl CoreId {
    pub const BOOTSTRAP: Self = Self(0);

    #[inline]
    #[must_use]
    pub const fn index(self) -> usize {
        self.0
    }

    #[inline]
    #[must_use]
    pub const fn is_bootstrap(self) -> bool {
        self.0 == 0
    }
}

impl fmt::Display for CoreId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "core#{}", self.0)
    }
}

/// Atomic count of cores that have come online.
///
/// Each core calls [`register`](Self::register) exactly once when it is ready;
/// the returned [`CoreId`] is its identity for the rest of the kernel's life.
/// The bootstrap core polls [`active`](Self::active) to learn whether an
/// application core made it.
pub struct CoreCounter {
    active: AtomicUsize,
}

impl CoreCounter {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            active: AtomicUsize::new(0),
        }
    }

    /// Joins the set of active cores and returns the caller's logical id.
    #[inline]
    pub fn register(&self) -> CoreId {
        CoreId(self.active.fetch_add(1, Ordering::AcqRel))
    }

    /// Number of cores registered so far.
    #[inline]
    #[must_use]
    pub fn active(&self) -> usize {
        self.active.load(Ordering::Acquire)
    }
}

impl Default for CoreCounter {
    fn default() -> Self {
        Self::new()
    }
}
