use core::sync::atomic::{AtomicU8, Ordering};
use kernel_info::memory::MAX_CORES;
use kernel_sync::{CoreCounter, CoreId, SmpBarrier};

/// Bring-up progress of one core.
///
/// ```text
/// Absent ──INIT──▶ InitRequested ──STARTUP──▶ Started ──┬─▶ Ready
///                                                       └─▶ TimedOut
/// ```
///
/// `Ready` is claimed by the application core itself, `TimedOut` by the
/// bootstrap core. Whoever swaps `Started` first wins, so a core that answers
/// late never joins a round that already gave up on it.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CoreState {
    Absent = 0,
    InitRequested = 1,
    Started = 2,
    Ready = 3,
    TimedOut = 4,
}

impl CoreState {
    #[must_use]
    pub const fn from_u8(value: u8) -> Self {
        match value {
            1 => Self::InitRequested,
            2 => Self::Started,
            3 => Self::Ready,
            4 => Self::TimedOut,
            _ => Self::Absent,
        }
    }

    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Ready | Self::TimedOut)
    }
}

/// One atomic [`CoreState`] per slot of the boot core table.
pub struct CoreStates {
    slots: [AtomicU8; MAX_CORES],
}

impl Default for CoreStates {
    fn default() -> Self {
        Self::new()
    }
}

impl CoreStates {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            slots: [const { AtomicU8::new(CoreState::Absent as u8) }; MAX_CORES],
        }
    }

    /// # Panics
    /// If `slot` is not below [`MAX_CORES`].
    #[must_use]
    pub fn get(&self, slot: usize) -> CoreState {
        CoreState::from_u8(self.slots[slot].load(Ordering::Acquire))
    }

    /// # Panics
    /// If `slot` is not below [`MAX_CORES`].
    pub fn set(&self, slot: usize, state: CoreState) {
        self.slots[slot].store(state as u8, Ordering::Release);
    }

    /// Moves `slot` from `from` to `to`; fails with the observed state.
    ///
    /// # Errors
    /// The state actually found if it was not `from`.
    ///
    /// # Panics
    /// If `slot` is not below [`MAX_CORES`].
    pub fn advance(&self, slot: usize, from: CoreState, to: CoreState) -> Result<(), CoreState> {
        self.slots[slot]
            .compare_exchange(from as u8, to as u8, Ordering::AcqRel, Ordering::Acquire)
            .map(|_| ())
            .map_err(CoreState::from_u8)
    }

    /// Number of slots in state `state`.
    #[must_use]
    pub fn count(&self, state: CoreState) -> usize {
        (0..MAX_CORES).filter(|&slot| self.get(slot) == state).count()
    }
}

/// The state shared between the bootstrap core and the application cores
/// during bring-up.
pub struct SmpState {
    states: CoreStates,
    counter: CoreCounter,
    barrier: SmpBarrier,
}

impl Default for SmpState {
    fn default() -> Self {
        Self::new()
    }
}

impl SmpState {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            states: CoreStates::new(),
            counter: CoreCounter::new(),
            barrier: SmpBarrier::new(0),
        }
    }

    #[inline]
    #[must_use]
    pub const fn states(&self) -> &CoreStates {
        &self.states
    }

    #[inline]
    #[must_use]
    pub const fn counter(&self) -> &CoreCounter {
        &self.counter
    }

    #[inline]
    #[must_use]
    pub const fn barrier(&self) -> &SmpBarrier {
        &self.barrier
    }

    /// Registers the bootstrap core in `slot`. Must be the first registration.
    pub fn register_bootstrap(&self, slot: usize) -> CoreId {
        let id = self.counter.register();
        debug_assert!(id.is_bootstrap(), "bootstrap core registered as {id}");
        self.states.set(slot, CoreState::Ready);
        id
    }
}
