//! # Kernel synchronization primitives
//!
//! Busy-waiting building blocks shared by every core:
//!
//! * [`Spinlock`]: the raw Free/Held flag with `acquire`/`release`/`try_acquire`.
//! * [`SpinLock<T>`]: a guarded lock owning its data, built on [`Spinlock`].
//! * [`SmpBarrier`]: a rendezvous that releases once all expected cores arrived.
//! * [`CoreCounter`]: the atomic count of active cores, handing out logical ids.
//! * [`SyncOnceCell`]: a write-once latch for boot-time decisions.
//! * [`IrqGuard`]: saves and masks the local interrupt flag for a scope.
//!
//! None of the primitives offers a timeout or cancellation. A caller that needs
//! bounded waiting wraps them in its own retry loop.

#![cfg_attr(not(any(test, doctest)), no_std)]
#![allow(unsafe_code)]

mod barrier;
mod core_counter;
pub mod irq;
mod raw_spin;
mod spin_lock;
mod sync_once_cell;

pub use barrier::SmpBarrier;
pub use core_counter::{CoreCounter, CoreId};
pub use irq::{IrqGuard, IrqSpinLockGuard};
pub use raw_spin::{Spinlock, set_core_id_source};
pub use spin_lock::{SpinLock, SpinLockGuard};
pub use sync_once_cell::SyncOnceCell;
