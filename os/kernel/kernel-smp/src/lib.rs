//! # Multi-core bring-up
//!
//! The bootstrap core wakes the application cores listed in the boot core
//! table with INIT and STARTUP IPIs, one at a time, and waits for each to
//! report in. Every core ends up with its own [`Domain`]: the descriptor
//! table it loaded and a handle to the shared page allocator.
//!
//! * [`BringUp`]: the bootstrap side, bounded by a [`BringUpPolicy`].
//! * [`ApplicationCore`]: the application side of the handshake.
//! * [`SmpState`]: per-slot [`CoreState`]s, the core counter and the barrier.
//! * [`trampoline`]: the real-mode entry page and its parameter block.

#![cfg_attr(not(any(test, doctest)), no_std)]
#![allow(unsafe_code)]

mod application;
mod bringup;
mod domain;
mod state;
pub mod trampoline;

pub use application::ApplicationCore;
pub use bringup::{BringUp, BringUpPolicy, BringUpReport, Delay, StartupIpi, bootstrap_slot};
pub use domain::{Domain, SharedAllocator};
pub use state::{CoreState, CoreStates, SmpState};
pub use trampoline::{TrampolineError, TrampolineParameters};
