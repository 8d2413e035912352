//! # Local interrupt controller
//!
//! The local APIC of each core delivers interrupts, accepts end-of-interrupt
//! acknowledgements, sends inter-processor interrupts and runs a timer. It
//! is reached either through a 4 KiB MMIO window (xAPIC) or through the MSR
//! block at `0x800` (x2APIC). The loader tells the kernel which one to use;
//! [`LocalApic::initialize`] latches that decision once.
//!
//! ```
//! use kernel_apic::{ApicBus, ApicMode, ApicRegister, LocalApic};
//! use kernel_memory_addresses::PhysicalAddress;
//! use std::cell::Cell;
//!
//! struct LastMsrWrite(Cell<(u32, u64)>);
//!
//! impl ApicBus for LastMsrWrite {
//!     fn read_msr(&self, _: u32) -> u64 { 0 }
//!     fn write_msr(&self, msr: u32, value: u64) { self.0.set((msr, value)); }
//!     fn read_mmio(&self, _: PhysicalAddress) -> u32 { 0 }
//!     fn write_mmio(&self, _: PhysicalAddress, _: u32) {}
//! }
//!
//! let apic = LocalApic::with_mode(ApicMode::X2Apic, LastMsrWrite(Cell::new((0, 1))));
//! apic.end_of_interrupt();
//! assert_eq!(apic.bus().0.get(), (0x80B, 0));
//! ```

#![cfg_attr(not(any(test, doctest)), no_std)]
#![allow(unsafe_code)]

mod bus;
mod local_apic;
mod register;

#[cfg(target_arch = "x86_64")]
pub use bus::HardwareBus;
pub use bus::ApicBus;
pub use local_apic::{ApicError, LocalApic, latched_mode};
pub use register::{
    ApicMode, ApicRegister, DeliveryMode, DestinationShorthand, IpiCommand, SpuriousVector,
    TimerDivisor, TimerLvt, TimerMode,
};
