//! # Kernel Entry Point
//!
//! The loader jumps to [`entry::_start_kernel`] on the bootstrap core with a
//! pointer to the [`KernelBootInfo`](kernel_info::boot::KernelBootInfo)
//! block. From there the bootstrap core
//!
//! 1. installs the debug-console logger,
//! 2. validates the boot block,
//! 3. seeds the physical page allocator from the memory map,
//! 4. builds and loads the gate table,
//! 5. latches the interrupt controller mode and enables the local APIC,
//! 6. copies the startup trampoline below 1 MiB and wakes the other cores,
//! 7. starts its timer and idles.
//!
//! Application cores arrive in [`ap::ap_entry`] through the trampoline.
//!
//! On the host the crate builds as an empty binary so `cargo test` over the
//! workspace does not need a bare-metal target.

#![cfg_attr(target_os = "none", no_std, no_main)]
#![allow(unsafe_code)]

#[cfg(target_os = "none")]
mod ap;
#[cfg(target_os = "none")]
mod bsp;
#[cfg(target_os = "none")]
mod entry;
#[cfg(target_os = "none")]
mod panic;
#[cfg(target_os = "none")]
mod trampoline;
#[cfg(target_os = "none")]
mod tsc;

#[cfg(not(target_os = "none"))]
fn main() {}
