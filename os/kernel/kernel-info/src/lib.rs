//! # Kernel Configuration and Boot Interface
//!
//! The authoritative source for everything the loader and the kernel must
//! agree on, and for the compile-time constants shared across kernel crates.
//!
//! ## Modules
//!
//! ### Boot Information ([`boot`])
//! The fixed-layout handoff block a loader stage passes to the kernel entry
//! point: magic, capability flags (notably whether the local interrupt
//! controller runs in extended x2APIC mode), placement of the boot stack,
//! the info block, the descriptor tables, the optional syscall entry, and
//! pointers to the memory map and the core table. The kernel reads it once
//! during bootstrap and never again.
//!
//! ### Memory Map ([`memory_map`])
//! `(address, length, available)` records describing physical memory. The
//! physical page allocator consumes them once to size its descriptor map and
//! to reserve everything that is not usable RAM.
//!
//! ### Memory Layout ([`memory`])
//! Compile-time constants: higher-half direct map base, the application
//! processor trampoline page, the xAPIC MMIO window, stack sizes, and the
//! maximum number of cores.
//!
//! ## ABI
//! All handoff structures are `#[repr(C)]` with fixed-size integers only. No
//! Rust enums with payloads and no `bool` cross the boundary.
//!
//! ```rust
//! use kernel_info::boot::{BootFlags, KernelBootInfo};
//!
//! let mut info = KernelBootInfo::empty();
//! info.flags = BootFlags::new().with_extended_apic(true);
//! assert!(info.validate().is_ok());
//! assert!(info.flags.extended_apic());
//! ```

#![cfg_attr(not(any(test, doctest)), no_std)]
#![allow(unsafe_code)]

pub mod boot;
pub mod memory;
pub mod memory_map;
