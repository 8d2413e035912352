//! # Memory Layout

pub use kernel_memory_addresses::{PAGE_SHIFT, PAGE_SIZE};

/// A simple Higher Half Direct Map (HHDM) base.
/// Anything mapped at [`HHDM_BASE`] + `pa` lets the kernel
/// access physical memory via a fixed offset.
pub const HHDM_BASE: u64 = 0xffff_8880_0000_0000;

/// Where the kernel executes (VMA).
///
/// # Kernel Build
/// Sourced by the kernel's `build.rs` to configure the linker.
pub const KERNEL_BASE: u64 = 0xffff_ffff_8000_0000;

/// Physical load address of the kernel image (LMA base).
pub const PHYS_LOAD: u64 = 0x0010_0000;

/// Physical page the application-processor startup code is copied to.
///
/// The STARTUP message carries this page number (`0x08`), so it must be
/// page-aligned and below 1 MiB where cores begin in real mode.
pub const AP_TRAMPOLINE_PAGE: u64 = 0x8000;

/// First byte above the real-mode addressable range.
pub const REAL_MODE_LIMIT: u64 = 0x10_0000;

/// Physical base of the xAPIC register window (legacy addressing mode).
pub const XAPIC_MMIO_BASE: u64 = 0xFEE0_0000;

/// Upper bound on cores the kernel tracks, bootstrap core included.
pub const MAX_CORES: usize = 64;

/// The size of the kernel stack in debug builds.
#[cfg(debug_assertions)]
pub const KERNEL_STACK_SIZE: usize = 64 * 1024;

/// The size of the kernel stack in release builds.
#[cfg(not(debug_assertions))]
pub const KERNEL_STACK_SIZE: usize = 32 * 1024;

/// Stack given to each application core for its startup path.
pub const AP_STACK_SIZE: usize = 16 * 1024;

const _: () = {
    assert!(KERNEL_STACK_SIZE.is_multiple_of(4096));
    assert!(AP_STACK_SIZE.is_multiple_of(4096));
    assert!(AP_TRAMPOLINE_PAGE.is_multiple_of(PAGE_SIZE));
    assert!(AP_TRAMPOLINE_PAGE < REAL_MODE_LIMIT);
    assert!(XAPIC_MMIO_BASE.is_multiple_of(PAGE_SIZE));
    assert!(KERNEL_BASE > HHDM_BASE);
    assert!(PHYS_LOAD >= REAL_MODE_LIMIT);
    assert!(MAX_CORES >= 1);
};
