//! # Virtual and Physical Memory Address Types
//!
//! Zero-cost wrappers that keep physical and virtual addresses apart at
//! compile time. Only 4 KiB frames are managed by this kernel core, so the page
//! arithmetic is fixed to [`PAGE_SIZE`].
//!
//! ```rust
//! # use kernel_memory_addresses::*;
//! let pa = PhysicalAddress::new(0x1234);
//! assert_eq!(pa.align_down().as_u64(), 0x1000);
//! assert_eq!(pa.align_up(), Some(PhysicalAddress::new(0x2000)));
//! assert_eq!(pa.frame_number(), 1);
//! ```

#![cfg_attr(not(any(test, doctest)), no_std)]
#![allow(clippy::inline_always)]

mod physical_address;
mod virtual_address;

pub use physical_address::PhysicalAddress;
pub use virtual_address::VirtualAddress;

/// log2 of [`PAGE_SIZE`].
pub const PAGE_SHIFT: u32 = 12;

/// Size of a physical page frame in bytes.
pub const PAGE_SIZE: u64 = 1 << PAGE_SHIFT;

/// Rounds `value` down to a multiple of [`PAGE_SIZE`].
#[inline(always)]
#[must_use]
pub const fn page_align_down(value: u64) -> u64 {
    value & !(PAGE_SIZE - 1)
}

/// Rounds `value` up to a multiple of [`PAGE_SIZE`], or `None` on overflow.
#[inline(always)]
#[must_use]
pub const fn page_align_up(value: u64) -> Option<u64> {
    match value.checked_add(PAGE_SIZE - 1) {
        Some(v) => Some(page_align_down(v)),
        None => None,
    }
}

/// Number of whole pages needed to hold `bytes` bytes.
#[inline(always)]
#[must_use]
pub const fn pages_for(bytes: u64) -> u64 {
    bytes.div_ceil(PAGE_SIZE)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn alignment_helpers() {
        assert_eq!(page_align_down(0), 0);
        assert_eq!(page_align_down(0xFFF), 0);
        assert_eq!(page_align_down(0x1000), 0x1000);
        assert_eq!(page_align_up(1), Some(0x1000));
        assert_eq!(page_align_up(0x1000), Some(0x1000));
        assert_eq!(page_align_up(u64::MAX), None);
        assert_eq!(pages_for(0), 0);
        assert_eq!(pages_for(1), 1);
        assert_eq!(pages_for(4096), 1);
        assert_eq!(pages_for(4097), 2);
    }
}
