//! # Page Descriptors
//!
//! One byte per physical page frame:
//!
//! ```text
//!  7               2 1   0
//! ┌─────────────────┬─────┐
//! │  access count   │ st  │
//! └─────────────────┴─────┘
//! ```
//!
//! The two ranges are disjoint; every mutator only touches its own bits.

use bitfield_struct::bitfield;

/// Largest value the 6-bit access counter can hold.
pub const MAX_ACCESS_COUNT: u8 = 0x3F;

/// Lifecycle state of a physical page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum PageStatus {
    /// Available for allocation.
    Free = 0,
    /// Holds reclaimable cache contents.
    Caching = 1,
    /// Handed out by the allocator.
    InUse = 2,
    /// Never handed out (firmware, MMIO, the descriptor map itself).
    Reserved = 3,
}

impl PageStatus {
    pub const ALL: [Self; 4] = [Self::Free, Self::Caching, Self::InUse, Self::Reserved];

    /// Decodes the low two bits; higher bits are ignored.
    #[must_use]
    pub const fn from_bits(bits: u8) -> Self {
        match bits & 0b11 {
            0 => Self::Free,
            1 => Self::Caching,
            2 => Self::InUse,
            _ => Self::Reserved,
        }
    }

    #[must_use]
    pub const fn into_bits(self) -> u8 {
        self as u8
    }
}

/// Packed status and access counter of one physical page.
#[bitfield(u8)]
#[derive(PartialEq, Eq, Hash)]
pub struct PageDescriptor {
    /// Bits 0–1.
    #[bits(2)]
    pub status: PageStatus,

    /// Bits 2–7.
    #[bits(6)]
    accesses: u8,
}

impl PageDescriptor {
    /// A free page that was never accessed.
    pub const FREE: Self = Self::new();

    #[inline]
    #[must_use]
    pub const fn access_count(&self) -> u8 {
        self.accesses()
    }

    #[inline]
    pub fn free(&mut self) {
        self.set_status(PageStatus::Free);
    }

    #[inline]
    pub fn mark_in_use(&mut self) {
        self.set_status(PageStatus::InUse);
    }

    #[inline]
    pub fn mark_caching(&mut self) {
        self.set_status(PageStatus::Caching);
    }

    /// Marks the page reserved and pins its counter at the maximum.
    #[inline]
    pub fn reserve(&mut self) {
        self.set_status(PageStatus::Reserved);
        self.set_accesses(MAX_ACCESS_COUNT);
    }

    /// Bumps the access counter.
    ///
    /// The counter wraps from 63 to 1, never to 0, so a page that was ever
    /// touched stays distinguishable from one that never was.
    #[inline]
    pub fn increment_accesses(&mut self) {
        let next = if self.accesses() == MAX_ACCESS_COUNT {
            1
        } else {
            self.accesses() + 1
        };
        self.set_accesses(next);
    }

    #[inline]
    #[must_use]
    pub const fn is_free(&self) -> bool {
        matches!(self.status(), PageStatus::Free)
    }
}

const _: () = {
    assert!(size_of::<PageDescriptor>() == 1);
};
