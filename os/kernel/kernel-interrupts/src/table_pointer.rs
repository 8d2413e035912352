//! # Descriptor Table Registers
//!
//! `lgdt`, `lidt`, `sgdt` and `sidt` all take the same 10-byte operand:
//! a 16-bit limit (size in bytes minus one) followed by a 64-bit base.

/// Image of `GDTR` or `IDTR`.
#[repr(C, packed)]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DescriptorTablePointer {
    pub limit: u16,
    pub base: u64,
}

const _: () = assert!(size_of::<DescriptorTablePointer>() == 10);

impl DescriptorTablePointer {
    #[must_use]
    pub const fn new(base: u64, limit: u16) -> Self {
        Self { limit, base }
    }

    /// Describes a table occupying `size` bytes at `base`.
    ///
    /// Returns `None` for empty tables and for tables larger than 64 KiB.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub const fn for_size(base: u64, size: usize) -> Option<Self> {
        if size == 0 || size > 0x1_0000 {
            return None;
        }
        Some(Self::new(base, (size - 1) as u16))
    }

    #[inline]
    #[must_use]
    pub const fn base(&self) -> u64 {
        self.base
    }

    #[inline]
    #[must_use]
    pub const fn limit(&self) -> u16 {
        self.limit
    }

    /// Table size in bytes.
    #[inline]
    #[must_use]
    pub const fn size(&self) -> usize {
        self.limit as usize + 1
    }

    /// Loads this image into `GDTR`.
    ///
    /// # Safety
    /// CPL 0; the table must be valid and stay in place while loaded, and its
    /// selectors must match the ones currently held in the segment registers.
    #[cfg(all(target_arch = "x86_64", target_os = "none"))]
    #[inline]
    pub unsafe fn load_gdt(&self) {
        unsafe {
            core::arch::asm!("lgdt [{}]", in(reg) core::ptr::from_ref(self), options(nostack, preserves_flags, readonly));
        }
    }

    /// Loads this image into `IDTR`.
    ///
    /// # Safety
    /// CPL 0; every present gate must point at valid handler code and the
    /// table must stay in place while loaded.
    #[cfg(all(target_arch = "x86_64", target_os = "none"))]
    #[inline]
    pub unsafe fn load_idt(&self) {
        unsafe {
            core::arch::asm!("lidt [{}]", in(reg) core::ptr::from_ref(self), options(nostack, preserves_flags, readonly));
        }
    }

    /// The `GDTR` of the executing core.
    #[cfg(all(target_arch = "x86_64", target_os = "none"))]
    #[inline]
    #[must_use]
    pub fn current_gdt() -> Self {
        let mut image = Self::new(0, 0);
        unsafe {
            core::arch::asm!("sgdt [{}]", in(reg) &raw mut image, options(nostack, preserves_flags));
        }
        image
    }

    /// The `IDTR` of the executing core.
    #[cfg(all(target_arch = "x86_64", target_os = "none"))]
    #[inline]
    #[must_use]
    pub fn current_idt() -> Self {
        let mut image = Self::new(0, 0);
        unsafe {
            core::arch::asm!("sidt [{}]", in(reg) &raw mut image, options(nostack, preserves_flags));
        }
        image
    }
}
