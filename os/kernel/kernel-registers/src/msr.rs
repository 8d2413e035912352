//! # Model-Specific Registers (MSR)
//!
//! Raw `RDMSR`/`WRMSR` access plus the registers the kernel needs to find and
//! drive its local interrupt controller:
//!
//! - `IA32_APIC_BASE` (`0x1B`): enable bits, x2APIC mode bit, and the physical
//!   base of the xAPIC register window.
//! - The x2APIC register block (`0x800..=0x8FF`): each xAPIC register at MMIO
//!   offset `0x10 * n` is reachable as MSR `0x800 + n`.
//! - `IA32_GS_BASE` (`0xC000_0101`): per-core pointer to the core's domain.
//!
//! ## References
//! - Intel SDM Vol. 3, §11.4.4 "Local APIC Status and Location"
//! - Intel SDM Vol. 3, §11.12.1 "Detecting and Enabling x2APIC Mode"

mod ia32_apic_base;
mod ia32_gs_base;

pub use ia32_apic_base::Ia32ApicBase;
pub use ia32_gs_base::Ia32GsBase;

/// Identifies a **Model-Specific Register (MSR)** by its architectural index.
#[repr(transparent)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Msr(pub u32);

impl Msr {
    /// First index of the x2APIC register block.
    pub const X2APIC_BASE: u32 = 0x800;

    #[inline(always)]
    #[allow(clippy::inline_always)]
    #[must_use]
    pub const fn new(index: u32) -> Self {
        Self(index)
    }

    /// The MSR backing the local APIC register with the given
    /// register index (MMIO offset divided by 16).
    #[inline]
    #[must_use]
    pub const fn x2apic(register: u32) -> Self {
        Self(Self::X2APIC_BASE + register)
    }

    #[inline(always)]
    #[allow(clippy::inline_always)]
    #[must_use]
    pub const fn raw(self) -> u32 {
        self.0
    }

    /// Write a 64-bit value to this MSR.
    ///
    /// # Safety
    /// - Executes the privileged `WRMSR` instruction; only valid at CPL 0.
    /// - The MSR must exist and be writable on the current core, otherwise
    ///   the write raises `#GP(0)`.
    #[cfg(all(feature = "asm", target_arch = "x86_64"))]
    #[inline]
    #[allow(clippy::cast_possible_truncation)]
    #[doc(alias = "wrmsr")]
    pub unsafe fn store_raw(self, val: u64) {
        let lo = (val & 0xFFFF_FFFF) as u32;
        let hi = (val >> 32) as u32;
        unsafe {
            core::arch::asm!(
                "wrmsr",
                in("ecx") self.raw(),
                in("eax") lo,
                in("edx") hi,
                options(nostack, preserves_flags)
            );
        }
    }

    /// Read the 64-bit value of this MSR.
    ///
    /// # Safety
    /// Same requirements as [`Msr::store_raw`].
    #[cfg(all(feature = "asm", target_arch = "x86_64"))]
    #[inline(always)]
    #[allow(clippy::inline_always)]
    #[doc(alias = "rdmsr")]
    pub unsafe fn load_raw(self) -> u64 {
        let lo: u32;
        let hi: u32;
        unsafe {
            core::arch::asm!(
                "rdmsr",
                in("ecx") self.raw(),
                out("eax") lo,
                out("edx") hi,
                options(nomem, nostack, preserves_flags)
            );
        }
        (u64::from(hi) << 32) | u64::from(lo)
    }
}

/// Canonical if bits 63..48 are all copies of bit 47.
#[inline]
#[must_use]
pub const fn is_canonical(addr: u64) -> bool {
    let sign = (addr >> 47) & 1;
    (addr >> 48) == if sign == 0 { 0 } else { 0xFFFF }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn x2apic_indices() {
        assert_eq!(Msr::x2apic(0x02).raw(), 0x802);
        assert_eq!(Msr::x2apic(0x0B).raw(), 0x80B);
        assert_eq!(Msr::x2apic(0x30).raw(), 0x830);
    }

    #[test]
    fn canonical_addresses() {
        assert!(is_canonical(0x0000_7fff_ffff_f000));
        assert!(is_canonical(0xffff_8880_0000_0000));
        assert!(!is_canonical(0x0000_8000_0000_0000));
    }
}
