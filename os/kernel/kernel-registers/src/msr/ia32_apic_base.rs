use crate::msr::Msr;
use bitfield_struct::bitfield;
use kernel_memory_addresses::PhysicalAddress;

/// `IA32_APIC_BASE` (MSR `0x1B`).
///
/// Locates the local APIC and selects its addressing mode. The x2APIC bit
/// may only be set while the global enable bit is set; clearing it again
/// requires disabling the APIC first.
#[bitfield(u64, order = Lsb)]
#[derive(PartialEq, Eq)]
pub struct Ia32ApicBase {
    #[bits(8)]
    __: u8,

    /// Bit 8: BSP: this core is the bootstrap processor (read-only).
    #[bits(access = RO)]
    pub bsp: bool,

    #[bits(1)]
    __: u8,

    /// Bit 10: EXTD: x2APIC mode, registers are MSRs.
    pub x2apic_enable: bool,

    /// Bit 11: EN: global enable.
    pub enable: bool,

    /// Bits 12–51: physical base of the xAPIC window >> 12.
    #[bits(40)]
    base_4k: u64,

    #[bits(12)]
    __: u16,
}

impl Ia32ApicBase {
    pub const IA32_APIC_BASE: u32 = 0x1B;
    pub const MSR: Msr = Msr::new(Self::IA32_APIC_BASE);

    /// Physical base of the xAPIC register window.
    #[must_use]
    pub const fn base(&self) -> PhysicalAddress {
        PhysicalAddress::new(self.base_4k() << 12)
    }

    /// Sets the register window base; `base` must be 4 KiB-aligned.
    #[must_use]
    pub fn with_base(self, base: PhysicalAddress) -> Self {
        debug_assert!(base.is_page_aligned(), "APIC base must be 4K-aligned");
        self.with_base_4k(base.as_u64() >> 12)
    }
}

#[cfg(all(feature = "asm", target_arch = "x86_64"))]
impl crate::LoadRegisterUnsafe for Ia32ApicBase {
    #[inline]
    unsafe fn load_unsafe() -> Self {
        Self::from_bits(unsafe { Self::MSR.load_raw() })
    }
}

#[cfg(all(feature = "asm", target_arch = "x86_64"))]
impl crate::StoreRegisterUnsafe for Ia32ApicBase {
    #[inline]
    unsafe fn store_unsafe(self) {
        unsafe { Self::MSR.store_raw(self.into_bits()) }
    }
}
