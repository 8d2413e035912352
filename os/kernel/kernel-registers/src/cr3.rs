use bitfield_struct::bitfield;
use kernel_memory_addresses::PhysicalAddress;

/// CR3: Page-Map Level-4 Base Register (PCID disabled).
///
/// Application cores start in real mode with paging off; the startup
/// trampoline loads the bootstrap core's CR3 so every core shares one
/// address space.
#[bitfield(u64)]
#[derive(PartialEq, Eq)]
pub struct Cr3 {
    #[bits(3)]
    __: u8,

    /// Bit 3: PWT: Page-level Write-Through for PML4 accesses.
    pub pwt: bool,

    /// Bit 4: PCD: Page-level Cache Disable for PML4 accesses.
    pub pcd: bool,

    #[bits(7)]
    __: u8,

    /// Bits 12–51: PML4 physical base >> 12.
    #[bits(40)]
    pml4_base_4k: u64,

    #[bits(12)]
    __: u16,
}

impl Cr3 {
    /// `pml4` must be 4 KiB-aligned.
    #[must_use]
    pub fn from_pml4(pml4: PhysicalAddress) -> Self {
        debug_assert!(pml4.is_page_aligned(), "PML4 base must be 4K-aligned");
        Self::new().with_pml4_base_4k(pml4.as_u64() >> 12)
    }

    #[must_use]
    pub const fn pml4(&self) -> PhysicalAddress {
        PhysicalAddress::new(self.pml4_base_4k() << 12)
    }

    /// The raw value as a 32-bit quantity, as needed by a trampoline that
    /// loads CR3 before entering long mode.
    ///
    /// Returns `None` when the PML4 lives above 4 GiB.
    #[must_use]
    pub fn as_low_u32(&self) -> Option<u32> {
        u32::try_from(self.into_bits()).ok()
    }
}

#[cfg(all(feature = "asm", target_arch = "x86_64"))]
impl crate::LoadRegisterUnsafe for Cr3 {
    unsafe fn load_unsafe() -> Self {
        let cr3: u64;
        unsafe {
            core::arch::asm!("mov {}, cr3", out(reg) cr3, options(nomem, nostack, preserves_flags));
        }
        Self::from_bits(cr3)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pml4_round_trip_and_low_half() {
        let cr3 = Cr3::from_pml4(PhysicalAddress::new(0x0010_2000)).with_pwt(true);
        assert_eq!(cr3.into_bits(), 0x0010_2008);
        assert_eq!(cr3.pml4(), PhysicalAddress::new(0x0010_2000));
        assert_eq!(cr3.as_low_u32(), Some(0x0010_2008));

        let high = Cr3::from_pml4(PhysicalAddress::new(0x1_0000_0000));
        assert_eq!(high.as_low_u32(), None);
    }
}
