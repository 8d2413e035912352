//! # Register bus
//!
//! [`LocalApic`](crate::LocalApic) decides *where* a register lives; an
//! [`ApicBus`] performs the access. The kernel uses [`HardwareBus`], tests
//! substitute a recorder.

use kernel_alloc::PhysMapper;
use kernel_memory_addresses::PhysicalAddress;

/// Raw register access for the local APIC.
pub trait ApicBus {
    fn read_msr(&self, msr: u32) -> u64;
    fn write_msr(&self, msr: u32, value: u64);
    fn read_mmio(&self, address: PhysicalAddress) -> u32;
    fn write_mmio(&self, address: PhysicalAddress, value: u32);
}

impl<B: ApicBus + ?Sized> ApicBus for &B {
    #[inline]
    fn read_msr(&self, msr: u32) -> u64 {
        (**self).read_msr(msr)
    }

    #[inline]
    fn write_msr(&self, msr: u32, value: u64) {
        (**self).write_msr(msr, value);
    }

    #[inline]
    fn read_mmio(&self, address: PhysicalAddress) -> u32 {
        (**self).read_mmio(address)
    }

    #[inline]
    fn write_mmio(&self, address: PhysicalAddress, value: u32) {
        (**self).write_mmio(address, value);
    }
}

/// `rdmsr`/`wrmsr` and volatile MMIO through a [`PhysMapper`].
#[cfg(target_arch = "x86_64")]
#[derive(Debug, Clone, Copy)]
pub struct HardwareBus<M> {
    mapper: M,
}

#[cfg(target_arch = "x86_64")]
impl<M: PhysMapper> HardwareBus<M> {
    /// # Safety
    /// - Only usable at CPL 0.
    /// - `mapper` must map the xAPIC window uncached and writable.
    pub const unsafe fn new(mapper: M) -> Self {
        Self { mapper }
    }
}

#[cfg(target_arch = "x86_64")]
impl<M: PhysMapper> ApicBus for HardwareBus<M> {
    #[inline]
    fn read_msr(&self, msr: u32) -> u64 {
        // SAFETY: CPL 0 is guaranteed by `HardwareBus::new`.
        unsafe { kernel_registers::msr::Msr::new(msr).load_raw() }
    }

    #[inline]
    fn write_msr(&self, msr: u32, value: u64) {
        // SAFETY: as above.
        unsafe { kernel_registers::msr::Msr::new(msr).store_raw(value) }
    }

    #[inline]
    fn read_mmio(&self, address: PhysicalAddress) -> u32 {
        let ptr = self.mapper.phys_to_virt(address).as_mut_ptr::<u32>();
        // SAFETY: the window is mapped per `HardwareBus::new`.
        unsafe { ptr.read_volatile() }
    }

    #[inline]
    fn write_mmio(&self, address: PhysicalAddress, value: u32) {
        let ptr = self.mapper.phys_to_virt(address).as_mut_ptr::<u32>();
        // SAFETY: as above.
        unsafe { ptr.write_volatile(value) }
    }
}
