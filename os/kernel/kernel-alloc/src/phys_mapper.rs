//! # Physical Memory Access
//!
//! Code can only dereference virtual addresses. [`PhysMapper`] turns a
//! physical address into a pointer in the current address space so the
//! allocator can place its descriptor map in the memory it manages and device
//! drivers can reach MMIO windows.
//!
//! With the higher-half direct map every physical address `pa` is visible at
//! `HHDM_BASE + pa`; [`HhdmPhysMapper`] does exactly that. Tests substitute a
//! heap buffer.

use kernel_info::memory::HHDM_BASE;
use kernel_memory_addresses::{PhysicalAddress, VirtualAddress};

/// Converts physical addresses to usable virtual addresses.
pub trait PhysMapper {
    /// The virtual address under which `pa` is visible.
    fn phys_to_virt(&self, pa: PhysicalAddress) -> VirtualAddress;

    /// # Safety
    /// - `pa` must be mapped writable for `size_of::<T>()` bytes.
    /// - The mapping must remain valid for `'a`.
    /// - The bytes at `pa` must be a valid `T` and not aliased for `'a`.
    #[inline]
    unsafe fn phys_to_mut<'a, T>(&self, pa: PhysicalAddress) -> &'a mut T {
        let ptr = self.phys_to_virt(pa).as_mut_ptr::<T>();
        // SAFETY: upheld by the caller.
        unsafe { &mut *ptr }
    }

    /// # Safety
    /// Same as [`PhysMapper::phys_to_mut`], for `len` consecutive `T`s.
    #[inline]
    unsafe fn phys_to_slice_mut<'a, T>(&self, pa: PhysicalAddress, len: usize) -> &'a mut [T] {
        let ptr = self.phys_to_virt(pa).as_mut_ptr::<T>();
        // SAFETY: upheld by the caller.
        unsafe { core::slice::from_raw_parts_mut(ptr, len) }
    }
}

/// [`PhysMapper`] for the kernel's higher-half direct map.
#[derive(Debug, Default, Clone, Copy)]
pub struct HhdmPhysMapper;

impl PhysMapper for HhdmPhysMapper {
    #[inline]
    fn phys_to_virt(&self, pa: PhysicalAddress) -> VirtualAddress {
        VirtualAddress::new(HHDM_BASE + pa.as_u64())
    }
}
