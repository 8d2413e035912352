//! # Per-core domain
//!
//! Everything a core needs to find on its own: the descriptor table it runs
//! with and the shared physical page allocator. Each core owns exactly one
//! record, reachable through `IA32_GS_BASE` once [`Domain::activate`] ran.

use core::fmt;
use kernel_alloc::PhysicalPageAllocator;
use kernel_interrupts::DescriptorTablePointer;
use kernel_memory_addresses::PhysicalAddress;
use kernel_sync::SpinLock;

/// The allocator every domain shares.
pub type SharedAllocator = SpinLock<PhysicalPageAllocator<'static>>;

/// Per-core record. Deliberately neither `Clone` nor `Copy`.
pub struct Domain<'a> {
    gdt: DescriptorTablePointer,
    allocator: &'a SharedAllocator,
}

impl<'a> Domain<'a> {
    #[must_use]
    pub const fn new(gdt: DescriptorTablePointer, allocator: &'a SharedAllocator) -> Self {
        Self { gdt, allocator }
    }

    /// The `GDTR` image this core loads.
    #[inline]
    #[must_use]
    pub const fn gdt(&self) -> DescriptorTablePointer {
        self.gdt
    }

    #[inline]
    #[must_use]
    pub const fn allocator(&self) -> &'a SharedAllocator {
        self.allocator
    }

    /// Takes one page from the shared allocator.
    #[must_use]
    pub fn allocate_page(&self) -> Option<PhysicalAddress> {
        self.allocator.lock_irq().allocate_page()
    }
}

impl Domain<'static> {
    /// Loads the descriptor table and publishes this record as the
    /// executing core's domain.
    ///
    /// # Safety
    /// - CPL 0, interrupts disabled.
    /// - The table behind [`Domain::gdt`] must stay valid and contain the
    ///   selectors currently loaded.
    pub unsafe fn activate(&'static self) {
        #[cfg(all(target_arch = "x86_64", target_os = "none"))]
        {
            use kernel_registers::StoreRegisterUnsafe;
            use kernel_registers::msr::Ia32GsBase;

            // SAFETY: upheld by the caller.
            unsafe {
                self.gdt.load_gdt();
                Ia32GsBase::from_ptr(core::ptr::NonNull::from(self)).store_unsafe();
            }
        }
        log::trace!("domain activated, GDT at {:#x}", self.gdt.base());
    }

    /// The domain of the executing core, if [`Domain::activate`] ran on it.
    ///
    /// # Safety
    /// `IA32_GS_BASE` must either be zero or hold a pointer stored by
    /// [`Domain::activate`].
    #[cfg(all(target_arch = "x86_64", target_os = "none"))]
    #[must_use]
    pub unsafe fn current() -> Option<&'static Self> {
        use kernel_registers::LoadRegisterUnsafe;
        use kernel_registers::msr::Ia32GsBase;

        // SAFETY: upheld by the caller.
        let base = unsafe { Ia32GsBase::load_unsafe() };
        base.as_ptr::<Self>().map(|ptr| unsafe { ptr.as_ref() })
    }
}

impl fmt::Debug for Domain<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let gdt = self.gdt;
        f.debug_struct("Domain")
            .field("gdt_base", &format_args!("{:#x}", gdt.base()))
            .field("gdt_limit", &gdt.limit())
            .finish_non_exhaustive()
    }
}
