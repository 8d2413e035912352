use crate::msr::{Msr, is_canonical};
use core::ptr::NonNull;

/// `IA32_GS_BASE` (MSR `0xC000_0101`).
///
/// The kernel parks a pointer to the current core's domain record here so any
/// code running on the core can find it without a lookup table.
#[repr(transparent)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ia32GsBase(u64);

impl Ia32GsBase {
    pub const IA32_GS_BASE: u32 = 0xC000_0101;
    pub const MSR: Msr = Msr::new(Self::IA32_GS_BASE);

    #[must_use]
    pub fn from_ptr<T>(ptr: NonNull<T>) -> Self {
        let addr = ptr.as_ptr() as u64;
        debug_assert!(is_canonical(addr), "non-canonical GS base: {addr:#x}");
        Self(addr)
    }

    #[must_use]
    pub const fn as_u64(self) -> u64 {
        self.0
    }

    /// The stored pointer, or `None` if the base was never set.
    #[must_use]
    pub fn as_ptr<T>(self) -> Option<NonNull<T>> {
        NonNull::new(self.0 as *mut T)
    }
}

#[cfg(all(feature = "asm", target_arch = "x86_64"))]
impl crate::LoadRegisterUnsafe for Ia32GsBase {
    #[inline]
    unsafe fn load_unsafe() -> Self {
        Self(unsafe { Self::MSR.load_raw() })
    }
}

#[cfg(all(feature = "asm", target_arch = "x86_64"))]
impl crate::StoreRegisterUnsafe for Ia32GsBase {
    #[inline]
    unsafe fn store_unsafe(self) {
        unsafe { Self::MSR.store_raw(self.0) }
    }
}
