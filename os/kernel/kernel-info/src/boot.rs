//! # Kernel Boot Information

use crate::memory_map::{MemoryMap, MemoryRegion};
use bitfield_struct::bitfield;
use kernel_memory_addresses::VirtualAddress;

/// Value of [`KernelBootInfo::magic`] written by a conforming loader (`"KBOOTINF"`).
pub const BOOT_INFO_MAGIC: u64 = u64::from_le_bytes(*b"KBOOTINF");

/// Errors detected while accepting a boot handoff block.
#[derive(thiserror::Error, Debug, Copy, Clone, PartialEq, Eq)]
pub enum BootInfoError {
    #[error("boot information pointer is null")]
    NullPointer,
    #[error("boot information magic mismatch: found {found:#018x}")]
    BadMagic { found: u64 },
    #[error("memory map pointer is null but {count} regions were announced")]
    MissingMemoryMap { count: u64 },
    #[error("core table pointer is null but {count} cores were announced")]
    MissingCoreTable { count: u64 },
    #[error("syscall entry flag is set but the entry address is zero")]
    MissingSyscallEntry,
}

/// Capability flags announced by the loader.
#[bitfield(u64)]
#[derive(PartialEq, Eq)]
pub struct BootFlags {
    /// The local interrupt controller runs in extended (x2APIC) mode and
    /// must be addressed through model-specific registers.
    pub extended_apic: bool,

    /// [`KernelBootInfo::syscall_entry`] holds a valid address.
    pub syscall_entry_present: bool,

    #[bits(62)]
    __: u64,
}

/// Information the kernel needs at its entry point.
///
/// Keep this `#[repr(C)]` and prefer fixed-size integers at the ABI boundary.
/// All addresses are virtual addresses valid in the kernel's address space
/// unless documented otherwise.
#[repr(C)]
#[derive(Clone, Debug)]
pub struct KernelBootInfo {
    /// Must equal [`BOOT_INFO_MAGIC`].
    pub magic: u64,

    /// Capability flags.
    pub flags: BootFlags,

    /// Lowest address of the bootstrap core's stack.
    pub stack_base: u64,

    /// Size of the bootstrap core's stack in bytes.
    pub stack_size: u64,

    /// Where this block itself lives.
    pub info_base: u64,

    /// Base of the global descriptor table prepared by the loader.
    pub gdt_base: u64,

    /// Base of the interrupt descriptor table storage.
    pub idt_base: u64,

    /// Syscall entry point, meaningful only with
    /// [`BootFlags::syscall_entry_present`].
    pub syscall_entry: u64,

    /// Physical memory map.
    pub memory_map: MemoryMapInfo,

    /// Cores discovered by the loader.
    pub cores: CoreTableInfo,
}

#[repr(C)]
#[derive(Clone, Copy, Debug, Default)]
pub struct MemoryMapInfo {
    /// Pointer to an array of [`MemoryRegion`] records.
    pub regions_ptr: u64,

    /// Number of records in the array.
    pub region_count: u64,
}

#[repr(C)]
#[derive(Clone, Copy, Debug, Default)]
pub struct CoreTableInfo {
    /// Pointer to an array of [`CoreDescriptor`] records.
    pub cores_ptr: u64,

    /// Number of records in the array.
    pub core_count: u64,
}

/// One entry of the loader's core table.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CoreDescriptor {
    /// Local interrupt controller ID of the core.
    pub apic_id: u32,

    /// Non-zero if the core is present and may be started.
    pub present: u32,
}

impl CoreDescriptor {
    #[must_use]
    pub const fn new(apic_id: u32, present: bool) -> Self {
        Self {
            apic_id,
            present: if present { 1 } else { 0 },
        }
    }

    #[must_use]
    pub const fn is_present(&self) -> bool {
        self.present != 0
    }
}

impl KernelBootInfo {
    /// A valid block with no memory map, no cores and no capabilities.
    #[must_use]
    pub const fn empty() -> Self {
        Self {
            magic: BOOT_INFO_MAGIC,
            flags: BootFlags::new(),
            stack_base: 0,
            stack_size: 0,
            info_base: 0,
            gdt_base: 0,
            idt_base: 0,
            syscall_entry: 0,
            memory_map: MemoryMapInfo {
                regions_ptr: 0,
                region_count: 0,
            },
            cores: CoreTableInfo {
                cores_ptr: 0,
                core_count: 0,
            },
        }
    }

    /// Accepts a raw handoff pointer and checks the block.
    ///
    /// # Errors
    /// See [`BootInfoError`].
    ///
    /// # Safety
    /// `ptr` must be null or point to a readable, properly aligned
    /// [`KernelBootInfo`] that stays valid for `'a`.
    pub unsafe fn from_raw<'a>(ptr: *const Self) -> Result<&'a Self, BootInfoError> {
        // SAFETY: the caller guarantees `ptr` is null or valid.
        let info = unsafe { ptr.as_ref() }.ok_or(BootInfoError::NullPointer)?;
        info.validate()?;
        Ok(info)
    }

    /// Checks the magic and the consistency of the announced tables.
    ///
    /// # Errors
    /// See [`BootInfoError`].
    pub const fn validate(&self) -> Result<(), BootInfoError> {
        if self.magic != BOOT_INFO_MAGIC {
            return Err(BootInfoError::BadMagic { found: self.magic });
        }
        if self.memory_map.regions_ptr == 0 && self.memory_map.region_count != 0 {
            return Err(BootInfoError::MissingMemoryMap {
                count: self.memory_map.region_count,
            });
        }
        if self.cores.cores_ptr == 0 && self.cores.core_count != 0 {
            return Err(BootInfoError::MissingCoreTable {
                count: self.cores.core_count,
            });
        }
        if self.flags.syscall_entry_present() && self.syscall_entry == 0 {
            return Err(BootInfoError::MissingSyscallEntry);
        }
        Ok(())
    }

    /// Whether the local interrupt controller must be driven through MSRs.
    #[inline]
    #[must_use]
    pub const fn extended_apic(&self) -> bool {
        self.flags.extended_apic()
    }

    /// The syscall entry point, if the loader provided one.
    #[must_use]
    pub const fn syscall_entry(&self) -> Option<VirtualAddress> {
        if self.flags.syscall_entry_present() {
            Some(VirtualAddress::new(self.syscall_entry))
        } else {
            None
        }
    }

    /// Top of the bootstrap stack (exclusive).
    #[must_use]
    pub const fn stack_top(&self) -> VirtualAddress {
        VirtualAddress::new(self.stack_base.wrapping_add(self.stack_size))
    }

    /// The physical memory map.
    ///
    /// # Safety
    /// [`MemoryMapInfo::regions_ptr`] must point to `region_count` readable
    /// [`MemoryRegion`] records that outlive `'a`.
    #[must_use]
    pub unsafe fn memory_map<'a>(&self) -> MemoryMap<'a> {
        let count = usize::try_from(self.memory_map.region_count).unwrap_or(0);
        if self.memory_map.regions_ptr == 0 || count == 0 {
            return MemoryMap::new(&[]);
        }

        let ptr = self.memory_map.regions_ptr as *const MemoryRegion;
        // SAFETY: the caller guarantees the table is valid.
        MemoryMap::new(unsafe { core::slice::from_raw_parts(ptr, count) })
    }

    /// The core table.
    ///
    /// # Safety
    /// [`CoreTableInfo::cores_ptr`] must point to `core_count` readable
    /// [`CoreDescriptor`] records that outlive `'a`.
    #[must_use]
    pub unsafe fn cores<'a>(&self) -> &'a [CoreDescriptor] {
        let count = usize::try_from(self.cores.core_count).unwrap_or(0);
        if self.cores.cores_ptr == 0 || count == 0 {
            return &[];
        }

        let ptr = self.cores.cores_ptr as *const CoreDescriptor;
        // SAFETY: the caller guarantees the table is valid.
        unsafe { core::slice::from_raw_parts(ptr, count) }
    }
}

const _: () = {
    assert!(size_of::<BootFlags>() == 8);
    assert!(size_of::<CoreDescriptor>() == 8);
    assert!(size_of::<KernelBootInfo>() == 12 * 8);
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_block_is_valid() {
        let info = KernelBootInfo::empty();
        assert_eq!(info.validate(), Ok(()));
        assert!(!info.extended_apic());
        assert_eq!(info.syscall_entry(), None);
    }

    #[test]
    fn rejects_wrong_magic() {
        let mut info = KernelBootInfo::empty();
        info.magic = 0xdead_beef;
        assert_eq!(
            info.validate(),
            Err(BootInfoError::BadMagic { found: 0xdead_beef })
        );
    }

    #[test]
    fn rejects_null_tables_with_counts() {
        let mut info = KernelBootInfo::empty();
        info.memory_map.region_count = 3;
        assert_eq!(
            info.validate(),
            Err(BootInfoError::MissingMemoryMap { count: 3 })
        );

        let mut info = KernelBootInfo::empty();
        info.cores.core_count = 2;
        assert_eq!(
            info.validate(),
            Err(BootInfoError::MissingCoreTable { count: 2 })
        );
    }

    #[test]
    fn syscall_entry_requires_flag() {
        let mut info = KernelBootInfo::empty();
        info.syscall_entry = 0xffff_ffff_8000_1000;
        assert_eq!(info.syscall_entry(), None);

        info.flags.set_syscall_entry_present(true);
        assert_eq!(
            info.syscall_entry(),
            Some(VirtualAddress::new(0xffff_ffff_8000_1000))
        );

        info.syscall_entry = 0;
        assert_eq!(info.validate(), Err(BootInfoError::MissingSyscallEntry));
    }

    #[test]
    fn from_raw_rejects_null() {
        let result = unsafe { KernelBootInfo::from_raw(core::ptr::null()) };
        assert_eq!(result.err(), Some(BootInfoError::NullPointer));
    }

    #[test]
    fn tables_are_read_through_pointers() {
        let regions = [
            MemoryRegion::new(0x0, 0x9_f000, true),
            MemoryRegion::new(0x9_f000, 0x6_1000, false),
        ];
        let cores = [CoreDescriptor::new(0, true), CoreDescriptor::new(1, false)];

        let mut info = KernelBootInfo::empty();
        info.memory_map = MemoryMapInfo {
            regions_ptr: regions.as_ptr() as u64,
            region_count: regions.len() as u64,
        };
        info.cores = CoreTableInfo {
            cores_ptr: cores.as_ptr() as u64,
            core_count: cores.len() as u64,
        };

        let info = unsafe { KernelBootInfo::from_raw(&raw const info) }.unwrap();
        let map = unsafe { info.memory_map() };
        assert_eq!(map.len(), 2);
        assert_eq!(map.available().count(), 1);

        let table = unsafe { info.cores() };
        assert!(table[0].is_present());
        assert!(!table[1].is_present());
    }
}
