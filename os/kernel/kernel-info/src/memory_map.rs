//! # Physical Memory Map

use kernel_memory_addresses::PhysicalAddress;

/// One `(address, length, available)` record of the loader's memory map.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct MemoryRegion {
    /// Physical start of the region.
    pub address: u64,

    /// Length of the region in bytes.
    pub length: u64,

    /// Non-zero if the region is usable RAM.
    pub available: u32,

    _reserved: u32,
}

impl MemoryRegion {
    #[must_use]
    pub const fn new(address: u64, length: u64, available: bool) -> Self {
        Self {
            address,
            length,
            available: if available { 1 } else { 0 },
            _reserved: 0,
        }
    }

    #[inline]
    #[must_use]
    pub const fn start(&self) -> PhysicalAddress {
        PhysicalAddress::new(self.address)
    }

    /// Exclusive end of the region, saturated at the top of the address space.
    #[inline]
    #[must_use]
    pub const fn end(&self) -> PhysicalAddress {
        PhysicalAddress::new(self.address.saturating_add(self.length))
    }

    #[inline]
    #[must_use]
    pub const fn is_available(&self) -> bool {
        self.available != 0
    }

    #[inline]
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.length == 0
    }
}

/// Borrowed view over the loader's memory map.
#[derive(Clone, Copy, Debug)]
pub struct MemoryMap<'a> {
    regions: &'a [MemoryRegion],
}

impl<'a> MemoryMap<'a> {
    #[must_use]
    pub const fn new(regions: &'a [MemoryRegion]) -> Self {
        Self { regions }
    }

    #[must_use]
    pub const fn len(&self) -> usize {
        self.regions.len()
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.regions.is_empty()
    }

    #[must_use]
    pub const fn regions(&self) -> &'a [MemoryRegion] {
        self.regions
    }

    pub fn iter(&self) -> impl Iterator<Item = &'a MemoryRegion> + 'a {
        self.regions.iter()
    }

    /// Usable, non-empty RAM regions.
    pub fn available(&self) -> impl Iterator<Item = &'a MemoryRegion> + 'a {
        self.regions
            .iter()
            .filter(|r| r.is_available() && !r.is_empty())
    }

    /// Regions that must never be handed out.
    pub fn unavailable(&self) -> impl Iterator<Item = &'a MemoryRegion> + 'a {
        self.regions
            .iter()
            .filter(|r| !r.is_available() && !r.is_empty())
    }

    /// The lowest start and highest end over all usable regions.
    ///
    /// Gaps between usable regions fall inside the span; callers treat them
    /// as reserved.
    #[must_use]
    pub fn available_span(&self) -> Option<(PhysicalAddress, PhysicalAddress)> {
        self.available().fold(None, |span, r| match span {
            None => Some((r.start(), r.end())),
            Some((lo, hi)) => Some((lo.min(r.start()), hi.max(r.end()))),
        })
    }

    /// Sum of the lengths of all usable regions.
    #[must_use]
    pub fn available_bytes(&self) -> u64 {
        self.available()
            .fold(0u64, |acc, r| acc.saturating_add(r.length))
    }
}

impl<'a> IntoIterator for MemoryMap<'a> {
    type Item = &'a MemoryRegion;
    type IntoIter = core::slice::Iter<'a, MemoryRegion>;

    fn into_iter(self) -> Self::IntoIter {
        self.regions.iter()
    }
}

const _: () = {
    assert!(size_of::<MemoryRegion>() == 24);
};
