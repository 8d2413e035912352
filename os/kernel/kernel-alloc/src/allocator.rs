//! # Physical Page Allocator
//!
//! A flat array of [`PageDescriptor`]s, one per page, indexed by
//! `(address - base) / PAGE_SIZE`. Allocation is next-fit from a cursor that
//! remembers where the previous allocation ended.
//!
//! The allocator never locks. Shared instances live behind a
//! `kernel_sync::SpinLock`.

use crate::descriptor::{PageDescriptor, PageStatus};
use crate::layout::MapLayout;
use crate::phys_mapper::PhysMapper;
use crate::PageAllocError;
use kernel_info::memory::REAL_MODE_LIMIT;
use kernel_info::memory_map::{MemoryMap, MemoryRegion};
use kernel_memory_addresses::{PAGE_SIZE, PhysicalAddress};
use log::{debug, trace};

/// Page counts per [`PageStatus`].
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct PageStats {
    pub free: usize,
    pub caching: usize,
    pub in_use: usize,
    pub reserved: usize,
}

impl PageStats {
    #[must_use]
    pub const fn total(&self) -> usize {
        self.free + self.caching + self.in_use + self.reserved
    }

    #[must_use]
    pub const fn count(&self, status: PageStatus) -> usize {
        match status {
            PageStatus::Free => self.free,
            PageStatus::Caching => self.caching,
            PageStatus::InUse => self.in_use,
            PageStatus::Reserved => self.reserved,
        }
    }
}

pub struct PhysicalPageAllocator<'m> {
    layout: MapLayout,
    map: &'m mut [PageDescriptor],
    current_index: usize,
}

impl<'m> PhysicalPageAllocator<'m> {
    /// Builds an allocator over caller-provided descriptor storage.
    ///
    /// All pages start [`PageStatus::Free`] except the ones holding the
    /// descriptor array, which are [`PageStatus::Reserved`].
    ///
    /// # Errors
    /// [`PageAllocError::StorageTooSmall`] if `storage` has fewer than
    /// `layout.map_size()` entries. Extra entries are ignored.
    pub fn new(layout: MapLayout, storage: &'m mut [PageDescriptor]) -> Result<Self, PageAllocError> {
        let provided = storage.len();
        let map = storage
            .get_mut(..layout.map_size())
            .ok_or(PageAllocError::StorageTooSmall {
                required: layout.map_size(),
                provided,
            })?;

        map.fill(PageDescriptor::FREE);
        let own = layout.storage_indices();
        for descriptor in &mut map[own.clone()] {
            descriptor.reserve();
        }

        debug!(
            "page map over {}..{}: {} pages, {} descriptor page(s) at {}",
            layout.base(),
            layout.end(),
            layout.map_size(),
            layout.descriptor_pages(),
            layout.storage()
        );

        Ok(Self {
            layout,
            map,
            current_index: if own.start == 0 { own.end } else { 0 },
        })
    }

    /// Builds an allocator whose descriptor array lives in the first pages
    /// of `[start, end)` itself.
    ///
    /// # Errors
    /// [`PageAllocError::RangeTooSmall`], see [`MapLayout::compute`].
    ///
    /// # Safety
    /// `[start, end)` must be RAM that nobody else uses for `'m`, and
    /// `mapper` must map it writable.
    pub unsafe fn initialize_in_place<M: PhysMapper>(
        start: PhysicalAddress,
        end: PhysicalAddress,
        mapper: &M,
    ) -> Result<Self, PageAllocError> {
        let layout = MapLayout::compute(start, end)?;
        // SAFETY: forwarded to the caller.
        unsafe { Self::place(layout, mapper) }
    }

    /// # Safety
    /// The pages at `layout.storage_range()` must be unused RAM that
    /// `mapper` maps writable.
    unsafe fn place<M: PhysMapper>(layout: MapLayout, mapper: &M) -> Result<Self, PageAllocError> {
        // SAFETY: upheld by the caller; `PageDescriptor` is a plain byte with
        // no invalid bit patterns.
        let storage = unsafe { mapper.phys_to_slice_mut(layout.storage(), layout.map_size()) };
        Self::new(layout, storage)
    }

    /// Builds an allocator spanning all usable memory in `map`.
    ///
    /// Everything inside the span that the map does not list as available
    /// is reserved, including gaps between regions and partial pages at
    /// region edges.
    ///
    /// The descriptor array goes to the lowest available region at or above
    /// [`REAL_MODE_LIMIT`] that holds it in whole pages. Only if no such
    /// region exists does it fall back to real-mode memory, which the
    /// startup trampoline and firmware also need.
    ///
    /// # Errors
    /// - [`PageAllocError::NoUsableMemory`] for a map without usable regions.
    /// - [`PageAllocError::NoRoomForDescriptors`] if no single available
    ///   region can hold the descriptor array.
    /// - Otherwise as [`PhysicalPageAllocator::initialize_in_place`].
    ///
    /// # Safety
    /// Every region `map` lists as available must be unused RAM for `'m`,
    /// and `mapper` must map it writable.
    pub unsafe fn seed_from_memory_map<M: PhysMapper>(
        map: &MemoryMap<'_>,
        mapper: &M,
    ) -> Result<Self, PageAllocError> {
        let (start, end) = map.available_span().ok_or(PageAllocError::NoUsableMemory)?;

        let layout = MapLayout::compute(start, end)?;
        let pages = layout.descriptor_pages();
        let storage = descriptor_home(map, pages).ok_or(PageAllocError::NoRoomForDescriptors { pages })?;
        let layout = layout.with_storage(storage)?;

        // SAFETY: `storage` starts `pages` whole pages of available RAM.
        let mut allocator = unsafe { Self::place(layout, mapper)? };

        for region in map.unavailable() {
            allocator.reserve_covering(region.start(), region.end());
        }

        // Walk the usable regions in address order without sorting the
        // borrowed map; every uncovered stretch is a hole.
        let mut cursor = start;
        while let Some(next) = map
            .available()
            .filter(|r| r.end() > cursor)
            .min_by_key(|r| r.start())
        {
            if next.start() > cursor {
                allocator.reserve_covering(cursor, next.start());
            }
            cursor = cursor.max(next.end());
        }

        let stats = allocator.stats();
        debug!(
            "seeded page map: {} free, {} reserved of {} pages",
            stats.free,
            stats.reserved,
            stats.total()
        );
        Ok(allocator)
    }

    #[inline]
    #[must_use]
    pub const fn layout(&self) -> &MapLayout {
        &self.layout
    }

    #[inline]
    #[must_use]
    pub const fn base(&self) -> PhysicalAddress {
        self.layout.base()
    }

    #[inline]
    #[must_use]
    pub const fn map_size(&self) -> usize {
        self.layout.map_size()
    }

    /// Where the next allocation search begins.
    #[inline]
    #[must_use]
    pub const fn current_index(&self) -> usize {
        self.current_index
    }

    #[inline]
    #[must_use]
    pub fn descriptor(&self, index: usize) -> Option<PageDescriptor> {
        self.map.get(index).copied()
    }

    #[inline]
    pub fn descriptor_mut(&mut self, index: usize) -> Option<&mut PageDescriptor> {
        self.map.get_mut(index)
    }

    #[must_use]
    pub fn descriptors(&self) -> &[PageDescriptor] {
        self.map
    }

    /// Status of the page containing `address`.
    #[must_use]
    pub fn status_of(&self, address: PhysicalAddress) -> Option<PageStatus> {
        let index = self.layout.index_of(address)?;
        self.descriptor(index).map(|d| d.status())
    }

    /// Reserves pages `start_index .. start_index + count`.
    ///
    /// # Errors
    /// [`PageAllocError::OutOfRange`] if any part of the range lies past the
    /// map; nothing is modified in that case.
    pub fn reserve_page_range(&mut self, start_index: usize, count: usize) -> Result<(), PageAllocError> {
        let map_size = self.map_size();
        let end = start_index
            .checked_add(count)
            .filter(|&end| end <= map_size)
            .ok_or(PageAllocError::OutOfRange {
                start: start_index,
                count,
                map_size,
            })?;

        for descriptor in &mut self.map[start_index..end] {
            descriptor.reserve();
        }

        trace!("reserved pages {start_index}..{end}");
        Ok(())
    }

    /// Reserves `length / PAGE_SIZE` pages starting with the page that
    /// contains `address`. Both quantities truncate.
    ///
    /// # Errors
    /// [`PageAllocError::AddressOutOfRange`] for addresses below the base,
    /// otherwise as [`PhysicalPageAllocator::reserve_page_range`].
    pub fn reserve_physical_region(
        &mut self,
        address: PhysicalAddress,
        length: u64,
    ) -> Result<(), PageAllocError> {
        if address < self.base() {
            return Err(PageAllocError::AddressOutOfRange { address });
        }

        let out_of_range = PageAllocError::AddressOutOfRange { address };
        let first = usize::try_from((address - self.base()) / PAGE_SIZE).map_err(|_| out_of_range)?;
        let count = usize::try_from(length / PAGE_SIZE).map_err(|_| out_of_range)?;
        self.reserve_page_range(first, count)
    }

    /// Reserves every page overlapping `[start, end)`, clipped to the map.
    fn reserve_covering(&mut self, start: PhysicalAddress, end: PhysicalAddress) {
        let lo = start.max(self.base());
        let hi = end.min(self.layout.end());
        if lo >= hi {
            return;
        }

        let Some(first) = self.layout.index_of(lo) else {
            return;
        };
        let last = self
            .layout
            .index_of(PhysicalAddress::new(hi.as_u64() - 1))
            .unwrap_or(self.map_size() - 1);

        for descriptor in &mut self.map[first..=last] {
            descriptor.reserve();
        }
        trace!("reserved pages {first}..={last} covering {start}..{end}");
    }

    /// Hands out the next free page at or after the cursor, wrapping once.
    pub fn allocate_page(&mut self) -> Option<PhysicalAddress> {
        let map_size = self.map_size();
        let index = (0..map_size)
            .map(|offset| (self.current_index + offset) % map_size)
            .find(|&index| self.map[index].is_free())?;

        self.map[index].mark_in_use();
        self.current_index = (index + 1) % map_size;
        Some(self.layout.address_of(index))
    }

    /// Returns a page obtained from [`PhysicalPageAllocator::allocate_page`].
    ///
    /// # Errors
    /// - [`PageAllocError::Misaligned`] if `address` is not a page base.
    /// - [`PageAllocError::AddressOutOfRange`] if it is not managed here.
    /// - [`PageAllocError::NotInUse`] if the page is not allocated, which
    ///   includes freeing it twice.
    pub fn free_page(&mut self, address: PhysicalAddress) -> Result<(), PageAllocError> {
        if !address.is_page_aligned() {
            return Err(PageAllocError::Misaligned { address });
        }

        let descriptor = self.lookup_mut(address)?;
        if descriptor.status() != PageStatus::InUse {
            return Err(PageAllocError::NotInUse { address });
        }

        descriptor.free();
        Ok(())
    }

    /// Counts one access to the page containing `address` and returns the
    /// new counter value.
    ///
    /// # Errors
    /// [`PageAllocError::AddressOutOfRange`] if the page is not managed here.
    pub fn record_access(&mut self, address: PhysicalAddress) -> Result<u8, PageAllocError> {
        let descriptor = self.lookup_mut(address)?;
        descriptor.increment_accesses();
        Ok(descriptor.access_count())
    }

    #[must_use]
    pub fn stats(&self) -> PageStats {
        self.map
            .iter()
            .fold(PageStats::default(), |mut stats, d| {
                match d.status() {
                    PageStatus::Free => stats.free += 1,
                    PageStatus::Caching => stats.caching += 1,
                    PageStatus::InUse => stats.in_use += 1,
                    PageStatus::Reserved => stats.reserved += 1,
                }
                stats
            })
    }

    fn lookup_mut(&mut self, address: PhysicalAddress) -> Result<&mut PageDescriptor, PageAllocError> {
        let index = self
            .layout
            .index_of(address)
            .ok_or(PageAllocError::AddressOutOfRange { address })?;
        Ok(&mut self.map[index])
    }
}

/// Lowest page-aligned start of an available region holding `pages` whole
/// pages, preferring memory above the real-mode limit.
fn descriptor_home(map: &MemoryMap<'_>, pages: usize) -> Option<PhysicalAddress> {
    let needed = pages as u64 * PAGE_SIZE;
    let fits = |r: &MemoryRegion| {
        let lo = r.start().align_up()?;
        let hi = r.end().align_down();
        (hi > lo && hi - lo >= needed).then_some(lo)
    };

    let high = map
        .available()
        .filter_map(fits)
        .filter(|a| a.as_u64() >= REAL_MODE_LIMIT)
        .min();
    high.or_else(|| map.available().filter_map(fits).min())
}

impl core::fmt::Debug for PhysicalPageAllocator<'_> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("PhysicalPageAllocator")
            .field("layout", &self.layout)
            .field("current_index", &self.current_index)
            .field("stats", &self.stats())
            .finish_non_exhaustive()
    }
}
