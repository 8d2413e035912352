use crate::PageAllocError;
use core::ops::Range;
use kernel_memory_addresses::{PAGE_SIZE, PhysicalAddress, page_align_down, pages_for};

/// Geometry of a descriptor map over one contiguous physical range.
///
/// The descriptor array occupies [`MapLayout::descriptor_pages`] pages
/// starting at [`MapLayout::storage`]. That is the front of the described
/// range unless [`MapLayout::with_storage`] moves it elsewhere.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MapLayout {
    base: PhysicalAddress,
    map_size: usize,
    descriptor_pages: usize,
    storage: PhysicalAddress,
}

impl MapLayout {
    /// Rounds `start` up and the usable length down to whole pages.
    ///
    /// # Errors
    /// [`PageAllocError::RangeTooSmall`] if the range cannot hold its own
    /// descriptor array plus one allocatable page.
    pub fn compute(start: PhysicalAddress, end: PhysicalAddress) -> Result<Self, PageAllocError> {
        let too_small = PageAllocError::RangeTooSmall { start, end };

        let base = start.align_up().ok_or(too_small)?;
        if end <= base {
            return Err(too_small);
        }

        let length = page_align_down(end - base);
        let map_size = usize::try_from(length / PAGE_SIZE).map_err(|_| too_small)?;
        let descriptor_pages = usize::try_from(pages_for(map_size as u64)).map_err(|_| too_small)?;
        if map_size <= descriptor_pages {
            return Err(too_small);
        }

        Ok(Self {
            base,
            map_size,
            descriptor_pages,
            storage: base,
        })
    }

    /// Places the descriptor array at `storage` instead of the front of the
    /// range. Indices stay relative to [`MapLayout::base`].
    ///
    /// # Errors
    /// [`PageAllocError::Misaligned`] if `storage` is not a page base.
    pub fn with_storage(self, storage: PhysicalAddress) -> Result<Self, PageAllocError> {
        if !storage.is_page_aligned() {
            return Err(PageAllocError::Misaligned { address: storage });
        }
        Ok(Self { storage, ..self })
    }

    /// Physical address of page 0.
    #[inline]
    #[must_use]
    pub const fn base(&self) -> PhysicalAddress {
        self.base
    }

    /// Exclusive end of the described range.
    #[inline]
    #[must_use]
    pub const fn end(&self) -> PhysicalAddress {
        PhysicalAddress::new(self.base.as_u64() + self.map_size as u64 * PAGE_SIZE)
    }

    /// Number of pages (and descriptors).
    #[inline]
    #[must_use]
    pub const fn map_size(&self) -> usize {
        self.map_size
    }

    #[inline]
    #[must_use]
    pub const fn descriptor_pages(&self) -> usize {
        self.descriptor_pages
    }

    /// Where the descriptor array lives.
    #[inline]
    #[must_use]
    pub const fn storage(&self) -> PhysicalAddress {
        self.storage
    }

    /// Physical range covered by the descriptor pages.
    #[inline]
    #[must_use]
    pub const fn storage_range(&self) -> Range<PhysicalAddress> {
        let end = self.storage.as_u64() + self.descriptor_pages as u64 * PAGE_SIZE;
        self.storage..PhysicalAddress::new(end)
    }

    /// Page indices of the descriptor array, empty if it lies outside the
    /// described range.
    #[must_use]
    pub fn storage_indices(&self) -> Range<usize> {
        match self.index_of(self.storage) {
            Some(first) => first..(first + self.descriptor_pages).min(self.map_size),
            None => 0..0,
        }
    }

    /// Index of the page containing `address`.
    #[inline]
    #[must_use]
    pub fn index_of(&self, address: PhysicalAddress) -> Option<usize> {
        if address < self.base || address >= self.end() {
            return None;
        }
        usize::try_from((address - self.base) / PAGE_SIZE).ok()
    }

    /// Physical address of page `index`.
    #[inline]
    #[must_use]
    pub const fn address_of(&self, index: usize) -> PhysicalAddress {
        PhysicalAddress::new(self.base.as_u64() + index as u64 * PAGE_SIZE)
    }
}
