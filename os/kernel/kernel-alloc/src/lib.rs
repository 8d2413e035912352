//! # Physical Page Allocation
//!
//! Accounting for every 4 KiB physical page the kernel manages. Each page is
//! described by a single byte holding its [`PageStatus`] and a small access
//! counter; the descriptors form one flat array, normally placed at the front
//! of the memory they describe. Seeding from a memory map moves the array into
//! the first usable region large enough for it.
//!
//! ```text
//! base                                                       end
//! ┌──────────────┬───────────────────────────────────────────┐
//! │ descriptors  │ pages handed out by the allocator         │
//! │ (Reserved)   │ Free / Caching / InUse / Reserved         │
//! └──────────────┴───────────────────────────────────────────┘
//! ```
//!
//! ## Components
//!
//! - [`descriptor`]: the packed [`PageDescriptor`] byte.
//! - [`MapLayout`]: how a physical range splits into descriptor pages and
//!   allocatable pages.
//! - [`PhysicalPageAllocator`]: reservation, next-fit allocation, freeing,
//!   access tracking, and seeding from the loader's memory map.
//! - [`phys_mapper`]: reaching physical memory through the direct map.
//!
//! ## Concurrency
//!
//! The allocator holds `&mut` to its map and does no locking of its own.
//! Cores share it through `kernel_sync::SpinLock<PhysicalPageAllocator>`.
//!
//! ```rust
//! use kernel_alloc::{MapLayout, PageDescriptor, PageStatus, PhysicalPageAllocator};
//! use kernel_memory_addresses::PhysicalAddress;
//!
//! let layout = MapLayout::compute(PhysicalAddress::new(0), PhysicalAddress::new(0x10_0000))?;
//! let mut storage = [PageDescriptor::FREE; 256];
//! let mut pmm = PhysicalPageAllocator::new(layout, &mut storage)?;
//!
//! let page = pmm.allocate_page().unwrap();
//! assert_eq!(pmm.status_of(page), Some(PageStatus::InUse));
//! pmm.free_page(page)?;
//! # Ok::<(), kernel_alloc::PageAllocError>(())
//! ```

#![cfg_attr(not(any(test, doctest)), no_std)]
#![allow(unsafe_code)]

mod allocator;
pub mod descriptor;
mod error;
mod layout;
pub mod phys_mapper;

pub use allocator::{PageStats, PhysicalPageAllocator};
pub use descriptor::{MAX_ACCESS_COUNT, PageDescriptor, PageStatus};
pub use error::PageAllocError;
pub use layout::MapLayout;
pub use phys_mapper::{HhdmPhysMapper, PhysMapper};
