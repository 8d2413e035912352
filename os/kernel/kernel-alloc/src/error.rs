use kernel_memory_addresses::PhysicalAddress;

/// Argument errors of the physical page allocator.
///
/// No variant leaves the descriptor map partially updated.
#[derive(thiserror::Error, Debug, Copy, Clone, PartialEq, Eq)]
pub enum PageAllocError {
    #[error("page range {start}+{count} exceeds the map of {map_size} pages")]
    OutOfRange {
        start: usize,
        count: usize,
        map_size: usize,
    },
    #[error("address {address} lies outside the managed range")]
    AddressOutOfRange { address: PhysicalAddress },
    #[error("range {start}..{end} cannot hold the descriptor map and one page")]
    RangeTooSmall {
        start: PhysicalAddress,
        end: PhysicalAddress,
    },
    #[error("descriptor storage holds {provided} entries but {required} are required")]
    StorageTooSmall { required: usize, provided: usize },
    #[error("page at {address} is not page aligned")]
    Misaligned { address: PhysicalAddress },
    #[error("page at {address} is not in use")]
    NotInUse { address: PhysicalAddress },
    #[error("memory map contains no usable memory")]
    NoUsableMemory,
    #[error("no available region can hold {pages} descriptor page(s)")]
    NoRoomForDescriptors { pages: usize },
}
