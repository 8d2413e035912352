use kernel_alloc::{PageAllocError, PageStatus, PhysMapper, PhysicalPageAllocator};
use kernel_info::memory_map::{MemoryMap, MemoryRegion};
use kernel_memory_addresses::{PhysicalAddress, VirtualAddress};

/// Backs a window of "physical" memory with a heap buffer.
struct HeapMapper {
    window: PhysicalAddress,
    ptr: *mut u8,
    len: usize,
    _backing: Box<[u8]>,
}

impl HeapMapper {
    fn new(window: u64, len: usize) -> Self {
        let mut backing = vec![0xCC_u8; len].into_boxed_slice();
        Self {
            window: PhysicalAddress::new(window),
            ptr: backing.as_mut_ptr(),
            len,
            _backing: backing,
        }
    }
}

impl PhysMapper for HeapMapper {
    fn phys_to_virt(&self, pa: PhysicalAddress) -> VirtualAddress {
        let offset = usize::try_from(pa - self.window).unwrap();
        assert!(offset < self.len, "{pa} outside the mapped window");
        VirtualAddress::from_ptr(self.ptr.wrapping_add(offset))
    }
}

const PC_MAP: [MemoryRegion; 6] = [
    MemoryRegion::new(0x0, 0x9_f000, true),
    MemoryRegion::new(0x9_f000, 0x6_1000, false),
    MemoryRegion::new(0x10_0000, 0x70_0000, true),
    // 0x80_0000..0x90_0000 is not listed at all.
    MemoryRegion::new(0x90_0000, 0x70_0000, true),
    MemoryRegion::new(0x100_0000, 0x800, true),
    MemoryRegion::new(0xfee0_0000, 0x1000, false),
];

fn reserved_indices(pmm: &PhysicalPageAllocator<'_>) -> Vec<usize> {
    pmm.descriptors()
        .iter()
        .enumerate()
        .filter(|(_, d)| d.status() == PageStatus::Reserved)
        .map(|(i, _)| i)
        .collect()
}

fn expected_pc_reservations() -> Vec<usize> {
    let mut expected: Vec<usize> = (0x9f..=0xff).collect();
    // Descriptor page, first whole page above 1 MiB.
    expected.push(0x100);
    expected.extend(0x800..=0x8ff);
    expected
}

#[test]
fn seeds_reserved_regions_and_holes() {
    let mapper = HeapMapper::new(0x10_0000, 0x2000);
    let map = MemoryMap::new(&PC_MAP);
    let pmm = unsafe { PhysicalPageAllocator::seed_from_memory_map(&map, &mapper) }.unwrap();

    assert_eq!(pmm.base(), PhysicalAddress::new(0));
    assert_eq!(pmm.map_size(), 4096);
    assert_eq!(reserved_indices(&pmm), expected_pc_reservations());

    let stats = pmm.stats();
    assert_eq!(stats.reserved, 1 + 97 + 256);
    assert_eq!(stats.free, 4096 - stats.reserved);
}

#[test]
fn region_order_does_not_matter() {
    let mut shuffled = PC_MAP;
    shuffled.reverse();
    shuffled.swap(1, 4);

    let mapper = HeapMapper::new(0x10_0000, 0x2000);
    let map = MemoryMap::new(&shuffled);
    let pmm = unsafe { PhysicalPageAllocator::seed_from_memory_map(&map, &mapper) }.unwrap();
    assert_eq!(reserved_indices(&pmm), expected_pc_reservations());
}

#[test]
fn partial_pages_next_to_holes_are_reserved() {
    let regions = [
        MemoryRegion::new(0x1000, 0x4800, true),
        MemoryRegion::new(0x6000, 0x1_a000, true),
    ];
    let mapper = HeapMapper::new(0x1000, 0x1000);
    let map = MemoryMap::new(&regions);
    let mut pmm = unsafe { PhysicalPageAllocator::seed_from_memory_map(&map, &mapper) }.unwrap();

    assert_eq!(pmm.map_size(), 31);
    assert_eq!(
        pmm.status_of(PhysicalAddress::new(0x5000)),
        Some(PageStatus::Reserved)
    );
    assert_eq!(
        pmm.status_of(PhysicalAddress::new(0x4000)),
        Some(PageStatus::Free)
    );

    // First allocation skips the descriptor page.
    assert_eq!(pmm.allocate_page(), Some(PhysicalAddress::new(0x2000)));
}

#[test]
fn descriptors_are_written_through_the_mapper() {
    let mapper = HeapMapper::new(0x10_0000, 0x2000);
    let map = MemoryMap::new(&PC_MAP);
    let pmm = unsafe { PhysicalPageAllocator::seed_from_memory_map(&map, &mapper) }.unwrap();

    let page_zero = pmm.descriptor(0).unwrap().into_bits();
    let own_page = pmm.descriptor(0x100).unwrap().into_bits();
    drop(pmm);

    let stored = |index: u64| unsafe { *mapper.phys_to_mut::<u8>(PhysicalAddress::new(0x10_0000 + index)) };
    assert_eq!(stored(0), page_zero);
    assert_eq!(stored(0x100), own_page);
    assert_eq!(own_page, 0xFF);
}

/// A 256 MiB machine: the descriptor array fits below the VGA hole, but
/// low memory belongs to the startup trampoline.
const LOW_AND_HIGH: [MemoryRegion; 3] = [
    MemoryRegion::new(0x0, 0x9_f000, true),
    MemoryRegion::new(0x9_f000, 0x6_1000, false),
    MemoryRegion::new(0x10_0000, 0xff0_0000, true),
];

#[test]
fn descriptor_array_stays_out_of_real_mode_memory() {
    let mapper = HeapMapper::new(0x10_0000, 0x1_0000);
    let map = MemoryMap::new(&LOW_AND_HIGH);
    let mut pmm = unsafe { PhysicalPageAllocator::seed_from_memory_map(&map, &mapper) }.unwrap();

    let layout = *pmm.layout();
    assert_eq!(layout.base(), PhysicalAddress::new(0));
    assert_eq!(layout.descriptor_pages(), 16);
    assert_eq!(
        layout.storage_range(),
        PhysicalAddress::new(0x10_0000)..PhysicalAddress::new(0x11_0000)
    );

    let trampoline = PhysicalAddress::new(0x8000);
    assert!(!layout.storage_range().contains(&trampoline));
    assert_eq!(pmm.status_of(trampoline), Some(PageStatus::Free));
    pmm.reserve_physical_region(trampoline, 0x1000).unwrap();
    assert_eq!(pmm.status_of(trampoline), Some(PageStatus::Reserved));

    // The bytes behind the storage range are the descriptors.
    let before = pmm.descriptors().to_vec();
    drop(pmm);
    let stored = unsafe { mapper.phys_to_slice_mut::<u8>(layout.storage(), layout.map_size()) };
    let after: Vec<u8> = stored.to_vec();
    assert_eq!(after, before.iter().map(|d| d.into_bits()).collect::<Vec<_>>());

    for page in 0x100..0x110 {
        assert_eq!(before[page].status(), PageStatus::Reserved);
    }
    assert_eq!(before[0x110].status(), PageStatus::Free);
}

#[test]
fn four_gibibytes_place_the_array_above_the_hole() {
    let regions = [
        MemoryRegion::new(0x0, 0x9_f000, true),
        MemoryRegion::new(0x9_f000, 0x6_1000, false),
        MemoryRegion::new(0x10_0000, 0xfff0_0000, true),
    ];
    let mapper = HeapMapper::new(0x10_0000, 0x10_0000);
    let map = MemoryMap::new(&regions);
    let pmm = unsafe { PhysicalPageAllocator::seed_from_memory_map(&map, &mapper) }.unwrap();

    assert_eq!(pmm.map_size(), 0x10_0000);
    assert_eq!(pmm.layout().storage(), PhysicalAddress::new(0x10_0000));
    assert_eq!(pmm.layout().storage_indices(), 0x100..0x200);
    assert_eq!(pmm.status_of(PhysicalAddress::new(0x8000)), Some(PageStatus::Free));
    assert_eq!(pmm.stats().reserved, 0x61 + 0x100);
}

#[test]
fn low_memory_is_used_when_nothing_else_fits() {
    let regions = [
        MemoryRegion::new(0x1000, 0x9_e000, true),
        MemoryRegion::new(0x10_0000, 0x1000, true),
    ];
    let high = HeapMapper::new(0x10_0000, 0x1000);
    let map = MemoryMap::new(&regions);
    let pmm = unsafe { PhysicalPageAllocator::seed_from_memory_map(&map, &high) }.unwrap();

    // 256 pages, one descriptor page; the lone page above 1 MiB fits too.
    assert_eq!(pmm.layout().storage(), PhysicalAddress::new(0x10_0000));
    drop(pmm);

    let mapper = HeapMapper::new(0x1000, 0x1000);
    let regions = [MemoryRegion::new(0x1000, 0x9_e000, true)];
    let map = MemoryMap::new(&regions);
    let pmm = unsafe { PhysicalPageAllocator::seed_from_memory_map(&map, &mapper) }.unwrap();
    assert_eq!(pmm.layout().storage(), PhysicalAddress::new(0x1000));
    assert_eq!(pmm.current_index(), 1);
}

#[test]
fn fragmented_maps_without_room_for_descriptors_are_rejected() {
    let regions = [
        MemoryRegion::new(0x0, 0x1000, true),
        MemoryRegion::new(0x200_0000, 0x1000, true),
    ];
    let mapper = HeapMapper::new(0, 0x1000);
    let map = MemoryMap::new(&regions);
    let err = unsafe { PhysicalPageAllocator::seed_from_memory_map(&map, &mapper) }.unwrap_err();
    assert_eq!(err, PageAllocError::NoRoomForDescriptors { pages: 3 });
}

#[test]
fn empty_or_unusable_maps_are_rejected() {
    let mapper = HeapMapper::new(0, 0x1000);

    let map = MemoryMap::new(&[]);
    let err = unsafe { PhysicalPageAllocator::seed_from_memory_map(&map, &mapper) }.unwrap_err();
    assert_eq!(err, PageAllocError::NoUsableMemory);

    let regions = [MemoryRegion::new(0x0, 0x10_0000, false)];
    let map = MemoryMap::new(&regions);
    let err = unsafe { PhysicalPageAllocator::seed_from_memory_map(&map, &mapper) }.unwrap_err();
    assert_eq!(err, PageAllocError::NoUsableMemory);
}
