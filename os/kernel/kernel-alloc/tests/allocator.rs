use kernel_alloc::{
    MAX_ACCESS_COUNT, MapLayout, PageAllocError, PageDescriptor, PageStatus, PhysicalPageAllocator,
};
use kernel_memory_addresses::{PAGE_SIZE, PhysicalAddress};
use kernel_sync::SpinLock;
use std::collections::HashSet;
use std::sync::Arc;
use std::thread;

const PAGES: usize = 4096;

fn storage() -> Vec<PageDescriptor> {
    vec![PageDescriptor::from_bits(0xA5); PAGES]
}

fn layout() -> MapLayout {
    MapLayout::compute(
        PhysicalAddress::new(0),
        PhysicalAddress::new(PAGES as u64 * PAGE_SIZE),
    )
    .unwrap()
}

fn snapshot(pmm: &PhysicalPageAllocator<'_>) -> Vec<u8> {
    pmm.descriptors().iter().map(|d| d.into_bits()).collect()
}

#[test]
fn initialize_reserves_only_descriptor_pages() {
    let mut storage = storage();
    let pmm = PhysicalPageAllocator::new(layout(), &mut storage).unwrap();

    assert_eq!(pmm.map_size(), 4096);
    assert_eq!(pmm.descriptor(0).unwrap().status(), PageStatus::Reserved);
    assert!(pmm.descriptors()[1..].iter().all(|d| *d == PageDescriptor::FREE));

    let stats = pmm.stats();
    assert_eq!(stats.reserved, 1);
    assert_eq!(stats.free, 4095);
    assert_eq!(stats.total(), 4096);
}

#[test]
fn storage_must_cover_the_map() {
    let mut short = vec![PageDescriptor::FREE; PAGES - 1];
    let err = PhysicalPageAllocator::new(layout(), &mut short).unwrap_err();
    assert_eq!(
        err,
        PageAllocError::StorageTooSmall {
            required: PAGES,
            provided: PAGES - 1
        }
    );
}

#[test]
fn end_to_end_reservation() {
    let mut storage = storage();
    let mut pmm = PhysicalPageAllocator::new(layout(), &mut storage).unwrap();

    pmm.reserve_physical_region(PhysicalAddress::new(0x10000), 0x10000)
        .unwrap();

    for (index, d) in pmm.descriptors().iter().enumerate() {
        let expected = index == 0 || (16..=31).contains(&index);
        assert_eq!(
            d.status() == PageStatus::Reserved,
            expected,
            "page {index} has status {:?}",
            d.status()
        );
    }

    let before = snapshot(&pmm);
    assert_eq!(
        pmm.reserve_page_range(4096, 1),
        Err(PageAllocError::OutOfRange {
            start: 4096,
            count: 1,
            map_size: 4096
        })
    );
    assert_eq!(snapshot(&pmm), before);
}

#[test]
fn reserve_page_range_is_exact_when_in_bounds() {
    let cases = [(0, 0), (0, 1), (1, 4095), (100, 7), (4095, 1), (4096, 0)];
    for (start, count) in cases {
        let mut storage = storage();
        let mut pmm = PhysicalPageAllocator::new(layout(), &mut storage).unwrap();
        pmm.reserve_page_range(start, count).unwrap();

        for (index, d) in pmm.descriptors().iter().enumerate() {
            let reserved = index == 0 || (start..start + count).contains(&index);
            assert_eq!(d.status() == PageStatus::Reserved, reserved, "{start}+{count} at {index}");
            if (start..start + count).contains(&index) {
                assert_eq!(d.access_count(), MAX_ACCESS_COUNT);
            }
        }
    }
}

#[test]
fn reserve_page_range_mutates_nothing_when_out_of_bounds() {
    let cases = [(4096, 1), (4000, 97), (0, 4097), (1, usize::MAX), (usize::MAX, 2)];
    for (start, count) in cases {
        let mut storage = storage();
        let mut pmm = PhysicalPageAllocator::new(layout(), &mut storage).unwrap();
        let before = snapshot(&pmm);

        let err = pmm.reserve_page_range(start, count).unwrap_err();
        assert!(matches!(err, PageAllocError::OutOfRange { .. }), "{err}");
        assert_eq!(snapshot(&pmm), before, "{start}+{count}");
    }
}

#[test]
fn reserve_physical_region_truncates() {
    let mut storage = storage();
    let mut pmm = PhysicalPageAllocator::new(layout(), &mut storage).unwrap();

    // Starts inside page 2, one and a half pages long: only page 2.
    pmm.reserve_physical_region(PhysicalAddress::new(0x2800), 0x1800)
        .unwrap();
    assert_eq!(pmm.descriptor(2).unwrap().status(), PageStatus::Reserved);
    assert_eq!(pmm.descriptor(3).unwrap().status(), PageStatus::Free);

    // Shorter than a page: nothing.
    pmm.reserve_physical_region(PhysicalAddress::new(0x5000), 0xfff)
        .unwrap();
    assert_eq!(pmm.descriptor(5).unwrap().status(), PageStatus::Free);
}

#[test]
fn reserve_physical_region_below_base_is_rejected() {
    let layout = MapLayout::compute(
        PhysicalAddress::new(0x10_0000),
        PhysicalAddress::new(0x20_0000),
    )
    .unwrap();
    let mut storage = vec![PageDescriptor::FREE; layout.map_size()];
    let mut pmm = PhysicalPageAllocator::new(layout, &mut storage).unwrap();

    let address = PhysicalAddress::new(0xf_f000);
    assert_eq!(
        pmm.reserve_physical_region(address, 0x2000),
        Err(PageAllocError::AddressOutOfRange { address })
    );
}

#[test]
fn allocation_is_next_fit_and_wraps() {
    let layout = MapLayout::compute(PhysicalAddress::new(0), PhysicalAddress::new(8 * PAGE_SIZE))
        .unwrap();
    let mut storage = vec![PageDescriptor::FREE; 8];
    let mut pmm = PhysicalPageAllocator::new(layout, &mut storage).unwrap();
    pmm.reserve_page_range(3, 1).unwrap();

    let got: Vec<u64> = (0..6)
        .map(|_| pmm.allocate_page().unwrap().as_u64() / PAGE_SIZE)
        .collect();
    assert_eq!(got, [1, 2, 4, 5, 6, 7]);
    assert_eq!(pmm.allocate_page(), None);

    // Freeing page 2 makes it the only candidate; the cursor wraps to it.
    pmm.free_page(PhysicalAddress::new(2 * PAGE_SIZE)).unwrap();
    assert_eq!(pmm.allocate_page(), Some(PhysicalAddress::new(2 * PAGE_SIZE)));
    assert_eq!(pmm.current_index(), 3);
}

#[test]
fn free_rejects_double_free_and_foreign_pages() {
    let mut storage = storage();
    let mut pmm = PhysicalPageAllocator::new(layout(), &mut storage).unwrap();

    let page = pmm.allocate_page().unwrap();
    pmm.free_page(page).unwrap();
    assert_eq!(
        pmm.free_page(page),
        Err(PageAllocError::NotInUse { address: page })
    );

    let reserved = PhysicalAddress::new(0);
    assert_eq!(
        pmm.free_page(reserved),
        Err(PageAllocError::NotInUse { address: reserved })
    );

    let outside = PhysicalAddress::new(PAGES as u64 * PAGE_SIZE);
    assert_eq!(
        pmm.free_page(outside),
        Err(PageAllocError::AddressOutOfRange { address: outside })
    );

    let misaligned = page + 8;
    assert_eq!(
        pmm.free_page(misaligned),
        Err(PageAllocError::Misaligned { address: misaligned })
    );
}

#[test]
fn record_access_counts_per_page() {
    let mut storage = storage();
    let mut pmm = PhysicalPageAllocator::new(layout(), &mut storage).unwrap();
    let page = pmm.allocate_page().unwrap();

    assert_eq!(pmm.record_access(page), Ok(1));
    assert_eq!(pmm.record_access(page + 0x123), Ok(2));
    assert_eq!(pmm.status_of(page), Some(PageStatus::InUse));
}

#[test]
fn shared_allocator_hands_out_unique_pages() {
    let layout = MapLayout::compute(PhysicalAddress::new(0), PhysicalAddress::new(1024 * PAGE_SIZE))
        .unwrap();
    let storage = Box::leak(vec![PageDescriptor::FREE; 1024].into_boxed_slice());
    let pmm = Arc::new(SpinLock::new(PhysicalPageAllocator::new(layout, storage).unwrap()));

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let pmm = Arc::clone(&pmm);
            thread::spawn(move || {
                (0..100)
                    .map(|_| pmm.lock().allocate_page().unwrap())
                    .collect::<Vec<_>>()
            })
        })
        .collect();

    let mut seen = HashSet::new();
    for handle in handles {
        for page in handle.join().unwrap() {
            assert!(seen.insert(page), "{page} handed out twice");
        }
    }
    assert_eq!(seen.len(), 800);
    assert_eq!(pmm.lock().stats().in_use, 800);
}
