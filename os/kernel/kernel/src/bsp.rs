//! Bootstrap core initialization.

use crate::panic::halt;
use crate::trampoline;
use crate::tsc::TscDelay;
use core::hint::spin_loop;
use core::sync::atomic::{AtomicU64, Ordering};
use kernel_alloc::{HhdmPhysMapper, PhysicalPageAllocator};
use kernel_apic::{HardwareBus, LocalApic, TimerDivisor};
use kernel_info::boot::KernelBootInfo;
use kernel_info::memory::{AP_STACK_SIZE, AP_TRAMPOLINE_PAGE, MAX_CORES};
use kernel_interrupts::{DescriptorTablePointer, Idt, TrapFrame, global, vectors};
use kernel_memory_addresses::{PAGE_SIZE, PhysicalAddress};
use kernel_registers::LoadRegisterUnsafe;
use kernel_registers::cr3::Cr3;
use kernel_smp::trampoline::{install_trampoline, write_parameters};
use kernel_smp::{BringUp, Domain, SharedAllocator, SmpState, TrampolineParameters, bootstrap_slot};
use kernel_sync::{SpinLock, SyncOnceCell};
use log::{error, info, warn};

pub type KernelApic = LocalApic<HardwareBus<HhdmPhysMapper>>;

pub static PAGE_ALLOCATOR: SyncOnceCell<SharedAllocator> = SyncOnceCell::new();
pub static IDT: SyncOnceCell<Idt> = SyncOnceCell::new();
pub static APIC: SyncOnceCell<KernelApic> = SyncOnceCell::new();
pub static SMP: SmpState = SmpState::new();
pub static DOMAINS: [SyncOnceCell<Domain<'static>>; MAX_CORES] =
    [const { SyncOnceCell::new() }; MAX_CORES];

/// Kernel code and data selectors, so application cores can leave the
/// trampoline's GDT layout behind.
pub static KERNEL_SELECTORS: SyncOnceCell<(u16, u16)> = SyncOnceCell::new();

static TIMER_TICKS: AtomicU64 = AtomicU64::new(0);

#[repr(C, align(16))]
struct ApStack([u8; AP_STACK_SIZE]);

static mut AP_STACKS: [ApStack; MAX_CORES] = [const { ApStack([0; AP_STACK_SIZE]) }; MAX_CORES];

/// Periodic timer period in divided bus clocks.
const TIMER_INITIAL_COUNT: u32 = 1_000_000;

pub fn start(info: &KernelBootInfo) -> ! {
    info!("boot information accepted");

    let (allocator, trampoline_page) = seed_allocator(info);
    let selectors = current_selectors();
    let _ = KERNEL_SELECTORS.set(selectors);

    let idt = IDT.get_or_init(|| {
        let mut idt = Idt::new();
        kernel_interrupts::build_gate_table(&mut idt, selectors.0);
        idt
    });
    // SAFETY: every present gate points at an entry trampoline.
    unsafe { idt.load() };
    global::register(vectors::APIC_TIMER, timer_tick);

    // SAFETY: CPL 0; the direct map covers the xAPIC window.
    let apic = APIC.get_or_init(|| LocalApic::initialize(info, unsafe { HardwareBus::new(HhdmPhysMapper) }));
    apic.enable(vectors::APIC_SPURIOUS);
    info!("local APIC {:#x} enabled in {:?} mode", apic.id(), apic.mode());

    // SAFETY: the loader guarantees the core table is valid.
    let cores = unsafe { info.cores() };
    let bsp_id = apic.id();
    let bsp_slot = bootstrap_slot(cores, bsp_id).unwrap_or_else(|| {
        error!("no usable core table slot for the bootstrap core, using slot 0");
        0
    });

    let domain = DOMAINS[bsp_slot].get_or_init(|| Domain::new(DescriptorTablePointer::current_gdt(), allocator));
    // SAFETY: CPL 0 with interrupts masked; the GDT is the one in use.
    unsafe { domain.activate() };
    SMP.register_bootstrap(bsp_slot);

    match trampoline_page {
        Some(page) => start_application_cores(apic, cores, bsp_id, page, allocator),
        None => warn!("no usable trampoline page, application cores stay offline"),
    }

    apic.start_timer_periodic(vectors::APIC_TIMER, TimerDivisor::By16, TIMER_INITIAL_COUNT);
    info!("{} core(s) online", SMP.counter().active());
    idle()
}

fn seed_allocator(info: &KernelBootInfo) -> (&'static SharedAllocator, Option<PhysicalAddress>) {
    // SAFETY: the loader's memory map is valid and available RAM is unused.
    let seeded = unsafe { PhysicalPageAllocator::seed_from_memory_map(&info.memory_map(), &HhdmPhysMapper) };
    let mut pmm = match seeded {
        Ok(pmm) => pmm,
        Err(e) => panic!("physical memory unusable: {e}"),
    };

    let trampoline_page = reserve_trampoline_page(&mut pmm);

    let stats = pmm.stats();
    info!("page allocator: {} of {} pages free", stats.free, stats.total());
    (PAGE_ALLOCATOR.get_or_init(|| SpinLock::new(pmm)), trampoline_page)
}

/// Application cores start from this page; it must not hold page descriptors.
fn reserve_trampoline_page(pmm: &mut PhysicalPageAllocator<'_>) -> Option<PhysicalAddress> {
    let page = PhysicalAddress::new(AP_TRAMPOLINE_PAGE);
    let descriptors = pmm.layout().storage_range();
    if descriptors.contains(&page) {
        error!(
            "trampoline page {page} lies inside the page descriptors at {}..{}",
            descriptors.start, descriptors.end
        );
        return None;
    }

    match pmm.reserve_physical_region(page, PAGE_SIZE) {
        Ok(()) => info!("reserved trampoline page {page}"),
        // Outside the managed range; nothing else hands it out.
        Err(e) => warn!("trampoline page {page} not reserved: {e}"),
    }
    Some(page)
}

fn start_application_cores(
    apic: &'static KernelApic,
    cores: &[kernel_info::boot::CoreDescriptor],
    bsp_id: u32,
    page: PhysicalAddress,
    allocator: &'static SharedAllocator,
) {
    // SAFETY: CPL 0.
    let cr3 = unsafe { Cr3::load_unsafe() };
    let Some(cr3) = cr3.as_low_u32() else {
        warn!("page tables above 4 GiB, application cores stay offline");
        return;
    };

    let gdt = DescriptorTablePointer::current_gdt();
    let base = TrampolineParameters {
        cr3: u64::from(cr3),
        entry: crate::ap::ap_entry as usize as u64,
        ..TrampolineParameters::default()
    };

    // SAFETY: the trampoline page is reserved and reachable through the direct map.
    if let Err(e) = unsafe { install_trampoline(trampoline::code(), page, &base, &HhdmPhysMapper) } {
        error!("cannot install startup trampoline: {e}");
        return;
    }

    // SAFETY: CPL 0 with interrupts masked.
    let delay = unsafe { TscDelay::calibrate() };
    let bringup = BringUp::new(&SMP, apic, &delay);
    let result = bringup.run_with(cores, bsp_id, page, |slot, _| {
        let domain = DOMAINS[slot].get_or_init(|| Domain::new(gdt, allocator));
        let params = TrampolineParameters {
            stack_top: ap_stack_top(slot),
            slot: slot as u64,
            domain: core::ptr::from_ref(domain) as u64,
            ..base
        };
        // SAFETY: cores start one at a time, nobody else reads the block now.
        unsafe { write_parameters(page, &params, &HhdmPhysMapper) };
    });

    match result {
        Ok(report) => {
            for slot in report.timed_out_slots() {
                warn!("core slot {slot} stays offline");
            }
        }
        Err(e) => error!("bring-up not attempted: {e}"),
    }
}

fn ap_stack_top(slot: usize) -> u64 {
    // SAFETY: only the address is taken; each slot's stack goes to one core.
    let stack = unsafe { &raw const AP_STACKS[slot] };
    stack as u64 + AP_STACK_SIZE as u64
}

fn current_selectors() -> (u16, u16) {
    let (cs, ss): (u16, u16);
    // SAFETY: reading segment registers has no side effects.
    unsafe {
        core::arch::asm!("mov {0:x}, cs", "mov {1:x}, ss", out(reg) cs, out(reg) ss, options(nomem, nostack, preserves_flags));
    }
    (cs, ss)
}

fn timer_tick(_frame: &mut TrapFrame) {
    TIMER_TICKS.fetch_add(1, Ordering::Relaxed);
    if let Some(apic) = APIC.get() {
        apic.end_of_interrupt();
    }
}

/// Enables interrupts and waits for them.
pub fn idle() -> ! {
    // SAFETY: the gate table is loaded before any core idles.
    unsafe { core::arch::asm!("sti", options(nomem, nostack)) };
    loop {
        // SAFETY: HLT resumes on the next interrupt.
        unsafe { core::arch::asm!("hlt", options(nomem, nostack)) };
        spin_loop();
    }
}

/// Called by cores that cannot continue.
pub fn park() -> ! {
    halt()
}
