use kernel_alloc::{MapLayout, PageDescriptor, PhysicalPageAllocator};
use kernel_info::boot::CoreDescriptor;
use kernel_info::memory::MAX_CORES;
use kernel_interrupts::DescriptorTablePointer;
use kernel_memory_addresses::{PAGE_SIZE, PhysicalAddress};
use kernel_smp::{
    ApplicationCore, BringUp, BringUpPolicy, CoreState, Delay, Domain, SharedAllocator, SmpState,
    StartupIpi, TrampolineError, bootstrap_slot,
};
use kernel_sync::SpinLock;
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use std::thread::{self, JoinHandle};
use std::time::Duration;

const ENTRY_PAGE: u64 = 0x8000;

fn leaked_allocator(pages: usize) -> &'static SharedAllocator {
    let storage = Box::leak(vec![PageDescriptor::FREE; pages].into_boxed_slice());
    let layout = MapLayout::compute(
        PhysicalAddress::new(0x10_0000),
        PhysicalAddress::new(0x10_0000 + pages as u64 * PAGE_SIZE),
    )
    .unwrap();
    let pmm = PhysicalPageAllocator::new(layout, storage).unwrap();
    Box::leak(Box::new(SpinLock::new(pmm)))
}

fn leaked_domain() -> &'static Domain<'static> {
    let gdt = DescriptorTablePointer::for_size(0xffff_ffff_8020_0000, 7 * 8).unwrap();
    Box::leak(Box::new(Domain::new(gdt, leaked_allocator(64))))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Ipi {
    Init(u32),
    Startup(u32, u8),
}

/// Stands in for the cores: a STARTUP to a responsive APIC id spawns a thread
/// that runs the application-core handshake.
struct SimulatedCores {
    smp: &'static SmpState,
    domain: &'static Domain<'static>,
    slots: HashMap<u32, usize>,
    responsive: HashSet<u32>,
    sent: Mutex<Vec<Ipi>>,
    running: Mutex<Vec<JoinHandle<Option<usize>>>>,
}

impl SimulatedCores {
    fn new(smp: &'static SmpState, cores: &[CoreDescriptor], responsive: &[u32]) -> Self {
        Self {
            smp,
            domain: leaked_domain(),
            slots: cores
                .iter()
                .enumerate()
                .map(|(slot, c)| (c.apic_id, slot))
                .collect(),
            responsive: responsive.iter().copied().collect(),
            sent: Mutex::new(Vec::new()),
            running: Mutex::new(Vec::new()),
        }
    }

    fn join(&self) -> Vec<Option<usize>> {
        self.running
            .lock()
            .unwrap()
            .drain(..)
            .map(|h| h.join().unwrap())
            .collect()
    }
}

impl StartupIpi for SimulatedCores {
    fn send_init(&self, apic_id: u32) {
        self.sent.lock().unwrap().push(Ipi::Init(apic_id));
    }

    fn send_startup(&self, apic_id: u32, vector: u8) {
        self.sent.lock().unwrap().push(Ipi::Startup(apic_id, vector));
        if !self.responsive.contains(&apic_id) {
            return;
        }

        let (smp, domain, slot) = (self.smp, self.domain, self.slots[&apic_id]);
        let handle = thread::spawn(move || unsafe {
            ApplicationCore::enter(domain, smp, slot, |id| {
                assert!(domain.allocate_page().is_some());
                id.index()
            })
        });
        self.running.lock().unwrap().push(handle);
    }
}

/// Records requested waits and sleeps a scaled-down amount so the simulated
/// cores get to run.
#[derive(Default)]
struct RecordingDelay {
    waits: Mutex<Vec<Duration>>,
}

impl Delay for RecordingDelay {
    fn delay(&self, duration: Duration) {
        self.waits.lock().unwrap().push(duration);
        thread::sleep(duration / 10);
    }
}

fn fast_policy() -> BringUpPolicy {
    BringUpPolicy {
        poll_attempts: 250,
        ..BringUpPolicy::default()
    }
}

fn table(ids: &[u32]) -> Vec<CoreDescriptor> {
    ids.iter().map(|&id| CoreDescriptor::new(id, true)).collect()
}

#[test]
fn default_policy() {
    let policy = BringUpPolicy::default();
    assert_eq!(policy.init_settle, Duration::from_millis(10));
    assert_eq!(policy.poll_interval, Duration::from_millis(100));
    assert_eq!(policy.poll_attempts, 10);
}

#[test]
fn all_cores_come_up() {
    let smp: &'static SmpState = Box::leak(Box::new(SmpState::new()));
    let cores = table(&[0, 1, 2, 3]);
    let sim = SimulatedCores::new(smp, &cores, &[1, 2, 3]);
    let delay = RecordingDelay::default();

    assert!(smp.register_bootstrap(0).is_bootstrap());
    let report = BringUp::new(smp, &sim, &delay)
        .with_policy(fast_policy())
        .run(&cores, 0, PhysicalAddress::new(ENTRY_PAGE))
        .unwrap();

    assert_eq!(report.ready_count(), 3);
    assert_eq!(report.timed_out_count(), 0);
    assert!((1..4).all(|slot| report.is_ready(slot)));
    assert_eq!(smp.counter().active(), 4);
    assert!(smp.barrier().is_open());

    let mut ids: Vec<usize> = sim.join().into_iter().map(Option::unwrap).collect();
    ids.sort_unstable();
    assert_eq!(ids, [1, 2, 3]);

    for slot in 0..4 {
        assert_eq!(smp.states().get(slot), CoreState::Ready);
    }
}

#[test]
fn ipis_are_sent_in_order_with_settle_delay() {
    let smp: &'static SmpState = Box::leak(Box::new(SmpState::new()));
    let cores = table(&[4, 9]);
    let sim = SimulatedCores::new(smp, &cores, &[9]);
    let delay = RecordingDelay::default();

    smp.register_bootstrap(0);
    BringUp::new(smp, &sim, &delay)
        .with_policy(fast_policy())
        .run(&cores, 4, PhysicalAddress::new(ENTRY_PAGE))
        .unwrap();
    sim.join();

    assert_eq!(*sim.sent.lock().unwrap(), [Ipi::Init(9), Ipi::Startup(9, 0x08)]);
    assert_eq!(delay.waits.lock().unwrap()[0], Duration::from_millis(10));
}

#[test]
fn silent_core_times_out_and_the_rest_continue() {
    let smp: &'static SmpState = Box::leak(Box::new(SmpState::new()));
    let cores = table(&[0, 1, 2]);
    let sim = SimulatedCores::new(smp, &cores, &[2]);
    let delay = RecordingDelay::default();
    let policy = BringUpPolicy {
        poll_attempts: 5,
        ..BringUpPolicy::default()
    };

    smp.register_bootstrap(0);
    let report = BringUp::new(smp, &sim, &delay)
        .with_policy(policy)
        .run(&cores, 0, PhysicalAddress::new(ENTRY_PAGE))
        .unwrap();
    sim.join();

    assert_eq!(smp.states().get(1), CoreState::TimedOut);
    assert!(report.timed_out(1));
    assert_eq!(report.timed_out_slots().collect::<Vec<_>>(), [1]);

    // Core 2 came up after core 1 was given up.
    let sent = sim.sent.lock().unwrap().clone();
    assert!(sent.contains(&Ipi::Startup(2, 0x08)));
    assert_eq!(smp.states().get(2), CoreState::Ready);

    let polls = delay
        .waits
        .lock()
        .unwrap()
        .iter()
        .filter(|&&d| d == Duration::from_millis(100))
        .count();
    assert!(polls >= 5, "only {polls} polls");
}

#[test]
fn timed_out_core_is_held_in_init() {
    let smp: &'static SmpState = Box::leak(Box::new(SmpState::new()));
    let cores = table(&[0, 1, 2]);
    let sim = SimulatedCores::new(smp, &cores, &[2]);
    let delay = RecordingDelay::default();
    let policy = BringUpPolicy {
        poll_attempts: 3,
        ..BringUpPolicy::default()
    };

    smp.register_bootstrap(0);
    let mut prepared = Vec::new();
    BringUp::new(smp, &sim, &delay)
        .with_policy(policy)
        .run_with(&cores, 0, PhysicalAddress::new(ENTRY_PAGE), |slot, _| {
            prepared.push(slot);
        })
        .unwrap();
    sim.join();

    // Core 1 is back in INIT before slot 2's parameters are written.
    assert_eq!(
        *sim.sent.lock().unwrap(),
        [
            Ipi::Init(1),
            Ipi::Startup(1, 0x08),
            Ipi::Init(1),
            Ipi::Init(2),
            Ipi::Startup(2, 0x08),
        ]
    );
    assert_eq!(prepared, [1, 2]);
    assert_eq!(smp.states().get(1), CoreState::TimedOut);
}

#[test]
fn bootstrap_slot_must_fit_the_core_tables() {
    let cores = table(&[7, 3, 5]);
    assert_eq!(bootstrap_slot(&cores, 3), Some(1));
    assert_eq!(bootstrap_slot(&cores, 9), None);

    let ids: Vec<u32> = (0..=MAX_CORES as u32).collect();
    let cores = table(&ids);
    assert_eq!(bootstrap_slot(&cores, MAX_CORES as u32 - 1), Some(MAX_CORES - 1));
    assert_eq!(bootstrap_slot(&cores, MAX_CORES as u32), None);
}

#[test]
fn late_core_is_parked() {
    let smp: &'static SmpState = Box::leak(Box::new(SmpState::new()));
    smp.states().set(3, CoreState::TimedOut);

    let result = unsafe { ApplicationCore::enter(leaked_domain(), smp, 3, |_| ()) };
    assert!(result.is_none());
    assert_eq!(smp.counter().active(), 0);
}

#[test]
fn absent_cores_and_the_bsp_are_skipped() {
    let smp: &'static SmpState = Box::leak(Box::new(SmpState::new()));
    let cores = vec![
        CoreDescriptor::new(0, true),
        CoreDescriptor::new(1, false),
        CoreDescriptor::new(2, true),
    ];
    let sim = SimulatedCores::new(smp, &cores, &[2]);
    let delay = RecordingDelay::default();

    smp.register_bootstrap(0);
    let report = BringUp::new(smp, &sim, &delay)
        .with_policy(fast_policy())
        .run(&cores, 0, PhysicalAddress::new(ENTRY_PAGE))
        .unwrap();
    sim.join();

    assert_eq!(report.ready_count(), 1);
    assert_eq!(smp.states().get(1), CoreState::Absent);
    assert!(
        !sim.sent
            .lock()
            .unwrap()
            .iter()
            .any(|ipi| matches!(ipi, Ipi::Init(0 | 1)))
    );
}

#[test]
fn invalid_entry_page_sends_nothing() {
    let smp: &'static SmpState = Box::leak(Box::new(SmpState::new()));
    let cores = table(&[0, 1]);
    let sim = SimulatedCores::new(smp, &cores, &[1]);
    let delay = RecordingDelay::default();
    let bringup = BringUp::new(smp, &sim, &delay);

    let page = PhysicalAddress::new(0x10_0000);
    assert_eq!(
        bringup.run(&cores, 0, page),
        Err(TrampolineError::NotInRealModeMemory { page })
    );
    let page = PhysicalAddress::new(0x8800);
    assert_eq!(
        bringup.run(&cores, 0, page),
        Err(TrampolineError::Misaligned { page })
    );
    assert!(sim.sent.lock().unwrap().is_empty());
}

#[test]
fn domain_shares_the_allocator() {
    let allocator = leaked_allocator(16);
    let gdt = DescriptorTablePointer::for_size(0x1000, 64).unwrap();
    let a = Domain::new(gdt, allocator);
    let b = Domain::new(gdt, allocator);

    let first = a.allocate_page().unwrap();
    let second = b.allocate_page().unwrap();
    assert_ne!(first, second);
    assert_eq!(a.gdt().limit(), 63);
    assert!(std::ptr::eq(a.allocator(), b.allocator()));
}
