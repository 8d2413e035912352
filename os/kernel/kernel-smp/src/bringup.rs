//! # Bring-up driver
//!
//! Runs on the bootstrap core. For every present application core:
//!
//! 1. mark it `InitRequested`, send INIT, wait [`BringUpPolicy::init_settle`];
//! 2. mark it `Started`, send STARTUP with the trampoline page;
//! 3. poll up to [`BringUpPolicy::poll_attempts`] times, sleeping
//!    [`BringUpPolicy::poll_interval`] between polls, for the core to claim
//!    `Ready`;
//! 4. otherwise claim `TimedOut`, send INIT again and move on.
//!
//! Cores are started one after another so the shared trampoline parameter
//! block is never needed by two cores at once. The second INIT holds a
//! timed-out core in wait-for-STARTUP, so a late STARTUP cannot make it read
//! the parameters written for the next core. Afterwards the bootstrap core
//! meets every ready core at the barrier.

use crate::state::{CoreState, SmpState};
use crate::trampoline::{TrampolineError, startup_vector};
use core::time::Duration;
use kernel_apic::{ApicBus, IpiCommand, LocalApic};
use kernel_info::boot::CoreDescriptor;
use kernel_info::memory::MAX_CORES;
use kernel_memory_addresses::PhysicalAddress;
use log::{debug, info, warn};

/// Sends the two IPIs a bring-up needs.
pub trait StartupIpi {
    fn send_init(&self, apic_id: u32);
    fn send_startup(&self, apic_id: u32, vector: u8);
}

impl<B: ApicBus> StartupIpi for LocalApic<B> {
    fn send_init(&self, apic_id: u32) {
        Self::send_init(self, apic_id);
    }

    fn send_startup(&self, apic_id: u32, vector: u8) {
        self.send_ipi(apic_id, IpiCommand::startup(vector));
    }
}

/// A busy or sleeping wait.
pub trait Delay {
    fn delay(&self, duration: Duration);
}

/// Timing of the bring-up sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BringUpPolicy {
    /// Wait between INIT and STARTUP.
    pub init_settle: Duration,
    /// Wait between two readiness polls.
    pub poll_interval: Duration,
    /// Polls before a core is given up.
    pub poll_attempts: u32,
}

impl Default for BringUpPolicy {
    fn default() -> Self {
        Self {
            init_settle: Duration::from_millis(10),
            poll_interval: Duration::from_millis(100),
            poll_attempts: 10,
        }
    }
}

/// Outcome of [`BringUp::run`], one bit per core table slot.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BringUpReport {
    ready: u64,
    timed_out: u64,
    skipped: usize,
}

const _: () = assert!(MAX_CORES <= u64::BITS as usize);

impl BringUpReport {
    /// Application cores that reached `Ready`.
    #[must_use]
    pub const fn ready_count(&self) -> usize {
        self.ready.count_ones() as usize
    }

    #[must_use]
    pub const fn timed_out_count(&self) -> usize {
        self.timed_out.count_ones() as usize
    }

    /// Present cores beyond [`MAX_CORES`] that were never started.
    #[must_use]
    pub const fn skipped(&self) -> usize {
        self.skipped
    }

    #[must_use]
    pub const fn is_ready(&self, slot: usize) -> bool {
        slot < MAX_CORES && self.ready & (1 << slot) != 0
    }

    #[must_use]
    pub const fn timed_out(&self, slot: usize) -> bool {
        slot < MAX_CORES && self.timed_out & (1 << slot) != 0
    }

    /// Slots of the cores that never answered.
    pub fn timed_out_slots(&self) -> impl Iterator<Item = usize> + '_ {
        (0..MAX_CORES).filter(|&slot| self.timed_out(slot))
    }
}

/// Core table slot of the bootstrap core, if it has one that fits the
/// per-core tables.
#[must_use]
pub fn bootstrap_slot(cores: &[CoreDescriptor], bsp_apic_id: u32) -> Option<usize> {
    let slot = cores.iter().position(|c| c.apic_id == bsp_apic_id)?;
    if slot >= MAX_CORES {
        warn!("bootstrap core (APIC {bsp_apic_id:#x}) sits in slot {slot}, beyond {MAX_CORES} cores");
        return None;
    }
    Some(slot)
}

pub struct BringUp<'a, I, D> {
    smp: &'a SmpState,
    ipi: &'a I,
    delay: &'a D,
    policy: BringUpPolicy,
}

impl<'a, I: StartupIpi, D: Delay> BringUp<'a, I, D> {
    #[must_use]
    pub fn new(smp: &'a SmpState, ipi: &'a I, delay: &'a D) -> Self {
        Self {
            smp,
            ipi,
            delay,
            policy: BringUpPolicy::default(),
        }
    }

    #[must_use]
    pub const fn with_policy(mut self, policy: BringUpPolicy) -> Self {
        self.policy = policy;
        self
    }

    #[must_use]
    pub const fn policy(&self) -> &BringUpPolicy {
        &self.policy
    }

    /// Starts every present core except `bsp_apic_id` and waits at the
    /// barrier for all that became ready.
    ///
    /// The bootstrap core must have called [`SmpState::register_bootstrap`].
    ///
    /// # Errors
    /// If `entry_page` cannot be a STARTUP target; no IPI is sent then.
    pub fn run(
        &self,
        cores: &[CoreDescriptor],
        bsp_apic_id: u32,
        entry_page: PhysicalAddress,
    ) -> Result<BringUpReport, TrampolineError> {
        self.run_with(cores, bsp_apic_id, entry_page, |_, _| {})
    }

    /// As [`BringUp::run`], calling `prepare(slot, core)` right before each
    /// core's INIT, e.g. to patch the trampoline parameters.
    ///
    /// # Errors
    /// As [`BringUp::run`].
    pub fn run_with(
        &self,
        cores: &[CoreDescriptor],
        bsp_apic_id: u32,
        entry_page: PhysicalAddress,
        mut prepare: impl FnMut(usize, &CoreDescriptor),
    ) -> Result<BringUpReport, TrampolineError> {
        let vector = startup_vector(entry_page)?;
        let mut report = BringUpReport::default();

        for (slot, core) in cores.iter().enumerate() {
            if !core.is_present() || core.apic_id == bsp_apic_id {
                continue;
            }
            if slot >= MAX_CORES {
                warn!("core table slot {slot} (APIC {:#x}) exceeds {MAX_CORES} cores, not started", core.apic_id);
                report.skipped += 1;
                continue;
            }

            prepare(slot, core);
            if self.start_core(slot, core.apic_id, vector) {
                report.ready |= 1 << slot;
            } else {
                report.timed_out |= 1 << slot;
            }
        }

        info!(
            "{} application core(s) ready, {} timed out",
            report.ready_count(),
            report.timed_out_count()
        );

        let barrier = self.smp.barrier();
        barrier.reset(report.ready_count() + 1);
        barrier.reach();
        debug!("all ready cores passed the bring-up barrier");
        Ok(report)
    }

    /// Returns whether the core claimed `Ready` in time.
    fn start_core(&self, slot: usize, apic_id: u32, vector: u8) -> bool {
        let states = self.smp.states();
        debug!("starting core slot {slot} (APIC {apic_id:#x})");

        states.set(slot, CoreState::InitRequested);
        self.ipi.send_init(apic_id);
        self.delay.delay(self.policy.init_settle);

        states.set(slot, CoreState::Started);
        self.ipi.send_startup(apic_id, vector);

        for _ in 0..self.policy.poll_attempts {
            if states.get(slot) == CoreState::Ready {
                return true;
            }
            self.delay.delay(self.policy.poll_interval);
        }

        match states.advance(slot, CoreState::Started, CoreState::TimedOut) {
            Ok(()) => {
                warn!("core slot {slot} (APIC {apic_id:#x}) did not answer, holding it in INIT");
                self.ipi.send_init(apic_id);
                false
            }
            // It claimed Ready after the last poll.
            Err(state) => state == CoreState::Ready,
        }
    }
}
