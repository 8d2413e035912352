use crate::bus::ApicBus;
use crate::register::{
    ApicMode, ApicRegister, IpiCommand, SpuriousVector, TimerDivisor, TimerLvt, TimerMode,
};
use kernel_info::boot::KernelBootInfo;
use kernel_info::memory::REAL_MODE_LIMIT;
use kernel_memory_addresses::PhysicalAddress;
use kernel_registers::msr::Ia32ApicBase;
use kernel_sync::SyncOnceCell;
use log::{debug, info, trace};

/// The addressing mode chosen at boot. Set once, never changed.
static MODE: SyncOnceCell<ApicMode> = SyncOnceCell::new();

/// The mode latched by [`LocalApic::initialize`], if it ran.
#[must_use]
pub fn latched_mode() -> Option<ApicMode> {
    MODE.get().copied()
}

#[derive(thiserror::Error, Debug, Copy, Clone, PartialEq, Eq)]
pub enum ApicError {
    #[error("startup page {page} is not page-aligned below 1 MiB")]
    InvalidStartupPage { page: PhysicalAddress },
}

/// The executing core's local interrupt controller.
pub struct LocalApic<B> {
    mode: ApicMode,
    window: PhysicalAddress,
    bus: B,
}

impl<B: ApicBus> LocalApic<B> {
    /// Latches the addressing mode from the boot flags and binds `bus`.
    ///
    /// The first call decides the mode for the lifetime of the kernel; later
    /// calls (one per application core) reuse it.
    pub fn initialize(info: &KernelBootInfo, bus: B) -> Self {
        let requested = ApicMode::from_boot_info(info);
        let mode = *MODE.get_or_init(|| {
            info!("local APIC addressing mode: {requested:?}");
            requested
        });
        debug_assert_eq!(mode, requested, "APIC mode changed after boot");
        Self::with_mode(mode, bus)
    }

    /// Binds `bus` in an explicit mode without touching the global latch.
    pub fn with_mode(mode: ApicMode, bus: B) -> Self {
        let window = match mode {
            ApicMode::XApic => Ia32ApicBase::from_bits(bus.read_msr(Ia32ApicBase::IA32_APIC_BASE)).base(),
            ApicMode::X2Apic => PhysicalAddress::zero(),
        };
        Self { mode, window, bus }
    }

    #[inline]
    #[must_use]
    pub const fn mode(&self) -> ApicMode {
        self.mode
    }

    /// Physical base of the MMIO window; zero in x2APIC mode.
    #[inline]
    #[must_use]
    pub const fn window(&self) -> PhysicalAddress {
        self.window
    }

    #[inline]
    #[must_use]
    pub const fn bus(&self) -> &B {
        &self.bus
    }

    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn read_register(&self, register: ApicRegister) -> u32 {
        match self.mode {
            ApicMode::X2Apic => self.bus.read_msr(register.msr()) as u32,
            ApicMode::XApic => self.bus.read_mmio(self.window + register.mmio_offset()),
        }
    }

    pub fn write_register(&self, register: ApicRegister, value: u32) {
        match self.mode {
            ApicMode::X2Apic => self.bus.write_msr(register.msr(), u64::from(value)),
            ApicMode::XApic => self
                .bus
                .write_mmio(self.window + register.mmio_offset(), value),
        }
    }

    /// The APIC id of the executing core.
    #[must_use]
    pub fn id(&self) -> u32 {
        let raw = self.read_register(ApicRegister::Id);
        match self.mode {
            ApicMode::XApic => raw >> 24,
            ApicMode::X2Apic => raw,
        }
    }

    /// Acknowledges the interrupt being serviced.
    #[inline]
    pub fn end_of_interrupt(&self) {
        self.write_register(ApicRegister::EndOfInterrupt, 0);
    }

    /// Globally enables the unit in the latched mode, then software-enables it
    /// with `spurious_vector` as the spurious interrupt vector.
    pub fn enable(&self, spurious_vector: u8) {
        let base = Ia32ApicBase::from_bits(self.bus.read_msr(Ia32ApicBase::IA32_APIC_BASE))
            .with_enable(true)
            .with_x2apic_enable(self.mode == ApicMode::X2Apic);
        self.bus
            .write_msr(Ia32ApicBase::IA32_APIC_BASE, base.into_bits());

        let svr = SpuriousVector::from_bits(self.read_register(ApicRegister::SpuriousInterruptVector))
            .with_vector(spurious_vector)
            .with_enabled(true);
        self.write_register(ApicRegister::SpuriousInterruptVector, svr.into_bits());
        debug!("local APIC {:#x} enabled, spurious vector {spurious_vector:#04x}", self.id());
    }

    /// Sends `command` to the core with APIC id `destination`.
    ///
    /// xAPIC splits the ICR in two registers: the destination goes high, and
    /// writing the low half triggers delivery. x2APIC takes one 64-bit write.
    pub fn send_ipi(&self, destination: u32, command: IpiCommand) {
        trace!("IPI {:#x} -> APIC {destination:#x}", command.into_bits());
        match self.mode {
            ApicMode::XApic => {
                self.wait_for_delivery();
                self.write_register(ApicRegister::InterruptCommandHigh, destination << 24);
                self.write_register(ApicRegister::InterruptCommandLow, command.into_bits());
                self.wait_for_delivery();
            }
            ApicMode::X2Apic => {
                let icr = (u64::from(destination) << 32) | u64::from(command.into_bits());
                self.bus
                    .write_msr(ApicRegister::InterruptCommandLow.msr(), icr);
            }
        }
    }

    fn wait_for_delivery(&self) {
        while IpiCommand::from_bits(self.read_register(ApicRegister::InterruptCommandLow))
            .delivery_pending()
        {
            core::hint::spin_loop();
        }
    }

    pub fn send_init(&self, destination: u32) {
        self.send_ipi(destination, IpiCommand::init());
    }

    /// Starts `destination` in real mode at the start of `page`.
    ///
    /// # Errors
    /// [`ApicError::InvalidStartupPage`] unless `page` is page-aligned and
    /// below 1 MiB.
    #[allow(clippy::cast_possible_truncation)]
    pub fn send_startup(&self, destination: u32, page: PhysicalAddress) -> Result<(), ApicError> {
        if !page.is_page_aligned() || page.as_u64() >= REAL_MODE_LIMIT {
            return Err(ApicError::InvalidStartupPage { page });
        }
        self.send_ipi(destination, IpiCommand::startup(page.frame_number() as u8));
        Ok(())
    }

    /// Arms the timer to fire `vector` every `initial` ticks of the bus clock
    /// divided by `divisor`.
    pub fn start_timer_periodic(&self, vector: u8, divisor: TimerDivisor, initial: u32) {
        let lvt = TimerLvt::new()
            .with_vector(vector)
            .with_mode(TimerMode::Periodic)
            .with_masked(true);
        self.write_register(ApicRegister::Timer, lvt.into_bits());
        self.write_register(ApicRegister::TimerDivisor, divisor.into_bits());
        self.write_register(ApicRegister::TimerInitialCount, initial);
        self.mask_timer(false);
        debug!("APIC timer: vector {vector:#04x}, divisor {}, initial {initial}", divisor.divide_by());
    }

    /// Masks or unmasks timer delivery, keeping the rest of the LVT entry.
    pub fn mask_timer(&self, masked: bool) {
        let lvt = TimerLvt::from_bits(self.read_register(ApicRegister::Timer)).with_masked(masked);
        self.write_register(ApicRegister::Timer, lvt.into_bits());
    }

    #[must_use]
    pub fn timer_current_count(&self) -> u32 {
        self.read_register(ApicRegister::TimerCurrentCount)
    }
}

impl<B> core::fmt::Debug for LocalApic<B> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("LocalApic")
            .field("mode", &self.mode)
            .field("window", &self.window)
            .finish_non_exhaustive()
    }
}
