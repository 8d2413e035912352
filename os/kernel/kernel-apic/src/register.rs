//! # Local APIC register file
//!
//! Registers are named by their index `n`. In xAPIC mode register `n` lives
//! at MMIO offset `n * 16` from the window base, in x2APIC mode it is MSR
//! `0x800 + n`.

use bitfield_struct::bitfield;
use kernel_info::boot::KernelBootInfo;

/// Register indices used by the kernel.
#[repr(u16)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ApicRegister {
    Id = 0x02,
    EndOfInterrupt = 0x0B,
    SpuriousInterruptVector = 0x0F,
    InterruptCommandLow = 0x30,
    InterruptCommandHigh = 0x31,
    Timer = 0x32,
    TimerInitialCount = 0x38,
    TimerCurrentCount = 0x39,
    TimerDivisor = 0x3E,
}

impl ApicRegister {
    #[inline]
    #[must_use]
    pub const fn index(self) -> u16 {
        self as u16
    }

    /// Byte offset inside the xAPIC MMIO window.
    #[inline]
    #[must_use]
    pub const fn mmio_offset(self) -> u64 {
        (self as u64) * 16
    }

    /// MSR number in x2APIC mode.
    #[inline]
    #[must_use]
    pub const fn msr(self) -> u32 {
        kernel_registers::msr::Msr::x2apic(self as u32).raw()
    }
}

/// How the local APIC registers are reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApicMode {
    /// Memory-mapped registers, 8-bit ids.
    XApic,
    /// MSR registers, 32-bit ids.
    X2Apic,
}

impl ApicMode {
    #[must_use]
    pub const fn from_boot_info(info: &KernelBootInfo) -> Self {
        if info.extended_apic() {
            Self::X2Apic
        } else {
            Self::XApic
        }
    }
}

/// ICR delivery mode, bits 8–10.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryMode {
    Fixed = 0b000,
    LowestPriority = 0b001,
    Smi = 0b010,
    Nmi = 0b100,
    Init = 0b101,
    Startup = 0b110,
    /// 0b011 and 0b111 are reserved.
    Reserved = 0b111,
}

impl DeliveryMode {
    #[must_use]
    pub const fn from_bits(bits: u8) -> Self {
        match bits & 0b111 {
            0b000 => Self::Fixed,
            0b001 => Self::LowestPriority,
            0b010 => Self::Smi,
            0b100 => Self::Nmi,
            0b101 => Self::Init,
            0b110 => Self::Startup,
            _ => Self::Reserved,
        }
    }

    #[must_use]
    pub const fn into_bits(self) -> u8 {
        self as u8
    }
}

/// ICR destination shorthand, bits 18–19.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DestinationShorthand {
    None = 0b00,
    SelfOnly = 0b01,
    AllIncludingSelf = 0b10,
    AllExcludingSelf = 0b11,
}

impl DestinationShorthand {
    #[must_use]
    pub const fn from_bits(bits: u8) -> Self {
        match bits & 0b11 {
            0b00 => Self::None,
            0b01 => Self::SelfOnly,
            0b10 => Self::AllIncludingSelf,
            _ => Self::AllExcludingSelf,
        }
    }

    #[must_use]
    pub const fn into_bits(self) -> u8 {
        self as u8
    }
}

/// Low half of the Interrupt Command Register.
#[bitfield(u32)]
#[derive(PartialEq, Eq)]
pub struct IpiCommand {
    pub vector: u8,
    #[bits(3)]
    pub delivery_mode: DeliveryMode,
    /// Logical instead of physical destination.
    pub logical_destination: bool,
    /// Set while the previous IPI is still being sent (xAPIC only).
    #[bits(access = RO)]
    pub delivery_pending: bool,
    __: bool,
    /// Level assert; must be set for everything but INIT de-assert.
    pub assert: bool,
    pub level_triggered: bool,
    #[bits(2)]
    __: u8,
    #[bits(2)]
    pub shorthand: DestinationShorthand,
    #[bits(12)]
    __: u16,
}

impl IpiCommand {
    /// A fixed interrupt on `vector`.
    #[must_use]
    pub const fn fixed(vector: u8) -> Self {
        Self::new()
            .with_vector(vector)
            .with_delivery_mode(DeliveryMode::Fixed)
            .with_assert(true)
    }

    /// INIT, level assert, edge triggered (`0x4500`).
    #[must_use]
    pub const fn init() -> Self {
        Self::new()
            .with_delivery_mode(DeliveryMode::Init)
            .with_assert(true)
    }

    /// STARTUP at physical page `page_number` (`0x4600 | page`).
    #[must_use]
    pub const fn startup(page_number: u8) -> Self {
        Self::new()
            .with_vector(page_number)
            .with_delivery_mode(DeliveryMode::Startup)
            .with_assert(true)
    }
}

/// Timer mode in the LVT timer entry, bits 17–18.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerMode {
    OneShot = 0b00,
    Periodic = 0b01,
    TscDeadline = 0b10,
}

impl TimerMode {
    #[must_use]
    pub const fn from_bits(bits: u8) -> Self {
        match bits & 0b11 {
            0b01 => Self::Periodic,
            0b10 => Self::TscDeadline,
            _ => Self::OneShot,
        }
    }

    #[must_use]
    pub const fn into_bits(self) -> u8 {
        self as u8
    }
}

/// LVT timer entry.
#[bitfield(u32)]
#[derive(PartialEq, Eq)]
pub struct TimerLvt {
    pub vector: u8,
    #[bits(4)]
    __: u8,
    #[bits(access = RO)]
    pub delivery_pending: bool,
    #[bits(3)]
    __: u8,
    pub masked: bool,
    #[bits(2)]
    pub mode: TimerMode,
    #[bits(13)]
    __: u16,
}

/// Spurious Interrupt Vector register.
#[bitfield(u32)]
#[derive(PartialEq, Eq)]
pub struct SpuriousVector {
    pub vector: u8,
    /// APIC software enable.
    pub enabled: bool,
    #[bits(23)]
    __: u32,
}

/// Timer divide configuration. The odd encodings are architectural.
#[repr(u32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerDivisor {
    By1 = 0b1011,
    By2 = 0b0000,
    By4 = 0b0001,
    By8 = 0b0010,
    By16 = 0b0011,
    By32 = 0b1000,
    By64 = 0b1001,
    By128 = 0b1010,
}

impl TimerDivisor {
    #[must_use]
    pub const fn into_bits(self) -> u32 {
        self as u32
    }

    #[must_use]
    pub const fn divide_by(self) -> u32 {
        match self {
            Self::By1 => 1,
            Self::By2 => 2,
            Self::By4 => 4,
            Self::By8 => 8,
            Self::By16 => 16,
            Self::By32 => 32,
            Self::By64 => 64,
            Self::By128 => 128,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn register_addresses() {
        assert_eq!(ApicRegister::Id.mmio_offset(), 0x20);
        assert_eq!(ApicRegister::EndOfInterrupt.mmio_offset(), 0xB0);
        assert_eq!(ApicRegister::InterruptCommandHigh.mmio_offset(), 0x310);
        assert_eq!(ApicRegister::TimerDivisor.msr(), 0x83E);
    }

    #[test]
    fn startup_commands_match_the_classic_encodings() {
        assert_eq!(IpiCommand::init().into_bits(), 0x4500);
        assert_eq!(IpiCommand::startup(0x08).into_bits(), 0x4608);
        assert_eq!(IpiCommand::fixed(0xF0).into_bits(), 0x40F0);
    }

    #[test]
    fn periodic_masked_timer() {
        let lvt = TimerLvt::new()
            .with_vector(0xE0)
            .with_masked(true)
            .with_mode(TimerMode::Periodic);
        assert_eq!(lvt.into_bits(), 0x0003_00E0);
    }
}
