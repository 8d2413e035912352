//! # Time Stamp Counter delays
//!
//! Bring-up needs millisecond waits before any timer interrupt is wired up.
//! [`TscDelay`] busy-waits on `rdtsc` with a frequency taken from CPUID leaf
//! `0x15` (crystal ratio) or `0x16` (base MHz), falling back to a PIT
//! measurement when neither is reported.

use core::arch::x86_64::{__cpuid, __cpuid_count};
use core::hint::spin_loop;
use core::time::Duration;
use kernel_smp::Delay;
use log::debug;

const PIT_CH0_DATA: u16 = 0x40;
const PIT_CMD: u16 = 0x43;
const PIT_INPUT_HZ: u64 = 1_193_182;

/// Busy-wait [`Delay`] driven by the TSC.
#[derive(Debug, Clone, Copy)]
pub struct TscDelay {
    hz: u64,
}

impl TscDelay {
    /// # Safety
    /// CPL 0 with interrupts masked; may reprogram PIT channel 0.
    pub unsafe fn calibrate() -> Self {
        let hz = leaf_15_hz()
            .or_else(leaf_16_hz)
            // SAFETY: upheld by the caller.
            .unwrap_or_else(|| unsafe { pit_measure_hz(50_000) });
        debug!("TSC runs at {} MHz", hz / 1_000_000);
        Self { hz: hz.max(1) }
    }
}

impl Delay for TscDelay {
    fn delay(&self, duration: Duration) {
        let micros = u64::try_from(duration.as_micros()).unwrap_or(u64::MAX);
        let ticks = micros.saturating_mul(self.hz) / 1_000_000;
        let start = rdtsc();
        while rdtsc().wrapping_sub(start) < ticks {
            spin_loop();
        }
    }
}

fn max_leaf() -> u32 {
    // SAFETY: CPUID is available on every x86-64 core.
    unsafe { __cpuid(0) }.eax
}

/// TSC Hz = crystal Hz × EBX / EAX.
fn leaf_15_hz() -> Option<u64> {
    if max_leaf() < 0x15 {
        return None;
    }
    // SAFETY: leaf checked above.
    let r = unsafe { __cpuid_count(0x15, 0) };
    if r.eax == 0 || r.ebx == 0 || r.ecx == 0 {
        return None;
    }
    Some(u64::from(r.ecx).saturating_mul(u64::from(r.ebx)) / u64::from(r.eax))
}

/// Base frequency in MHz, taken as the TSC rate.
fn leaf_16_hz() -> Option<u64> {
    if max_leaf() < 0x16 {
        return None;
    }
    // SAFETY: leaf checked above.
    let base_mhz = unsafe { __cpuid_count(0x16, 0) }.eax & 0xFFFF;
    (base_mhz != 0).then(|| u64::from(base_mhz) * 1_000_000)
}

/// Counts TSC ticks over one PIT channel 0 reload period.
#[allow(clippy::cast_possible_truncation)]
unsafe fn pit_measure_hz(window_us: u64) -> u64 {
    let reload = (PIT_INPUT_HZ * window_us).div_ceil(1_000_000).clamp(1, 0xFFFF) as u16;

    // SAFETY: upheld by the caller.
    unsafe {
        // Channel 0, lobyte/hibyte, mode 2, binary.
        outb(PIT_CMD, 0b0011_0100);
        outb(PIT_CH0_DATA, (reload & 0xFF) as u8);
        outb(PIT_CH0_DATA, (reload >> 8) as u8);
    }

    let t0 = rdtsc();
    // SAFETY: as above.
    let mut last = unsafe { read_pit_counter() };
    loop {
        // SAFETY: as above.
        let current = unsafe { read_pit_counter() };
        if current > last || current <= 2 {
            break;
        }
        last = current;
        spin_loop();
    }
    let elapsed = rdtsc().wrapping_sub(t0);

    elapsed.saturating_mul(1_000_000) / window_us
}

unsafe fn read_pit_counter() -> u16 {
    // SAFETY: upheld by the caller.
    unsafe {
        outb(PIT_CMD, 0);
        let lo = u16::from(inb(PIT_CH0_DATA));
        let hi = u16::from(inb(PIT_CH0_DATA));
        (hi << 8) | lo
    }
}

unsafe fn outb(port: u16, value: u8) {
    // SAFETY: upheld by the caller.
    unsafe {
        core::arch::asm!("out dx, al", in("dx") port, in("al") value, options(nomem, nostack, preserves_flags));
    }
}

unsafe fn inb(port: u16) -> u8 {
    let value: u8;
    // SAFETY: upheld by the caller.
    unsafe {
        core::arch::asm!("in al, dx", in("dx") port, out("al") value, options(nomem, nostack, preserves_flags));
    }
    value
}

fn rdtsc() -> u64 {
    let lo: u32;
    let hi: u32;
    // SAFETY: RDTSC is unprivileged unless CR4.TSD is set, which the kernel never does.
    unsafe {
        core::arch::asm!(
            "lfence",
            "rdtsc",
            out("eax") lo,
            out("edx") hi,
            options(nomem, nostack, preserves_flags),
        );
    }
    (u64::from(hi) << 32) | u64::from(lo)
}
