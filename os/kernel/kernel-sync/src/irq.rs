use crate::{SpinLock, SpinLockGuard};
use core::ops::{Deref, DerefMut};

/// Bit 9 of `RFLAGS`: maskable interrupts enabled.
#[cfg(all(target_arch = "x86_64", target_os = "none"))]
const RFLAGS_IF: u64 = 1 << 9;

/// A spin lock guard that also keeps local interrupts masked while held.
///
/// Created via [`SpinLock::lock_irq`], it
///
/// 1. saves the current interrupt state and disables interrupts, and
/// 2. acquires the underlying lock,
///
/// releasing them in reverse order on drop.
///
/// Any lock that an interrupt handler may also take on the same core must be
/// taken this way from ordinary kernel code, or the handler spins forever on a
/// lock its own core holds.
///
/// # Platform / Privilege
///
/// Uses `cli/sti` and `pushfq/pop`; CPL0 on bare-metal `x86_64` only.
/// Hosted builds keep the lock semantics and skip the interrupt masking.
pub struct IrqSpinLockGuard<'a, T> {
    // Field order matters: the lock is released before interrupts come back.
    guard: SpinLockGuard<'a, T>,
    _irq: IrqGuard,
}

impl<T> SpinLock<T> {
    /// Acquires the lock with interrupts disabled for the guard's lifetime.
    #[inline]
    pub fn lock_irq(&self) -> IrqSpinLockGuard<'_, T> {
        let irq = IrqGuard::new();
        let guard = self.lock();
        IrqSpinLockGuard { guard, _irq: irq }
    }
}

impl<T> Deref for IrqSpinLockGuard<'_, T> {
    type Target = T;
    fn deref(&self) -> &T {
        &self.guard
    }
}

impl<T> DerefMut for IrqSpinLockGuard<'_, T> {
    fn deref_mut(&mut self) -> &mut T {
        &mut self.guard
    }
}

/// Disables maskable interrupts on the executing core (`cli`).
///
/// # Safety & Privilege
///
/// Must only be called in contexts where `cli` is permitted.
#[inline]
pub fn cli_stop_interrupts() {
    #[cfg(all(target_arch = "x86_64", target_os = "none"))]
    unsafe {
        core::arch::asm!("cli", options(nomem, nostack, preserves_flags));
    }
}

/// Enables maskable interrupts on the executing core (`sti`).
///
/// # Safety & Privilege
///
/// Must only be called in contexts where `sti` is permitted.
#[inline]
pub fn sti_enable_interrupts() {
    #[cfg(all(target_arch = "x86_64", target_os = "none"))]
    unsafe {
        core::arch::asm!("sti", options(nomem, nostack, preserves_flags));
    }
}

/// Returns the current `RFLAGS` value (via `pushfq/pop`).
#[cfg(target_arch = "x86_64")]
#[inline]
#[must_use]
pub fn rflags() -> u64 {
    let r: u64;
    unsafe { core::arch::asm!("pushfq; pop {}", out(reg) r, options(nostack, preserves_flags)) }
    r
}

/// Whether maskable interrupts are currently delivered to this core.
///
/// Hosted builds have no interrupt flag of their own to manage and always
/// report `false`, which turns [`IrqGuard`] into a no-op there.
#[inline]
#[must_use]
pub fn interrupts_enabled() -> bool {
    #[cfg(all(target_arch = "x86_64", target_os = "none"))]
    {
        rflags() & RFLAGS_IF != 0
    }
    #[cfg(not(all(target_arch = "x86_64", target_os = "none")))]
    {
        false
    }
}

/// RAII guard that disables interrupts on creation and restores them on drop.
///
/// Interrupts are only re-enabled if they were enabled when the guard was
/// created, so guards nest.
pub struct IrqGuard {
    were_enabled: bool,
}

impl Default for IrqGuard {
    fn default() -> Self {
        Self::new()
    }
}

impl IrqGuard {
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        let enabled = interrupts_enabled();
        if enabled {
            cli_stop_interrupts();
        }
        Self {
            were_enabled: enabled,
        }
    }
}

impl Drop for IrqGuard {
    fn drop(&mut self) {
        if self.were_enabled {
            sti_enable_interrupts();
        }
    }
}
