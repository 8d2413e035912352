use core::panic::PanicInfo;
use kernel_qemu::qemu_trace;

#[panic_handler]
fn panic(info: &PanicInfo) -> ! {
    // Straight to the port; the logger may be what failed.
    qemu_trace!("[PANIC] {info}\n");
    halt()
}

/// Stops the executing core for good.
pub fn halt() -> ! {
    loop {
        // SAFETY: masking interrupts and halting touches no memory.
        unsafe {
            core::arch::asm!("cli", "hlt", options(nomem, nostack));
        }
    }
}
