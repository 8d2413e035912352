use crate::bsp;
use kernel_info::boot::KernelBootInfo;
use kernel_info::memory::KERNEL_STACK_SIZE;
use kernel_qemu::{DebugPortSink, KernelLogger, qemu_trace};
use log::LevelFilter;

#[cfg(debug_assertions)]
const LOG_LEVEL: LevelFilter = LevelFilter::Debug;

#[cfg(not(debug_assertions))]
const LOG_LEVEL: LevelFilter = LevelFilter::Info;

static LOGGER: KernelLogger<DebugPortSink> = KernelLogger::new(DebugPortSink, LOG_LEVEL);

/// 16-byte aligned stack
#[repr(C, align(16))]
struct Aligned<const N: usize>([u8; N]);

#[unsafe(link_section = ".bss.boot")]
static mut BOOT_STACK: Aligned<KERNEL_STACK_SIZE> = Aligned([0; KERNEL_STACK_SIZE]);

/// The kernel entry point.
///
/// The loader passes the boot block in `RDI` (System V). The function is
/// naked so it can switch to [`BOOT_STACK`] before any Rust code runs and
/// then hand a well-formed call frame to [`kernel_entry`].
#[unsafe(no_mangle)]
#[unsafe(naked)]
pub extern "C" fn _start_kernel(_boot_info: *const KernelBootInfo) -> ! {
    core::arch::naked_asm!(
        "cli",
        "mov r12, rdi",
        "lea rax, [rip + {stack_sym}]",
        "add rax, {stack_size}",
        "and rax, -16",
        "mov rsp, rax",
        // Emulate a CALL so RSP % 16 == 8 at the Rust entry.
        "push 0",
        "xor rbp, rbp",
        "mov rdi, r12",
        "jmp {rust_entry}",
        stack_sym = sym BOOT_STACK,
        stack_size = const KERNEL_STACK_SIZE,
        rust_entry = sym kernel_entry,
    );
}

extern "C" fn kernel_entry(boot_info: *const KernelBootInfo) -> ! {
    #[cfg(feature = "qemu")]
    qemu_trace!("kernel reporting to QEMU\n");

    if let Err(e) = kernel_qemu::init(&LOGGER) {
        qemu_trace!("logger not installed: {e}\n");
    }

    // SAFETY: the loader hands over a pointer to a block that stays mapped.
    match unsafe { KernelBootInfo::from_raw(boot_info) } {
        Ok(info) => bsp::start(info),
        Err(e) => panic!("boot information rejected: {e}"),
    }
}
