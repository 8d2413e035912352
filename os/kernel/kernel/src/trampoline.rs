//! Real-mode startup code for application cores.
//!
//! The bytes between `ap_trampoline_start` and `ap_trampoline_end` are copied
//! to [`AP_TRAMPOLINE_PAGE`] and run from there, so every absolute address
//! is computed against that page. The code walks real mode → protected mode
//! → long mode with its own three-entry GDT, loads `cr3` from the parameter
//! block, and calls `entry(slot, domain)` on the provided stack.
//!
//! The page tables behind `cr3` must identity-map the trampoline page.

use kernel_info::memory::AP_TRAMPOLINE_PAGE;
use kernel_smp::trampoline::PARAMETERS_OFFSET;

core::arch::global_asm!(
    ".pushsection .rodata.ap_trampoline, \"a\"",
    ".balign 16",
    ".global ap_trampoline_start",
    "ap_trampoline_start:",
    ".code16",
    "cli",
    "cld",
    "xor ax, ax",
    "mov ds, ax",
    "mov es, ax",
    "mov ss, ax",
    "lgdt [{base} + (ap_tramp_gdt_ptr - ap_trampoline_start)]",
    "mov eax, cr0",
    "or eax, 1",
    "mov cr0, eax",
    // jmp dword 0x08:pm32
    ".byte 0x66, 0xEA",
    ".long {base} + (ap_tramp_pm32 - ap_trampoline_start)",
    ".word 0x08",

    ".code32",
    "ap_tramp_pm32:",
    "mov ax, 0x10",
    "mov ds, ax",
    "mov es, ax",
    "mov ss, ax",
    // PAE
    "mov eax, cr4",
    "or eax, 0x20",
    "mov cr4, eax",
    "mov eax, dword ptr [{params}]",
    "mov cr3, eax",
    // EFER.LME | EFER.NXE
    "mov ecx, 0xC0000080",
    "rdmsr",
    "or eax, 0x900",
    "wrmsr",
    // PG | PE
    "mov eax, cr0",
    "or eax, 0x80000001",
    "mov cr0, eax",
    // jmp 0x18:lm64
    ".byte 0xEA",
    ".long {base} + (ap_tramp_lm64 - ap_trampoline_start)",
    ".word 0x18",

    ".code64",
    "ap_tramp_lm64:",
    "mov ax, 0x10",
    "mov ds, ax",
    "mov es, ax",
    "mov ss, ax",
    "mov rsp, qword ptr [{params} + 8]",
    "mov rdi, qword ptr [{params} + 24]",
    "mov rsi, qword ptr [{params} + 32]",
    "mov rax, qword ptr [{params} + 16]",
    "and rsp, -16",
    "xor rbp, rbp",
    "call rax",
    "ap_tramp_halt:",
    "cli",
    "hlt",
    "jmp ap_tramp_halt",

    ".balign 8",
    "ap_tramp_gdt:",
    ".quad 0",
    ".quad 0x00CF9A000000FFFF",
    ".quad 0x00CF92000000FFFF",
    ".quad 0x00AF9A000000FFFF",
    "ap_tramp_gdt_ptr:",
    ".word ap_tramp_gdt_ptr - ap_tramp_gdt - 1",
    ".long {base} + (ap_tramp_gdt - ap_trampoline_start)",
    ".global ap_trampoline_end",
    "ap_trampoline_end:",
    ".popsection",
    base = const AP_TRAMPOLINE_PAGE,
    params = const AP_TRAMPOLINE_PAGE + PARAMETERS_OFFSET as u64,
);

unsafe extern "C" {
    static ap_trampoline_start: u8;
    static ap_trampoline_end: u8;
}

/// The trampoline as linked into the kernel image.
pub fn code() -> &'static [u8] {
    let start = &raw const ap_trampoline_start;
    let end = &raw const ap_trampoline_end;
    let len = (end as usize) - (start as usize);
    // SAFETY: both symbols delimit one read-only blob in `.rodata`.
    unsafe { core::slice::from_raw_parts(start, len) }
}
