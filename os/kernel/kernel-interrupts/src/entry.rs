//! # Entry trampolines
//!
//! One 16-byte aligned stub per vector. Each stub levels the stack (pushes a
//! zero error code where the CPU pushes none), pushes its vector number and
//! jumps to the common path, which completes a [`TrapFrame`] and calls the
//! global dispatch with a pointer to it.
//!
//! ```text
//! stub:   [push 0]  push N  jmp common
//! common: cld
//!         push rax .. r15        ; GPRs, r15 ends up lowest
//!         push gs, fs, es, ds    ; selectors, ds ends up lowest
//!         rdi = rsp              ; &mut TrapFrame
//!         align rsp, call dispatch
//!         restore ds, es (fs/gs bases stay untouched)
//!         pop r15 .. rax
//!         drop vector + error code
//!         iretq
//! ```
//!
//! [`TrapFrame`]: crate::TrapFrame

use crate::global::kernel_trap_dispatch;
use crate::trap_frame::TrapFrame;

core::arch::global_asm!(
    ".altmacro",
    ".macro kernel_trap_stub n",
    "    .align 16",
    "kernel_trap_stub_\\n:",
    "    .if (\\n == 8) || ((\\n >= 10) && (\\n <= 14)) || (\\n == 17) || (\\n == 21) || (\\n == 29) || (\\n == 30)",
    "    .else",
    "    push 0",
    "    .endif",
    "    push \\n",
    "    jmp kernel_trap_common",
    ".endm",
    ".macro kernel_trap_stub_address n",
    "    .quad kernel_trap_stub_\\n",
    ".endm",
    "",
    ".pushsection .text.kernel_trap_stubs, \"ax\"",
    ".set kernel_trap_vector, 0",
    ".rept 256",
    "    kernel_trap_stub %kernel_trap_vector",
    "    .set kernel_trap_vector, kernel_trap_vector + 1",
    ".endr",
    "",
    ".align 16",
    "kernel_trap_common:",
    "    cld",
    "    push rax",
    "    push rbx",
    "    push rcx",
    "    push rdx",
    "    push rsi",
    "    push rdi",
    "    push rbp",
    "    push r8",
    "    push r9",
    "    push r10",
    "    push r11",
    "    push r12",
    "    push r13",
    "    push r14",
    "    push r15",
    "    mov rax, gs",
    "    push rax",
    "    mov rax, fs",
    "    push rax",
    "    mov rax, es",
    "    push rax",
    "    mov rax, ds",
    "    push rax",
    // rbx is saved in the frame and callee-saved across the call.
    "    mov rdi, rsp",
    "    mov rbx, rsp",
    "    and rsp, -16",
    "    call {dispatch}",
    "    mov rsp, rbx",
    "    pop rax",
    "    mov ds, ax",
    "    pop rax",
    "    mov es, ax",
    "    add rsp, 16",
    "    pop r15",
    "    pop r14",
    "    pop r13",
    "    pop r12",
    "    pop r11",
    "    pop r10",
    "    pop r9",
    "    pop r8",
    "    pop rbp",
    "    pop rdi",
    "    pop rsi",
    "    pop rdx",
    "    pop rcx",
    "    pop rbx",
    "    pop rax",
    "    add rsp, 16",
    "    iretq",
    ".popsection",
    "",
    ".pushsection .rodata.kernel_trap_stubs, \"a\"",
    ".balign 8",
    ".global KERNEL_TRAP_STUBS",
    "KERNEL_TRAP_STUBS:",
    ".set kernel_trap_vector, 0",
    ".rept 256",
    "    kernel_trap_stub_address %kernel_trap_vector",
    "    .set kernel_trap_vector, kernel_trap_vector + 1",
    ".endr",
    ".popsection",
    ".noaltmacro",
    dispatch = sym kernel_trap_dispatch,
);

const _: () = assert!(size_of::<TrapFrame>() % 8 == 0);

unsafe extern "C" {
    static KERNEL_TRAP_STUBS: [u64; 256];
}

/// Addresses of the 256 entry stubs, indexed by vector.
#[must_use]
pub fn trampolines() -> &'static [u64; 256] {
    // SAFETY: the table is emitted above and never written.
    unsafe { &*core::ptr::addr_of!(KERNEL_TRAP_STUBS) }
}
