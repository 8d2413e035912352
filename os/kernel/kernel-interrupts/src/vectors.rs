//! # Vector Numbers
//!
//! | Range       | Use                                   |
//! |-------------|---------------------------------------|
//! | `0x00–0x1F` | CPU exceptions                        |
//! | `0x20–0x2F` | legacy PIC lines (remapped)           |
//! | `0x80`      | software syscall gate                 |
//! | `0xE0`      | local APIC timer                      |
//! | `0xFF`      | local APIC spurious                   |

pub const DIVIDE_ERROR: u8 = 0x00;
pub const DEBUG: u8 = 0x01;
pub const NMI: u8 = 0x02;
pub const BREAKPOINT: u8 = 0x03;
pub const OVERFLOW: u8 = 0x04;
pub const BOUND_RANGE: u8 = 0x05;
pub const INVALID_OPCODE: u8 = 0x06;
pub const DEVICE_NOT_AVAILABLE: u8 = 0x07;
pub const DOUBLE_FAULT: u8 = 0x08;
pub const INVALID_TSS: u8 = 0x0A;
pub const SEGMENT_NOT_PRESENT: u8 = 0x0B;
pub const STACK_SEGMENT_FAULT: u8 = 0x0C;
pub const GENERAL_PROTECTION: u8 = 0x0D;
pub const PAGE_FAULT: u8 = 0x0E;
pub const X87_FLOATING_POINT: u8 = 0x10;
pub const ALIGNMENT_CHECK: u8 = 0x11;
pub const MACHINE_CHECK: u8 = 0x12;
pub const SIMD_FLOATING_POINT: u8 = 0x13;
pub const VIRTUALIZATION: u8 = 0x14;
pub const CONTROL_PROTECTION: u8 = 0x15;
pub const HYPERVISOR_INJECTION: u8 = 0x1C;
pub const VMM_COMMUNICATION: u8 = 0x1D;
pub const SECURITY: u8 = 0x1E;

/// Number of architecturally reserved exception vectors.
pub const EXCEPTION_COUNT: u8 = 32;

/// First vector of the remapped legacy PIC.
pub const PIC_BASE: u8 = 0x20;

/// IRQ 7 of the primary PIC, raised spuriously.
pub const PIC_SPURIOUS_PRIMARY: u8 = PIC_BASE + 7;

/// IRQ 15 (IRQ 7 of the secondary PIC), raised spuriously.
pub const PIC_SPURIOUS_SECONDARY: u8 = PIC_BASE + 15;

pub const SYSCALL: u8 = 0x80;
pub const APIC_TIMER: u8 = 0xE0;
pub const APIC_SPURIOUS: u8 = 0xFF;

#[inline]
#[must_use]
pub const fn is_exception(vector: u8) -> bool {
    vector < EXCEPTION_COUNT
}

/// Vectors that never carry work and need neither handling nor EOI.
#[inline]
#[must_use]
pub const fn is_spurious(vector: u8) -> bool {
    matches!(
        vector,
        APIC_SPURIOUS | PIC_SPURIOUS_PRIMARY | PIC_SPURIOUS_SECONDARY
    )
}

/// Whether the CPU pushes an error code for `vector`.
#[inline]
#[must_use]
pub const fn pushes_error_code(vector: u8) -> bool {
    matches!(
        vector,
        DOUBLE_FAULT
            | INVALID_TSS
            | SEGMENT_NOT_PRESENT
            | STACK_SEGMENT_FAULT
            | GENERAL_PROTECTION
            | PAGE_FAULT
            | ALIGNMENT_CHECK
            | CONTROL_PROTECTION
            | VMM_COMMUNICATION
            | SECURITY
    )
}

/// Whether ring-3 code may raise `vector` with `int n`.
#[inline]
#[must_use]
pub const fn user_callable(vector: u8) -> bool {
    matches!(vector, BREAKPOINT | SYSCALL)
}

/// Human-readable name of a CPU exception.
#[must_use]
pub const fn exception_name(vector: u8) -> Option<&'static str> {
    let name = match vector {
        DIVIDE_ERROR => "Divide Error",
        DEBUG => "Debug",
        NMI => "Non-Maskable Interrupt",
        BREAKPOINT => "Breakpoint",
        OVERFLOW => "Overflow",
        BOUND_RANGE => "Bound Range Exceeded",
        INVALID_OPCODE => "Invalid Opcode",
        DEVICE_NOT_AVAILABLE => "Device Not Available",
        DOUBLE_FAULT => "Double Fault",
        0x09 => "Coprocessor Segment Overrun",
        INVALID_TSS => "Invalid TSS",
        SEGMENT_NOT_PRESENT => "Segment Not Present",
        STACK_SEGMENT_FAULT => "Stack-Segment Fault",
        GENERAL_PROTECTION => "General Protection Fault",
        PAGE_FAULT => "Page Fault",
        X87_FLOATING_POINT => "x87 Floating-Point Exception",
        ALIGNMENT_CHECK => "Alignment Check",
        MACHINE_CHECK => "Machine Check",
        SIMD_FLOATING_POINT => "SIMD Floating-Point Exception",
        VIRTUALIZATION => "Virtualization Exception",
        CONTROL_PROTECTION => "Control Protection Exception",
        HYPERVISOR_INJECTION => "Hypervisor Injection Exception",
        VMM_COMMUNICATION => "VMM Communication Exception",
        SECURITY => "Security Exception",
        0x0F | 0x16..=0x1B | 0x1F => "Reserved",
        _ => return None,
    };
    Some(name)
}
