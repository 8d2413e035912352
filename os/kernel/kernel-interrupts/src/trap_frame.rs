//! # Trap Frame
//!
//! The register snapshot the entry trampolines build on the interrupted
//! stack. The field order is shared with the assembly in `entry` and must
//! not change without updating it.
//!
//! ```text
//! low address                                                high address
//! ┌────────────┬───────────────────────┬────────┬───────┬───────────────────┐
//! │ ds es fs gs│ r15 … r8 rbp … rbx rax│ vector │ error │ rip cs rflags rsp ss
//! └────────────┴───────────────────────┴────────┴───────┴───────────────────┘
//!   pushed by the common prologue      pushed by stub     pushed by the CPU
//! ```

use core::mem::offset_of;

#[repr(C)]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TrapFrame {
    pub ds: u64,
    pub es: u64,
    pub fs: u64,
    pub gs: u64,

    pub r15: u64,
    pub r14: u64,
    pub r13: u64,
    pub r12: u64,
    pub r11: u64,
    pub r10: u64,
    pub r9: u64,
    pub r8: u64,
    pub rbp: u64,
    pub rdi: u64,
    pub rsi: u64,
    pub rdx: u64,
    pub rcx: u64,
    pub rbx: u64,
    pub rax: u64,

    /// Vector number pushed by the per-vector stub.
    pub vector: u64,
    /// Hardware error code, or 0 for vectors without one.
    pub error_code: u64,

    pub rip: u64,
    pub cs: u64,
    pub rflags: u64,
    pub rsp: u64,
    pub ss: u64,
}

/// Byte offset of [`TrapFrame::vector`], as seen by the entry assembly.
pub const VECTOR_OFFSET: usize = offset_of!(TrapFrame, vector);

/// Byte offset of [`TrapFrame::rip`], i.e. the first CPU-pushed field.
pub const HARDWARE_FRAME_OFFSET: usize = offset_of!(TrapFrame, rip);

const _: () = {
    assert!(size_of::<TrapFrame>() == 200);
    assert!(offset_of!(TrapFrame, ds) == 0);
    assert!(offset_of!(TrapFrame, gs) == 24);
    assert!(offset_of!(TrapFrame, r15) == 32);
    assert!(offset_of!(TrapFrame, rax) == 144);
    assert!(VECTOR_OFFSET == 152);
    assert!(offset_of!(TrapFrame, error_code) == 160);
    assert!(HARDWARE_FRAME_OFFSET == 168);
    assert!(offset_of!(TrapFrame, ss) == 192);
};

impl TrapFrame {
    /// A frame for `vector` with all registers zero.
    #[must_use]
    pub fn for_vector(vector: u8) -> Self {
        Self {
            vector: u64::from(vector),
            ..Self::default()
        }
    }

    /// The vector as the 8-bit number the CPU delivered.
    #[inline]
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub const fn vector(&self) -> u8 {
        self.vector as u8
    }

    /// Privilege level of the interrupted code.
    #[inline]
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub const fn cpl(&self) -> u8 {
        (self.cs & 0b11) as u8
    }

    /// Whether the trap interrupted ring-3 code.
    #[inline]
    #[must_use]
    pub const fn from_user(&self) -> bool {
        self.cpl() == 3
    }

    /// Whether maskable interrupts were enabled in the interrupted context.
    #[inline]
    #[must_use]
    pub const fn interrupts_were_enabled(&self) -> bool {
        self.rflags & (1 << 9) != 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn privilege_from_cs() {
        let mut frame = TrapFrame::for_vector(0x80);
        frame.cs = 0x08;
        assert!(!frame.from_user());
        frame.cs = 0x1b;
        assert_eq!(frame.cpl(), 3);
        assert!(frame.from_user());
    }

    #[test]
    fn vector_is_low_byte() {
        let mut frame = TrapFrame::for_vector(0x21);
        assert_eq!(frame.vector(), 0x21);
        frame.vector = 0x1FF;
        assert_eq!(frame.vector(), 0xFF);
    }
}
