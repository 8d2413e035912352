//! # Interrupt Descriptor Table
//!
//! 256 gate descriptors, filled once at boot with the addresses of the
//! per-vector entry trampolines and then only read by the CPU. Every core
//! loads the same table, so no locking is involved after installation.
//!
//! ```ignore
//! idt[0x80]
//!     .set_handler_addr(stub)
//!     .selector(KERNEL_CS)
//!     .dpl(3)
//!     .present(true)
//!     .gate_interrupt();
//! ```
//!
//! ## When to use Trap vs. Interrupt gates
//! - **Interrupt gates** clear IF on entry. The trampolines rely on this: a
//!   handler runs to completion on its core unless it re-enables interrupts.
//! - **Trap gates** leave IF unchanged.

use crate::table_pointer::DescriptorTablePointer;
use crate::vectors;
use bitfield_struct::bitfield;
use core::ops::{Index, IndexMut};

const _: () = assert!(size_of::<IdtEntry>() == 16);
const _: () = assert!(align_of::<Idt>() == 16);
const _: () = assert!(size_of::<Idt>() == 256 * 16);

/// The middle two bytes of a gate:
///
/// - **low byte**: `IST` (3 bits) + 5 reserved zero bits
/// - **high byte**: `| P | DPL(2) | S(0) | Type(4) |`
#[bitfield(u16)]
#[derive(PartialEq, Eq)]
pub struct IdtGateAttr {
    /// Interrupt Stack Table index; 0 keeps the current stack.
    #[bits(3)]
    pub ist: u8,

    #[bits(5)]
    __zero0: u8,

    /// 0xE = interrupt gate, 0xF = trap gate.
    #[bits(4)]
    pub typ: u8,

    /// Must be 0 for interrupt and trap gates.
    #[bits(1)]
    pub s: bool,

    /// Lowest privilege allowed to raise the vector with `int n`.
    #[bits(2)]
    pub dpl: u8,

    #[bits(1)]
    pub present: bool,
}

impl IdtGateAttr {
    #[inline]
    #[must_use]
    pub const fn interrupt_gate() -> Self {
        Self::new().with_typ(0xE).with_s(false)
    }

    #[inline]
    #[must_use]
    pub const fn trap_gate() -> Self {
        Self::new().with_typ(0xF).with_s(false)
    }
}

#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub enum GateType {
    /// Masks further maskable interrupts upon entry (clears `IF`).
    InterruptGate,
    /// Leaves `IF` unchanged.
    TrapGate,
}

/// A 256-entry **Interrupt Descriptor Table**.
#[repr(C, align(16))]
pub struct Idt {
    entries: [IdtEntry; 256],
}

impl Default for Idt {
    fn default() -> Self {
        Self::new()
    }
}

impl Idt {
    /// A table with all gates marked not present.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            entries: [IdtEntry::MISSING; 256],
        }
    }

    /// Points every vector at its entry trampoline.
    ///
    /// All gates are interrupt gates running in code segment `cs`. Only
    /// breakpoint and the syscall vector accept `int n` from ring 3.
    pub fn install_trampolines(&mut self, trampolines: &[u64; 256], cs: u16) {
        for (vector, (entry, &address)) in (0..=u8::MAX).zip(self.entries.iter_mut().zip(trampolines)) {
            let dpl = if vectors::user_callable(vector) { 3 } else { 0 };
            entry
                .set_handler_addr(address)
                .selector(cs)
                .dpl(dpl)
                .present(address != 0)
                .gate_interrupt();
        }
    }

    /// The `IDTR` image describing this table.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn pointer(&self) -> DescriptorTablePointer {
        DescriptorTablePointer::new(
            core::ptr::from_ref(self) as u64,
            (size_of::<Self>() - 1) as u16,
        )
    }

    /// Loads this table into the executing core's `IDTR`.
    ///
    /// # Safety
    /// - Must be called at CPL 0.
    /// - All present entries must reference valid handler code.
    #[cfg(all(target_arch = "x86_64", target_os = "none"))]
    #[inline]
    pub unsafe fn load(&'static self) {
        let idtr = self.pointer();
        unsafe { idtr.load_idt() };
    }

    pub fn iter(&self) -> impl Iterator<Item = &IdtEntry> {
        self.entries.iter()
    }
}

impl Index<u8> for Idt {
    type Output = IdtEntry;
    fn index(&self, vector: u8) -> &Self::Output {
        &self.entries[usize::from(vector)]
    }
}

impl IndexMut<u8> for Idt {
    fn index_mut(&mut self, vector: u8) -> &mut Self::Output {
        &mut self.entries[usize::from(vector)]
    }
}

/// One **16-byte** gate descriptor.
///
/// ```text
/// bytes 0..2   offset[15:0]
/// bytes 2..4   selector
/// bytes 4..6   IST / type / DPL / P   (IdtGateAttr)
/// bytes 6..8   offset[31:16]
/// bytes 8..12  offset[63:32]
/// bytes 12..16 zero
/// ```
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct IdtEntry {
    offset_lo: u16,
    selector: u16,
    ist_type: u16,
    offset_mid: u16,
    offset_hi: u32,
    zero: u32,
}

impl IdtEntry {
    /// A zeroed, non-present entry.
    pub const MISSING: Self = Self {
        offset_lo: 0,
        selector: 0,
        ist_type: IdtGateAttr::new().into_bits(),
        offset_mid: 0,
        offset_hi: 0,
        zero: 0,
    };

    /// Stores the handler address and returns a builder for the rest.
    ///
    /// The entry starts out as a non-present ring-0 interrupt gate.
    #[allow(clippy::cast_possible_truncation)]
    pub const fn set_handler_addr(&mut self, addr: u64) -> IdtEntryBuilder<'_> {
        self.offset_lo = (addr & 0xFFFF) as u16;
        self.offset_mid = ((addr >> 16) & 0xFFFF) as u16;
        self.offset_hi = (addr >> 32) as u32;
        self.ist_type = IdtGateAttr::interrupt_gate().into_bits();
        IdtEntryBuilder { entry: self }
    }

    #[must_use]
    pub const fn handler_addr(&self) -> u64 {
        (self.offset_hi as u64) << 32 | (self.offset_mid as u64) << 16 | self.offset_lo as u64
    }

    #[must_use]
    pub const fn selector(&self) -> u16 {
        self.selector
    }

    #[must_use]
    pub const fn attributes(&self) -> IdtGateAttr {
        IdtGateAttr::from_bits(self.ist_type)
    }

    #[must_use]
    pub const fn is_present(&self) -> bool {
        self.attributes().present()
    }
}

/// Fluent builder for an [`IdtEntry`].
pub struct IdtEntryBuilder<'a> {
    entry: &'a mut IdtEntry,
}

impl IdtEntryBuilder<'_> {
    #[inline]
    pub const fn present(self, p: bool) -> Self {
        let bf = IdtGateAttr::from_bits(self.entry.ist_type).with_present(p);
        self.entry.ist_type = bf.into_bits();
        self
    }

    /// Set **DPL**, 0..=3. `dpl(3)` lets ring 3 raise the vector via `int n`.
    #[inline]
    pub fn dpl(self, dpl: u8) -> Self {
        debug_assert!(dpl <= 3);
        let bf = IdtGateAttr::from_bits(self.entry.ist_type).with_dpl(dpl);
        self.entry.ist_type = bf.into_bits();
        self
    }

    #[inline]
    pub const fn gate_interrupt(self) -> Self {
        let bf = IdtGateAttr::from_bits(self.entry.ist_type)
            .with_typ(0xE)
            .with_s(false);
        self.entry.ist_type = bf.into_bits();
        self
    }

    #[inline]
    pub const fn gate_trap(self) -> Self {
        let bf = IdtGateAttr::from_bits(self.entry.ist_type)
            .with_typ(0xF)
            .with_s(false);
        self.entry.ist_type = bf.into_bits();
        self
    }

    #[inline]
    pub const fn gate_type(self, gate_type: GateType) -> Self {
        match gate_type {
            GateType::InterruptGate => self.gate_interrupt(),
            GateType::TrapGate => self.gate_trap(),
        }
    }

    /// Set the **IST** index (0 disables IST switching).
    #[inline]
    pub fn ist(self, idx: u8) -> Self {
        debug_assert!(idx <= 7);
        let bf = IdtGateAttr::from_bits(self.entry.ist_type).with_ist(idx);
        self.entry.ist_type = bf.into_bits();
        self
    }

    #[inline]
    pub const fn selector(self, sel: u16) -> Self {
        self.entry.selector = sel;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interrupt_gate_attribute_byte() {
        let mut entry = IdtEntry::MISSING;
        entry.set_handler_addr(0xffff_ffff_8012_3456).selector(0x08).present(true);
        assert_eq!(entry.attributes().into_bits() >> 8, 0x8E);
        assert_eq!(entry.handler_addr(), 0xffff_ffff_8012_3456);
    }
}
