//! # Interrupt state and dispatch
//!
//! * [`TrapFrame`]: the register snapshot built by the entry trampolines.
//! * [`Idt`]: the 256-entry gate table, written once at boot.
//! * [`HandlerTable`]: per-vector Rust handlers plus a fallback.
//! * [`global`]: the table instance the trampolines dispatch into.
//! * [`syscall`]: the `int 0x80` register convention.
//!
//! Tests build their own [`HandlerTable`] and call
//! [`HandlerTable::dispatch`] with synthetic frames:
//!
//! ```
//! use kernel_interrupts::{HandlerTable, TrapFrame};
//!
//! fn keyboard(frame: &mut TrapFrame) {
//!     frame.rax = u64::from(frame.vector());
//! }
//!
//! let mut table = HandlerTable::new();
//! table.register(0x21, keyboard);
//!
//! let mut frame = TrapFrame::for_vector(0x21);
//! table.dispatch(&mut frame);
//! assert_eq!(frame.rax, 0x21);
//! ```

#![cfg_attr(not(any(test, doctest)), no_std)]
#![allow(unsafe_code)]

#[cfg(all(target_arch = "x86_64", target_os = "none"))]
pub mod entry;
pub mod gate;
pub mod global;
mod handlers;
pub mod syscall;
mod table_pointer;
mod trap_frame;
pub mod vectors;

pub use gate::{GateType, Idt, IdtEntry, IdtGateAttr};
pub use handlers::{Handler, HandlerTable, default_fallback};
pub use table_pointer::DescriptorTablePointer;
pub use trap_frame::{HARDWARE_FRAME_OFFSET, TrapFrame, VECTOR_OFFSET};

/// Registers the handlers every kernel needs in the global table.
pub fn install_default_handlers() {
    global::register(vectors::SYSCALL, syscall::syscall_handler);
}

/// Points `idt` at the entry trampolines and installs the default handlers.
#[cfg(all(target_arch = "x86_64", target_os = "none"))]
pub fn build_gate_table(idt: &mut Idt, kernel_cs: u16) {
    idt.install_trampolines(entry::trampolines(), kernel_cs);
    install_default_handlers();
    log::info!("gate table populated for 256 vectors");
}
