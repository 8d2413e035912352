//! # Typed `X86_64` Registers
//!
//! Bitfield views of the control and model-specific registers the kernel
//! touches during bring-up, with load/store implementations behind the
//! `asm` feature so layouts stay testable on any host.

#![cfg_attr(not(any(test, doctest)), no_std)]
#![allow(unsafe_code)]

pub mod cr3;
pub mod msr;

pub trait LoadRegisterUnsafe {
    /// # Safety
    /// The caller must uphold the implementation-specific safety requirements.
    /// Most registers here are privileged and require Ring 0.
    unsafe fn load_unsafe() -> Self;
}

pub trait StoreRegisterUnsafe {
    /// # Safety
    /// The caller must uphold the implementation-specific safety requirements.
    /// Most registers here are privileged and require Ring 0.
    unsafe fn store_unsafe(self);
}
