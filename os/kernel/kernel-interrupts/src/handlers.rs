//! # Handler Table
//!
//! Maps each of the 256 vectors to an optional Rust handler. A vector
//! without a handler is routed to the table's fallback, which is called
//! exactly once per delivery.

use crate::trap_frame::TrapFrame;
use crate::vectors;
use core::fmt;
use log::{trace, warn};

/// A vector handler. It may modify the frame to change the resumed state.
pub type Handler = fn(&mut TrapFrame);

pub struct HandlerTable {
    slots: [Option<Handler>; 256],
    fallback: Handler,
}

impl Default for HandlerTable {
    fn default() -> Self {
        Self::new()
    }
}

impl HandlerTable {
    /// An empty table using [`default_fallback`].
    #[must_use]
    pub const fn new() -> Self {
        Self::with_fallback(default_fallback)
    }

    #[must_use]
    pub const fn with_fallback(fallback: Handler) -> Self {
        Self {
            slots: [None; 256],
            fallback,
        }
    }

    /// Installs `handler` for `vector`, returning the handler it replaced.
    pub fn register(&mut self, vector: u8, handler: Handler) -> Option<Handler> {
        self.slots[usize::from(vector)].replace(handler)
    }

    /// Removes the handler for `vector` so it reaches the fallback again.
    pub fn unregister(&mut self, vector: u8) -> Option<Handler> {
        self.slots[usize::from(vector)].take()
    }

    #[must_use]
    pub fn handler(&self, vector: u8) -> Option<Handler> {
        self.slots[usize::from(vector)]
    }

    pub const fn set_fallback(&mut self, fallback: Handler) {
        self.fallback = fallback;
    }

    #[must_use]
    pub const fn fallback(&self) -> Handler {
        self.fallback
    }

    /// The function that will run for `vector`.
    #[must_use]
    pub fn resolve(&self, vector: u8) -> Handler {
        match self.slots[usize::from(vector)] {
            Some(handler) => handler,
            None => self.fallback,
        }
    }

    /// Runs the handler registered for `frame.vector`, or the fallback.
    pub fn dispatch(&self, frame: &mut TrapFrame) {
        (self.resolve(frame.vector()))(frame);
    }

    /// Number of vectors with a registered handler.
    #[must_use]
    pub fn registered(&self) -> usize {
        self.slots.iter().filter(|slot| slot.is_some()).count()
    }
}

impl fmt::Debug for HandlerTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandlerTable")
            .field("registered", &self.registered())
            .finish_non_exhaustive()
    }
}

/// Fallback for vectors nobody registered.
///
/// Spurious vectors are dropped. CPU exceptions are fatal. Any other
/// interrupt is logged and ignored.
///
/// # Panics
/// On any exception vector (0..32).
pub fn default_fallback(frame: &mut TrapFrame) {
    let vector = frame.vector();
    if vectors::is_spurious(vector) {
        trace!("spurious interrupt on vector {vector:#04x}");
        return;
    }

    if let Some(name) = vectors::exception_name(vector) {
        panic!(
            "unhandled exception {vector:#04x} ({name}), error code {:#x}, rip {:#x}\n{frame:#x?}",
            frame.error_code, frame.rip
        );
    }

    warn!(
        "unhandled interrupt on vector {vector:#04x} at rip {:#x}",
        frame.rip
    );
}
