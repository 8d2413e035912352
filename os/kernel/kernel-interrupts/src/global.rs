//! The handler table the entry trampolines dispatch into.
//!
//! Registration takes the lock with interrupts masked so a handler for the
//! same core can never spin on it. Dispatch copies the handler out under the
//! lock and runs it unlocked, so handlers may themselves register vectors.

use crate::handlers::{Handler, HandlerTable};
use crate::trap_frame::TrapFrame;
use kernel_sync::SpinLock;

static HANDLERS: SpinLock<HandlerTable> = SpinLock::new(HandlerTable::new());

/// Installs `handler` for `vector` in the global table.
pub fn register(vector: u8, handler: Handler) -> Option<Handler> {
    HANDLERS.lock_irq().register(vector, handler)
}

pub fn unregister(vector: u8) -> Option<Handler> {
    HANDLERS.lock_irq().unregister(vector)
}

pub fn set_fallback(fallback: Handler) {
    HANDLERS.lock_irq().set_fallback(fallback);
}

#[must_use]
pub fn handler(vector: u8) -> Option<Handler> {
    HANDLERS.lock_irq().handler(vector)
}

/// Routes `frame` to the globally registered handler.
pub fn dispatch(frame: &mut TrapFrame) {
    let handler = HANDLERS.lock_irq().resolve(frame.vector());
    handler(frame);
}

/// Called by the common entry path with a pointer to the saved frame.
///
/// # Safety
/// `frame` must point at a live [`TrapFrame`] on the interrupted stack.
#[cfg(all(target_arch = "x86_64", target_os = "none"))]
pub(crate) unsafe extern "C" fn kernel_trap_dispatch(frame: *mut TrapFrame) {
    let frame = unsafe { &mut *frame };
    dispatch(frame);
}
