//! # Software syscall gate
//!
//! The `int 0x80` convention: `rax` selects the service, `rdi`, `rsi` and
//! `rdx` carry arguments and the result is written back into `rax`. The
//! selector table itself lives outside this crate and is plugged in with
//! [`install_service`].

use crate::trap_frame::TrapFrame;
use kernel_sync::SyncOnceCell;
use log::{trace, warn};

/// Result returned when no service is installed.
pub const NOT_IMPLEMENTED: u64 = u64::MAX;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyscallArgs {
    pub selector: u64,
    pub arg0: u64,
    pub arg1: u64,
    pub arg2: u64,
}

impl SyscallArgs {
    #[must_use]
    pub const fn from_frame(frame: &TrapFrame) -> Self {
        Self {
            selector: frame.rax,
            arg0: frame.rdi,
            arg1: frame.rsi,
            arg2: frame.rdx,
        }
    }
}

pub type SyscallService = fn(SyscallArgs) -> u64;

static SERVICE: SyncOnceCell<SyscallService> = SyncOnceCell::new();

/// Sets the function that serves syscalls. Only the first call wins.
///
/// # Errors
/// Returns the rejected service if one was installed already.
pub fn install_service(service: SyscallService) -> Result<(), SyscallService> {
    SERVICE.set(service)
}

/// Runs `service` for the arguments in `frame` and stores its result.
pub fn serve(frame: &mut TrapFrame, service: SyscallService) {
    let args = SyscallArgs::from_frame(frame);
    trace!("syscall {:#x}({:#x}, {:#x}, {:#x})", args.selector, args.arg0, args.arg1, args.arg2);
    frame.rax = service(args);
}

/// Handler for [`crate::vectors::SYSCALL`].
pub fn syscall_handler(frame: &mut TrapFrame) {
    if let Some(&service) = SERVICE.get() {
        serve(frame, service);
    } else {
        warn!("syscall {:#x} without an installed service", frame.rax);
        frame.rax = NOT_IMPLEMENTED;
    }
}
