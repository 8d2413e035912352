//! # QEMU debug console logging
//!
//! Routes the kernel's `log` records to QEMU's debug console (I/O port
//! `0x402`, captured on the host with `-debugcon stdio`).
//!
//! * [`TextSink`]: anything that accepts text. The kernel writes every line
//!   through one.
//! * [`DebugPortSink`]: the port `0x402` sink. It only emits bytes in
//!   bare-metal builds with the `enabled` feature.
//! * [`KernelLogger`]: a `log::Log` backend formatting
//!   `"[LEVEL] target: message\n"` into a sink.
//! * [`qemu_trace!`]: formatted output straight to the debug port, for panics
//!   and code that runs before [`init`].
//!
//! ```
//! use kernel_qemu::{KernelLogger, TextSink};
//! use log::{Level, LevelFilter, Log, Record};
//! use std::sync::Mutex;
//!
//! struct Lines(Mutex<String>);
//!
//! impl TextSink for Lines {
//!     fn write_str(&self, s: &str) {
//!         self.0.lock().unwrap().push_str(s);
//!     }
//! }
//!
//! let logger = KernelLogger::new(Lines(Mutex::new(String::new())), LevelFilter::Info);
//! logger.log(
//!     &Record::builder()
//!         .level(Level::Info)
//!         .target("apic")
//!         .args(format_args!("x2APIC enabled"))
//!         .build(),
//! );
//! assert_eq!(*logger.sink().0.lock().unwrap(), "[INFO] apic: x2APIC enabled\n");
//! ```

#![cfg_attr(not(any(test, doctest)), no_std)]
#![allow(unsafe_code)]

mod logger;
mod sink;

pub use logger::{KernelLogger, init};
pub use sink::{DebugPortSink, SinkWriter, TextSink};

#[doc(hidden)]
pub mod qemu_fmt {
    use crate::{DebugPortSink, SinkWriter};
    use core::fmt;

    #[doc(hidden)]
    #[inline]
    pub fn qemu_write(args: fmt::Arguments) {
        // Best effort; the debug port cannot fail.
        let _ = fmt::write(&mut SinkWriter::new(&DebugPortSink), args);
    }
}

/// `format!`-style output to the debug port, bypassing `log`.
#[macro_export]
macro_rules! qemu_trace {
    ($($arg:tt)*) => {{
        $crate::qemu_fmt::qemu_write(core::format_args!($($arg)*));
    }};
}
