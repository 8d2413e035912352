use core::fmt;

/// Destination for log text.
///
/// Takes `&self` so one sink can be shared by every core; implementations
/// serialize internally if they need to.
pub trait TextSink {
    fn write_str(&self, s: &str);
}

impl<S: TextSink + ?Sized> TextSink for &S {
    fn write_str(&self, s: &str) {
        (**self).write_str(s);
    }
}

/// Adapts a [`TextSink`] to [`fmt::Write`].
pub struct SinkWriter<'a, S: ?Sized>(&'a S);

impl<'a, S: TextSink + ?Sized> SinkWriter<'a, S> {
    #[must_use]
    pub const fn new(sink: &'a S) -> Self {
        Self(sink)
    }
}

impl<S: TextSink + ?Sized> fmt::Write for SinkWriter<'_, S> {
    #[inline]
    fn write_str(&mut self, s: &str) -> fmt::Result {
        self.0.write_str(s);
        Ok(())
    }
}

/// QEMU's `-debugcon` port.
#[derive(Debug, Default, Clone, Copy)]
pub struct DebugPortSink;

impl DebugPortSink {
    pub const PORT: u16 = 0x402;
}

impl TextSink for DebugPortSink {
    #[inline]
    fn write_str(&self, s: &str) {
        for byte in s.bytes() {
            put_byte(byte);
        }
    }
}

#[cfg(all(feature = "enabled", target_arch = "x86_64", target_os = "none"))]
#[inline]
fn put_byte(byte: u8) {
    // SAFETY: writing the debug console port has no side effects on guest state.
    unsafe {
        core::arch::asm!(
            "out dx, al",
            in("dx") DebugPortSink::PORT,
            in("al") byte,
            options(nomem, nostack, preserves_flags)
        );
    }
}

#[cfg(not(all(feature = "enabled", target_arch = "x86_64", target_os = "none")))]
#[inline]
const fn put_byte(_byte: u8) {}
