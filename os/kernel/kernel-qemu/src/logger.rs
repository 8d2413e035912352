use crate::sink::{SinkWriter, TextSink};
use core::fmt::Write;
use log::{LevelFilter, Log, Metadata, Record, SetLoggerError};

/// `log` backend writing one line per record into a [`TextSink`].
pub struct KernelLogger<S> {
    sink: S,
    max_level: LevelFilter,
}

impl<S> KernelLogger<S> {
    #[must_use]
    pub const fn new(sink: S, max_level: LevelFilter) -> Self {
        Self { sink, max_level }
    }

    #[must_use]
    pub const fn sink(&self) -> &S {
        &self.sink
    }

    #[must_use]
    pub const fn max_level(&self) -> LevelFilter {
        self.max_level
    }
}

impl<S: TextSink + Send + Sync> Log for KernelLogger<S> {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= self.max_level
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }

        let _ = writeln!(
            SinkWriter::new(&self.sink),
            "[{}] {}: {}",
            record.level(),
            record.target(),
            record.args()
        );
    }

    fn flush(&self) {}
}

/// Installs `logger` as the global `log` backend.
///
/// # Errors
/// If a logger was already installed; the first one stays active.
pub fn init<S: TextSink + Send + Sync + 'static>(
    logger: &'static KernelLogger<S>,
) -> Result<(), SetLoggerError> {
    log::set_logger(logger)?;
    log::set_max_level(logger.max_level);
    Ok(())
}
