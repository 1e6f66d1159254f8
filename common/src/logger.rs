use conquer_once::spin::OnceCell;
use core::fmt::Write;
use spinning_top::Spinlock;
use uf2_bootloader_boot_config::LevelFilter;

/// The global logger instance used for the `log` crate.
pub static LOGGER: OnceCell<LockedLogger> = OnceCell::uninit();

/// A logger that writes lines of text to a sink, e.g. a UART, protected by a spinlock.
pub struct LockedLogger {
    sink: Spinlock<&'static mut (dyn Write + Send)>,
}

impl LockedLogger {
    pub fn new(sink: &'static mut (dyn Write + Send)) -> Self {
        LockedLogger {
            sink: Spinlock::new(sink),
        }
    }
}

impl log::Log for LockedLogger {
    fn enabled(&self, _metadata: &log::Metadata) -> bool {
        true
    }

    fn log(&self, record: &log::Record) {
        let mut sink = self.sink.lock();
        // nowhere to report a failing sink
        let _ = writeln!(sink, "{:5}: {}", record.level(), record.args());
    }

    fn flush(&self) {}
}

/// Installs a logger writing to `sink` as the global `log` backend.
///
/// Only the first call installs a logger; later calls fail and drop their sink.
pub fn init_logger(
    sink: &'static mut (dyn Write + Send),
    level: LevelFilter,
) -> Result<(), log::SetLoggerError> {
    let logger = LOGGER.get_or_init(move || LockedLogger::new(sink));
    log::set_logger(logger)?;
    log::set_max_level(level_filter(level));
    Ok(())
}

fn level_filter(level: LevelFilter) -> log::LevelFilter {
    match level {
        LevelFilter::Off => log::LevelFilter::Off,
        LevelFilter::Error => log::LevelFilter::Error,
        LevelFilter::Warn => log::LevelFilter::Warn,
        LevelFilter::Info => log::LevelFilter::Info,
        LevelFilter::Debug => log::LevelFilter::Debug,
        LevelFilter::Trace => log::LevelFilter::Trace,
    }
}
