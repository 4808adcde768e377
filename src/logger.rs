use log::{Level, LevelFilter, Log, Metadata, Record, SetLoggerError};

use crate::vga_buffer::{print_colored, Color};

/// `log` backend writing to the VGA console
struct ConsoleLogger;

static LOGGER: ConsoleLogger = ConsoleLogger;

impl ConsoleLogger {
    fn level_color(level: Level) -> Color {
        match level {
            Level::Error => Color::LightRed,
            Level::Warn => Color::Yellow,
            Level::Info => Color::LightGreen,
            Level::Debug => Color::LightCyan,
            Level::Trace => Color::LightGray,
        }
    }
}

impl Log for ConsoleLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        print_colored(
            Self::level_color(record.level()),
            format_args!(
                "[{}] [{}] {}\n",
                record.level(),
                record.module_path().unwrap_or("?"),
                record.args()
            ),
        );
    }

    fn flush(&self) {}
}

pub fn init(level: LevelFilter) -> Result<(), SetLoggerError> {
    log::set_logger(&LOGGER)?;
    log::set_max_level(level);
    Ok(())
}
