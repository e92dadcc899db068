//! Category-tagged logging for the DFU gate
//!
//! Every line carries a category (`prevalidate`, `postvalidate`, `recovery`,
//! ...) which becomes the `log` target. Messages are preformatted
//! `core::fmt::Arguments`, so nothing here allocates. The sink is whatever
//! `log::Log` implementation the firmware installed; with no logger
//! installed every call is a no-op.

use core::fmt::Arguments;

use ::log::{Level, LevelFilter};

/// Change the current log level filter.
/// 0 = TRACE, 1 = DEBUG, 2 = INFO, 3 = WARN, 4 = ERROR/CRIT, 5 = OFF
pub fn set_log_level(level: usize) {
    let filter = match level {
        0 => LevelFilter::Trace,
        1 => LevelFilter::Debug,
        2 => LevelFilter::Info,
        3 => LevelFilter::Warn,
        4 => LevelFilter::Error,
        _ => LevelFilter::Off,
    };
    ::log::set_max_level(filter);
}

/// Internal function: hand one line to the installed logger
fn write_log(level: Level, category: &str, message: Arguments<'_>) {
    if cfg!(feature = "logging") {
        ::log::log!(target: category, level, "{}", message);
    }
}

// Public log API

pub fn log(level: Level, category: &str, message: Arguments<'_>) {
    write_log(level, category, message);
}

pub fn log_trace(category: &str, message: Arguments<'_>) {
    log(Level::Trace, category, message);
}

pub fn log_debug(category: &str, message: Arguments<'_>) {
    log(Level::Debug, category, message);
}

pub fn log_info(category: &str, message: Arguments<'_>) {
    log(Level::Info, category, message);
}

pub fn log_warn(category: &str, message: Arguments<'_>) {
    log(Level::Warn, category, message);
}

pub fn log_error(category: &str, message: Arguments<'_>) {
    log(Level::Error, category, message);
}

/// Error-level line marked as critical; used on the erase-and-reset path.
pub fn log_critical(category: &str, message: Arguments<'_>) {
    log(Level::Error, category, format_args!("CRIT: {}", message));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn level_numbers_map_to_filters() {
        set_log_level(3);
        assert_eq!(::log::max_level(), LevelFilter::Warn);
        set_log_level(9);
        assert_eq!(::log::max_level(), LevelFilter::Off);
        set_log_level(0);
        assert_eq!(::log::max_level(), LevelFilter::Trace);
    }

    #[test]
    fn logging_without_a_sink_is_silent() {
        log_info("test", format_args!("value {}", 7));
        log_critical("test", format_args!("still fine"));
    }
}
