//! Logging facilities.

use atty::Stream;
use colored::{Color, ColoredString, Colorize};

/// Log target used by all simulator log lines.
pub const LOG_TARGET: &str = "flowsim";

/// Applies the color to the string if stderr (log) goes to console.
pub fn get_colored(s: &str, color: Color) -> ColoredString {
    if atty::is(Stream::Stderr) {
        s.color(color)
    } else {
        s.normal()
    }
}

/// Logs a message at the info level, prefixed with the current simulated time.
///
/// The first argument is anything with a `current_time()` method, normally a
/// [`Simulator`](crate::Simulator).
///
/// # Examples
///
/// ```rust
/// use std::io::Write;
/// use env_logger::Builder;
/// use flowsim_core::{log_info, Simulator};
///
/// Builder::from_default_env()
///     .format(|buf, record| writeln!(buf, "{}", record.args()))
///     .init();
///
/// let sim = Simulator::new();
/// log_info!(sim, "created");
/// log_info!(sim, "created with precision {}", sim.flow_precision());
/// ```
#[macro_export]
macro_rules! log_info {
    ($sim:expr, $msg:expr) => (
        log::info!(
            target: $crate::log::LOG_TARGET,
            "[{} {} ] {}",
            $sim.current_time(), $crate::log::get_colored("INFO", $crate::colored::Color::Green), $msg
        )
    );
    ($sim:expr, $format:expr, $($arg:tt)+) => (
        log::info!(
            target: $crate::log::LOG_TARGET,
            concat!("[{} {} ] ", $format),
            $sim.current_time(), $crate::log::get_colored("INFO", $crate::colored::Color::Green), $($arg)+
        )
    );
}

/// Logs a message at the debug level.
///
/// # Examples
///
/// See [`log_info!`](crate::log_info!).
#[macro_export]
macro_rules! log_debug {
    ($sim:expr, $msg:expr) => (
        log::debug!(
            target: $crate::log::LOG_TARGET,
            "[{} {}] {}",
            $sim.current_time(), $crate::log::get_colored("DEBUG", $crate::colored::Color::Blue), $msg
        )
    );
    ($sim:expr, $format:expr, $($arg:tt)+) => (
        log::debug!(
            target: $crate::log::LOG_TARGET,
            concat!("[{} {}] ", $format),
            $sim.current_time(), $crate::log::get_colored("DEBUG", $crate::colored::Color::Blue), $($arg)+
        )
    );
}

/// Logs a message at the trace level.
///
/// # Examples
///
/// See [`log_info!`](crate::log_info!).
#[macro_export]
macro_rules! log_trace {
    ($sim:expr, $msg:expr) => (
        log::trace!(
            target: $crate::log::LOG_TARGET,
            "[{} {}] {}",
            $sim.current_time(), $crate::log::get_colored("TRACE", $crate::colored::Color::Cyan), $msg
        )
    );
    ($sim:expr, $format:expr, $($arg:tt)+) => (
        log::trace!(
            target: $crate::log::LOG_TARGET,
            concat!("[{} {}] ", $format),
            $sim.current_time(), $crate::log::get_colored("TRACE", $crate::colored::Color::Cyan), $($arg)+
        )
    );
}

/// Logs a message at the warn level.
///
/// # Examples
///
/// See [`log_info!`](crate::log_info!).
#[macro_export]
macro_rules! log_warn {
    ($sim:expr, $msg:expr) => (
        log::warn!(
            target: $crate::log::LOG_TARGET,
            "[{} {} ] {}",
            $sim.current_time(), $crate::log::get_colored("WARN", $crate::colored::Color::Yellow), $msg
        )
    );
    ($sim:expr, $format:expr, $($arg:tt)+) => (
        log::warn!(
            target: $crate::log::LOG_TARGET,
            concat!("[{} {} ] ", $format),
            $sim.current_time(), $crate::log::get_colored("WARN", $crate::colored::Color::Yellow), $($arg)+
        )
    );
}

/// Logs a message at the error level.
///
/// # Examples
///
/// See [`log_info!`](crate::log_info!).
#[macro_export]
macro_rules! log_error {
    ($sim:expr, $msg:expr) => (
        log::error!(
            target: $crate::log::LOG_TARGET,
            "[{} {}] {}",
            $sim.current_time(), $crate::log::get_colored("ERROR", $crate::colored::Color::Red), $msg
        )
    );
    ($sim:expr, $format:expr, $($arg:tt)+) => (
        log::error!(
            target: $crate::log::LOG_TARGET,
            concat!("[{} {}] ", $format),
            $sim.current_time(), $crate::log::get_colored("ERROR", $crate::colored::Color::Red), $($arg)+
        )
    );
}
