//! Leveled logging for the driver crates.
//!
//! Provides [`plog!`] and the convenience macros (`pinfo!`, `pdebug!`, etc.).
//! Drivers log configuration decisions and hardware faults; the board
//! installs a sink with [`set_log_fn`]. Before that, output is silently
//! discarded. Messages more verbose than [`MAX_LOG_LEVEL`] never reach the
//! sink.
//!
//! [`MAX_LOG_LEVEL`]: crate::config::MAX_LOG_LEVEL

use core::fmt;
use core::sync::atomic::{AtomicPtr, Ordering};

// ---------------------------------------------------------------------------
// Log levels (lower = more severe)
// ---------------------------------------------------------------------------

/// Log severity level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[repr(u8)]
pub enum LogLevel {
    /// Error: a transfer or configuration failed.
    Error = 1,
    /// Warning: unexpected condition, not necessarily an error.
    Warn = 2,
    /// Informational: peripheral setup and high-level progress.
    Info = 3,
    /// Debug: detailed diagnostic information.
    Debug = 4,
    /// Trace: per-interrupt tracing.
    Trace = 5,
}

impl LogLevel {
    /// Returns the human-readable name (fixed-width for aligned output).
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Error => "ERROR",
            Self::Warn => "WARN ",
            Self::Info => "INFO ",
            Self::Debug => "DEBUG",
            Self::Trace => "TRACE",
        }
    }
}

/// The signature of the global leveled log function.
pub type LogFn = fn(LogLevel, fmt::Arguments<'_>);

fn null_log(_level: LogLevel, _args: fmt::Arguments<'_>) {}

static LOG_FN: AtomicPtr<()> = AtomicPtr::new(null_log as *mut ());

/// Registers the global log sink.
///
/// # Safety
///
/// The provided function must be safe to call from any context, including
/// interrupt handlers. May be called more than once (e.g. once for an early
/// polled UART, once for the final logger).
pub unsafe fn set_log_fn(f: LogFn) {
    LOG_FN.store(f as *mut (), Ordering::Release);
}

#[inline]
fn load_log_fn() -> LogFn {
    let ptr = LOG_FN.load(Ordering::Acquire);
    // SAFETY: Only valid `LogFn` pointers (or `null_log`) are stored in LOG_FN.
    unsafe { core::mem::transmute::<*mut (), LogFn>(ptr) }
}

/// Implementation detail for [`plog!`]. Not public API.
#[doc(hidden)]
pub fn _log(level: LogLevel, args: fmt::Arguments<'_>) {
    if level <= crate::config::MAX_LOG_LEVEL {
        load_log_fn()(level, args);
    }
}

/// Logs a message at the given level.
#[macro_export]
macro_rules! plog {
    ($level:expr, $($arg:tt)*) => {
        $crate::log::_log($level, format_args!($($arg)*))
    };
}

/// Logs an error-level message.
#[macro_export]
macro_rules! perror {
    ($($arg:tt)*) => { $crate::plog!($crate::log::LogLevel::Error, $($arg)*) };
}

/// Logs a warning-level message.
#[macro_export]
macro_rules! pwarn {
    ($($arg:tt)*) => { $crate::plog!($crate::log::LogLevel::Warn, $($arg)*) };
}

/// Logs an info-level message.
#[macro_export]
macro_rules! pinfo {
    ($($arg:tt)*) => { $crate::plog!($crate::log::LogLevel::Info, $($arg)*) };
}

/// Logs a debug-level message.
#[macro_export]
macro_rules! pdebug {
    ($($arg:tt)*) => { $crate::plog!($crate::log::LogLevel::Debug, $($arg)*) };
}

/// Logs a trace-level message.
#[macro_export]
macro_rules! ptrace {
    ($($arg:tt)*) => { $crate::plog!($crate::log::LogLevel::Trace, $($arg)*) };
}
