//! Compile-time configuration.
//!
//! Values are read from the build environment with `option_env!` so a
//! board crate can tune them without feature flags:
//!
//! | Variable                   | Default     |
//! |----------------------------|-------------|
//! | `PLIB_LOG_LEVEL`           | `debug`     |
//! | `PLIB_PERIPHERAL_CLOCK_HZ` | `100000000` |

use crate::log::LogLevel;

/// Maximum log level (compile-time). Messages more verbose than this are
/// dropped before they reach the sink.
pub const MAX_LOG_LEVEL: LogLevel = match option_env!("PLIB_LOG_LEVEL") {
    Some(level) => match level.as_bytes() {
        b"error" => LogLevel::Error,
        b"warn" => LogLevel::Warn,
        b"info" => LogLevel::Info,
        b"debug" => LogLevel::Debug,
        b"trace" => LogLevel::Trace,
        _ => LogLevel::Debug,
    },
    None => LogLevel::Debug,
};

/// Peripheral bus clock in Hz, used when a setup call passes a source
/// clock of zero.
pub const PERIPHERAL_CLOCK_HZ: u32 =
    parse_u32(option_env!("PLIB_PERIPHERAL_CLOCK_HZ"), 100_000_000);

/// Parses a decimal integer at compile time, allowing `_` separators.
const fn parse_u32(value: Option<&str>, default: u32) -> u32 {
    let Some(value) = value else {
        return default;
    };
    let bytes = value.as_bytes();
    if bytes.is_empty() {
        return default;
    }

    let mut result: u32 = 0;
    let mut i = 0;
    while i < bytes.len() {
        let b = bytes[i];
        i += 1;
        if b == b'_' {
            continue;
        }
        assert!(b.is_ascii_digit(), "expected a decimal number");
        result = match result.checked_mul(10) {
            Some(r) => match r.checked_add((b - b'0') as u32) {
                Some(r) => r,
                None => panic!("value does not fit in u32"),
            },
            None => panic!("value does not fit in u32"),
        };
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_defaults_when_unset() {
        assert_eq!(parse_u32(None, 7), 7);
        assert_eq!(parse_u32(Some(""), 7), 7);
    }

    #[test]
    fn parse_decimal_with_separators() {
        assert_eq!(parse_u32(Some("48000000"), 0), 48_000_000);
        assert_eq!(parse_u32(Some("120_000_000"), 0), 120_000_000);
    }

    #[test]
    fn clock_is_nonzero() {
        assert!(PERIPHERAL_CLOCK_HZ > 0);
    }
}
