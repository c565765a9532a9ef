//! Driver error types.

use core::fmt;

/// Errors returned by driver operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriverError {
    /// A transfer is already in progress on the peripheral.
    Busy,
    /// An argument was rejected (empty buffer, zero length, out-of-range
    /// clock or baud rate).
    InvalidArgument,
    /// The requested mode or frame format is not supported by the hardware.
    Unsupported,
    /// The driver is not in a valid state for this operation.
    InvalidState,
}

impl fmt::Display for DriverError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Busy => f.write_str("transfer in progress"),
            Self::InvalidArgument => f.write_str("invalid argument"),
            Self::Unsupported => f.write_str("operation not supported"),
            Self::InvalidState => f.write_str("invalid driver state"),
        }
    }
}

impl core::error::Error for DriverError {}
