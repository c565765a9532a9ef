//! Caller buffers lent to a transfer and handed back.

use core::fmt;

use plib_core::error::DriverError;

/// The buffers of the last I2C or SPI transfer.
///
/// A transfer borrows the caller's buffers for `'a`; once the peripheral is
/// idle again, `take_buffers` returns them here so received data can be
/// inspected and the memory reused.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct TransferBuffers<'a> {
    /// Data that was transmitted, if any.
    pub write: Option<&'a [u8]>,
    /// Buffer that received data, if any.
    pub read: Option<&'a mut [u8]>,
}

/// A transfer request the driver did not accept.
///
/// Submitting lends the buffers for the driver's whole lifetime, so a
/// rejection returns them untouched; the caller can retry with the same
/// memory once the driver is idle.
#[derive(Debug, PartialEq, Eq)]
pub struct Rejected<B> {
    /// Why the request was rejected.
    pub error: DriverError,
    /// The buffers passed with the request.
    pub buffers: B,
}

impl<B> Rejected<B> {
    pub(crate) const fn new(error: DriverError, buffers: B) -> Self {
        Self { error, buffers }
    }
}

impl<B> From<Rejected<B>> for DriverError {
    fn from(rejected: Rejected<B>) -> Self {
        rejected.error
    }
}

impl<B> fmt::Display for Rejected<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "transfer rejected: {}", self.error)
    }
}

/// Result of submitting a transfer that lends `B`.
pub type SubmitResult<B> = Result<(), Rejected<B>>;
