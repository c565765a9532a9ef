//! Read-clears error latch.
//!
//! Peripheral fault bits are cleared by hardware at awkward times (or must be
//! acknowledged before reception can continue), so the interrupt handler
//! copies them into an [`ErrorLatch`] and the application picks them up
//! later with [`ErrorLatch::take`], which also resets the latch.
//!
//! The latch holds a single value. A second fault latched before `take`
//! replaces the first; a multi-bit status snapshot is kept whole.

use core::marker::PhantomData;
use core::sync::atomic::{AtomicU32, Ordering};

use bitflags::Flags;

/// Single-slot latch for a `bitflags` fault set.
///
/// The empty set means "no error".
pub struct ErrorLatch<F> {
    bits: AtomicU32,
    _flags: PhantomData<fn() -> F>,
}

impl<F: Flags<Bits = u32>> Default for ErrorLatch<F> {
    fn default() -> Self {
        Self::new()
    }
}

impl<F: Flags<Bits = u32>> ErrorLatch<F> {
    /// Creates a latch holding no error.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            bits: AtomicU32::new(0),
            _flags: PhantomData,
        }
    }

    /// Replaces the latched value with `errors`.
    pub fn latch(&self, errors: F) {
        self.bits.store(errors.bits(), Ordering::Release);
    }

    /// Returns the latched value and resets the latch to "no error".
    pub fn take(&self) -> F {
        F::from_bits_retain(self.bits.swap(0, Ordering::AcqRel))
    }

    /// Returns the latched value without clearing it.
    #[must_use]
    pub fn peek(&self) -> F {
        F::from_bits_retain(self.bits.load(Ordering::Acquire))
    }

    /// Resets the latch to "no error".
    pub fn clear(&self) {
        self.bits.store(0, Ordering::Release);
    }
}
