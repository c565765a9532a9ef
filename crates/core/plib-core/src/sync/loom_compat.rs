//! Loom compatibility shim.
//!
//! When compiled with `cfg(loom)`, re-exports loom's atomics. Otherwise,
//! re-exports the `core::sync::atomic` types.
//!
//! The ring buffer goes through this module so its SPSC protocol can be
//! checked under loom's deterministic scheduler without code changes.

// ---------------------------------------------------------------------------
// Loom mode
// ---------------------------------------------------------------------------

#[cfg(loom)]
pub(crate) use loom::sync::atomic::{AtomicU8, AtomicUsize, Ordering};

// ---------------------------------------------------------------------------
// Normal mode
// ---------------------------------------------------------------------------

#[cfg(not(loom))]
pub(crate) use core::sync::atomic::{AtomicU8, AtomicUsize, Ordering};
