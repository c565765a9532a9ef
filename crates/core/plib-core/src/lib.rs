//! Core building blocks for interrupt-driven peripheral drivers.
//!
//! Everything a driver shares between its interrupt handler and the
//! foreground loop lives here: the single-producer/single-consumer
//! [`ringbuf::RingBuf`], the [`callback::CallbackSlot`] used to notify
//! application code, the [`notify::ThresholdNotifier`] and the read-clears
//! [`latch::ErrorLatch`].
//!
//! The crate is host-testable: under `cargo test` it links `std`, and the
//! ring buffer can be model-checked with loom (`RUSTFLAGS="--cfg loom"`).

#![cfg_attr(not(test), no_std)]
#![warn(missing_docs)]

pub mod callback;
pub mod config;
pub mod error;
pub mod latch;
pub mod log;
pub mod notify;
pub mod ringbuf;
pub mod sync;
