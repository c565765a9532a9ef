//! Interrupt-driven peripheral drivers.
//!
//! Each peripheral has one generic driver, parameterized by a register
//! accessor trait ([`uart::UartRegisters`], [`i2c::I2cRegisters`],
//! [`spi::SpiRegisters`]). The `regs` module of each peripheral provides the
//! MMIO implementation; tests run the same drivers against host-side mocks.
//!
//! | Driver | Mode |
//! |---|---|
//! | [`uart::RingUart`] | interrupt-fed ring buffers with threshold notifications |
//! | [`uart::UartTransfer`] | one outstanding read and write, completion callbacks |
//! | [`uart::PolledUart`] | blocking byte I/O |
//! | [`i2c::I2cHost`] | interrupt-driven host transfers with 7/10-bit addressing |
//! | [`spi::SpiHost`] | interrupt-driven host transfers through the 4-deep FIFO |
//! | [`i2c::I2cClient`] | per-event callbacks that decide ACK or NACK |
//! | [`spi::SpiClient`] | chip-select framed exchanges through internal buffers |
//!
//! All drivers take `&self` and can live in `static`s. Interrupt entry points
//! are the `handle_*_interrupt` methods; the board wires them to its vector
//! table.

#![cfg_attr(not(test), no_std)]
#![warn(missing_docs)]

pub mod buffers;
pub mod config;
pub mod i2c;
pub mod spi;
pub mod uart;

#[cfg(test)]
mod testing;
