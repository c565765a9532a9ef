//! Typed MMIO register block abstractions.
//!
//! This crate re-exports the [`register_block!`] macro from
//! `plib-mmio-macros`, which generates safe, typed MMIO register accessor
//! structs from a declarative definition, and provides [`IrqBit`], the
//! accessor for one interrupt line in the interrupt controller's enable and
//! flag registers.
//!
//! # Example
//!
//! ```ignore
//! use plib_mmio::register_block;
//!
//! register_block! {
//!     /// SPI registers.
//!     pub SpiRegs {
//!         /// Control register 1.
//!         [0x00; u32; rw] con1,
//!         /// Status register.
//!         [0x04; u32; rw] stat,
//!         /// Data buffer.
//!         [0x08; u32; rw] buf,
//!     }
//! }
//! ```

#![cfg_attr(not(test), no_std)]
#![warn(missing_docs)]

pub use plib_mmio_macros::register_block;

mod irq;

pub use irq::IrqBit;
