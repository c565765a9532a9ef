//! I2C host and client drivers.
//!
//! [`I2cHost`] runs read, write and write-then-read transfers to 7-bit or
//! 10-bit addressed devices. Every bus event (start, address byte, data
//! byte, ACK, stop) raises the event interrupt, and
//! [`I2cHost::handle_interrupt`] advances a state machine one step per
//! event. A NACK or a bus collision ends the transfer; the outcome is read
//! with [`I2cHost::take_error`] from the completion callback.
//!
//! [`I2cClient`] answers at its own address. It keeps no transfer state:
//! each address match, received byte, transmit request and stop condition
//! is handed to the application callback, whose return value decides
//! whether the byte is acknowledged.

mod client;
mod host;
pub mod regs;

pub use client::{AckStatus, I2cClient, I2cClientCallback, I2cClientEvent, TransferDirection};
pub use host::I2cHost;

use bitflags::bitflags;
use plib_core::error::DriverError;

bitflags! {
    /// I2C control register (`I2CxCON1`) bits.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct I2cCon: u32 {
        /// Start condition enable (cleared by hardware).
        const SEN    = 1 << 0;
        /// Repeated start condition enable (cleared by hardware).
        const RSEN   = 1 << 1;
        /// Stop condition enable (cleared by hardware).
        const PEN    = 1 << 2;
        /// Receive enable (cleared by hardware after one byte).
        const RCEN   = 1 << 3;
        /// Acknowledge sequence enable (cleared by hardware).
        const ACKEN  = 1 << 4;
        /// Acknowledge data: set to NACK, clear to ACK.
        const ACKDT  = 1 << 5;
        /// Client clock stretching enable.
        const STREN  = 1 << 6;
        /// Slew rate control disable.
        const DISSLW = 1 << 9;
        /// 10-bit client address.
        const A10M   = 1 << 10;
        /// SCL release.
        const SCLREL = 1 << 12;
        /// Module enable.
        const ON     = 1 << 15;
        /// Client start condition interrupt enable.
        const SCIE   = 1 << 21;
        /// Client stop condition interrupt enable.
        const PCIE   = 1 << 22;
    }
}

impl I2cCon {
    /// Bus sequences the hardware is still executing.
    pub const SEQUENCES: Self = Self::SEN
        .union(Self::RSEN)
        .union(Self::PEN)
        .union(Self::RCEN)
        .union(Self::ACKEN);
}

bitflags! {
    /// I2C status register (`I2CxSTAT1`) bits.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct I2cStat: u32 {
        /// Transmit buffer full.
        const TBF     = 1 << 0;
        /// Receive buffer full.
        const RBF     = 1 << 1;
        /// Client mode: the host is reading.
        const R_W     = 1 << 2;
        /// Start condition seen last (bus active).
        const S       = 1 << 3;
        /// Stop condition seen last.
        const P       = 1 << 4;
        /// Client mode: the last byte was data, not an address.
        const D_A     = 1 << 5;
        /// Receive overflow: a byte arrived while `RBF` was still set.
        const I2COV   = 1 << 6;
        /// Bus collision.
        const BCL     = 1 << 10;
        /// Transmit in progress.
        const TRSTAT  = 1 << 14;
        /// Device did not acknowledge the last byte.
        const ACKSTAT = 1 << 15;
    }
}

bitflags! {
    /// I2C interrupt control register (`I2CxINTC`): which bus events raise
    /// the host and error interrupts.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct I2cIntc: u32 {
        /// Bus collision.
        const BCLIE   = 1 << 0;
        /// Stop condition complete.
        const HPCIE   = 1 << 1;
        /// Start or repeated start complete.
        const HSCIE   = 1 << 2;
        /// Acknowledge sequence complete.
        const HACKSIE = 1 << 3;
        /// Byte transmitted.
        const HDTXIE  = 1 << 4;
        /// Byte received.
        const HDRXIE  = 1 << 5;
        /// Host state change.
        const HSTIE   = 1 << 6;
        /// Client stop or start detected.
        const CLTIE   = 1 << 8;
        /// Client address matched.
        const CADDRIE = 1 << 9;
        /// Client byte transmitted.
        const CDTXIE  = 1 << 10;
        /// Client byte received.
        const CDRXIE  = 1 << 11;
    }
}

impl I2cIntc {
    /// Events driving the host state machine.
    pub const HOST_EVENTS: Self = Self::BCLIE
        .union(Self::HPCIE)
        .union(Self::HSCIE)
        .union(Self::HACKSIE)
        .union(Self::HDTXIE)
        .union(Self::HDRXIE)
        .union(Self::HSTIE);

    /// Events the client reacts to.
    pub const CLIENT_EVENTS: Self = Self::BCLIE
        .union(Self::CLTIE)
        .union(Self::CADDRIE)
        .union(Self::CDTXIE)
        .union(Self::CDRXIE);
}

bitflags! {
    /// Transfer faults. The empty set means "no error".
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct I2cError: u32 {
        /// The device did not acknowledge an address or data byte.
        const NACK          = 1 << 0;
        /// Another host drove the bus.
        const BUS_COLLISION = 1 << 1;
        /// Client mode: a byte arrived before the previous one was read.
        const OVERFLOW      = 1 << 2;
    }
}

bitflags! {
    /// Interrupt lines of one I2C module.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct I2cIrq: u8 {
        /// Bus event, in host or client mode.
        const EVENT = 1 << 0;
        /// Bus fault.
        const ERROR = 1 << 1;
    }
}

/// Register-level access to one I2C module.
pub trait I2cRegisters {
    /// Reads the control register.
    fn con(&self) -> I2cCon;
    /// Writes the control register.
    fn set_con(&self, value: I2cCon);
    /// Reads the status register.
    fn stat(&self) -> I2cStat;
    /// Writes the status register.
    fn set_stat(&self, value: I2cStat);
    /// Loads the transmit register.
    fn write_trn(&self, byte: u8);
    /// Reads the receive register.
    fn read_rcv(&self) -> u8;
    /// Writes both baud rate generator halves.
    fn set_baud(&self, value: u32);
    /// Writes the interrupt control register.
    fn set_intc(&self, value: I2cIntc);
    /// Writes the client address register.
    fn set_address(&self, address: u16);
    /// Writes the client address mask register.
    fn set_address_mask(&self, mask: u16);
    /// Enables or disables the given interrupt lines.
    fn set_irq_enabled(&self, irqs: I2cIrq, enabled: bool);
    /// Returns `true` if every line in `irqs` is enabled.
    fn irq_enabled(&self, irqs: I2cIrq) -> bool;
    /// Clears the pending flags of the given interrupt lines.
    fn clear_irq_pending(&self, irqs: I2cIrq);

    /// Read-modify-writes the control register.
    fn modify_con(&self, f: impl FnOnce(I2cCon) -> I2cCon) {
        self.set_con(f(self.con()));
    }
}

/// Bus settings applied by [`I2cHost::transfer_setup`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct I2cTransferSetup {
    /// SCL frequency in hertz, at most 1 MHz.
    pub clock_hz: u32,
}

impl Default for I2cTransferSetup {
    fn default() -> Self {
        Self {
            clock_hz: crate::config::I2C_DEFAULT_CLOCK_HZ,
        }
    }
}

/// Fastest supported bus clock.
pub const MAX_CLOCK_HZ: u32 = 1_000_000;

/// Baud rate generator range.
pub const BAUD_RANGE: core::ops::RangeInclusive<u32> = 4..=0xFF_FFFF;

/// Computes the baud rate generator value for an SCL of `clock_hz` from a
/// `src_clock_hz` peripheral clock.
///
/// `BRG = src / (2 * clock) - src / 5 MHz - 3`, the second term accounting
/// for the 200 ns pulse gobbler delay.
pub fn baud_value(src_clock_hz: u32, clock_hz: u32) -> Result<u32, DriverError> {
    if clock_hz == 0 || clock_hz > MAX_CLOCK_HZ {
        return Err(DriverError::InvalidArgument);
    }

    let src = u64::from(src_clock_hz);
    let half_period = src / (2 * u64::from(clock_hz));
    let baud = half_period
        .checked_sub(src / 5_000_000 + 3)
        .and_then(|v| u32::try_from(v).ok())
        .ok_or(DriverError::InvalidArgument)?;

    if BAUD_RANGE.contains(&baud) {
        Ok(baud)
    } else {
        Err(DriverError::InvalidArgument)
    }
}
