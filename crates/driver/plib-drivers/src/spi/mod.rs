//! SPI host driver.
//!
//! [`SpiHost`] runs full-duplex transfers through the module's 4-deep
//! enhanced-buffer FIFOs. Three interrupt lines cooperate:
//!
//! - RX fires when the receive FIFO reaches the watermark programmed in
//!   `RXMSK`; the handler drains it and refills the transmit FIFO,
//! - TX fires when the transmit FIFO is empty; used once reception is done
//!   (or not wanted) but bytes remain to be sent,
//! - ERROR is armed on "shift register empty" to detect the end of a
//!   transmit-only tail.
//!
//! When more bytes are to be received than sent, the transmit side is padded
//! with [`SPI_DUMMY_BYTE`](crate::config::SPI_DUMMY_BYTE).
//!
//! [`SpiClient`] is the other end of the bus. It stages a reply in an
//! internal write buffer, collects whatever the host clocks in while chip
//! select is asserted, and runs its callback when chip select is released.

mod client;
mod host;
pub mod regs;

pub use client::{BusyLine, SpiClient};
pub use host::SpiHost;

use bitflags::bitflags;
use plib_core::error::DriverError;

bitflags! {
    /// SPI control register 1 (`SPIxCON1`) bits.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct SpiCon1: u32 {
        /// Enhanced buffer (FIFO) mode.
        const ENHBUF = 1 << 0;
        /// Host mode.
        const MSTEN  = 1 << 5;
        /// Clock idles high.
        const CKP    = 1 << 6;
        /// Client mode: chip select input enable.
        const SSEN   = 1 << 7;
        /// Output changes on the active-to-idle clock edge.
        const CKE    = 1 << 8;
        /// 16-bit words.
        const MODE16 = 1 << 10;
        /// 32-bit words.
        const MODE32 = 1 << 11;
        /// Module enable.
        const ON     = 1 << 15;
        /// Ignore receive overflow.
        const IGNROV = 1 << 17;
        /// Baud clock from the clock generator instead of the bus clock.
        const MCLKEN = 1 << 23;
    }
}

bitflags! {
    /// SPI status register (`SPIxSTAT`) bits.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct SpiStat: u32 {
        /// Receive FIFO full.
        const SPIRBF = 1 << 0;
        /// Transmit FIFO full.
        const SPITBF = 1 << 1;
        /// Transmit FIFO empty.
        const SPITBE = 1 << 3;
        /// Receive FIFO empty.
        const SPIRBE = 1 << 5;
        /// Receive overflow.
        const SPIROV = 1 << 6;
        /// Shift register empty.
        const SRMT   = 1 << 7;
        /// Receive FIFO element count field.
        const RXELM  = 0x3F << 24;
    }
}

impl SpiStat {
    /// Number of bytes waiting in the receive FIFO.
    #[must_use]
    pub const fn rx_elements(self) -> u32 {
        (self.bits() & Self::RXELM.bits()) >> 24
    }
}

bitflags! {
    /// SPI interrupt mask register (`SPIxIMSK`) bits.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct SpiImsk: u32 {
        /// TX interrupt on transmit FIFO empty.
        const SPITBEN  = 1 << 3;
        /// ERROR interrupt on receive overflow.
        const SPIROVEN = 1 << 6;
        /// ERROR interrupt on shift register empty.
        const SRMTEN   = 1 << 7;
        /// RX interrupt on the `RXMSK` watermark.
        const RXWIEN   = 1 << 15;
        /// Receive watermark field.
        const RXMSK    = 0x3F << 16;
    }
}

impl SpiImsk {
    /// Returns `self` with the receive watermark set to `count` bytes.
    #[must_use]
    pub const fn with_rx_watermark(self, count: u32) -> Self {
        let cleared = self.bits() & !Self::RXMSK.bits();
        Self::from_bits_retain(cleared | ((count << 16) & Self::RXMSK.bits()))
    }

    /// Returns the receive watermark.
    #[must_use]
    pub const fn rx_watermark(self) -> u32 {
        (self.bits() & Self::RXMSK.bits()) >> 16
    }
}

bitflags! {
    /// Client faults. The empty set means "no error".
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct SpiError: u32 {
        /// A byte arrived while the receive FIFO was full.
        const OVERFLOW = 1 << 0;
    }
}

bitflags! {
    /// Interrupt lines of one SPI module.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct SpiIrq: u8 {
        /// Receive watermark reached.
        const RX    = 1 << 0;
        /// Transmit FIFO empty.
        const TX    = 1 << 1;
        /// Fault or shift register empty.
        const ERROR = 1 << 2;
    }
}

/// Register-level access to one SPI module.
pub trait SpiRegisters {
    /// Reads control register 1.
    fn con1(&self) -> SpiCon1;
    /// Writes control register 1.
    fn set_con1(&self, value: SpiCon1);
    /// Writes control register 2.
    fn set_con2(&self, value: u32);
    /// Reads the status register.
    fn stat(&self) -> SpiStat;
    /// Writes the status register.
    fn set_stat(&self, value: SpiStat);
    /// Writes the baud rate generator.
    fn set_brg(&self, value: u32);
    /// Reads the interrupt mask register.
    fn imsk(&self) -> SpiImsk;
    /// Writes the interrupt mask register.
    fn set_imsk(&self, value: SpiImsk);
    /// Pops one byte from the receive FIFO.
    fn read_buf(&self) -> u8;
    /// Pushes one byte into the transmit FIFO.
    fn write_buf(&self, byte: u8);
    /// Enables or disables the given interrupt lines.
    fn set_irq_enabled(&self, irqs: SpiIrq, enabled: bool);
    /// Returns `true` if every line in `irqs` is enabled.
    fn irq_enabled(&self, irqs: SpiIrq) -> bool;
    /// Clears the pending flags of the given interrupt lines.
    fn clear_irq_pending(&self, irqs: SpiIrq);

    /// Read-modify-writes control register 1.
    fn modify_con1(&self, f: impl FnOnce(SpiCon1) -> SpiCon1) {
        self.set_con1(f(self.con1()));
    }

    /// Read-modify-writes the interrupt mask register.
    fn modify_imsk(&self, f: impl FnOnce(SpiImsk) -> SpiImsk) {
        self.set_imsk(f(self.imsk()));
    }
}

/// Clock level between transfers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClockPolarity {
    /// SCK idles low.
    IdleLow,
    /// SCK idles high.
    IdleHigh,
}

/// Clock edge on which output data changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClockPhase {
    /// Data changes when SCK leaves its idle level.
    IdleToActive,
    /// Data changes when SCK returns to its idle level.
    ActiveToIdle,
}

/// Word size.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataBits {
    /// 8-bit words.
    Eight,
    /// 16-bit words.
    Sixteen,
    /// 32-bit words.
    ThirtyTwo,
}

/// Bus settings applied by [`SpiHost::transfer_setup`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpiTransferSetup {
    /// SCK frequency in hertz.
    pub clock_hz: u32,
    /// Clock polarity.
    pub polarity: ClockPolarity,
    /// Clock phase.
    pub phase: ClockPhase,
    /// Word size. The driver moves bytes, so only [`DataBits::Eight`] is
    /// accepted.
    pub data_bits: DataBits,
}

impl Default for SpiTransferSetup {
    fn default() -> Self {
        Self {
            clock_hz: crate::config::SPI_DEFAULT_CLOCK_HZ,
            polarity: ClockPolarity::IdleHigh,
            phase: ClockPhase::IdleToActive,
            data_bits: DataBits::Eight,
        }
    }
}

impl SpiTransferSetup {
    /// Returns the `CKP`, `CKE` and word-size bits for this setup.
    fn con1_bits(&self) -> SpiCon1 {
        let mut bits = SpiCon1::empty();
        bits.set(SpiCon1::CKP, self.polarity == ClockPolarity::IdleHigh);
        bits.set(SpiCon1::CKE, self.phase == ClockPhase::ActiveToIdle);
        match self.data_bits {
            DataBits::Eight => {}
            DataBits::Sixteen => bits |= SpiCon1::MODE16,
            DataBits::ThirtyTwo => bits |= SpiCon1::MODE32,
        }
        bits
    }
}

/// Largest baud rate generator value.
pub const MAX_BRG: u32 = 0x1FFF;

/// Computes the baud rate generator value for an SCK of `clock_hz`.
///
/// `SCK = src / (2 * (BRG + 1))`. The truncated divisor gives a rate at or
/// above the request; the next divisor is taken when its rate is closer.
pub fn brg_value(src_clock_hz: u32, clock_hz: u32) -> Result<u32, DriverError> {
    if clock_hz == 0 {
        return Err(DriverError::InvalidArgument);
    }

    let mut brg = (src_clock_hz / clock_hz / 2)
        .checked_sub(1)
        .ok_or(DriverError::InvalidArgument)?;
    if brg > MAX_BRG {
        return Err(DriverError::InvalidArgument);
    }

    let rate_high = src_clock_hz / (2 * (brg + 1));
    let rate_low = src_clock_hz / (2 * (brg + 2));
    if rate_high.abs_diff(clock_hz) > clock_hz.abs_diff(rate_low) {
        brg += 1;
    }

    if brg > MAX_BRG {
        return Err(DriverError::InvalidArgument);
    }
    Ok(brg)
}
