//! UART drivers.
//!
//! Three drivers share the register definitions, the [`UartRegisters`]
//! accessor trait and the serial setup code in this module:
//!
//! - [`RingUart`]: interrupt-fed ring buffers in both directions,
//! - [`UartTransfer`]: one outstanding read and one outstanding write,
//! - [`PolledUart`]: blocking byte I/O without interrupts.

mod polled;
pub mod regs;
mod ring;
mod transfer;

pub use polled::PolledUart;
pub use ring::{RingEvent, RingUart};
pub use transfer::UartTransfer;

use bitflags::bitflags;
use plib_core::error::DriverError;
use plib_core::pdebug;

// ---------------------------------------------------------------------------
// Bitflag types
// ---------------------------------------------------------------------------

bitflags! {
    /// UART control register (`UxCON`) bits.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct UartCon: u32 {
        /// Frame format field (data width and parity).
        const MODE   = 0b1111;
        /// Receiver enable.
        const RXEN   = 1 << 4;
        /// Transmitter enable.
        const TXEN   = 1 << 5;
        /// Auto-baud detection enable (cleared by hardware when done).
        const ABDEN  = 1 << 6;
        /// High-speed (÷4) baud clock when set, low-speed (÷16) when clear.
        const BRGS   = 1 << 7;
        /// Module enable.
        const ON     = 1 << 15;
        /// Stop bit selection field.
        const STP    = 0b11 << 16;
        /// Flow control field.
        const FLO    = 0b11 << 18;
        /// Baud clock source field.
        const CLKSEL = 0b11 << 24;
        /// Fractional baud rate generation.
        const CLKMOD = 1 << 27;
    }
}

bitflags! {
    /// UART status register (`UxSTAT`) bits.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct UartStat: u32 {
        /// Receive FIFO overflowed.
        const RXFOIF = 1 << 1;
        /// Framing error on the byte at the head of the receive FIFO.
        const FERIF  = 1 << 3;
        /// Parity error on the byte at the head of the receive FIFO.
        const PERIF  = 1 << 6;
        /// Transmit shift register empty.
        const TXMTIF = 1 << 7;
        /// Overflow error interrupt enable.
        const RXFOIE = 1 << 9;
        /// Framing error interrupt enable.
        const FERIE  = 1 << 11;
        /// Parity error interrupt enable.
        const PERIE  = 1 << 14;
        /// Receive FIFO full.
        const RXBF   = 1 << 16;
        /// Receive FIFO empty.
        const RXBE   = 1 << 17;
        /// Transmit FIFO full.
        const TXBF   = 1 << 20;
        /// Transmit FIFO empty.
        const TXBE   = 1 << 21;
    }
}

bitflags! {
    /// Receive faults, using the same bit positions as [`UartStat`].
    ///
    /// The empty set means "no error".
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct UartError: u32 {
        /// Receive FIFO overflow.
        const OVERRUN = UartStat::RXFOIF.bits();
        /// Framing error.
        const FRAMING = UartStat::FERIF.bits();
        /// Parity error.
        const PARITY  = UartStat::PERIF.bits();
    }
}

impl UartError {
    /// Extracts the fault bits from a status register value.
    #[must_use]
    pub const fn from_status(stat: UartStat) -> Self {
        Self::from_bits_truncate(stat.bits())
    }
}

bitflags! {
    /// Interrupt lines of one UART.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct UartIrq: u8 {
        /// Receive FIFO has data.
        const RX    = 1 << 0;
        /// Transmit FIFO has room.
        const TX    = 1 << 1;
        /// Receive fault.
        const ERROR = 1 << 2;
    }
}

// ---------------------------------------------------------------------------
// Register access
// ---------------------------------------------------------------------------

/// Register-level access to one UART instance.
///
/// [`regs::MmioUart`] implements this over memory-mapped registers; tests
/// implement it over a simulated peripheral.
pub trait UartRegisters {
    /// Reads the control register.
    fn con(&self) -> UartCon;
    /// Writes the control register.
    fn set_con(&self, value: UartCon);
    /// Reads the status register.
    fn stat(&self) -> UartStat;
    /// Writes the status register.
    fn set_stat(&self, value: UartStat);
    /// Writes the baud rate generator.
    fn set_brg(&self, value: u32);
    /// Pops one byte from the receive FIFO.
    fn read_rx(&self) -> u8;
    /// Pushes one byte into the transmit FIFO.
    fn write_tx(&self, byte: u8);
    /// Enables or disables the given interrupt lines.
    fn set_irq_enabled(&self, irqs: UartIrq, enabled: bool);
    /// Returns `true` if every line in `irqs` is enabled.
    fn irq_enabled(&self, irqs: UartIrq) -> bool;
    /// Clears the pending flags of the given interrupt lines.
    fn clear_irq_pending(&self, irqs: UartIrq);

    /// Read-modify-writes the control register.
    fn modify_con(&self, f: impl FnOnce(UartCon) -> UartCon) {
        self.set_con(f(self.con()));
    }
}

/// Discards pending receive faults and the bytes they belong to.
///
/// Clears the overflow flag, drains the receive FIFO (which clears framing
/// and parity flags) and acknowledges the receive and error interrupts.
/// Does nothing when no fault is flagged.
pub(crate) fn clear_errors<R: UartRegisters>(regs: &R) {
    let errors = UartError::from_status(regs.stat());
    if errors.is_empty() {
        return;
    }

    if errors.contains(UartError::OVERRUN) {
        regs.set_stat(regs.stat() - UartStat::RXFOIF);
    }
    while !regs.stat().contains(UartStat::RXBE) {
        let _ = regs.read_rx();
    }
    regs.clear_irq_pending(UartIrq::ERROR | UartIrq::RX);
}

/// Returns `true` if auto-baud detection is running.
pub(crate) fn auto_baud_active<R: UartRegisters>(regs: &R) -> bool {
    regs.con().contains(UartCon::ABDEN)
}

/// Starts auto-baud detection. Stopping it early is not supported by the
/// hardware, so `false` is ignored.
pub(crate) fn set_auto_baud<R: UartRegisters>(regs: &R, enable: bool) {
    if enable {
        regs.modify_con(|con| con | UartCon::ABDEN);
    }
}

/// Returns `true` once the last byte has left the shift register.
pub(crate) fn transmit_complete<R: UartRegisters>(regs: &R) -> bool {
    regs.stat().contains(UartStat::TXMTIF)
}

// ---------------------------------------------------------------------------
// Serial setup
// ---------------------------------------------------------------------------

/// Number of data bits per frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataWidth {
    /// 7 data bits, no parity.
    Seven,
    /// 8 data bits.
    Eight,
}

/// Parity mode (8-bit frames only).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Parity {
    /// No parity bit.
    None,
    /// Odd parity.
    Odd,
    /// Even parity.
    Even,
}

/// Stop bit configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum StopBits {
    /// One stop bit.
    One = 0,
    /// One and a half stop bits.
    OneAndHalf = 1,
    /// Two stop bits.
    Two = 2,
    /// Two stop bits sent, one checked on receive.
    TwoSendOneReceive = 3,
}

/// Line settings applied by `serial_setup`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SerialSetup {
    /// Baud rate in bits per second.
    pub baud_rate: u32,
    /// Data width.
    pub data_width: DataWidth,
    /// Parity.
    pub parity: Parity,
    /// Stop bits.
    pub stop_bits: StopBits,
}

impl Default for SerialSetup {
    fn default() -> Self {
        Self {
            baud_rate: crate::config::UART_DEFAULT_BAUD,
            data_width: DataWidth::Eight,
            parity: Parity::None,
            stop_bits: StopBits::One,
        }
    }
}

impl SerialSetup {
    /// Returns the `MODE` field value for this frame format.
    ///
    /// 7-bit frames cannot carry parity.
    fn mode(&self) -> Result<u32, DriverError> {
        match (self.data_width, self.parity) {
            (DataWidth::Eight, Parity::None) => Ok(0),
            (DataWidth::Seven, Parity::None) => Ok(1),
            (DataWidth::Eight, Parity::Odd) => Ok(2),
            (DataWidth::Eight, Parity::Even) => Ok(3),
            (DataWidth::Seven, _) => Err(DriverError::Unsupported),
        }
    }
}

/// Largest value the baud rate generator accepts.
pub const MAX_BRG: u32 = 0xF_FFFF;

/// Smallest divisor usable in fractional mode.
pub const MIN_FRACTIONAL_DIVISOR: u32 = 16;

/// A baud rate generator setting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BaudDivisor {
    /// Fractional mode: `clk / baud`.
    Fractional(u32),
    /// Integer high-speed mode: `clk / (4 * baud) - 1`.
    HighSpeed(u32),
    /// Integer low-speed mode: `clk / (16 * baud) - 1`.
    LowSpeed(u32),
}

impl BaudDivisor {
    /// Picks the generator mode for `baud` from a `clock_hz` source.
    ///
    /// Fractional mode has the lowest error and is preferred. When its
    /// divisor overflows the register the integer modes are tried, high
    /// speed first. A divisor below [`MIN_FRACTIONAL_DIVISOR`] means the
    /// clock is too slow for the requested rate.
    pub fn compute(clock_hz: u32, baud: u32) -> Result<Self, DriverError> {
        if baud == 0 {
            return Err(DriverError::InvalidArgument);
        }

        let fractional = clock_hz / baud;
        if fractional < MIN_FRACTIONAL_DIVISOR {
            return Err(DriverError::InvalidArgument);
        }
        if fractional <= MAX_BRG {
            return Ok(Self::Fractional(fractional));
        }

        let clock = u64::from(clock_hz);
        let baud = u64::from(baud);
        let fits = |value: u64| u32::try_from(value).ok().filter(|&v| v <= MAX_BRG);

        if let Some(brg) = fits(clock / (4 * baud) - 1) {
            return Ok(Self::HighSpeed(brg));
        }
        if let Some(brg) = fits(clock / (16 * baud) - 1) {
            return Ok(Self::LowSpeed(brg));
        }
        Err(DriverError::InvalidArgument)
    }

    /// Returns the value written to the baud rate generator.
    #[must_use]
    pub const fn brg(self) -> u32 {
        match self {
            Self::Fractional(v) | Self::HighSpeed(v) | Self::LowSpeed(v) => v,
        }
    }

    /// Returns the control bits selecting this generator mode.
    const fn con_bits(self) -> UartCon {
        match self {
            Self::Fractional(_) => UartCon::CLKMOD,
            Self::HighSpeed(_) => UartCon::BRGS,
            Self::LowSpeed(_) => UartCon::empty(),
        }
    }
}

/// Resolves a caller-supplied source clock, where zero selects the
/// configured peripheral clock.
pub(crate) const fn source_clock(src_clock_hz: u32) -> u32 {
    if src_clock_hz == 0 {
        plib_core::config::PERIPHERAL_CLOCK_HZ
    } else {
        src_clock_hz
    }
}

/// Reprograms frame format and baud rate.
///
/// Everything is validated before the peripheral is touched, so a rejected
/// setup leaves the UART running with its previous settings. The module is
/// switched off while the generator is reprogrammed; the transmitter and
/// receiver enables are restored afterwards.
pub(crate) fn apply_serial_setup<R: UartRegisters>(
    regs: &R,
    setup: &SerialSetup,
    src_clock_hz: u32,
) -> Result<(), DriverError> {
    if setup.baud_rate == 0 {
        return Err(DriverError::InvalidArgument);
    }
    let mode = setup.mode()?;
    let clock = source_clock(src_clock_hz);
    let divisor = BaudDivisor::compute(clock, setup.baud_rate)?;

    let enables = regs.con() & (UartCon::TXEN | UartCon::RXEN);
    regs.modify_con(|con| con - UartCon::ON);

    regs.modify_con(|con| {
        let cleared = con - UartCon::MODE - UartCon::STP - UartCon::BRGS - UartCon::CLKMOD;
        cleared
            | divisor.con_bits()
            | UartCon::from_bits_retain(mode)
            | UartCon::from_bits_retain((setup.stop_bits as u32) << 16)
    });
    regs.set_brg(divisor.brg());

    regs.modify_con(|con| con | UartCon::ON | enables);

    pdebug!(
        "uart: {} baud from {} Hz, {:?} brg {:#x}",
        setup.baud_rate,
        clock,
        divisor,
        divisor.brg()
    );
    Ok(())
}

/// Programs the power-on frame format: 8N1 at the default baud rate,
/// fractional generator, peripheral bus clock, no flow control, receive
/// fault interrupts enabled in the status register. Leaves the module off.
pub(crate) fn program_defaults<R: UartRegisters>(regs: &R) -> Result<(), DriverError> {
    let clock = source_clock(0);
    let divisor = BaudDivisor::compute(clock, crate::config::UART_DEFAULT_BAUD)?;

    regs.set_con(divisor.con_bits());
    regs.set_stat(UartStat::RXFOIE | UartStat::FERIE | UartStat::PERIE);
    regs.set_brg(divisor.brg());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::uart::MockUart;

    #[test]
    fn fractional_divisor_for_default_rate() {
        // 100 MHz / 115200 = 868 (0x364).
        assert_eq!(
            BaudDivisor::compute(100_000_000, 115_200),
            Ok(BaudDivisor::Fractional(0x364))
        );
    }

    #[test]
    fn divisor_below_sixteen_is_rejected() {
        assert_eq!(
            BaudDivisor::compute(1_000_000, 100_000),
            Err(DriverError::InvalidArgument)
        );
    }

    #[test]
    fn high_speed_when_fractional_overflows() {
        // 100 MHz / 50 = 2_000_000 > 0xFFFFF; 100 MHz / 200 - 1 = 499_999.
        assert_eq!(
            BaudDivisor::compute(100_000_000, 50),
            Ok(BaudDivisor::HighSpeed(499_999))
        );
    }

    #[test]
    fn low_speed_when_high_speed_overflows() {
        // 200 MHz / 40 = 5_000_000 > 0xFFFFF; 200 MHz / 160 - 1 = 1_249_999,
        // still too big; 200 MHz / 640 - 1 = 312_499.
        assert_eq!(
            BaudDivisor::compute(200_000_000, 40),
            Ok(BaudDivisor::LowSpeed(312_499))
        );
    }

    #[test]
    fn unreachable_rate_is_rejected() {
        assert_eq!(
            BaudDivisor::compute(u32::MAX, 1),
            Err(DriverError::InvalidArgument)
        );
    }

    #[test]
    fn zero_baud_is_rejected() {
        assert_eq!(
            BaudDivisor::compute(100_000_000, 0),
            Err(DriverError::InvalidArgument)
        );
    }

    #[test]
    fn seven_bit_with_parity_is_unsupported() {
        let regs = MockUart::new();
        let setup = SerialSetup {
            data_width: DataWidth::Seven,
            parity: Parity::Even,
            ..SerialSetup::default()
        };
        assert_eq!(
            apply_serial_setup(&regs, &setup, 0),
            Err(DriverError::Unsupported)
        );
    }

    #[test]
    fn rejected_setup_leaves_module_running() {
        let regs = MockUart::new();
        regs.set_con(UartCon::ON | UartCon::TXEN | UartCon::RXEN);
        regs.set_brg(0x364);

        let setup = SerialSetup {
            baud_rate: 10_000_000,
            ..SerialSetup::default()
        };
        assert_eq!(
            apply_serial_setup(&regs, &setup, 100_000_000),
            Err(DriverError::InvalidArgument)
        );
        assert!(regs.con().contains(UartCon::ON));
        assert_eq!(regs.brg(), 0x364);
    }

    #[test]
    fn setup_programs_frame_and_restores_enables() {
        let regs = MockUart::new();
        regs.set_con(UartCon::ON | UartCon::TXEN | UartCon::RXEN | UartCon::CLKMOD);

        let setup = SerialSetup {
            baud_rate: 50,
            data_width: DataWidth::Eight,
            parity: Parity::Odd,
            stop_bits: StopBits::Two,
        };
        apply_serial_setup(&regs, &setup, 100_000_000).unwrap();

        let con = regs.con();
        assert!(con.contains(UartCon::ON | UartCon::TXEN | UartCon::RXEN | UartCon::BRGS));
        assert!(!con.contains(UartCon::CLKMOD));
        assert_eq!((con & UartCon::MODE).bits(), 2);
        assert_eq!((con & UartCon::STP).bits() >> 16, 2);
        assert_eq!(regs.brg(), 499_999);
        // The module was switched off while the generator changed.
        assert!(regs.was_switched_off());
    }

    #[test]
    fn zero_source_clock_uses_configured_clock() {
        let regs = MockUart::new();
        apply_serial_setup(&regs, &SerialSetup::default(), 0).unwrap();
        let expected = BaudDivisor::compute(
            plib_core::config::PERIPHERAL_CLOCK_HZ,
            crate::config::UART_DEFAULT_BAUD,
        )
        .unwrap();
        assert_eq!(regs.brg(), expected.brg());
    }

    #[test]
    fn clear_errors_drains_fifo_and_flags() {
        let regs = MockUart::new();
        regs.receive(&[1, 2, 3]);
        regs.raise_error(UartError::OVERRUN | UartError::FRAMING);

        clear_errors(&regs);

        assert!(UartError::from_status(regs.stat()).is_empty());
        assert!(regs.stat().contains(UartStat::RXBE));
        assert!(!regs.is_pending(UartIrq::ERROR));
        assert!(!regs.is_pending(UartIrq::RX));
    }

    #[test]
    fn clear_errors_keeps_data_when_no_fault() {
        let regs = MockUart::new();
        regs.receive(&[7]);
        clear_errors(&regs);
        assert_eq!(regs.read_rx(), 7);
    }

    #[test]
    fn auto_baud_cannot_be_disabled() {
        let regs = MockUart::new();
        assert!(!auto_baud_active(&regs));
        set_auto_baud(&regs, true);
        assert!(auto_baud_active(&regs));
        set_auto_baud(&regs, false);
        assert!(auto_baud_active(&regs));
    }
}
