//! Blocking UART without interrupts.

use core::fmt;

use plib_core::error::DriverError;
use plib_core::pinfo;

use super::{SerialSetup, UartCon, UartError, UartIrq, UartRegisters, UartStat};

/// A UART polled from the foreground.
///
/// Every call busy-waits on the status register; no interrupt line is ever
/// enabled.
pub struct PolledUart<R> {
    regs: R,
}

impl<R: UartRegisters> PolledUart<R> {
    /// Creates the driver. Does not touch hardware.
    pub const fn new(regs: R) -> Self {
        Self { regs }
    }

    /// Returns the register accessor.
    pub fn registers(&self) -> &R {
        &self.regs
    }

    /// Programs 8N1 at the default baud rate and switches the UART on.
    pub fn initialize(&self) -> Result<(), DriverError> {
        self.regs
            .set_irq_enabled(UartIrq::RX | UartIrq::TX | UartIrq::ERROR, false);
        super::program_defaults(&self.regs)?;
        self.regs
            .modify_con(|con| con | UartCon::ON | UartCon::TXEN | UartCon::RXEN);
        pinfo!("uart: polled mode");
        Ok(())
    }

    /// Changes frame format and baud rate.
    pub fn serial_setup(&self, setup: &SerialSetup, src_clock_hz: u32) -> Result<(), DriverError> {
        super::apply_serial_setup(&self.regs, setup, src_clock_hz)
    }

    /// Sends `data`, waiting for FIFO room before each byte.
    pub fn write(&self, data: &[u8]) {
        for &byte in data {
            self.write_byte(byte);
        }
    }

    /// Sends one byte, waiting for FIFO room.
    pub fn write_byte(&self, byte: u8) {
        while !self.transmitter_is_ready() {
            core::hint::spin_loop();
        }
        self.regs.write_tx(byte);
    }

    /// Fills `buf` from the receive line.
    ///
    /// Faults left over from earlier traffic are discarded first. A fault
    /// flagged while reading stops the read and is returned; the bytes
    /// before it are in `buf`.
    pub fn read(&self, buf: &mut [u8]) -> Result<(), UartError> {
        super::clear_errors(&self.regs);

        for slot in buf.iter_mut() {
            let stat = loop {
                let stat = self.regs.stat();
                if !stat.contains(UartStat::RXBE) {
                    break stat;
                }
                core::hint::spin_loop();
            };

            let errors = UartError::from_status(stat);
            if !errors.is_empty() {
                return Err(errors);
            }
            *slot = self.regs.read_rx();
        }
        Ok(())
    }

    /// Pops one byte without waiting or checking for faults.
    pub fn read_byte(&self) -> u8 {
        self.regs.read_rx()
    }

    /// Returns `true` if a received byte is waiting.
    pub fn receiver_is_ready(&self) -> bool {
        !self.regs.stat().contains(UartStat::RXBE)
    }

    /// Returns `true` if the transmit FIFO has room.
    pub fn transmitter_is_ready(&self) -> bool {
        !self.regs.stat().contains(UartStat::TXBF)
    }

    /// Returns `true` once the last byte has left the shift register.
    pub fn transmit_complete(&self) -> bool {
        super::transmit_complete(&self.regs)
    }

    /// Returns the receive faults currently flagged and discards them
    /// together with the buffered bytes.
    pub fn take_error(&self) -> UartError {
        let errors = UartError::from_status(self.regs.stat());
        if !errors.is_empty() {
            super::clear_errors(&self.regs);
        }
        errors
    }

    /// Returns `true` while auto-baud detection is running.
    pub fn auto_baud_query(&self) -> bool {
        super::auto_baud_active(&self.regs)
    }

    /// Starts auto-baud detection. `false` is ignored.
    pub fn set_auto_baud(&self, enable: bool) {
        super::set_auto_baud(&self.regs, enable);
    }
}

impl<R: UartRegisters> fmt::Write for PolledUart<R> {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        for byte in s.bytes() {
            if byte == b'\n' {
                self.write_byte(b'\r');
            }
            self.write_byte(byte);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use core::fmt::Write as _;

    use super::*;
    use crate::testing::uart::{MockUart, RX_FIFO_DEPTH};

    fn uart() -> PolledUart<MockUart> {
        let uart = PolledUart::new(MockUart::new());
        uart.initialize().unwrap();
        uart
    }

    #[test]
    fn initialize_switches_on_without_interrupts() {
        let uart = uart();
        let con = uart.registers().con();
        assert!(con.contains(UartCon::ON | UartCon::TXEN | UartCon::RXEN));
        assert!(!uart.registers().is_enabled(UartIrq::RX));
        assert!(!uart.registers().is_enabled(UartIrq::TX));
        assert!(!uart.registers().is_enabled(UartIrq::ERROR));
    }

    #[test]
    fn read_fills_buffer() {
        let uart = uart();
        uart.registers().receive(b"hey!");
        assert!(uart.receiver_is_ready());

        let mut buf = [0u8; 3];
        assert_eq!(uart.read(&mut buf), Ok(()));
        assert_eq!(&buf, b"hey");
        assert_eq!(uart.read_byte(), b'!');
        assert!(!uart.receiver_is_ready());
    }

    #[test]
    fn write_reports_fifo_space() {
        let uart = uart();
        uart.write(&[1, 2, 3]);
        assert!(uart.transmitter_is_ready());
        assert!(!uart.transmit_complete());

        uart.write_byte(4);
        assert!(!uart.transmitter_is_ready());

        uart.registers().shift_out();
        assert!(uart.transmit_complete());
        assert_eq!(uart.registers().wire(), vec![1, 2, 3, 4]);
    }

    #[test]
    fn fmt_write_translates_newlines() {
        let mut uart = uart();
        uart.write_str("a\n").unwrap();
        uart.registers().shift_out();
        assert_eq!(uart.registers().wire(), b"a\r\n".to_vec());
    }

    #[test]
    fn take_error_reports_and_clears_overflow() {
        let uart = uart();
        let burst = [0x42u8; RX_FIFO_DEPTH + 1];
        uart.registers().receive(&burst);

        assert_eq!(uart.take_error(), UartError::OVERRUN);
        assert!(!uart.receiver_is_ready());
        assert!(uart.take_error().is_empty());
    }

    #[test]
    fn take_error_without_fault_keeps_data() {
        let uart = uart();
        uart.registers().receive(&[5]);
        assert!(uart.take_error().is_empty());
        assert_eq!(uart.read_byte(), 5);
    }
}
