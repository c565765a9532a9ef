//! Interrupt-driven UART transfers.
//!
//! [`UartTransfer`] accepts one outstanding read and one outstanding write.
//! The caller lends a buffer for `'a`; the RX/TX interrupt handlers move
//! bytes between it and the hardware FIFOs and call the direction's
//! completion callback when the buffer is done. Buffers are handed back with
//! [`UartTransfer::take_read`] and [`UartTransfer::take_write`] once the
//! direction is idle, or straight away inside a [`Rejected`].

use plib_core::callback::{Callback, CallbackSlot};
use plib_core::error::DriverError;
use plib_core::latch::ErrorLatch;
use plib_core::sync::IrqSpinLock;
use plib_core::{pinfo, pwarn};

use super::{SerialSetup, UartCon, UartError, UartIrq, UartRegisters, UartStat};
use crate::buffers::{Rejected, SubmitResult};

struct ReadState<'a> {
    buf: Option<&'a mut [u8]>,
    count: usize,
    busy: bool,
}

struct WriteState<'a> {
    buf: Option<&'a [u8]>,
    count: usize,
    busy: bool,
}

/// A UART moving caller buffers under interrupt control.
pub struct UartTransfer<'a, R> {
    regs: R,
    read: IrqSpinLock<ReadState<'a>>,
    write: IrqSpinLock<WriteState<'a>>,
    read_callback: CallbackSlot<Callback>,
    write_callback: CallbackSlot<Callback>,
    errors: ErrorLatch<UartError>,
}

impl<'a, R: UartRegisters> UartTransfer<'a, R> {
    /// Creates the driver. Does not touch hardware.
    pub const fn new(regs: R) -> Self {
        Self {
            regs,
            read: IrqSpinLock::new(ReadState {
                buf: None,
                count: 0,
                busy: false,
            }),
            write: IrqSpinLock::new(WriteState {
                buf: None,
                count: 0,
                busy: false,
            }),
            read_callback: CallbackSlot::new(),
            write_callback: CallbackSlot::new(),
            errors: ErrorLatch::new(),
        }
    }

    /// Returns the register accessor.
    pub fn registers(&self) -> &R {
        &self.regs
    }

    /// Programs 8N1 at the default baud rate and switches the UART on.
    /// Interrupts stay disabled until a transfer is submitted.
    pub fn initialize(&self) -> Result<(), DriverError> {
        self.regs
            .set_irq_enabled(UartIrq::RX | UartIrq::TX | UartIrq::ERROR, false);
        super::program_defaults(&self.regs)?;

        *self.read.lock() = ReadState {
            buf: None,
            count: 0,
            busy: false,
        };
        *self.write.lock() = WriteState {
            buf: None,
            count: 0,
            busy: false,
        };
        self.read_callback.clear();
        self.write_callback.clear();
        self.errors.clear();

        self.regs
            .modify_con(|con| con | UartCon::ON | UartCon::TXEN | UartCon::RXEN);
        pinfo!("uart: transfer mode");
        Ok(())
    }

    /// Changes frame format and baud rate. Rejected with
    /// [`DriverError::Busy`] while a transfer is outstanding.
    pub fn serial_setup(&self, setup: &SerialSetup, src_clock_hz: u32) -> Result<(), DriverError> {
        if self.read_is_busy() || self.write_is_busy() {
            return Err(DriverError::Busy);
        }
        super::apply_serial_setup(&self.regs, setup, src_clock_hz)
    }

    /// Starts receiving into `buf`.
    ///
    /// Stale faults and the bytes that caused them are discarded first.
    /// The read callback fires when `buf` is full or a receive fault ends
    /// the transfer early.
    pub fn read(&self, buf: &'a mut [u8]) -> SubmitResult<&'a mut [u8]> {
        if buf.is_empty() {
            return Err(Rejected::new(DriverError::InvalidArgument, buf));
        }

        let mut state = self.read.lock();
        if state.busy {
            return Err(Rejected::new(DriverError::Busy, buf));
        }

        super::clear_errors(&self.regs);
        *state = ReadState {
            buf: Some(buf),
            count: 0,
            busy: true,
        };
        self.errors.clear();
        self.regs.set_irq_enabled(UartIrq::ERROR | UartIrq::RX, true);
        Ok(())
    }

    /// Starts transmitting `buf`.
    ///
    /// As much as fits is pushed into the FIFO right away; the TX interrupt
    /// sends the rest and fires the write callback.
    pub fn write(&self, buf: &'a [u8]) -> SubmitResult<&'a [u8]> {
        if buf.is_empty() {
            return Err(Rejected::new(DriverError::InvalidArgument, buf));
        }

        let mut state = self.write.lock();
        if state.busy {
            return Err(Rejected::new(DriverError::Busy, buf));
        }

        let mut count = 0;
        while count < buf.len() && !self.regs.stat().contains(UartStat::TXBF) {
            self.regs.write_tx(buf[count]);
            count += 1;
        }
        *state = WriteState {
            buf: Some(buf),
            count,
            busy: true,
        };
        self.regs.set_irq_enabled(UartIrq::TX, true);
        Ok(())
    }

    /// Returns `true` while a read is outstanding.
    pub fn read_is_busy(&self) -> bool {
        self.read.lock().busy
    }

    /// Returns `true` while a write is outstanding.
    pub fn write_is_busy(&self) -> bool {
        self.write.lock().busy
    }

    /// Returns the number of bytes received into the current read buffer.
    pub fn read_count(&self) -> usize {
        self.read.lock().count
    }

    /// Returns the number of bytes of the current write buffer handed to the
    /// hardware.
    pub fn write_count(&self) -> usize {
        self.write.lock().count
    }

    /// Abandons the outstanding read, if any. No callback fires and the
    /// received count is reset; read it first if it matters.
    pub fn read_abort(&self) {
        let mut state = self.read.lock();
        if state.busy {
            self.regs.set_irq_enabled(UartIrq::ERROR | UartIrq::RX, false);
            state.busy = false;
            state.count = 0;
        }
    }

    /// Returns the last read buffer once no read is outstanding.
    pub fn take_read(&self) -> Option<&'a mut [u8]> {
        let mut state = self.read.lock();
        if state.busy { None } else { state.buf.take() }
    }

    /// Returns the last write buffer once no write is outstanding.
    pub fn take_write(&self) -> Option<&'a [u8]> {
        let mut state = self.write.lock();
        if state.busy { None } else { state.buf.take() }
    }

    /// Registers the read completion callback. `None` clears it.
    pub fn register_read_callback(&self, callback: Option<Callback>, context: usize) {
        self.read_callback.register(callback, context);
    }

    /// Registers the write completion callback. `None` clears it.
    pub fn register_write_callback(&self, callback: Option<Callback>, context: usize) {
        self.write_callback.register(callback, context);
    }

    /// Returns the latched receive faults and clears the latch.
    pub fn take_error(&self) -> UartError {
        self.errors.take()
    }

    /// Returns `true` while auto-baud detection is running.
    pub fn auto_baud_query(&self) -> bool {
        super::auto_baud_active(&self.regs)
    }

    /// Starts auto-baud detection. `false` is ignored.
    pub fn set_auto_baud(&self, enable: bool) {
        super::set_auto_baud(&self.regs, enable);
    }

    /// Returns `true` once the last byte has left the shift register.
    pub fn transmit_complete(&self) -> bool {
        super::transmit_complete(&self.regs)
    }

    // -----------------------------------------------------------------------
    // Interrupt handlers
    // -----------------------------------------------------------------------

    /// RX interrupt: fills the read buffer from the FIFO.
    pub fn handle_rx_interrupt(&self) {
        let done = {
            let mut state = self.read.lock();
            if !state.busy {
                self.regs.clear_irq_pending(UartIrq::RX);
                return;
            }

            let ReadState { buf, count, .. } = &mut *state;
            let len = buf.as_deref().map_or(0, <[u8]>::len);
            while *count < len && !self.regs.stat().contains(UartStat::RXBE) {
                let byte = self.regs.read_rx();
                if let Some(buf) = buf.as_deref_mut() {
                    buf[*count] = byte;
                }
                *count += 1;
            }
            self.regs.clear_irq_pending(UartIrq::RX);

            let done = *count >= len;
            if done {
                state.busy = false;
                self.regs.set_irq_enabled(UartIrq::ERROR | UartIrq::RX, false);
            }
            done
        };

        if done {
            self.read_callback.invoke();
        }
    }

    /// TX interrupt: refills the FIFO from the write buffer.
    pub fn handle_tx_interrupt(&self) {
        let done = {
            let mut state = self.write.lock();
            if !state.busy {
                return;
            }

            self.regs.clear_irq_pending(UartIrq::TX);
            let WriteState { buf, count, .. } = &mut *state;
            let data = buf.unwrap_or(&[]);
            while *count < data.len() && !self.regs.stat().contains(UartStat::TXBF) {
                self.regs.write_tx(data[*count]);
                *count += 1;
            }

            let done = *count >= data.len();
            if done {
                state.busy = false;
                self.regs.set_irq_enabled(UartIrq::TX, false);
            }
            done
        };

        if done {
            self.write_callback.invoke();
        }
    }

    /// Error interrupt: latches the fault, ends the read and fires the read
    /// callback. The bytes received so far stay in the buffer.
    pub fn handle_error_interrupt(&self) {
        let errors = UartError::from_status(self.regs.stat());
        self.errors.latch(errors);

        self.regs.set_irq_enabled(UartIrq::ERROR | UartIrq::RX, false);
        self.read.lock().busy = false;
        super::clear_errors(&self.regs);

        pwarn!("uart: receive fault {:?}, read ended", errors);
        self.read_callback.invoke();
    }
}
