//! SPI client mode.
//!
//! The host frames each exchange with chip select. The client's data flows
//! through two internal buffers:
//!
//! - the read buffer collects every byte clocked in while chip select is
//!   asserted; bytes past its capacity are dropped,
//! - the write buffer holds the reply staged with [`SpiClient::write`],
//!   fed to the transmit FIFO from the TX interrupt.
//!
//! Chip select is an ordinary GPIO interrupt. The board forwards its edges
//! to [`SpiClient::handle_chip_select`]. On release the receive FIFO is
//! drained before the callback runs, so the callback always sees the whole
//! window. The optional busy output tells the host when the client is
//! ready for the next exchange.

use plib_core::callback::{Callback, CallbackSlot};
use plib_core::latch::ErrorLatch;
use plib_core::sync::IrqSpinLock;
use plib_core::{pdebug, pinfo, pwarn};

use super::{SpiCon1, SpiError, SpiImsk, SpiIrq, SpiRegisters, SpiStat};
use crate::config::{SPI_CLIENT_READ_BUFFER_SIZE, SPI_CLIENT_WRITE_BUFFER_SIZE};

/// Output pin that signals "busy" to the host.
pub trait BusyLine {
    /// Drives the pin: high while `busy`.
    fn set_busy(&self, busy: bool);
}

/// No busy pin.
impl BusyLine for () {
    fn set_busy(&self, _busy: bool) {}
}

struct State {
    read: [u8; SPI_CLIENT_READ_BUFFER_SIZE],
    write: [u8; SPI_CLIENT_WRITE_BUFFER_SIZE],
    read_len: usize,
    write_len: usize,
    write_pos: usize,
    busy: bool,
}

impl State {
    const fn new() -> Self {
        Self {
            read: [0; SPI_CLIENT_READ_BUFFER_SIZE],
            write: [0; SPI_CLIENT_WRITE_BUFFER_SIZE],
            read_len: 0,
            write_len: 0,
            write_pos: 0,
            busy: false,
        }
    }
}

/// An interrupt-driven SPI client with internal buffers.
pub struct SpiClient<R, P = ()> {
    regs: R,
    busy_line: P,
    state: IrqSpinLock<State>,
    callback: CallbackSlot<Callback>,
    errors: ErrorLatch<SpiError>,
}

impl<R: SpiRegisters, P: BusyLine> SpiClient<R, P> {
    /// Creates the driver. Does not touch hardware.
    pub const fn new(regs: R, busy_line: P) -> Self {
        Self {
            regs,
            busy_line,
            state: IrqSpinLock::new(State::new()),
            callback: CallbackSlot::new(),
            errors: ErrorLatch::new(),
        }
    }

    /// Returns the register accessor.
    pub fn registers(&self) -> &R {
        &self.regs
    }

    /// Returns the busy output.
    pub fn busy_line(&self) -> &P {
        &self.busy_line
    }

    /// Resets the module and starts it in client mode with chip select
    /// enabled. Reception and overflow detection are armed; transmission
    /// starts with the first [`write`](Self::write).
    pub fn initialize(&self) {
        self.regs
            .set_irq_enabled(SpiIrq::RX | SpiIrq::TX | SpiIrq::ERROR, false);
        self.regs.set_con1(SpiCon1::empty());
        self.regs
            .clear_irq_pending(SpiIrq::RX | SpiIrq::TX | SpiIrq::ERROR);
        self.regs.set_con1(SpiCon1::SSEN | SpiCon1::ENHBUF);
        self.regs.set_imsk(
            (SpiImsk::SPIROVEN | SpiImsk::RXWIEN | SpiImsk::SPITBEN).with_rx_watermark(1),
        );

        *self.state.lock() = State::new();
        self.callback.clear();
        self.errors.clear();
        self.busy_line.set_busy(false);

        self.regs.set_irq_enabled(SpiIrq::RX | SpiIrq::ERROR, true);
        self.regs.modify_con1(|con| con | SpiCon1::ON);
        pinfo!("spi: client mode");
    }

    /// Stops the module and restores register reset values.
    pub fn deinitialize(&self) {
        self.regs
            .set_irq_enabled(SpiIrq::RX | SpiIrq::TX | SpiIrq::ERROR, false);
        self.regs.modify_con1(|con| con - SpiCon1::ON);
        self.regs
            .clear_irq_pending(SpiIrq::RX | SpiIrq::TX | SpiIrq::ERROR);
        self.regs.set_con1(SpiCon1::empty());
        self.regs.set_imsk(SpiImsk::empty());
        self.regs.set_stat(SpiStat::SPITBE | SpiStat::SPIRBE);

        *self.state.lock() = State::new();
        self.callback.clear();
    }

    /// Copies up to `buf.len()` received bytes into `buf` and returns how
    /// many were copied.
    pub fn read(&self, buf: &mut [u8]) -> usize {
        let s = self.state.lock();
        let count = buf.len().min(s.read_len);
        buf[..count].copy_from_slice(&s.read[..count]);
        count
    }

    /// Stages `data` as the reply to the host's next exchange and returns
    /// how many bytes fit the write buffer.
    pub fn write(&self, data: &[u8]) -> usize {
        self.regs.set_irq_enabled(SpiIrq::TX, false);

        let mut s = self.state.lock();
        let count = data.len().min(SPI_CLIENT_WRITE_BUFFER_SIZE);
        s.write[..count].copy_from_slice(&data[..count]);
        s.write_len = count;
        s.write_pos = 0;
        self.fill_fifo(&mut s);

        if s.write_pos < s.write_len {
            self.regs.set_irq_enabled(SpiIrq::TX, true);
        }
        if count < data.len() {
            pdebug!("spi: client reply cut to {} bytes", count);
        }
        count
    }

    /// Returns how many bytes the current window has received.
    pub fn read_count(&self) -> usize {
        self.state.lock().read_len
    }

    /// Returns the read buffer capacity.
    #[allow(clippy::unused_self)]
    pub const fn read_buffer_size(&self) -> usize {
        SPI_CLIENT_READ_BUFFER_SIZE
    }

    /// Returns the write buffer capacity.
    #[allow(clippy::unused_self)]
    pub const fn write_buffer_size(&self) -> usize {
        SPI_CLIENT_WRITE_BUFFER_SIZE
    }

    /// Registers the callback run when chip select is released. `None`
    /// clears it.
    pub fn register_callback(&self, callback: Option<Callback>, context: usize) {
        self.callback.register(callback, context);
    }

    /// Returns `true` while chip select is asserted.
    pub fn is_busy(&self) -> bool {
        self.state.lock().busy
    }

    /// Drives the busy output low: the client can take another exchange.
    pub fn ready(&self) {
        self.busy_line.set_busy(false);
    }

    /// Returns and clears the latched faults.
    pub fn take_error(&self) -> SpiError {
        self.errors.take()
    }

    fn fill_fifo(&self, s: &mut State) {
        while s.write_pos < s.write_len && !self.regs.stat().contains(SpiStat::SPITBF) {
            self.regs.write_buf(s.write[s.write_pos]);
            s.write_pos += 1;
        }
    }

    fn drain_rx(&self, s: &mut State) {
        while !self.regs.stat().contains(SpiStat::SPIRBE) {
            let byte = self.regs.read_buf();
            if let Some(slot) = s.read.get_mut(s.read_len) {
                *slot = byte;
                s.read_len += 1;
            }
        }
    }

    // -----------------------------------------------------------------------
    // Interrupt handlers
    // -----------------------------------------------------------------------

    /// Chip select edge. Assertion starts a window and raises the busy
    /// output; release ends it and runs the callback, after which the read
    /// buffer starts over.
    pub fn handle_chip_select(&self, asserted: bool) {
        if asserted {
            self.state.lock().busy = true;
            self.busy_line.set_busy(true);
            return;
        }

        {
            let mut s = self.state.lock();
            self.drain_rx(&mut s);
            s.busy = false;
            s.write_len = 0;
            s.write_pos = 0;
        }
        self.regs.set_irq_enabled(SpiIrq::TX, false);
        self.regs.clear_irq_pending(SpiIrq::RX);

        self.callback.invoke();
        self.state.lock().read_len = 0;
    }

    /// RX interrupt: moves the receive FIFO into the read buffer.
    pub fn handle_rx_interrupt(&self) {
        self.drain_rx(&mut self.state.lock());
        self.regs.clear_irq_pending(SpiIrq::RX);
    }

    /// TX interrupt: tops up the transmit FIFO from the write buffer.
    pub fn handle_tx_interrupt(&self) {
        let mut s = self.state.lock();
        self.fill_fifo(&mut s);
        if s.write_pos >= s.write_len {
            self.regs.set_irq_enabled(SpiIrq::TX, false);
        }
        self.regs.clear_irq_pending(SpiIrq::TX);
    }

    /// Error interrupt: latches and clears a receive overflow.
    pub fn handle_error_interrupt(&self) {
        let stat = self.regs.stat();
        if stat.contains(SpiStat::SPIROV) {
            self.errors.latch(SpiError::OVERFLOW);
            self.regs.set_stat(stat - SpiStat::SPIROV);
            pwarn!("spi: client receive overflow");
        }
        self.regs.clear_irq_pending(SpiIrq::ERROR);
    }
}
