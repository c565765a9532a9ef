//! Simulated SPI module, in host or client mode.

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;

use crate::config::SPI_FIFO_DEPTH;
use crate::spi::{BusyLine, SpiCon1, SpiImsk, SpiIrq, SpiRegisters, SpiStat};

/// An SPI module whose bus only moves when the test calls
/// [`MockSpi::clock`] or [`MockSpi::clock_one`] (host mode) or
/// [`MockSpi::host_exchange`] (client mode). Interrupt lines are
/// level-triggered: a line fires while its condition holds and it is
/// enabled.
#[derive(Default)]
pub struct MockSpi {
    con1: Cell<u32>,
    con2: Cell<u32>,
    overflow: Cell<bool>,
    brg: Cell<u32>,
    imsk: Cell<u32>,
    tx_fifo: RefCell<VecDeque<u8>>,
    rx_fifo: RefCell<VecDeque<u8>>,
    miso: RefCell<VecDeque<u8>>,
    mosi: RefCell<Vec<u8>>,
    enabled: Cell<u8>,
}

impl MockSpi {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bytes the device shifts back, in order. Zero once exhausted.
    pub fn queue_miso(&self, bytes: &[u8]) {
        self.miso.borrow_mut().extend(bytes);
    }

    /// Puts bytes straight into the receive FIFO.
    pub fn inject_rx(&self, bytes: &[u8]) {
        self.rx_fifo.borrow_mut().extend(bytes);
    }

    /// Everything the host sent so far.
    pub fn mosi(&self) -> Vec<u8> {
        self.mosi.borrow().clone()
    }

    pub fn brg(&self) -> u32 {
        self.brg.get()
    }

    pub fn con2(&self) -> u32 {
        self.con2.get()
    }

    pub fn overflowed(&self) -> bool {
        self.overflow.get()
    }

    /// Shifts out the whole transmit FIFO, receiving one byte per byte
    /// sent.
    pub fn clock(&self) {
        while self.clock_one() {}
    }

    /// Shifts out one byte and receives its reply. A reply that does not
    /// fit flags an overflow unless `IGNROV` is set. Returns `false` if the
    /// transmit FIFO was empty.
    pub fn clock_one(&self) -> bool {
        let Some(byte) = self.tx_fifo.borrow_mut().pop_front() else {
            return false;
        };
        self.mosi.borrow_mut().push(byte);
        let reply = self.miso.borrow_mut().pop_front().unwrap_or(0);
        self.receive(reply);
        true
    }

    /// The remote host clocks `byte` in and gets the next byte of the
    /// transmit FIFO back, or zero on underrun.
    pub fn host_exchange(&self, byte: u8) -> u8 {
        self.mosi.borrow_mut().push(byte);
        let reply = self.tx_fifo.borrow_mut().pop_front().unwrap_or(0);
        self.receive(byte);
        reply
    }

    /// Bytes waiting in the transmit FIFO.
    pub fn tx_queued(&self) -> usize {
        self.tx_fifo.borrow().len()
    }

    fn receive(&self, byte: u8) {
        let mut rx = self.rx_fifo.borrow_mut();
        if rx.len() < SPI_FIFO_DEPTH {
            rx.push_back(byte);
        } else if !self.con1().contains(SpiCon1::IGNROV) {
            self.overflow.set(true);
        }
    }

    /// Returns `true` if `irq` is enabled and its condition holds.
    pub fn fires(&self, irq: SpiIrq) -> bool {
        if !self.irq_enabled(irq) {
            return false;
        }
        let imsk = self.imsk();
        let rx = self.rx_fifo.borrow().len();
        let tx_empty = self.tx_fifo.borrow().is_empty();
        if irq == SpiIrq::RX {
            let watermark = usize::try_from(imsk.rx_watermark()).unwrap_or(usize::MAX);
            imsk.contains(SpiImsk::RXWIEN) && rx > 0 && rx >= watermark
        } else if irq == SpiIrq::TX {
            imsk.contains(SpiImsk::SPITBEN) && tx_empty
        } else if irq == SpiIrq::ERROR {
            (imsk.contains(SpiImsk::SRMTEN) && tx_empty)
                || (imsk.contains(SpiImsk::SPIROVEN) && self.overflow.get())
        } else {
            false
        }
    }
}

/// A busy output pin.
#[derive(Default)]
pub struct MockBusyLine {
    high: Cell<bool>,
}

impl MockBusyLine {
    pub fn is_high(&self) -> bool {
        self.high.get()
    }
}

impl BusyLine for MockBusyLine {
    fn set_busy(&self, busy: bool) {
        self.high.set(busy);
    }
}

impl SpiRegisters for MockSpi {
    fn con1(&self) -> SpiCon1 {
        SpiCon1::from_bits_retain(self.con1.get())
    }

    fn set_con1(&self, value: SpiCon1) {
        self.con1.set(value.bits());
    }

    fn set_con2(&self, value: u32) {
        self.con2.set(value);
    }

    fn stat(&self) -> SpiStat {
        let rx = self.rx_fifo.borrow().len();
        let tx = self.tx_fifo.borrow().len();
        let mut stat = SpiStat::from_bits_retain(u32::try_from(rx).unwrap_or(0) << 24);
        stat.set(SpiStat::SPIRBF, rx >= SPI_FIFO_DEPTH);
        stat.set(SpiStat::SPIRBE, rx == 0);
        stat.set(SpiStat::SPITBF, tx >= SPI_FIFO_DEPTH);
        stat.set(SpiStat::SPITBE, tx == 0);
        stat.set(SpiStat::SRMT, tx == 0);
        stat.set(SpiStat::SPIROV, self.overflow.get());
        stat
    }

    fn set_stat(&self, value: SpiStat) {
        // Overflow can only be cleared.
        if !value.contains(SpiStat::SPIROV) {
            self.overflow.set(false);
        }
    }

    fn set_brg(&self, value: u32) {
        self.brg.set(value);
    }

    fn imsk(&self) -> SpiImsk {
        SpiImsk::from_bits_retain(self.imsk.get())
    }

    fn set_imsk(&self, value: SpiImsk) {
        self.imsk.set(value.bits());
    }

    fn read_buf(&self) -> u8 {
        self.rx_fifo.borrow_mut().pop_front().unwrap_or(0)
    }

    fn write_buf(&self, byte: u8) {
        let mut fifo = self.tx_fifo.borrow_mut();
        if fifo.len() < SPI_FIFO_DEPTH {
            fifo.push_back(byte);
        }
    }

    fn set_irq_enabled(&self, irqs: SpiIrq, enabled: bool) {
        let bits = if enabled {
            self.enabled.get() | irqs.bits()
        } else {
            self.enabled.get() & !irqs.bits()
        };
        self.enabled.set(bits);
    }

    fn irq_enabled(&self, irqs: SpiIrq) -> bool {
        self.enabled.get() & irqs.bits() == irqs.bits()
    }

    fn clear_irq_pending(&self, _irqs: SpiIrq) {}
}
