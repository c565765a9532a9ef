//! Simulated UART.

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;

use crate::uart::{UartCon, UartError, UartIrq, UartRegisters, UartStat};

/// Transmit FIFO depth.
pub const TX_FIFO_DEPTH: usize = 4;

/// Receive FIFO depth.
pub const RX_FIFO_DEPTH: usize = 8;

const ERROR_FLAGS: UartStat = UartStat::RXFOIF.union(UartStat::FERIF).union(UartStat::PERIF);
const WRITABLE: UartStat = UartStat::RXFOIE.union(UartStat::FERIE).union(UartStat::PERIE);

/// A UART whose receive line is fed by the test and whose transmit line
/// is recorded.
#[derive(Default)]
pub struct MockUart {
    con: Cell<u32>,
    stat: Cell<u32>,
    brg: Cell<u32>,
    rx_fifo: RefCell<VecDeque<u8>>,
    tx_fifo: RefCell<VecDeque<u8>>,
    wire: RefCell<Vec<u8>>,
    enabled: Cell<u8>,
    pending: Cell<u8>,
    switched_off: Cell<bool>,
}

impl MockUart {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bytes arrive on the receive line. Bytes past the FIFO depth are lost
    /// and flag an overflow.
    pub fn receive(&self, bytes: &[u8]) {
        let mut fifo = self.rx_fifo.borrow_mut();
        for &b in bytes {
            if fifo.len() < RX_FIFO_DEPTH {
                fifo.push_back(b);
            } else {
                self.raise_error(UartError::OVERRUN);
            }
        }
        if !fifo.is_empty() {
            self.pend(UartIrq::RX);
        }
    }

    /// Flags receive faults and raises the error interrupt.
    pub fn raise_error(&self, errors: UartError) {
        self.stat.set(self.stat.get() | errors.bits());
        self.pend(UartIrq::ERROR);
    }

    /// Moves everything in the transmit FIFO onto the wire and raises the
    /// transmit interrupt.
    pub fn shift_out(&self) {
        let mut fifo = self.tx_fifo.borrow_mut();
        self.wire.borrow_mut().extend(fifo.drain(..));
        self.pend(UartIrq::TX);
    }

    /// Returns everything transmitted so far.
    pub fn wire(&self) -> Vec<u8> {
        self.wire.borrow().clone()
    }

    pub fn rx_fifo_len(&self) -> usize {
        self.rx_fifo.borrow().len()
    }

    pub fn brg(&self) -> u32 {
        self.brg.get()
    }

    /// Returns `true` if `ON` was ever cleared.
    pub fn was_switched_off(&self) -> bool {
        self.switched_off.get()
    }

    pub fn is_enabled(&self, irq: UartIrq) -> bool {
        self.enabled.get() & irq.bits() == irq.bits()
    }

    pub fn is_pending(&self, irq: UartIrq) -> bool {
        self.pending.get() & irq.bits() == irq.bits()
    }

    /// Returns `true` if `irq` is both pending and enabled.
    pub fn fires(&self, irq: UartIrq) -> bool {
        self.is_enabled(irq) && self.is_pending(irq)
    }

    fn pend(&self, irq: UartIrq) {
        self.pending.set(self.pending.get() | irq.bits());
    }
}

impl UartRegisters for MockUart {
    fn con(&self) -> UartCon {
        UartCon::from_bits_retain(self.con.get())
    }

    fn set_con(&self, value: UartCon) {
        if !value.contains(UartCon::ON) {
            self.switched_off.set(true);
        }
        self.con.set(value.bits());
    }

    fn stat(&self) -> UartStat {
        let mut stat = UartStat::from_bits_retain(self.stat.get());
        let rx = self.rx_fifo.borrow().len();
        let tx = self.tx_fifo.borrow().len();
        stat.set(UartStat::RXBE, rx == 0);
        stat.set(UartStat::RXBF, rx == RX_FIFO_DEPTH);
        stat.set(UartStat::TXBE, tx == 0);
        stat.set(UartStat::TXBF, tx >= TX_FIFO_DEPTH);
        stat.set(UartStat::TXMTIF, tx == 0);
        stat
    }

    fn set_stat(&self, value: UartStat) {
        // Fault flags can only be cleared by software.
        let old = UartStat::from_bits_retain(self.stat.get());
        let flags = old & ERROR_FLAGS & value;
        self.stat.set((flags | (value & WRITABLE)).bits());
    }

    fn set_brg(&self, value: u32) {
        self.brg.set(value);
    }

    fn read_rx(&self) -> u8 {
        let mut fifo = self.rx_fifo.borrow_mut();
        let byte = fifo.pop_front().unwrap_or(0);
        if fifo.is_empty() {
            // Framing and parity flags belong to the byte that was popped.
            let stat = UartStat::from_bits_retain(self.stat.get());
            self.stat
                .set((stat - UartStat::FERIF - UartStat::PERIF).bits());
        }
        byte
    }

    fn write_tx(&self, byte: u8) {
        let mut fifo = self.tx_fifo.borrow_mut();
        if fifo.len() < TX_FIFO_DEPTH {
            fifo.push_back(byte);
        }
    }

    fn set_irq_enabled(&self, irqs: UartIrq, enabled: bool) {
        let bits = if enabled {
            self.enabled.get() | irqs.bits()
        } else {
            self.enabled.get() & !irqs.bits()
        };
        self.enabled.set(bits);
    }

    fn irq_enabled(&self, irqs: UartIrq) -> bool {
        self.is_enabled(irqs)
    }

    fn clear_irq_pending(&self, irqs: UartIrq) {
        self.pending.set(self.pending.get() & !irqs.bits());
    }
}
