//! Simulated I2C module: a host with one device on the bus, or a client
//! driven by a remote host.

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;

use crate::i2c::{I2cCon, I2cIntc, I2cIrq, I2cRegisters, I2cStat};

/// What the simulated bus saw, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BusEvent {
    Start,
    Restart,
    Stop,
    /// Byte driven by the host.
    Write(u8),
    /// Byte driven by the device.
    Read(u8),
    /// Host acknowledged a received byte.
    Ack,
    /// Host did not acknowledge a received byte.
    Nack,
}

/// How the device interprets the next byte the host sends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Address,
    TenBitLow,
    Data,
}

/// An I2C module whose bus sequences complete as soon as they are
/// requested, each raising the event interrupt.
///
/// In client mode the test plays the remote host with the `host_*`
/// methods; each one updates the status register the way the hardware
/// would and raises the event interrupt.
pub struct MockI2c {
    device: u16,
    client: bool,
    address: Cell<u16>,
    mask: Cell<u16>,
    trn: Cell<u8>,
    con: Cell<u32>,
    stat: Cell<u32>,
    rcv: Cell<u8>,
    baud: Cell<u32>,
    intc: Cell<u32>,
    enabled: Cell<u8>,
    pending: Cell<u8>,
    cycled: Cell<bool>,
    phase: Cell<Phase>,
    /// The 10-bit device matched the last header/low byte pair.
    selected: Cell<bool>,
    read_data: RefCell<VecDeque<u8>>,
    bus: RefCell<Vec<BusEvent>>,
}

impl MockI2c {
    /// A bus with a device answering at `device` (7-bit when below 0x80).
    pub fn with_device(device: u16) -> Self {
        Self {
            device,
            client: false,
            address: Cell::new(0),
            mask: Cell::new(0),
            trn: Cell::new(0),
            con: Cell::new(0),
            stat: Cell::new(0),
            rcv: Cell::new(0),
            baud: Cell::new(0),
            intc: Cell::new(0),
            enabled: Cell::new(0),
            pending: Cell::new(0),
            cycled: Cell::new(false),
            phase: Cell::new(Phase::Data),
            selected: Cell::new(false),
            read_data: RefCell::new(VecDeque::new()),
            bus: RefCell::new(Vec::new()),
        }
    }

    /// A module in client mode.
    pub fn client() -> Self {
        Self {
            client: true,
            ..Self::with_device(0)
        }
    }

    /// Bytes the device returns to reads, in order.
    pub fn queue_read(&self, bytes: &[u8]) {
        self.read_data.borrow_mut().extend(bytes);
    }

    pub fn bus(&self) -> Vec<BusEvent> {
        self.bus.borrow().clone()
    }

    pub fn baud(&self) -> u32 {
        self.baud.get()
    }

    pub fn intc(&self) -> I2cIntc {
        I2cIntc::from_bits_retain(self.intc.get())
    }

    /// Returns `true` if the module was ever switched off while on.
    pub fn was_cycled(&self) -> bool {
        self.cycled.get()
    }

    pub fn address(&self) -> u16 {
        self.address.get()
    }

    pub fn address_mask(&self) -> u16 {
        self.mask.get()
    }

    /// The remote host sends a start and the client's 7-bit address.
    #[allow(clippy::cast_possible_truncation)]
    pub fn host_addresses(&self, read: bool) {
        self.log(BusEvent::Start);
        self.set_stat_bits(I2cStat::S, true);
        self.set_stat_bits(I2cStat::P | I2cStat::ACKSTAT | I2cStat::D_A, false);
        self.set_stat_bits(I2cStat::R_W, read);
        self.receive(((self.address.get() as u8) << 1) | u8::from(read));
    }

    /// The remote host writes a data byte.
    pub fn host_writes(&self, byte: u8) {
        self.log(BusEvent::Write(byte));
        self.set_stat_bits(I2cStat::D_A, true);
        self.receive(byte);
    }

    /// The remote host clocks out the byte loaded in the transmit register
    /// and answers with ACK or NACK. Returns `None` if nothing was loaded.
    pub fn host_reads(&self, ack: bool) -> Option<u8> {
        if !self.stat().contains(I2cStat::TBF) {
            return None;
        }
        let byte = self.trn.get();
        self.log(BusEvent::Read(byte));
        self.log(if ack { BusEvent::Ack } else { BusEvent::Nack });
        self.set_stat_bits(I2cStat::TBF, false);
        self.set_stat_bits(I2cStat::D_A, true);
        self.set_stat_bits(I2cStat::ACKSTAT, !ack);
        self.pend(I2cIrq::EVENT);
        Some(byte)
    }

    /// The remote host ends the transfer.
    pub fn host_stops(&self) {
        self.log(BusEvent::Stop);
        self.set_stat_bits(I2cStat::S, false);
        self.set_stat_bits(I2cStat::P, true);
        self.pend(I2cIrq::EVENT);
    }

    fn receive(&self, byte: u8) {
        if self.stat().contains(I2cStat::RBF) {
            self.set_stat_bits(I2cStat::I2COV, true);
        } else {
            self.rcv.set(byte);
            self.set_stat_bits(I2cStat::RBF, true);
        }
        self.pend(I2cIrq::EVENT);
    }

    /// Another host wins arbitration.
    pub fn collide(&self) {
        self.set_stat_bits(I2cStat::BCL, true);
        self.pend(I2cIrq::ERROR);
    }

    /// Returns `true` if `irq` is both pending and enabled.
    pub fn fires(&self, irq: I2cIrq) -> bool {
        self.enabled.get() & self.pending.get() & irq.bits() == irq.bits()
    }

    fn pend(&self, irq: I2cIrq) {
        self.pending.set(self.pending.get() | irq.bits());
    }

    fn log(&self, event: BusEvent) {
        self.bus.borrow_mut().push(event);
    }

    fn set_stat_bits(&self, bits: I2cStat, value: bool) {
        let mut stat = I2cStat::from_bits_retain(self.stat.get());
        stat.set(bits, value);
        self.stat.set(stat.bits());
    }

    fn is_ten_bit(&self) -> bool {
        self.device > 0x7F
    }

    #[allow(clippy::cast_possible_truncation)]
    fn header(&self) -> u8 {
        0xF0 | (((self.device >> 8) as u8 & 0b11) << 1)
    }

    /// Decides whether the device acknowledges `byte`.
    #[allow(clippy::cast_possible_truncation)]
    fn acknowledges(&self, byte: u8) -> bool {
        match self.phase.get() {
            Phase::Address if byte & 0xF8 == 0xF0 => {
                let write_header = byte & 1 == 0;
                let matches = self.is_ten_bit() && byte & 0xFE == self.header();
                if write_header {
                    self.selected.set(false);
                    self.phase.set(Phase::TenBitLow);
                    matches
                } else {
                    self.phase.set(Phase::Data);
                    matches && self.selected.get()
                }
            }
            Phase::Address => {
                self.phase.set(Phase::Data);
                !self.is_ten_bit() && u16::from(byte >> 1) == self.device
            }
            Phase::TenBitLow => {
                self.phase.set(Phase::Data);
                let matches = byte == self.device as u8;
                self.selected.set(matches);
                matches
            }
            Phase::Data => true,
        }
    }

    fn start_sequences(&self, requested: I2cCon, ackdt: bool) {
        if requested.contains(I2cCon::SEN) {
            self.log(BusEvent::Start);
            self.set_stat_bits(I2cStat::S, true);
            self.set_stat_bits(I2cStat::P, false);
            self.phase.set(Phase::Address);
            self.pend(I2cIrq::EVENT);
        }
        if requested.contains(I2cCon::RSEN) {
            self.log(BusEvent::Restart);
            self.phase.set(Phase::Address);
            self.pend(I2cIrq::EVENT);
        }
        if requested.contains(I2cCon::RCEN) {
            let byte = self.read_data.borrow_mut().pop_front().unwrap_or(0xFF);
            self.log(BusEvent::Read(byte));
            self.rcv.set(byte);
            self.set_stat_bits(I2cStat::RBF, true);
            self.pend(I2cIrq::EVENT);
        }
        if requested.contains(I2cCon::ACKEN) {
            self.log(if ackdt { BusEvent::Nack } else { BusEvent::Ack });
            self.pend(I2cIrq::EVENT);
        }
        if requested.contains(I2cCon::PEN) {
            self.log(BusEvent::Stop);
            self.set_stat_bits(I2cStat::S, false);
            self.set_stat_bits(I2cStat::P, true);
            self.pend(I2cIrq::EVENT);
        }
    }
}

impl I2cRegisters for MockI2c {
    fn con(&self) -> I2cCon {
        I2cCon::from_bits_retain(self.con.get())
    }

    fn set_con(&self, value: I2cCon) {
        if self.con().contains(I2cCon::ON) && !value.contains(I2cCon::ON) {
            self.cycled.set(true);
        }
        // Sequence bits clear themselves once the sequence completes.
        self.con.set((value - I2cCon::SEQUENCES).bits());
        self.start_sequences(value & I2cCon::SEQUENCES, value.contains(I2cCon::ACKDT));
    }

    fn stat(&self) -> I2cStat {
        I2cStat::from_bits_retain(self.stat.get())
    }

    fn set_stat(&self, value: I2cStat) {
        // Only the collision and overflow flags are software-clearable.
        for flag in [I2cStat::BCL, I2cStat::I2COV] {
            if !value.contains(flag) {
                self.set_stat_bits(flag, false);
            }
        }
    }

    fn write_trn(&self, byte: u8) {
        if self.client {
            self.trn.set(byte);
            self.set_stat_bits(I2cStat::TBF, true);
            return;
        }
        self.log(BusEvent::Write(byte));
        let ack = self.acknowledges(byte);
        self.set_stat_bits(I2cStat::ACKSTAT, !ack);
        self.pend(I2cIrq::EVENT);
    }

    fn read_rcv(&self) -> u8 {
        self.set_stat_bits(I2cStat::RBF, false);
        self.rcv.get()
    }

    fn set_baud(&self, value: u32) {
        self.baud.set(value);
    }

    fn set_intc(&self, value: I2cIntc) {
        self.intc.set(value.bits());
    }

    fn set_address(&self, address: u16) {
        self.address.set(address);
    }

    fn set_address_mask(&self, mask: u16) {
        self.mask.set(mask);
    }

    fn set_irq_enabled(&self, irqs: I2cIrq, enabled: bool) {
        let bits = if enabled {
            self.enabled.get() | irqs.bits()
        } else {
            self.enabled.get() & !irqs.bits()
        };
        self.enabled.set(bits);
    }

    fn irq_enabled(&self, irqs: I2cIrq) -> bool {
        self.enabled.get() & irqs.bits() == irqs.bits()
    }

    fn clear_irq_pending(&self, irqs: I2cIrq) {
        self.pending.set(self.pending.get() & !irqs.bits());
    }
}
