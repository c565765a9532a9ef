//! I2C client mode.

use plib_core::callback::CallbackSlot;
use plib_core::error::DriverError;
use plib_core::latch::ErrorLatch;
use plib_core::{pdebug, pinfo, pwarn};

use super::{I2cCon, I2cError, I2cIntc, I2cIrq, I2cRegisters, I2cStat};

/// Bus events reported to the client callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum I2cClientEvent {
    /// The host addressed this client. Returning `false` NACKs the address.
    AddressMatch,
    /// A data byte arrived; fetch it with [`I2cClient::read_byte`].
    /// Returning `false` NACKs it.
    RxReady,
    /// The host wants a byte; load it with [`I2cClient::write_byte`].
    TxReady,
    /// The host ended the transfer.
    StopBitReceived,
    /// A fault was latched; read it with [`I2cClient::take_error`].
    Error,
}

/// Client callback. The return value acknowledges (`true`) or rejects
/// (`false`) the address or byte behind `AddressMatch` and `RxReady`; it is
/// ignored for the other events.
pub type I2cClientCallback = fn(event: I2cClientEvent, context: usize) -> bool;

/// Direction of the current transfer, seen from the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferDirection {
    /// The host writes to this client.
    Write,
    /// The host reads from this client.
    Read,
}

/// How the host answered the last byte this client sent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AckStatus {
    /// The host wants another byte.
    Ack,
    /// The host is done reading.
    Nack,
}

/// An interrupt-driven I2C client answering at one address.
pub struct I2cClient<R> {
    regs: R,
    address: u16,
    callback: CallbackSlot<I2cClientCallback>,
    errors: ErrorLatch<I2cError>,
}

impl<R: I2cRegisters> I2cClient<R> {
    /// Creates a client for `address` (7-bit below `0x80`, otherwise
    /// 10-bit). Does not touch hardware.
    pub const fn new(regs: R, address: u16) -> Self {
        Self {
            regs,
            address,
            callback: CallbackSlot::new(),
            errors: ErrorLatch::new(),
        }
    }

    /// Returns the register accessor.
    pub fn registers(&self) -> &R {
        &self.regs
    }

    /// Programs the client address, routes client events to the event
    /// interrupt and switches the module on.
    pub fn initialize(&self) -> Result<(), DriverError> {
        if self.address > 0x3FF {
            return Err(DriverError::InvalidArgument);
        }

        let mut con = I2cCon::PCIE | I2cCon::SCIE | I2cCon::SCLREL;
        con.set(I2cCon::A10M, self.address > 0x7F);

        self.regs.set_irq_enabled(I2cIrq::EVENT | I2cIrq::ERROR, false);
        self.regs.set_con(con);
        self.regs.set_intc(I2cIntc::CLIENT_EVENTS);
        self.regs.set_address(self.address);
        self.regs.set_address_mask(0);
        self.regs.clear_irq_pending(I2cIrq::EVENT | I2cIrq::ERROR);
        self.errors.clear();
        self.regs.set_irq_enabled(I2cIrq::EVENT | I2cIrq::ERROR, true);
        self.regs.modify_con(|con| con | I2cCon::ON);
        pinfo!("i2c: client at {:#x}", self.address);
        Ok(())
    }

    /// Switches the module off and restores register reset values.
    pub fn deinitialize(&self) {
        self.regs.modify_con(|con| con - I2cCon::ON);
        self.regs.set_irq_enabled(I2cIrq::EVENT | I2cIrq::ERROR, false);
        self.regs.clear_irq_pending(I2cIrq::EVENT | I2cIrq::ERROR);
        self.regs.set_con(I2cCon::SCLREL);
        self.regs.set_intc(I2cIntc::empty());
        self.regs.set_address(0);
        self.regs.set_address_mask(0);
        self.callback.clear();
    }

    /// Registers the event callback. `None` clears it.
    pub fn register_callback(&self, callback: Option<I2cClientCallback>, context: usize) {
        self.callback.register(callback, context);
    }

    /// Returns `true` while the bus is between a start and a stop.
    pub fn is_busy(&self) -> bool {
        self.regs.stat().contains(I2cStat::S)
    }

    /// Returns the byte the host wrote last.
    pub fn read_byte(&self) -> u8 {
        self.regs.read_rcv()
    }

    /// Loads `byte` for the host to read. Returns `false` without writing if
    /// the previous byte has not been clocked out yet.
    pub fn write_byte(&self, byte: u8) -> bool {
        if self.regs.stat().contains(I2cStat::TBF) {
            return false;
        }
        self.regs.write_trn(byte);
        true
    }

    /// Returns the direction of the transfer in progress.
    pub fn transfer_dir(&self) -> TransferDirection {
        if self.regs.stat().contains(I2cStat::R_W) {
            TransferDirection::Read
        } else {
            TransferDirection::Write
        }
    }

    /// Returns the host's answer to the last byte sent.
    pub fn last_byte_ack_status(&self) -> AckStatus {
        if self.regs.stat().contains(I2cStat::ACKSTAT) {
            AckStatus::Nack
        } else {
            AckStatus::Ack
        }
    }

    /// Returns and clears the latched faults.
    pub fn take_error(&self) -> I2cError {
        self.errors.take()
    }

    fn notify(&self, event: I2cClientEvent) -> Option<bool> {
        self.callback.with(|callback, context| callback(event, context))
    }

    /// Drives the ACK bit for the byte being received. Without a callback
    /// the previous setting stands.
    fn acknowledge(&self, ack: Option<bool>) {
        if let Some(ack) = ack {
            self.regs.modify_con(|mut con| {
                con.set(I2cCon::ACKDT, !ack);
                con
            });
        }
    }

    // -----------------------------------------------------------------------
    // Interrupt handlers
    // -----------------------------------------------------------------------

    /// Event interrupt: classifies the bus event from the status register,
    /// reports it, and releases the clock.
    pub fn handle_interrupt(&self) {
        self.regs.clear_irq_pending(I2cIrq::EVENT);
        let stat = self.regs.stat();

        if stat.contains(I2cStat::I2COV) {
            self.regs.set_stat(stat - I2cStat::I2COV);
            let _ = self.regs.read_rcv();
            self.errors.latch(I2cError::OVERFLOW);
            pwarn!("i2c: client receive overflow");
            self.notify(I2cClientEvent::Error);
        } else if stat.contains(I2cStat::P) {
            self.notify(I2cClientEvent::StopBitReceived);
        } else if !stat.contains(I2cStat::D_A) {
            if stat.contains(I2cStat::RBF) {
                let _ = self.regs.read_rcv();
                let ack = self.notify(I2cClientEvent::AddressMatch);
                if ack == Some(true)
                    && stat.contains(I2cStat::R_W)
                    && !stat.contains(I2cStat::TBF)
                {
                    self.notify(I2cClientEvent::TxReady);
                }
                if ack == Some(false) {
                    pdebug!("i2c: client address refused");
                }
                self.acknowledge(ack);
            }
        } else if stat.contains(I2cStat::R_W) {
            if !stat.intersects(I2cStat::TBF | I2cStat::ACKSTAT) {
                self.notify(I2cClientEvent::TxReady);
            }
        } else if stat.contains(I2cStat::RBF) {
            let ack = self.notify(I2cClientEvent::RxReady);
            self.acknowledge(ack);
        }

        self.regs.modify_con(|con| con | I2cCon::SCLREL);
    }

    /// Error interrupt: latches a bus collision and reports it.
    pub fn handle_error_interrupt(&self) {
        let stat = self.regs.stat();
        if stat.contains(I2cStat::BCL) {
            self.regs.set_stat(stat - I2cStat::BCL);
            self.errors.latch(I2cError::BUS_COLLISION);
            pwarn!("i2c: client bus collision");
        }
        self.regs.clear_irq_pending(I2cIrq::ERROR);
        self.notify(I2cClientEvent::Error);
    }
}
