//! I2C host transfer state machine.

use plib_core::callback::{Callback, CallbackSlot};
use plib_core::error::DriverError;
use plib_core::latch::ErrorLatch;
use plib_core::sync::IrqSpinLock;
use plib_core::{pdebug, pinfo, pwarn};

use super::{I2cCon, I2cError, I2cIntc, I2cIrq, I2cRegisters, I2cStat, I2cTransferSetup};
use crate::buffers::{Rejected, SubmitResult, TransferBuffers};

/// Highest 10-bit device address.
const MAX_ADDRESS: u16 = 0x3FF;

/// Highest 7-bit device address; anything above uses 10-bit addressing.
const MAX_7BIT_ADDRESS: u16 = 0x7F;

/// Where the transfer stands. Each variant names the bus event the next
/// event interrupt reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Idle,
    /// Start or restart done: send the (first) address byte.
    AddrByte1Send,
    /// 10-bit header acknowledged: send the low address byte.
    AddrByte2Send,
    /// 10-bit low byte acknowledged: issue the restart for the read header.
    Read10BitMode,
    /// Restart done: send the 10-bit read header.
    AddrByte1Send10BitOnly,
    Write,
    /// Read address acknowledged: start receiving.
    Read,
    ReadByte,
    WaitAckComplete,
    WaitStopComplete,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Direction {
    Write,
    Read,
}

struct Transfer<'a> {
    state: State,
    address: u16,
    direction: Direction,
    write: Option<&'a [u8]>,
    write_count: usize,
    read: Option<&'a mut [u8]>,
    read_count: usize,
}

impl Transfer<'_> {
    const fn idle() -> Self {
        Self {
            state: State::Idle,
            address: 0,
            direction: Direction::Write,
            write: None,
            write_count: 0,
            read: None,
            read_count: 0,
        }
    }

    fn read_len(&self) -> usize {
        self.read.as_deref().map_or(0, <[u8]>::len)
    }

    fn write_len(&self) -> usize {
        self.write.map_or(0, <[u8]>::len)
    }

    fn is_ten_bit(&self) -> bool {
        self.address > MAX_7BIT_ADDRESS
    }

    /// Upper two bits of a 10-bit address, shifted into header position.
    #[allow(clippy::cast_possible_truncation)]
    fn header_bits(&self) -> u8 {
        ((self.address >> 8) as u8 & 0b11) << 1
    }
}

/// An interrupt-driven I2C host.
pub struct I2cHost<'a, R> {
    regs: R,
    transfer: IrqSpinLock<Transfer<'a>>,
    callback: CallbackSlot<Callback>,
    errors: ErrorLatch<I2cError>,
}

impl<'a, R: I2cRegisters> I2cHost<'a, R> {
    /// Creates the driver. Does not touch hardware.
    pub const fn new(regs: R) -> Self {
        Self {
            regs,
            transfer: IrqSpinLock::new(Transfer::idle()),
            callback: CallbackSlot::new(),
            errors: ErrorLatch::new(),
        }
    }

    /// Returns the register accessor.
    pub fn registers(&self) -> &R {
        &self.regs
    }

    /// Programs the default bus clock, routes every bus event to the host
    /// interrupt and switches the module on.
    pub fn initialize(&self) -> Result<(), DriverError> {
        let baud = super::baud_value(
            plib_core::config::PERIPHERAL_CLOCK_HZ,
            crate::config::I2C_DEFAULT_CLOCK_HZ,
        )?;

        self.regs.set_irq_enabled(I2cIrq::EVENT | I2cIrq::ERROR, false);
        self.regs.set_baud(baud);
        self.regs.set_con(I2cCon::SCLREL | I2cCon::DISSLW);
        self.regs.set_intc(I2cIntc::HOST_EVENTS);
        self.regs.clear_irq_pending(I2cIrq::EVENT | I2cIrq::ERROR);
        self.regs.modify_con(|con| con | I2cCon::ON);

        *self.transfer.lock() = Transfer::idle();
        self.callback.clear();
        self.errors.clear();
        pinfo!("i2c: host mode, brg {:#x}", baud);
        Ok(())
    }

    /// Switches the module off and restores register reset values.
    pub fn deinitialize(&self) {
        self.regs.set_irq_enabled(I2cIrq::EVENT | I2cIrq::ERROR, false);
        self.regs.modify_con(|con| con - I2cCon::ON);
        self.regs.clear_irq_pending(I2cIrq::EVENT | I2cIrq::ERROR);
        self.regs.set_con(I2cCon::SCLREL);
        self.regs.set_intc(I2cIntc::empty());
        self.regs.set_baud(0);

        *self.transfer.lock() = Transfer::idle();
        self.callback.clear();
    }

    /// Registers the completion callback. `None` clears it.
    pub fn register_callback(&self, callback: Option<Callback>, context: usize) {
        self.callback.register(callback, context);
    }

    /// Returns `true` while a transfer is running, the hardware is still
    /// executing a bus sequence, or the bus is in use.
    pub fn is_busy(&self) -> bool {
        let con = self.regs.con();
        let stat = self.regs.stat();
        self.transfer.lock().state != State::Idle
            || con.intersects(I2cCon::SEQUENCES)
            || stat.intersects(I2cStat::TRSTAT | I2cStat::S)
    }

    /// Reads `buf.len()` bytes from `address`.
    pub fn read(&self, address: u16, buf: &'a mut [u8]) -> SubmitResult<TransferBuffers<'a>> {
        self.start(
            address,
            TransferBuffers {
                write: None,
                read: Some(buf),
            },
        )
    }

    /// Writes `data` to `address`. An empty `data` only addresses the
    /// device; the ACK or NACK tells whether it is present.
    pub fn write(&self, address: u16, data: &'a [u8]) -> SubmitResult<TransferBuffers<'a>> {
        self.start(
            address,
            TransferBuffers {
                write: Some(data),
                read: None,
            },
        )
    }

    /// Writes `data` to `address`, then reads `buf.len()` bytes after a
    /// repeated start.
    pub fn write_read(
        &self,
        address: u16,
        data: &'a [u8],
        buf: &'a mut [u8],
    ) -> SubmitResult<TransferBuffers<'a>> {
        self.start(
            address,
            TransferBuffers {
                write: Some(data),
                read: Some(buf),
            },
        )
    }

    /// Starts a transfer. A read buffer, when present, must not be empty.
    fn start(
        &self,
        address: u16,
        buffers: TransferBuffers<'a>,
    ) -> SubmitResult<TransferBuffers<'a>> {
        let empty_read = buffers.read.as_deref().is_some_and(<[u8]>::is_empty);
        if address > MAX_ADDRESS || empty_read {
            return Err(Rejected::new(DriverError::InvalidArgument, buffers));
        }

        let mut transfer = self.transfer.lock();
        if transfer.state != State::Idle || self.regs.stat().contains(I2cStat::S) {
            return Err(Rejected::new(DriverError::Busy, buffers));
        }

        let TransferBuffers { write, read } = buffers;
        *transfer = Transfer {
            state: State::AddrByte1Send,
            address,
            direction: if write.is_some() {
                Direction::Write
            } else {
                Direction::Read
            },
            write,
            write_count: 0,
            read,
            read_count: 0,
        };
        self.errors.clear();

        self.regs.modify_con(|con| con | I2cCon::SEN);
        self.regs.set_irq_enabled(I2cIrq::EVENT | I2cIrq::ERROR, true);
        Ok(())
    }

    /// Returns the fault that ended the last transfer and clears it.
    pub fn take_error(&self) -> I2cError {
        self.errors.take()
    }

    /// Changes the bus clock. `src_clock_hz == 0` selects the configured
    /// peripheral clock.
    ///
    /// Slew-rate control is enabled only for 400 kHz.
    pub fn transfer_setup(
        &self,
        setup: &I2cTransferSetup,
        src_clock_hz: u32,
    ) -> Result<(), DriverError> {
        let src = if src_clock_hz == 0 {
            plib_core::config::PERIPHERAL_CLOCK_HZ
        } else {
            src_clock_hz
        };
        let baud = super::baud_value(src, setup.clock_hz)?;

        if self.transfer.lock().state != State::Idle {
            return Err(DriverError::Busy);
        }

        self.regs.set_baud(baud);
        self.regs.modify_con(|mut con| {
            con.set(I2cCon::DISSLW, setup.clock_hz != 400_000);
            con
        });
        pdebug!("i2c: {} Hz from {} Hz, brg {:#x}", setup.clock_hz, src, baud);
        Ok(())
    }

    /// Abandons the running transfer without a callback and resets the
    /// module. Clears any latched fault.
    pub fn abort(&self) {
        let mut transfer = self.transfer.lock();
        self.errors.clear();
        transfer.state = State::Idle;
        self.regs.set_irq_enabled(I2cIrq::EVENT | I2cIrq::ERROR, false);

        self.regs.modify_con(|con| con - I2cCon::ON);
        core::hint::spin_loop();
        self.regs.modify_con(|con| con | I2cCon::ON);
    }

    /// Returns the buffers of the last transfer once the host is idle.
    pub fn take_buffers(&self) -> Option<TransferBuffers<'a>> {
        let mut transfer = self.transfer.lock();
        if transfer.state != State::Idle {
            return None;
        }
        Some(TransferBuffers {
            write: transfer.write.take(),
            read: transfer.read.take(),
        })
    }

    // -----------------------------------------------------------------------
    // Interrupt handlers
    // -----------------------------------------------------------------------

    /// Host interrupt: advances the transfer by one bus event.
    pub fn handle_interrupt(&self) {
        self.regs.clear_irq_pending(I2cIrq::EVENT);

        let done = {
            let mut transfer = self.transfer.lock();
            self.step(&mut transfer)
        };

        if done {
            self.callback.invoke();
        }
    }

    /// Runs one state machine step. Returns `true` when the transfer has
    /// just finished.
    fn step(&self, t: &mut Transfer<'a>) -> bool {
        let stat = self.regs.stat();
        let nacked = stat.contains(I2cStat::ACKSTAT);
        let tx_free = !stat.contains(I2cStat::TBF);

        match t.state {
            State::Idle => {}

            State::AddrByte1Send => {
                if tx_free {
                    if t.is_ten_bit() {
                        self.regs.write_trn(0xF0 | t.header_bits());
                        t.state = State::AddrByte2Send;
                    } else {
                        #[allow(clippy::cast_possible_truncation)]
                        let addr = (t.address as u8) << 1;
                        let rw = u8::from(t.direction == Direction::Read);
                        self.regs.write_trn(addr | rw);
                        t.state = match t.direction {
                            Direction::Write => State::Write,
                            Direction::Read => State::Read,
                        };
                    }
                }
            }

            State::AddrByte2Send => {
                if nacked {
                    self.nack(t);
                } else if tx_free {
                    #[allow(clippy::cast_possible_truncation)]
                    let low = t.address as u8;
                    self.regs.write_trn(low);
                    t.state = match t.direction {
                        Direction::Write => State::Write,
                        Direction::Read => State::Read10BitMode,
                    };
                }
            }

            State::Read10BitMode => {
                if nacked {
                    self.nack(t);
                } else {
                    self.regs.modify_con(|con| con | I2cCon::RSEN);
                    t.state = State::AddrByte1Send10BitOnly;
                }
            }

            State::AddrByte1Send10BitOnly => {
                if tx_free {
                    self.regs.write_trn(0xF1 | t.header_bits());
                    t.state = State::Read;
                }
            }

            State::Write => {
                if nacked {
                    self.nack(t);
                } else if t.write_count < t.write_len() {
                    if tx_free {
                        if let Some(data) = t.write {
                            self.regs.write_trn(data[t.write_count]);
                        }
                        t.write_count += 1;
                    }
                } else if t.read_count < t.read_len() {
                    self.regs.modify_con(|con| con | I2cCon::RSEN);
                    t.direction = Direction::Read;
                    t.state = if t.is_ten_bit() {
                        State::AddrByte1Send10BitOnly
                    } else {
                        State::AddrByte1Send
                    };
                } else {
                    self.stop(t);
                }
            }

            State::Read => {
                if nacked {
                    self.nack(t);
                } else {
                    self.regs.modify_con(|con| con | I2cCon::RCEN);
                    t.state = State::ReadByte;
                }
            }

            State::ReadByte => {
                if stat.contains(I2cStat::RBF) {
                    let byte = self.regs.read_rcv();
                    let len = t.read_len();
                    if let Some(buf) = t.read.as_deref_mut() {
                        buf[t.read_count] = byte;
                    }
                    t.read_count += 1;

                    // NACK the last byte so the device releases the bus.
                    let last = t.read_count == len;
                    self.regs.modify_con(|mut con| {
                        con.set(I2cCon::ACKDT, last);
                        con | I2cCon::ACKEN
                    });
                    t.state = State::WaitAckComplete;
                }
            }

            State::WaitAckComplete => {
                if t.read_count < t.read_len() {
                    self.regs.modify_con(|con| con | I2cCon::RCEN);
                    t.state = State::ReadByte;
                } else {
                    self.stop(t);
                }
            }

            State::WaitStopComplete => {
                t.state = State::Idle;
                self.regs.set_irq_enabled(I2cIrq::EVENT | I2cIrq::ERROR, false);
                return true;
            }
        }
        false
    }

    fn stop(&self, t: &mut Transfer<'a>) {
        self.regs.modify_con(|con| con | I2cCon::PEN);
        t.state = State::WaitStopComplete;
    }

    fn nack(&self, t: &mut Transfer<'a>) {
        self.errors.latch(I2cError::NACK);
        pdebug!("i2c: {:#x} not acknowledged", t.address);
        self.stop(t);
    }

    /// Error interrupt: a bus collision ends the transfer immediately. The
    /// callback runs either way so the application can inspect the fault.
    pub fn handle_error_interrupt(&self) {
        self.regs.clear_irq_pending(I2cIrq::ERROR);

        let stat = self.regs.stat();
        if stat.contains(I2cStat::BCL) {
            self.regs.set_stat(stat - I2cStat::BCL);
            self.transfer.lock().state = State::Idle;
            self.regs.set_irq_enabled(I2cIrq::EVENT | I2cIrq::ERROR, false);
            self.errors.latch(I2cError::BUS_COLLISION);
            pwarn!("i2c: bus collision");
        }

        self.callback.invoke();
    }
}
