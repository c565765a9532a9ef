//! SPI host transfers.

use plib_core::callback::{Callback, CallbackSlot};
use plib_core::error::DriverError;
use plib_core::sync::IrqSpinLock;
use plib_core::{pdebug, pinfo};

use super::{DataBits, SpiCon1, SpiImsk, SpiIrq, SpiRegisters, SpiStat, SpiTransferSetup};
use crate::buffers::{Rejected, SubmitResult, TransferBuffers};
use crate::config::{SPI_DUMMY_BYTE, SPI_FIFO_DEPTH};

struct Transfer<'a> {
    write: Option<&'a [u8]>,
    read: Option<&'a mut [u8]>,
    tx_count: usize,
    rx_count: usize,
    /// Padding bytes still to be clocked out after the write data.
    dummy: usize,
    busy: bool,
}

impl Transfer<'_> {
    const fn idle() -> Self {
        Self {
            write: None,
            read: None,
            tx_count: 0,
            rx_count: 0,
            dummy: 0,
            busy: false,
        }
    }

    fn tx_len(&self) -> usize {
        self.write.map_or(0, <[u8]>::len)
    }

    fn rx_len(&self) -> usize {
        self.read.as_deref().map_or(0, <[u8]>::len)
    }

    fn tx_done(&self) -> bool {
        self.tx_count >= self.tx_len()
    }

    /// Receive watermark for the bytes still expected.
    #[allow(clippy::cast_possible_truncation)]
    fn watermark(&self) -> u32 {
        (self.rx_len() - self.rx_count).min(SPI_FIFO_DEPTH) as u32
    }
}

/// An interrupt-driven SPI host.
pub struct SpiHost<'a, R> {
    regs: R,
    transfer: IrqSpinLock<Transfer<'a>>,
    callback: CallbackSlot<Callback>,
}

impl<'a, R: SpiRegisters> SpiHost<'a, R> {
    /// Creates the driver. Does not touch hardware.
    pub const fn new(regs: R) -> Self {
        Self {
            regs,
            transfer: IrqSpinLock::new(Transfer::idle()),
            callback: CallbackSlot::new(),
        }
    }

    /// Returns the register accessor.
    pub fn registers(&self) -> &R {
        &self.regs
    }

    /// Resets the module and starts it in host mode with the default
    /// [`SpiTransferSetup`].
    pub fn initialize(&self) -> Result<(), DriverError> {
        let setup = SpiTransferSetup::default();
        let brg = super::brg_value(plib_core::config::PERIPHERAL_CLOCK_HZ, setup.clock_hz)?;

        self.regs
            .set_irq_enabled(SpiIrq::RX | SpiIrq::TX | SpiIrq::ERROR, false);
        self.regs.set_con1(SpiCon1::empty());
        self.regs
            .clear_irq_pending(SpiIrq::RX | SpiIrq::TX | SpiIrq::ERROR);
        self.regs.set_brg(brg);
        self.regs
            .set_con1(SpiCon1::MSTEN | SpiCon1::ENHBUF | setup.con1_bits());

        *self.transfer.lock() = Transfer::idle();
        self.callback.clear();

        self.regs.modify_con1(|con| con | SpiCon1::ON);
        pinfo!("spi: host mode, brg {:#x}", brg);
        Ok(())
    }

    /// Stops the module and restores register reset values.
    pub fn deinitialize(&self) {
        self.regs
            .set_irq_enabled(SpiIrq::RX | SpiIrq::TX | SpiIrq::ERROR, false);
        self.regs.modify_con1(|con| con - SpiCon1::ON);
        self.regs
            .clear_irq_pending(SpiIrq::RX | SpiIrq::TX | SpiIrq::ERROR);
        self.regs.set_con1(SpiCon1::empty());
        self.regs.set_con2(0);
        self.regs.set_brg(0);
        self.regs.set_imsk(SpiImsk::empty());
        self.regs.set_stat(SpiStat::SPITBE | SpiStat::SPIRBE);

        *self.transfer.lock() = Transfer::idle();
        self.callback.clear();
    }

    /// Changes clock rate, clock mode and word size. `src_clock_hz == 0`
    /// selects the configured peripheral clock.
    pub fn transfer_setup(
        &self,
        setup: &SpiTransferSetup,
        src_clock_hz: u32,
    ) -> Result<(), DriverError> {
        if setup.data_bits != DataBits::Eight {
            return Err(DriverError::Unsupported);
        }
        let src = if src_clock_hz == 0 {
            plib_core::config::PERIPHERAL_CLOCK_HZ
        } else {
            src_clock_hz
        };
        let brg = super::brg_value(src, setup.clock_hz)?;

        if self.transfer.lock().busy {
            return Err(DriverError::Busy);
        }

        self.regs.modify_con1(|con| con - SpiCon1::ON);
        self.regs.set_brg(brg);
        self.regs.modify_con1(|con| {
            let cleared = con - SpiCon1::MODE16 - SpiCon1::MODE32 - SpiCon1::CKP - SpiCon1::CKE;
            cleared | setup.con1_bits()
        });
        self.regs.modify_con1(|con| con | SpiCon1::ON);
        pdebug!("spi: {} Hz from {} Hz, brg {:#x}", setup.clock_hz, src, brg);
        Ok(())
    }

    /// Sends `data`, discarding what comes back.
    pub fn write(&self, data: &'a [u8]) -> SubmitResult<TransferBuffers<'a>> {
        self.start(TransferBuffers {
            write: Some(data),
            read: None,
        })
    }

    /// Receives `buf.len()` bytes, clocking out dummy bytes.
    pub fn read(&self, buf: &'a mut [u8]) -> SubmitResult<TransferBuffers<'a>> {
        self.start(TransferBuffers {
            write: None,
            read: Some(buf),
        })
    }

    /// Sends `data` while receiving into `buf`. The shorter side ends early:
    /// extra received bytes are discarded, missing transmit bytes are
    /// padded with dummies.
    pub fn write_read(
        &self,
        data: &'a [u8],
        buf: &'a mut [u8],
    ) -> SubmitResult<TransferBuffers<'a>> {
        self.start(TransferBuffers {
            write: Some(data),
            read: Some(buf),
        })
    }

    fn start(&self, buffers: TransferBuffers<'a>) -> SubmitResult<TransferBuffers<'a>> {
        let mut t = self.transfer.lock();
        if t.busy {
            return Err(Rejected::new(DriverError::Busy, buffers));
        }

        let nothing_to_move = buffers.write.is_none_or(<[u8]>::is_empty)
            && buffers.read.as_deref().is_none_or(<[u8]>::is_empty);
        if nothing_to_move {
            return Err(Rejected::new(DriverError::InvalidArgument, buffers));
        }

        let TransferBuffers { write, read } = buffers;
        *t = Transfer {
            write,
            read,
            tx_count: 0,
            rx_count: 0,
            dummy: 0,
            busy: true,
        };
        t.dummy = t.rx_len().saturating_sub(t.tx_len());

        // Start from an empty receive side.
        self.regs.set_stat(self.regs.stat() - SpiStat::SPIROV);
        self.flush_rx();

        // Reception finishing first would overflow the receive FIFO with the
        // rest of the write data.
        let ignore_overflow = t.tx_len() > t.rx_len();
        self.regs.modify_con1(|mut con| {
            con.set(SpiCon1::IGNROV, ignore_overflow);
            con
        });

        self.regs
            .set_irq_enabled(SpiIrq::RX | SpiIrq::TX | SpiIrq::ERROR, false);
        self.regs
            .clear_irq_pending(SpiIrq::RX | SpiIrq::TX | SpiIrq::ERROR);
        self.regs.modify_imsk(|imsk| {
            (imsk - SpiImsk::SRMTEN | SpiImsk::RXWIEN | SpiImsk::SPITBEN).with_rx_watermark(1)
        });

        self.fill_fifo(&mut t);

        if t.rx_len() > 0 {
            let watermark = t.watermark();
            self.regs
                .modify_imsk(|imsk| imsk.with_rx_watermark(watermark));
            self.regs.set_irq_enabled(SpiIrq::RX, true);
        } else if !t.tx_done() {
            self.regs.set_irq_enabled(SpiIrq::TX, true);
        } else {
            self.arm_shift_empty();
        }
        Ok(())
    }

    /// Returns `true` while a transfer is running or the last byte is still
    /// being shifted out.
    pub fn is_busy(&self) -> bool {
        self.transfer.lock().busy || self.is_transmitter_busy()
    }

    /// Returns `true` while the shift register holds data.
    pub fn is_transmitter_busy(&self) -> bool {
        !self.regs.stat().contains(SpiStat::SRMT)
    }

    /// Registers the completion callback. `None` clears it.
    pub fn register_callback(&self, callback: Option<Callback>, context: usize) {
        self.callback.register(callback, context);
    }

    /// Returns the buffers of the last transfer once it has completed.
    pub fn take_buffers(&self) -> Option<TransferBuffers<'a>> {
        let mut t = self.transfer.lock();
        if t.busy {
            return None;
        }
        Some(TransferBuffers {
            write: t.write.take(),
            read: t.read.take(),
        })
    }

    /// Queues up to a FIFO's worth of write data, then dummy bytes.
    fn fill_fifo(&self, t: &mut Transfer<'a>) {
        for _ in 0..SPI_FIFO_DEPTH {
            if self.regs.stat().contains(SpiStat::SPITBF) {
                break;
            }
            if let Some(&byte) = t.write.and_then(|data| data.get(t.tx_count)) {
                self.regs.write_buf(byte);
                t.tx_count += 1;
            } else if t.dummy > 0 {
                self.regs.write_buf(SPI_DUMMY_BYTE);
                t.dummy -= 1;
            } else {
                break;
            }
        }
    }

    /// Moves completion detection to the shift-register-empty interrupt.
    fn arm_shift_empty(&self) {
        self.regs
            .modify_imsk(|imsk| imsk - SpiImsk::SPITBEN | SpiImsk::SRMTEN);
        self.regs.set_irq_enabled(SpiIrq::TX, false);
        self.regs.set_irq_enabled(SpiIrq::ERROR, true);
    }

    /// Discards everything in the receive FIFO.
    fn flush_rx(&self) {
        while !self.regs.stat().contains(SpiStat::SPIRBE) {
            let _ = self.regs.read_buf();
        }
    }

    /// Ends the transfer, dropping replies to surplus write data. The caller
    /// invokes the callback after releasing the lock.
    fn finish(&self, t: &mut Transfer<'a>) {
        self.flush_rx();
        self.regs.set_stat(self.regs.stat() - SpiStat::SPIROV);
        self.regs
            .set_irq_enabled(SpiIrq::RX | SpiIrq::TX | SpiIrq::ERROR, false);
        t.busy = false;
    }

    // -----------------------------------------------------------------------
    // Interrupt handlers
    // -----------------------------------------------------------------------

    /// RX interrupt: drains the receive FIFO and keeps the transmit FIFO
    /// topped up.
    pub fn handle_rx_interrupt(&self) {
        let done = {
            let mut t = self.transfer.lock();
            let mut done = false;

            if t.busy && self.regs.stat().rx_elements() != 0 {
                let rx_len = t.rx_len();
                while !self.regs.stat().contains(SpiStat::SPIRBE) {
                    let byte = self.regs.read_buf();
                    if t.rx_count >= rx_len {
                        // Clocked in alongside surplus write data.
                        continue;
                    }
                    let index = t.rx_count;
                    if let Some(buf) = t.read.as_deref_mut() {
                        buf[index] = byte;
                    }
                    t.rx_count += 1;
                }

                if t.rx_count < rx_len {
                    self.fill_fifo(&mut t);
                    let watermark = t.watermark();
                    self.regs
                        .modify_imsk(|imsk| imsk.with_rx_watermark(watermark));
                } else if t.tx_len() > rx_len {
                    // Write data past the read length may still be queued or
                    // shifting; completion waits for the shift register.
                    self.regs.set_irq_enabled(SpiIrq::RX, false);
                    if t.tx_done() {
                        self.arm_shift_empty();
                    } else {
                        self.regs.modify_imsk(|imsk| imsk | SpiImsk::SPITBEN);
                        self.regs.set_irq_enabled(SpiIrq::TX, true);
                    }
                } else {
                    // Every byte sent has been answered.
                    self.finish(&mut t);
                    done = true;
                }
            }

            self.regs.clear_irq_pending(SpiIrq::RX);
            done
        };

        if done {
            self.callback.invoke();
        }
    }

    /// TX interrupt: sends the remaining write data, then hands completion
    /// detection to the error interrupt.
    pub fn handle_tx_interrupt(&self) {
        {
            let mut t = self.transfer.lock();
            if t.busy && self.regs.stat().contains(SpiStat::SPITBE) {
                let tx_len = t.tx_len();
                while t.tx_count < tx_len && !self.regs.stat().contains(SpiStat::SPITBF) {
                    if let Some(data) = t.write {
                        self.regs.write_buf(data[t.tx_count]);
                    }
                    t.tx_count += 1;
                }
                if t.tx_done() {
                    self.arm_shift_empty();
                }
            }
        }
        self.regs.clear_irq_pending(SpiIrq::TX);
    }

    /// Error interrupt: completes a transfer once the last byte has left
    /// the shift register.
    pub fn handle_error_interrupt(&self) {
        let done = {
            let mut t = self.transfer.lock();
            let finished =
                t.busy && t.tx_done() && self.regs.stat().contains(SpiStat::SRMT);
            if finished {
                self.regs.modify_imsk(|imsk| imsk - SpiImsk::SRMTEN);
                self.finish(&mut t);
            }
            finished
        };
        self.regs.clear_irq_pending(SpiIrq::ERROR);

        if done {
            self.callback.invoke();
        }
    }
}
