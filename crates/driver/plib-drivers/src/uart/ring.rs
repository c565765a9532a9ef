//! Ring-buffer UART.
//!
//! Received bytes are moved from the hardware FIFO into a receive ring by
//! the RX interrupt; the application drains it with [`RingUart::read`].
//! Outgoing bytes are queued in a transmit ring with [`RingUart::write`] and
//! fed to the hardware by the TX interrupt, which is only enabled while the
//! ring holds data.
//!
//! Both rings are single-producer/single-consumer: the interrupt handler is
//! the producer of the receive ring and the consumer of the transmit ring,
//! the foreground is the other side. The rings need no lock; enabling the
//! TX interrupt from [`RingUart::write`] is a masked read-modify-write in
//! the register accessor.

use plib_core::callback::{CallbackSlot, EventCallback};
use plib_core::error::DriverError;
use plib_core::latch::ErrorLatch;
use plib_core::notify::ThresholdNotifier;
use plib_core::ringbuf::RingBuf;
use plib_core::{pinfo, pwarn};

use super::{SerialSetup, UartCon, UartError, UartIrq, UartRegisters, UartStat};
use crate::config::{UART_RX_RING_SIZE, UART_TX_RING_SIZE};

/// Event passed to the read and write callbacks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RingEvent {
    /// The receive ring reached the read threshold.
    ReadThresholdReached,
    /// The receive ring is full and a byte is waiting. The callback may
    /// drain the ring; otherwise the byte is dropped.
    ReadBufferFull,
    /// A receive fault was latched; fetch it with [`RingUart::take_error`].
    ReadError,
    /// The free space in the transmit ring reached the write threshold.
    WriteThresholdReached,
}

/// A UART driven through interrupt-fed ring buffers.
///
/// `RX` and `TX` are ring sizes in slots; each ring holds one byte less.
pub struct RingUart<R, const RX: usize = UART_RX_RING_SIZE, const TX: usize = UART_TX_RING_SIZE>
{
    regs: R,
    rx: RingBuf<RX>,
    tx: RingBuf<TX>,
    rx_notify: ThresholdNotifier,
    tx_notify: ThresholdNotifier,
    read_callback: CallbackSlot<EventCallback<RingEvent>>,
    write_callback: CallbackSlot<EventCallback<RingEvent>>,
    errors: ErrorLatch<UartError>,
}

impl<R: UartRegisters, const RX: usize, const TX: usize> RingUart<R, RX, TX> {
    /// Creates the driver. Does not touch hardware.
    pub const fn new(regs: R) -> Self {
        Self {
            regs,
            rx: RingBuf::new(),
            tx: RingBuf::new(),
            rx_notify: ThresholdNotifier::new(),
            tx_notify: ThresholdNotifier::new(),
            read_callback: CallbackSlot::new(),
            write_callback: CallbackSlot::new(),
            errors: ErrorLatch::new(),
        }
    }

    /// Returns the register accessor.
    pub fn registers(&self) -> &R {
        &self.regs
    }

    /// Programs 8N1 at the default baud rate, resets all driver state and
    /// starts reception.
    ///
    /// Must not race the UART's interrupt handlers.
    pub fn initialize(&self) -> Result<(), DriverError> {
        self.regs
            .set_irq_enabled(UartIrq::RX | UartIrq::TX | UartIrq::ERROR, false);
        super::program_defaults(&self.regs)?;

        self.rx.clear();
        self.tx.clear();
        self.rx_notify.reset();
        self.tx_notify.reset();
        self.read_callback.clear();
        self.write_callback.clear();
        self.errors.clear();

        self.regs.set_irq_enabled(UartIrq::ERROR | UartIrq::RX, true);
        self.regs
            .modify_con(|con| con | UartCon::ON | UartCon::TXEN | UartCon::RXEN);
        pinfo!("uart: ring mode, {} byte rx / {} byte tx", RX - 1, TX - 1);
        Ok(())
    }

    /// Stops the UART, disables its interrupts and drops callbacks and
    /// notification settings. Buffered bytes are discarded.
    pub fn deinitialize(&self) {
        self.regs
            .set_irq_enabled(UartIrq::RX | UartIrq::TX | UartIrq::ERROR, false);
        self.regs.modify_con(|con| con - UartCon::ON);
        self.regs
            .clear_irq_pending(UartIrq::RX | UartIrq::TX | UartIrq::ERROR);

        self.rx.clear();
        self.tx.clear();
        self.rx_notify.reset();
        self.tx_notify.reset();
        self.read_callback.clear();
        self.write_callback.clear();
    }

    /// Changes frame format and baud rate. See [`SerialSetup`].
    ///
    /// `src_clock_hz == 0` selects the configured peripheral clock.
    pub fn serial_setup(&self, setup: &SerialSetup, src_clock_hz: u32) -> Result<(), DriverError> {
        super::apply_serial_setup(&self.regs, setup, src_clock_hz)
    }

    // -----------------------------------------------------------------------
    // Receive side
    // -----------------------------------------------------------------------

    /// Copies up to `buf.len()` received bytes into `buf`. Never blocks.
    ///
    /// Returns the number of bytes copied.
    pub fn read(&self, buf: &mut [u8]) -> usize {
        self.rx.read(buf)
    }

    /// Returns the number of received bytes waiting to be read.
    pub fn read_count(&self) -> usize {
        self.rx.len()
    }

    /// Returns the free space in the receive ring.
    pub fn read_free_count(&self) -> usize {
        self.rx.free()
    }

    /// Returns the capacity of the receive ring.
    pub fn read_buffer_size(&self) -> usize {
        self.rx.capacity()
    }

    /// Enables or disables [`RingEvent::ReadThresholdReached`] and selects
    /// persistent or one-shot mode. Returns the previous enabled state.
    pub fn enable_read_notification(&self, enabled: bool, persistent: bool) -> bool {
        self.rx_notify.enable(enabled, persistent)
    }

    /// Sets the number of buffered bytes that triggers a read notification.
    /// Zero is ignored.
    pub fn set_read_threshold(&self, threshold: usize) {
        self.rx_notify.set_threshold(threshold);
    }

    /// Registers the receive-side callback. `None` clears it.
    pub fn register_read_callback(
        &self,
        callback: Option<EventCallback<RingEvent>>,
        context: usize,
    ) {
        self.read_callback.register(callback, context);
    }

    /// Returns the latched receive faults and clears the latch.
    pub fn take_error(&self) -> UartError {
        self.errors.take()
    }

    /// Returns `true` while auto-baud detection is running.
    pub fn auto_baud_query(&self) -> bool {
        super::auto_baud_active(&self.regs)
    }

    /// Starts auto-baud detection. `false` is ignored: the hardware does
    /// not support stopping detection early.
    pub fn set_auto_baud(&self, enable: bool) {
        super::set_auto_baud(&self.regs, enable);
    }

    // -----------------------------------------------------------------------
    // Transmit side
    // -----------------------------------------------------------------------

    /// Queues as much of `buf` as fits in the transmit ring. Never blocks.
    ///
    /// Returns the number of bytes queued, possibly fewer than `buf.len()`.
    pub fn write(&self, buf: &[u8]) -> usize {
        let queued = self.tx.write(buf);
        if !self.tx.is_empty() {
            self.regs.set_irq_enabled(UartIrq::TX, true);
        }
        queued
    }

    /// Returns the number of bytes still waiting to be transmitted.
    pub fn write_count(&self) -> usize {
        self.tx.len()
    }

    /// Returns the free space in the transmit ring.
    pub fn write_free_count(&self) -> usize {
        self.tx.free()
    }

    /// Returns the capacity of the transmit ring.
    pub fn write_buffer_size(&self) -> usize {
        self.tx.capacity()
    }

    /// Enables or disables [`RingEvent::WriteThresholdReached`] and selects
    /// persistent or one-shot mode. Returns the previous enabled state.
    pub fn enable_write_notification(&self, enabled: bool, persistent: bool) -> bool {
        self.tx_notify.enable(enabled, persistent)
    }

    /// Sets the amount of free transmit space that triggers a write
    /// notification. Zero is ignored.
    pub fn set_write_threshold(&self, threshold: usize) {
        self.tx_notify.set_threshold(threshold);
    }

    /// Registers the transmit-side callback. `None` clears it.
    pub fn register_write_callback(
        &self,
        callback: Option<EventCallback<RingEvent>>,
        context: usize,
    ) {
        self.write_callback.register(callback, context);
    }

    /// Returns `true` once the last queued byte has left the shift register.
    pub fn transmit_complete(&self) -> bool {
        super::transmit_complete(&self.regs)
    }

    // -----------------------------------------------------------------------
    // Interrupt handlers
    // -----------------------------------------------------------------------

    /// RX interrupt: moves every byte in the hardware FIFO into the ring.
    pub fn handle_rx_interrupt(&self) {
        while !self.regs.stat().contains(UartStat::RXBE) {
            let byte = self.regs.read_rx();
            self.push_rx(byte);
        }
        self.regs.clear_irq_pending(UartIrq::RX);
    }

    /// TX interrupt: refills the hardware FIFO from the ring and disables
    /// itself once the ring is drained.
    pub fn handle_tx_interrupt(&self) {
        if self.tx.is_empty() {
            self.regs.set_irq_enabled(UartIrq::TX, false);
            return;
        }

        self.regs.clear_irq_pending(UartIrq::TX);
        while !self.regs.stat().contains(UartStat::TXBF) {
            let Some(byte) = self.tx.pop() else {
                self.regs.set_irq_enabled(UartIrq::TX, false);
                break;
            };
            self.regs.write_tx(byte);

            let free = self.tx.free();
            if self.tx_notify.should_fire(free - 1, free) {
                self.write_callback.notify(RingEvent::WriteThresholdReached);
            }
        }
    }

    /// Error interrupt: latches the fault, discards the faulty data and
    /// reports [`RingEvent::ReadError`]. Reception continues afterwards.
    pub fn handle_error_interrupt(&self) {
        let errors = UartError::from_status(self.regs.stat());
        self.errors.latch(errors);

        self.regs.set_irq_enabled(UartIrq::ERROR | UartIrq::RX, false);
        super::clear_errors(&self.regs);
        self.regs.set_irq_enabled(UartIrq::ERROR | UartIrq::RX, true);

        pwarn!("uart: receive fault {:?}", errors);
        self.read_callback.notify(RingEvent::ReadError);
    }

    /// Pushes one received byte, giving the application a chance to make
    /// room first when the ring is full.
    fn push_rx(&self, byte: u8) -> bool {
        if self.rx.is_full() {
            self.read_callback.notify(RingEvent::ReadBufferFull);
        }

        let before = self.rx.len();
        if !self.rx.push(byte) {
            return false;
        }
        if self.rx_notify.should_fire(before, before + 1) {
            self.read_callback.notify(RingEvent::ReadThresholdReached);
        }
        true
    }
}
