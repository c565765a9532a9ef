//! Memory-mapped UART register block.

use plib_mmio::{IrqBit, register_block};

use super::{UartCon, UartIrq, UartRegisters, UartStat};

register_block! {
    /// UART MMIO register block.
    pub UartRegs {
        /// Control register.
        [0x00; u32; rw] con => UartCon,
        /// Status register.
        [0x04; u32; rw] stat => UartStat,
        /// Baud rate generator.
        [0x08; u32; rw] brg,
        /// Receive buffer (reading pops the FIFO).
        [0x0C; u32; ro] rxb,
        /// Transmit buffer.
        [0x10; u32; wo] txb,
    }
}

/// A UART at a fixed address together with its three interrupt lines.
#[derive(Debug, Clone, Copy)]
pub struct MmioUart {
    regs: UartRegs,
    rx: IrqBit,
    tx: IrqBit,
    error: IrqBit,
}

impl MmioUart {
    /// Creates the accessor.
    ///
    /// # Safety
    ///
    /// `base` must be the address of a UART register block, valid for as
    /// long as the accessor is used.
    #[must_use]
    pub const unsafe fn new(base: usize, rx: IrqBit, tx: IrqBit, error: IrqBit) -> Self {
        Self {
            // SAFETY: Forwarded from the caller.
            regs: unsafe { UartRegs::new(base) },
            rx,
            tx,
            error,
        }
    }

    fn lines(&self, irqs: UartIrq) -> impl Iterator<Item = &IrqBit> {
        [
            (UartIrq::RX, &self.rx),
            (UartIrq::TX, &self.tx),
            (UartIrq::ERROR, &self.error),
        ]
        .into_iter()
        .filter(move |(irq, _)| irqs.contains(*irq))
        .map(|(_, line)| line)
    }
}

impl UartRegisters for MmioUart {
    fn con(&self) -> UartCon {
        self.regs.con()
    }

    fn set_con(&self, value: UartCon) {
        self.regs.set_con(value);
    }

    fn stat(&self) -> UartStat {
        self.regs.stat()
    }

    fn set_stat(&self, value: UartStat) {
        self.regs.set_stat(value);
    }

    fn set_brg(&self, value: u32) {
        self.regs.set_brg(value);
    }

    #[allow(clippy::cast_possible_truncation)]
    fn read_rx(&self) -> u8 {
        // 7- and 8-bit frames: the data sits in the low byte.
        self.regs.rxb() as u8
    }

    fn write_tx(&self, byte: u8) {
        self.regs.set_txb(u32::from(byte));
    }

    fn set_irq_enabled(&self, irqs: UartIrq, enabled: bool) {
        self.lines(irqs).for_each(|line| line.set_enabled(enabled));
    }

    fn irq_enabled(&self, irqs: UartIrq) -> bool {
        self.lines(irqs).all(IrqBit::is_enabled)
    }

    fn clear_irq_pending(&self, irqs: UartIrq) {
        self.lines(irqs).for_each(IrqBit::clear_pending);
    }
}
