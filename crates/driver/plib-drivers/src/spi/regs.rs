//! Memory-mapped SPI register block.

use plib_mmio::{IrqBit, register_block};

use super::{SpiCon1, SpiImsk, SpiIrq, SpiRegisters, SpiStat};

register_block! {
    /// SPI MMIO register block.
    pub SpiRegs {
        /// Control register 1.
        [0x00; u32; rw] con1 => SpiCon1,
        /// Control register 2 (framed and audio modes, unused).
        [0x04; u32; rw] con2,
        /// Status register.
        [0x08; u32; rw] stat => SpiStat,
        /// Data buffer: writes push the transmit FIFO, reads pop the receive
        /// FIFO.
        [0x0C; u32; rw] buf,
        /// Baud rate generator.
        [0x10; u32; rw] brg,
        /// Interrupt mask.
        [0x14; u32; rw] imsk => SpiImsk,
    }
}

/// An SPI module at a fixed address with its three interrupt lines.
#[derive(Debug, Clone, Copy)]
pub struct MmioSpi {
    regs: SpiRegs,
    rx: IrqBit,
    tx: IrqBit,
    error: IrqBit,
}

impl MmioSpi {
    /// Creates the accessor.
    ///
    /// # Safety
    ///
    /// `base` must be the address of an SPI register block, valid for as
    /// long as the accessor is used.
    #[must_use]
    pub const unsafe fn new(base: usize, rx: IrqBit, tx: IrqBit, error: IrqBit) -> Self {
        Self {
            // SAFETY: Forwarded from the caller.
            regs: unsafe { SpiRegs::new(base) },
            rx,
            tx,
            error,
        }
    }

    fn lines(&self, irqs: SpiIrq) -> impl Iterator<Item = &IrqBit> {
        [
            (SpiIrq::RX, &self.rx),
            (SpiIrq::TX, &self.tx),
            (SpiIrq::ERROR, &self.error),
        ]
        .into_iter()
        .filter(move |(irq, _)| irqs.contains(*irq))
        .map(|(_, line)| line)
    }
}

impl SpiRegisters for MmioSpi {
    fn con1(&self) -> SpiCon1 {
        self.regs.con1()
    }

    fn set_con1(&self, value: SpiCon1) {
        self.regs.set_con1(value);
    }

    fn set_con2(&self, value: u32) {
        self.regs.set_con2(value);
    }

    fn stat(&self) -> SpiStat {
        self.regs.stat()
    }

    fn set_stat(&self, value: SpiStat) {
        self.regs.set_stat(value);
    }

    fn set_brg(&self, value: u32) {
        self.regs.set_brg(value);
    }

    fn imsk(&self) -> SpiImsk {
        self.regs.imsk()
    }

    fn set_imsk(&self, value: SpiImsk) {
        self.regs.set_imsk(value);
    }

    #[allow(clippy::cast_possible_truncation)]
    fn read_buf(&self) -> u8 {
        self.regs.buf() as u8
    }

    fn write_buf(&self, byte: u8) {
        self.regs.set_buf(u32::from(byte));
    }

    fn set_irq_enabled(&self, irqs: SpiIrq, enabled: bool) {
        self.lines(irqs).for_each(|line| line.set_enabled(enabled));
    }

    fn irq_enabled(&self, irqs: SpiIrq) -> bool {
        self.lines(irqs).all(IrqBit::is_enabled)
    }

    fn clear_irq_pending(&self, irqs: SpiIrq) {
        self.lines(irqs).for_each(IrqBit::clear_pending);
    }
}
