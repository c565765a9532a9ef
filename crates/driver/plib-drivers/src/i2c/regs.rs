//! Memory-mapped I2C register block.

use plib_mmio::{IrqBit, register_block};

use super::{I2cCon, I2cIntc, I2cIrq, I2cRegisters, I2cStat};

register_block! {
    /// I2C MMIO register block.
    pub I2cRegs {
        /// Control register.
        [0x00; u32; rw] con1 => I2cCon,
        /// Status register.
        [0x04; u32; rw] stat1 => I2cStat,
        /// Transmit register.
        [0x08; u32; wo] trn,
        /// Receive register.
        [0x0C; u32; ro] rcv,
        /// Baud rate generator, SCL high time.
        [0x10; u32; rw] hbrg,
        /// Baud rate generator, SCL low time.
        [0x14; u32; rw] lbrg,
        /// Interrupt control.
        [0x18; u32; rw] intc => I2cIntc,
        /// Client address.
        [0x1C; u32; rw] add,
        /// Client address mask: set bits are ignored when matching.
        [0x20; u32; rw] msk,
    }
}

/// An I2C module at a fixed address with its event and error interrupts.
#[derive(Debug, Clone, Copy)]
pub struct MmioI2c {
    regs: I2cRegs,
    event: IrqBit,
    error: IrqBit,
}

impl MmioI2c {
    /// Creates the accessor.
    ///
    /// # Safety
    ///
    /// `base` must be the address of an I2C register block, valid for as
    /// long as the accessor is used.
    #[must_use]
    pub const unsafe fn new(base: usize, event: IrqBit, error: IrqBit) -> Self {
        Self {
            // SAFETY: Forwarded from the caller.
            regs: unsafe { I2cRegs::new(base) },
            event,
            error,
        }
    }

    fn lines(&self, irqs: I2cIrq) -> impl Iterator<Item = &IrqBit> {
        [(I2cIrq::EVENT, &self.event), (I2cIrq::ERROR, &self.error)]
            .into_iter()
            .filter(move |(irq, _)| irqs.contains(*irq))
            .map(|(_, line)| line)
    }
}

impl I2cRegisters for MmioI2c {
    fn con(&self) -> I2cCon {
        self.regs.con1()
    }

    fn set_con(&self, value: I2cCon) {
        self.regs.set_con1(value);
    }

    fn stat(&self) -> I2cStat {
        self.regs.stat1()
    }

    fn set_stat(&self, value: I2cStat) {
        self.regs.set_stat1(value);
    }

    fn write_trn(&self, byte: u8) {
        self.regs.set_trn(u32::from(byte));
    }

    #[allow(clippy::cast_possible_truncation)]
    fn read_rcv(&self) -> u8 {
        self.regs.rcv() as u8
    }

    fn set_baud(&self, value: u32) {
        self.regs.set_hbrg(value);
        self.regs.set_lbrg(value);
    }

    fn set_intc(&self, value: I2cIntc) {
        self.regs.set_intc(value);
    }

    fn set_address(&self, address: u16) {
        self.regs.set_add(u32::from(address));
    }

    fn set_address_mask(&self, mask: u16) {
        self.regs.set_msk(u32::from(mask));
    }

    fn set_irq_enabled(&self, irqs: I2cIrq, enabled: bool) {
        self.lines(irqs).for_each(|line| line.set_enabled(enabled));
    }

    fn irq_enabled(&self, irqs: I2cIrq) -> bool {
        self.lines(irqs).all(IrqBit::is_enabled)
    }

    fn clear_irq_pending(&self, irqs: I2cIrq) {
        self.lines(irqs).for_each(IrqBit::clear_pending);
    }
}
