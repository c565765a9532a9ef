//! Interrupt line accessor.

use core::ptr;

use plib_core::sync::interrupts::without_interrupts;

/// One peripheral interrupt line in the interrupt controller.
///
/// Each line owns a single bit in an enable register (`IECx`) and the same
/// bit in a flag register (`IFSx`). Other lines share those registers, so
/// updates are read-modify-write with interrupts masked: a handler that
/// changes another line in the same register cannot have its write undone.
#[derive(Debug, Clone, Copy)]
pub struct IrqBit {
    enable: usize,
    flag: usize,
    mask: u32,
}

impl IrqBit {
    /// Creates an accessor for bit `bit` of the given registers.
    ///
    /// # Safety
    ///
    /// `enable` and `flag` must be the addresses of valid, 32-bit aligned
    /// MMIO registers (or memory standing in for them) for as long as the
    /// accessor is used, and `bit` must be below 32.
    #[must_use]
    pub const unsafe fn new(enable: usize, flag: usize, bit: u8) -> Self {
        Self {
            enable,
            flag,
            mask: 1 << bit,
        }
    }

    /// Enables or disables the interrupt line.
    #[inline]
    pub fn set_enabled(&self, enabled: bool) {
        self.update(self.enable, enabled);
    }

    /// Returns `true` if the interrupt line is enabled.
    #[inline]
    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.read(self.enable) & self.mask != 0
    }

    /// Returns `true` if the interrupt is pending.
    #[inline]
    #[must_use]
    pub fn is_pending(&self) -> bool {
        self.read(self.flag) & self.mask != 0
    }

    /// Clears the pending flag.
    #[inline]
    pub fn clear_pending(&self) {
        self.update(self.flag, false);
    }

    #[inline]
    fn read(&self, addr: usize) -> u32 {
        // SAFETY: Caller of `new` guarantees the address is a valid register.
        unsafe { ptr::read_volatile(addr as *const u32) }
    }

    #[inline]
    fn update(&self, addr: usize, set: bool) {
        without_interrupts(|| {
            let value = self.read(addr);
            let value = if set { value | self.mask } else { value & !self.mask };
            // SAFETY: Caller of `new` guarantees the address is a valid register.
            unsafe { ptr::write_volatile(addr as *mut u32, value) }
        });
    }
}
