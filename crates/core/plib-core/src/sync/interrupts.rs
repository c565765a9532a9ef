//! Interrupt masking on the running core.
//!
//! Cortex-M uses `PRIMASK`, RISC-V uses `mstatus.MIE`. Hosted builds have
//! no interrupts; under `cargo test` a per-thread flag stands in for the
//! mask so the save/restore protocol can be exercised.

/// Executes `f` with interrupts masked, restoring the previous mask state
/// afterwards. Nests: an inner call leaves interrupts masked on return.
#[inline]
pub fn without_interrupts<F, R>(f: F) -> R
where
    F: FnOnce() -> R,
{
    let saved = save_and_mask();
    let result = f();
    restore(saved);
    result
}

/// Returns `true` if interrupts are currently enabled.
#[inline]
#[must_use]
pub fn are_enabled() -> bool {
    imp::are_enabled()
}

/// Masks interrupts and returns a token describing the previous state.
#[inline]
pub(crate) fn save_and_mask() -> usize {
    imp::save_and_mask()
}

/// Restores the state returned by [`save_and_mask`].
#[inline]
pub(crate) fn restore(saved: usize) {
    imp::restore(saved);
}

#[cfg(all(target_os = "none", target_arch = "arm"))]
mod imp {
    #[inline]
    pub fn save_and_mask() -> usize {
        let primask: u32;
        // SAFETY: Reading PRIMASK and setting it is allowed in privileged mode.
        // No `nomem`: the asm must also act as a compiler barrier.
        unsafe {
            core::arch::asm!(
                "mrs {}, PRIMASK",
                "cpsid i",
                out(reg) primask,
                options(nostack, preserves_flags),
            );
        }
        primask as usize
    }

    #[inline]
    pub fn restore(saved: usize) {
        // PRIMASK bit 0 set means interrupts were already masked.
        if saved & 1 == 0 {
            // SAFETY: Re-enabling interrupts restores the state seen on entry.
            unsafe {
                core::arch::asm!("cpsie i", options(nostack, preserves_flags));
            }
        }
    }

    #[inline]
    pub fn are_enabled() -> bool {
        let primask: u32;
        // SAFETY: Reading PRIMASK has no side effects.
        unsafe {
            core::arch::asm!(
                "mrs {}, PRIMASK",
                out(reg) primask,
                options(nomem, nostack, preserves_flags),
            );
        }
        primask & 1 == 0
    }
}

#[cfg(all(
    target_os = "none",
    any(target_arch = "riscv32", target_arch = "riscv64")
))]
mod imp {
    /// `mstatus.MIE`.
    const MIE: usize = 1 << 3;

    #[inline]
    pub fn save_and_mask() -> usize {
        let mstatus: usize;
        // SAFETY: Clearing mstatus.MIE is allowed in machine mode.
        unsafe {
            core::arch::asm!(
                "csrrci {}, mstatus, 8",
                out(reg) mstatus,
                options(nostack),
            );
        }
        mstatus
    }

    #[inline]
    pub fn restore(saved: usize) {
        if saved & MIE != 0 {
            // SAFETY: Re-enabling interrupts restores the state seen on entry.
            unsafe {
                core::arch::asm!("csrsi mstatus, 8", options(nostack));
            }
        }
    }

    #[inline]
    pub fn are_enabled() -> bool {
        let mstatus: usize;
        // SAFETY: Reading mstatus has no side effects.
        unsafe {
            core::arch::asm!("csrr {}, mstatus", out(reg) mstatus, options(nomem, nostack));
        }
        mstatus & MIE != 0
    }
}

#[cfg(all(
    target_os = "none",
    not(any(
        target_arch = "arm",
        target_arch = "riscv32",
        target_arch = "riscv64"
    ))
))]
compile_error!("no interrupt masking for this bare-metal architecture");

#[cfg(all(not(target_os = "none"), not(test)))]
mod imp {
    #[inline]
    pub fn save_and_mask() -> usize {
        0
    }

    #[inline]
    pub fn restore(_saved: usize) {}

    #[inline]
    pub fn are_enabled() -> bool {
        true
    }
}

#[cfg(all(not(target_os = "none"), test))]
mod imp {
    use std::cell::Cell;

    std::thread_local! {
        static MASKED: Cell<bool> = const { Cell::new(false) };
    }

    pub fn save_and_mask() -> usize {
        usize::from(MASKED.with(|m| m.replace(true)))
    }

    pub fn restore(saved: usize) {
        MASKED.with(|m| m.set(saved != 0));
    }

    pub fn are_enabled() -> bool {
        !MASKED.with(Cell::get)
    }
}
