//! Synchronization primitives shared between interrupt handlers and
//! foreground code.
//!
//! Provides [`IrqSpinLock`], which masks interrupts on the running core
//! while held, and [`interrupts::without_interrupts`] for short critical
//! sections that guard no data of their own, such as read-modify-write of
//! a shared interrupt controller register. The lock is const-constructable
//! so it can be placed in `static` items.

pub mod interrupts;
mod irq_spinlock;

pub(crate) mod loom_compat;

pub use irq_spinlock::{IrqSpinLock, IrqSpinLockGuard};
