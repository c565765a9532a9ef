//! Interrupt-safe spin lock.
//!
//! Masks interrupts before acquiring the inner spinlock and restores the
//! previous mask state on release. State shared between a peripheral's
//! interrupt handler and foreground code goes behind one of these: while
//! the foreground holds the lock the handler cannot preempt it, and the
//! handler itself always finds the lock free on a single core.

use core::cell::UnsafeCell;
use core::marker::PhantomData;
use core::ops::{Deref, DerefMut};
use core::sync::atomic::{AtomicBool, Ordering};

use super::interrupts::{restore, save_and_mask};

/// A spin lock that masks interrupts while held.
///
/// Re-acquiring the lock from the same context while a guard is alive
/// spins forever. Callbacks must therefore run after the guard is dropped.
pub struct IrqSpinLock<T> {
    locked: AtomicBool,
    data: UnsafeCell<T>,
}

// SAFETY: The atomic flag ensures exclusive access to `T`.
unsafe impl<T: Send> Send for IrqSpinLock<T> {}
unsafe impl<T: Send> Sync for IrqSpinLock<T> {}

impl<T> IrqSpinLock<T> {
    /// Creates a new unlocked `IrqSpinLock`.
    pub const fn new(value: T) -> Self {
        Self {
            locked: AtomicBool::new(false),
            data: UnsafeCell::new(value),
        }
    }

    /// Acquires the lock, masking interrupts first.
    pub fn lock(&self) -> IrqSpinLockGuard<'_, T> {
        let saved = save_and_mask();

        // TTAS spin to acquire.
        loop {
            if self
                .locked
                .compare_exchange_weak(false, true, Ordering::Acquire, Ordering::Relaxed)
                .is_ok()
            {
                return IrqSpinLockGuard {
                    lock: self,
                    saved,
                    _not_send: PhantomData,
                };
            }
            while self.locked.load(Ordering::Relaxed) {
                core::hint::spin_loop();
            }
        }
    }
}

/// RAII guard that restores the interrupt mask on drop.
///
/// Not `Send`: the saved mask belongs to the core that took the lock.
pub struct IrqSpinLockGuard<'a, T> {
    lock: &'a IrqSpinLock<T>,
    saved: usize,
    _not_send: PhantomData<*const ()>,
}

impl<T> Deref for IrqSpinLockGuard<'_, T> {
    type Target = T;
    fn deref(&self) -> &T {
        // SAFETY: The lock is held, so we have exclusive access to the data.
        unsafe { &*self.lock.data.get() }
    }
}

impl<T> DerefMut for IrqSpinLockGuard<'_, T> {
    fn deref_mut(&mut self) -> &mut T {
        // SAFETY: The lock is held, so we have exclusive access to the data.
        unsafe { &mut *self.lock.data.get() }
    }
}

impl<T> Drop for IrqSpinLockGuard<'_, T> {
    fn drop(&mut self) {
        self.lock.locked.store(false, Ordering::Release);
        restore(self.saved);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sync::interrupts::are_enabled;

    #[test]
    fn lock_unlock() {
        let lock = IrqSpinLock::new(42);
        {
            let guard = lock.lock();
            assert_eq!(*guard, 42);
        }
        assert_eq!(*lock.lock(), 42);
    }

    #[test]
    fn interrupts_masked_while_held() {
        let lock = IrqSpinLock::new(());
        {
            let _guard = lock.lock();
            assert!(!are_enabled());
        }
        assert!(are_enabled());
    }

    #[test]
    fn mutate_through_guard() {
        let lock = IrqSpinLock::new(0);
        {
            let mut guard = lock.lock();
            *guard = 99;
        }
        assert_eq!(*lock.lock(), 99);
    }
}
