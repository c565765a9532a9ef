//! Single-slot callback registry.
//!
//! Every driver lets application code hook its interrupt handler through a
//! [`CallbackSlot`]: one function pointer plus one opaque context word.
//! Registering replaces whatever was there before; registering `None`
//! clears the slot.

use crate::sync::IrqSpinLock;

/// Completion callback: receives the registered context.
pub type Callback = fn(context: usize);

/// Event callback: receives the event that fired and the registered context.
pub type EventCallback<E> = fn(event: E, context: usize);

/// Holds at most one `(callback, context)` pair.
///
/// The pair is stored behind an [`IrqSpinLock`] so an interrupt handler
/// always observes a callback together with the context it was registered
/// with. The lock is released before the callback runs, so a callback may
/// call back into the driver or re-register itself.
pub struct CallbackSlot<F: Copy> {
    entry: IrqSpinLock<Option<(F, usize)>>,
}

impl<F: Copy> Default for CallbackSlot<F> {
    fn default() -> Self {
        Self::new()
    }
}

impl<F: Copy> CallbackSlot<F> {
    /// Creates an empty slot.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            entry: IrqSpinLock::new(None),
        }
    }

    /// Stores `callback` with `context`, replacing any previous registration.
    ///
    /// Passing `None` clears the slot.
    pub fn register(&self, callback: Option<F>, context: usize) {
        *self.entry.lock() = callback.map(|f| (f, context));
    }

    /// Clears the slot.
    pub fn clear(&self) {
        *self.entry.lock() = None;
    }

    /// Returns `true` if a callback is registered.
    #[must_use]
    pub fn is_registered(&self) -> bool {
        self.entry.lock().is_some()
    }

    /// Returns a copy of the registered pair.
    #[must_use]
    pub fn get(&self) -> Option<(F, usize)> {
        *self.entry.lock()
    }

    /// Runs `call` with the registered callback and context, if any.
    ///
    /// Returns `None` when the slot is empty.
    pub fn with<R>(&self, call: impl FnOnce(F, usize) -> R) -> Option<R> {
        let (callback, context) = self.get()?;
        Some(call(callback, context))
    }
}

impl CallbackSlot<Callback> {
    /// Invokes the registered completion callback, if any.
    pub fn invoke(&self) {
        self.with(|callback, context| callback(context));
    }
}

impl<E> CallbackSlot<EventCallback<E>> {
    /// Invokes the registered event callback with `event`, if any.
    pub fn notify(&self, event: E) {
        self.with(|callback, context| callback(event, context));
    }
}
