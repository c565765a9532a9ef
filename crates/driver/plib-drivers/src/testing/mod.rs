//! Host-side peripheral simulations for driver tests.
//!
//! Each mock implements a driver's register trait with `Cell`/`RefCell`
//! state and models just enough hardware behaviour (FIFOs, self-clearing
//! control bits, interrupt flags) for the drivers' state machines to run
//! end to end.

pub mod i2c;
pub mod spi;
pub mod uart;

use std::cell::RefCell;

thread_local! {
    static EVENTS: RefCell<Vec<(&'static str, usize)>> = const { RefCell::new(Vec::new()) };
}

/// Records a callback invocation for the current test thread.
pub fn record(name: &'static str, context: usize) {
    EVENTS.with(|e| e.borrow_mut().push((name, context)));
}

/// Returns and clears the invocations recorded on this thread.
pub fn take_events() -> Vec<(&'static str, usize)> {
    EVENTS.with(|e| e.borrow_mut().drain(..).collect())
}
