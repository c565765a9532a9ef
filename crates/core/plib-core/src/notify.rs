//! Byte-count threshold notifications.
//!
//! A [`ThresholdNotifier`] decides whether a driver should call its
//! registered callback after the number of buffered (or free) bytes
//! changed. It holds three settings, all off/zero at construction:
//!
//! - `enabled`: master switch,
//! - `persistent`: fire on every step at or above the threshold, instead
//!   of once when the threshold is crossed,
//! - `threshold`: the byte count to compare against.
//!
//! # One-shot semantics
//!
//! In one-shot mode the notifier fires on the step where the count goes
//! from below the threshold to at or above it (`before < threshold <=
//! after`). When the count moves one byte at a time this is the same as
//! firing when it equals the threshold, and a step of several bytes can
//! no longer jump over the threshold without firing.

use core::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

/// Per-direction notification settings.
pub struct ThresholdNotifier {
    enabled: AtomicBool,
    persistent: AtomicBool,
    threshold: AtomicUsize,
}

impl Default for ThresholdNotifier {
    fn default() -> Self {
        Self::new()
    }
}

impl ThresholdNotifier {
    /// Creates a disabled notifier with a zero threshold.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            enabled: AtomicBool::new(false),
            persistent: AtomicBool::new(false),
            threshold: AtomicUsize::new(0),
        }
    }

    /// Enables or disables notifications and selects the mode.
    ///
    /// Returns whether notifications were enabled before the call.
    pub fn enable(&self, enabled: bool, persistent: bool) -> bool {
        self.persistent.store(persistent, Ordering::Relaxed);
        self.enabled.swap(enabled, Ordering::AcqRel)
    }

    /// Sets the threshold. A threshold of zero is ignored.
    pub fn set_threshold(&self, threshold: usize) {
        if threshold > 0 {
            self.threshold.store(threshold, Ordering::Relaxed);
        }
    }

    /// Returns the configured threshold.
    #[must_use]
    pub fn threshold(&self) -> usize {
        self.threshold.load(Ordering::Relaxed)
    }

    /// Returns `true` if notifications are enabled.
    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Acquire)
    }

    /// Returns `true` if persistent mode is selected.
    #[must_use]
    pub fn is_persistent(&self) -> bool {
        self.persistent.load(Ordering::Relaxed)
    }

    /// Decides whether a count change from `before` to `after` should fire.
    #[must_use]
    pub fn should_fire(&self, before: usize, after: usize) -> bool {
        if !self.is_enabled() {
            return false;
        }
        let threshold = self.threshold();
        if self.is_persistent() {
            after >= threshold
        } else {
            before < threshold && after >= threshold
        }
    }

    /// Disables notifications and zeroes the threshold.
    pub fn reset(&self) {
        self.enabled.store(false, Ordering::Release);
        self.persistent.store(false, Ordering::Relaxed);
        self.threshold.store(0, Ordering::Relaxed);
    }
}
