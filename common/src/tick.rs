//! Millisecond tick clock.
//!
//! The counter is incremented by the 1 ms tick interrupt and wraps silently
//! after roughly 49.7 days. Everything that compares tick values must use
//! wrapping arithmetic.

use core::sync::atomic::{AtomicU32, Ordering};

/// Free-running tick counter with a single writer (the tick interrupt).
pub struct TickClock {
    ticks: AtomicU32,
}

impl TickClock {
    pub const fn new() -> Self {
        Self {
            ticks: AtomicU32::new(0),
        }
    }

    /// Advance the clock by one tick.
    ///
    /// Must only be called from the tick interrupt handler. Cortex-M0+ has no
    /// atomic read-modify-write instructions, so this is a separate load and
    /// store, which is only sound as long as there is exactly one writer.
    #[inline]
    pub fn on_tick(&self) {
        let ticks = self.ticks.load(Ordering::Relaxed);
        self.ticks.store(ticks.wrapping_add(1), Ordering::Release);
    }

    /// Return the current tick count.
    #[inline]
    pub fn now(&self) -> u32 {
        self.ticks.load(Ordering::Acquire)
    }

    /// Ticks passed since `start`, correct across a single wraparound.
    pub fn elapsed_since(&self, start: u32) -> u32 {
        self.now().wrapping_sub(start)
    }
}

impl Default for TickClock {
    fn default() -> Self {
        Self::new()
    }
}
