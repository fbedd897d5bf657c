//! Busy-wait delays on a free-running 16-bit microsecond counter.
//!
//! The counter is shared with nothing else and never reconfigured while
//! delaying, so the delay only ever reads it. All delays are blocking and
//! can't be cancelled. Being preempted only makes them longer.

use embedded_hal::blocking::delay::{DelayMs, DelayUs};

/// A hardware counter ticking once per microsecond and wrapping at 16 bits.
pub trait MicrosCounter {
    fn now_us(&mut self) -> u16;
}

/// Block for at least `us` microseconds.
pub fn delay_micros<C: MicrosCounter + ?Sized>(counter: &mut C, us: u16) {
    if us == 0 {
        return;
    }

    let start = counter.now_us();
    let target = start.wrapping_add(us);

    if target > start {
        // Stop early if the counter itself wrapped while we weren't looking,
        // in which case more than `us` have passed already.
        loop {
            let now = counter.now_us();
            if now >= target || now < start {
                break;
            }
        }
    } else {
        // Wait for the counter to wrap, then for the target
        while counter.now_us() >= start { /* wait */ }
        while counter.now_us() < target { /* wait */ }
    }
}

/// Blocking delay provider built on a [`MicrosCounter`].
///
/// Millisecond delays are composed from microsecond delays, so they keep
/// working while the tick interrupt is masked (e.g. during RTIC `#[init]`).
pub struct MicrosDelay<C> {
    counter: C,
}

impl<C: MicrosCounter> MicrosDelay<C> {
    pub fn new(counter: C) -> Self {
        Self { counter }
    }

    pub fn free(self) -> C {
        self.counter
    }
}

impl<C: MicrosCounter> DelayUs<u16> for MicrosDelay<C> {
    fn delay_us(&mut self, us: u16) {
        delay_micros(&mut self.counter, us);
    }
}

impl<C: MicrosCounter> DelayUs<u8> for MicrosDelay<C> {
    fn delay_us(&mut self, us: u8) {
        delay_micros(&mut self.counter, us.into());
    }
}

impl<C: MicrosCounter> DelayMs<u16> for MicrosDelay<C> {
    fn delay_ms(&mut self, ms: u16) {
        for _ in 0..ms {
            delay_micros(&mut self.counter, 1000);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use rstest::rstest;

    use crate::sim::{SimClock, SimCounter};

    #[rstest]
    // No wrap
    #[case(0, 1, 1)]
    #[case(0, 100, 1)]
    #[case(1000, 50, 3)]
    #[case(0, 0xFFFF, 7)]
    #[case(0x8000, 0x7FFF, 13)]
    // Target wraps
    #[case(0xFFFF, 1, 1)]
    #[case(0xFFF0, 100, 1)]
    #[case(0xFFF0, 100, 9)]
    #[case(0x8000, 0x8000, 5)]
    #[case(0x0001, 0xFFFF, 3)]
    // Counter wraps mid-wait although the target doesn't
    #[case(0xFFF0, 0x000F, 50)]
    fn test_delay_lower_bound(#[case] offset: u16, #[case] us: u16, #[case] cost: u64) {
        let clock = SimClock::new();
        let mut counter = SimCounter::new(&clock, offset, cost);

        let before = clock.now();
        delay_micros(&mut counter, us);
        let elapsed = clock.now() - before;

        assert!(
            elapsed >= u64::from(us),
            "delay of {} µs took only {} µs (offset {:#x})",
            us,
            elapsed,
            offset
        );
    }

    #[test]
    fn test_delay_is_not_much_longer_than_requested() {
        let clock = SimClock::new();
        let mut counter = SimCounter::new(&clock, 0xFF00, 1);

        let before = clock.now();
        delay_micros(&mut counter, 500);
        let elapsed = clock.now() - before;

        // One read for the start value plus one read past the target
        assert!(elapsed <= 502, "elapsed {}", elapsed);
    }

    #[test]
    fn test_zero_delay_does_not_touch_the_counter() {
        let clock = SimClock::new();
        let mut counter = SimCounter::new(&clock, 0x1234, 1);

        delay_micros(&mut counter, 0);

        assert_eq!(counter.reads(), 0);
        assert_eq!(clock.now(), 0);
    }

    #[test]
    fn test_delay_ms() {
        let clock = SimClock::new();
        let mut delay = MicrosDelay::new(SimCounter::new(&clock, 0xABCD, 2));

        DelayMs::<u16>::delay_ms(&mut delay, 20);

        assert!(clock.now() >= 20_000);
        assert!(clock.now() < 20_500);
    }

    #[test]
    fn test_delay_us_u8() {
        let clock = SimClock::new();
        let mut delay = MicrosDelay::new(SimCounter::new(&clock, 0, 1));

        DelayUs::<u8>::delay_us(&mut delay, 200);

        assert!(clock.now() >= 200);
    }
}
