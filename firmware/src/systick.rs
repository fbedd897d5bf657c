//! Millisecond tick clock driven by the SysTick exception.
//!
//! The SysTick handler must call [`on_tick`] and do nothing else, it is the
//! only writer of [`CLOCK`].

use cortex_m::peripheral::{syst::SystClkSource, SYST};
use hygrometer_common::tick::TickClock;

/// Core clock frequency (HSI16).
pub const CORE_CLOCK_HZ: u32 = 16_000_000;

pub const TICK_HZ: u32 = 1_000;

/// Ticks since boot.
pub static CLOCK: TickClock = TickClock::new();

/// Start SysTick with a 1 ms period and enable its interrupt.
///
/// Assumes the core runs at [`CORE_CLOCK_HZ`].
pub fn init(syst: &mut SYST) {
    syst.set_clock_source(SystClkSource::Core);
    syst.set_reload(CORE_CLOCK_HZ / TICK_HZ - 1);
    syst.clear_current();
    syst.enable_interrupt();
    syst.enable_counter();
}

pub fn on_tick() {
    CLOCK.on_tick();
}

pub fn now() -> u32 {
    CLOCK.now()
}
