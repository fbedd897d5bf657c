//! Microsecond counter using TIM6.
//!
//! RTIC takes ownership of SYST for the tick clock, so the busy-wait delays
//! run on a free-running basic timer instead. TIM6 is used because it has
//! lower current consumption than TIM2/3 or TIM21/22.

use hygrometer_common::delay::{MicrosCounter, MicrosDelay};
use stm32l0xx_hal::pac;

/// Blocking delay provider on top of TIM6.
pub type Tim6Delay = MicrosDelay<Tim6Counter>;

/// TIM6 counting up at 1 MHz, wrapping at 16 bits.
pub struct Tim6Counter {
    tim6: pac::TIM6,
}

impl Tim6Counter {
    pub fn new(tim6: pac::TIM6, rcc: &mut pac::RCC) -> Self {
        // Enable TIM6 in RCC
        rcc.apb1enr.modify(|_, w| w.tim6en().set_bit());

        // Reset timer
        rcc.apb1rstr.modify(|_, w| w.tim6rst().set_bit());
        rcc.apb1rstr.modify(|_, w| w.tim6rst().clear_bit());

        // Set up prescaler
        //
        // This implementation assumes that the core clock is set to 16 MHz
        // (HSI16). Dividing by 16 gives one timer tick per µs.
        tim6.psc.write(|w| w.psc().bits(15));

        // Count through the whole 16 bit range
        tim6.arr.write(|w| unsafe { w.arr().bits(0xFFFF) });

        // Trigger update event (UEV) in the event generation register (EGR)
        // in order to immediately apply the config
        tim6.egr.write(|w| w.ug().set_bit());

        // Enable counter
        tim6.cr1.modify(|_, w| w.cen().set_bit());

        Self { tim6 }
    }

    pub fn free(self) -> pac::TIM6 {
        self.tim6.cr1.modify(|_, w| w.cen().clear_bit());
        self.tim6
    }
}

impl MicrosCounter for Tim6Counter {
    fn now_us(&mut self) -> u16 {
        self.tim6.cnt.read().cnt().bits()
    }
}
