//! Toggle the serial TX pin. Useful for verifying the delay implementation using a
//! logic analyzer.
//!
//! Ends with a DHT11 style reset pulse (20 ms low) followed by 40 pulses of
//! 27 µs and 70 µs, to compare against the sensor's timing.

#![cfg_attr(target_arch = "arm", no_main)]
#![cfg_attr(target_arch = "arm", no_std)]

#[cfg(not(target_arch = "arm"))]
fn main() {}

#[cfg(target_arch = "arm")]
use panic_persist as _;

#[cfg(target_arch = "arm")]
#[rtic::app(device = stm32l0xx_hal::pac, peripherals = true)]
mod app {
    use hygrometer_common::dht11::timing;
    use hygrometer_firmware::delay::{Tim6Counter, Tim6Delay};
    use stm32l0xx_hal::{self as hal, pac, prelude::*};

    #[shared]
    struct Shared {}

    #[local]
    struct Local {}

    #[init]
    fn init(ctx: init::Context) -> (Shared, Local, init::Monotonics) {
        let mut dp: pac::Peripherals = ctx.device;

        // Delay provider
        let mut delay = Tim6Delay::new(Tim6Counter::new(dp.TIM6, &mut dp.RCC));

        // Clock configuration. Use HSI at 16 MHz.
        let mut rcc = dp.RCC.freeze(hal::rcc::Config::hsi16());

        // Toggle serial TX pin with delay
        let gpiob = dp.GPIOB.split(&mut rcc);
        let mut pin = gpiob.pb6.into_push_pull_output();

        // Trigger signal: Pull low for 100 µs, then high for 50 µs
        pin.set_low().ok();
        delay.delay_us(100u16);
        pin.set_high().ok();
        delay.delay_us(50u16);

        // Toggle with increasing durations
        for i in 1..=10u16 {
            pin.set_low().ok();
            delay.delay_us(i);
            pin.set_high().ok();
            delay.delay_us(i);
        }
        for i in 1..=10u16 {
            pin.set_low().ok();
            delay.delay_ms(i);
            pin.set_high().ok();
            delay.delay_ms(i);
        }

        // Sensor timing
        pin.set_low().ok();
        delay.delay_ms(timing::RESET_LOW_MS);
        pin.set_high().ok();
        for i in 0..40u16 {
            let high = if i % 2 == 0 {
                timing::ZERO_PULSE_US
            } else {
                timing::ONE_PULSE_US
            };
            pin.set_low().ok();
            delay.delay_us(50u16);
            pin.set_high().ok();
            delay.delay_us(high);
        }

        (Shared {}, Local {}, init::Monotonics())
    }
}
