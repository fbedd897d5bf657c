//! Controlling the status LEDs.
//!
//! - Green: the last reading succeeded
//! - Red: the last reading failed
//! - Yellow: heartbeat, toggled periodically while the firmware is alive

use embedded_hal::digital::v2::OutputPin;
use stm32l0xx_hal::gpio::{Output, Pin, PushPull};

/// Status LEDs.
pub struct StatusLeds {
    /// Red status LED
    led_r: Pin<Output<PushPull>>,
    /// Yellow status LED
    led_y: Pin<Output<PushPull>>,
    /// Green status LED
    led_g: Pin<Output<PushPull>>,
    heartbeat_on: bool,
}

// Setting push-pull pins is infallible, errors are ignored.
impl StatusLeds {
    pub fn new(
        led_r: Pin<Output<PushPull>>,
        led_y: Pin<Output<PushPull>>,
        led_g: Pin<Output<PushPull>>,
    ) -> Self {
        Self {
            led_r,
            led_y,
            led_g,
            heartbeat_on: false,
        }
    }

    pub fn enable_red(&mut self) {
        self.led_r.set_high().ok();
    }

    pub fn disable_red(&mut self) {
        self.led_r.set_low().ok();
    }

    pub fn enable_green(&mut self) {
        self.led_g.set_high().ok();
    }

    pub fn disable_green(&mut self) {
        self.led_g.set_low().ok();
    }

    /// Show the result of the last reading.
    pub fn show_outcome(&mut self, success: bool) {
        if success {
            self.disable_red();
            self.enable_green();
        } else {
            self.disable_green();
            self.enable_red();
        }
    }

    pub fn toggle_heartbeat(&mut self) {
        self.heartbeat_on = !self.heartbeat_on;
        if self.heartbeat_on {
            self.led_y.set_high().ok();
        } else {
            self.led_y.set_low().ok();
        }
    }

    pub fn disable_all(&mut self) {
        self.disable_red();
        self.disable_green();
        self.led_y.set_low().ok();
        self.heartbeat_on = false;
    }
}
