#![cfg_attr(not(test), no_std)]

pub mod delay;
pub mod leds;
pub mod report;
pub mod systick;
