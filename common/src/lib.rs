#![cfg_attr(not(test), no_std)]
//! Hardware independent parts of the hygrometer firmware.
//!
//! Everything in here only talks to the hardware through small traits
//! ([`line::SensorLine`] and [`delay::MicrosCounter`]), so
//! it can be unit tested on the host against simulated hardware.

pub mod delay;
pub mod dht11;
pub mod line;
pub mod tick;
pub mod timer;

#[cfg(test)]
mod sim;
