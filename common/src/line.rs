//! The shared data line between the MCU and the sensor.

use embedded_hal::digital::v2::{InputPin, OutputPin};

/// A single digital line that can be driven or released and sampled.
///
/// The sensor driver assumes exclusive ownership of the line for the whole
/// duration of a transfer.
pub trait SensorLine {
    type Error;

    /// Switch the line to output mode, so `write` drives it.
    fn set_output_mode(&mut self) -> Result<(), Self::Error>;

    /// Release the line so the sensor can drive it (pulled up when idle).
    fn set_input_mode(&mut self) -> Result<(), Self::Error>;

    fn write(&mut self, high: bool) -> Result<(), Self::Error>;

    fn read(&mut self) -> Result<bool, Self::Error>;
}

/// [`SensorLine`] on top of an open-drain output pin.
///
/// An open-drain pin can always be read back. Driving it high only releases
/// the line to the pull-up, so "input mode" is simply driving it high.
pub struct OpenDrainLine<P> {
    pin: P,
}

impl<P, E> OpenDrainLine<P>
where
    P: OutputPin<Error = E> + InputPin<Error = E>,
{
    pub fn new(pin: P) -> Self {
        Self { pin }
    }

    pub fn free(self) -> P {
        self.pin
    }
}

impl<P, E> SensorLine for OpenDrainLine<P>
where
    P: OutputPin<Error = E> + InputPin<Error = E>,
{
    type Error = E;

    fn set_output_mode(&mut self) -> Result<(), E> {
        Ok(())
    }

    fn set_input_mode(&mut self) -> Result<(), E> {
        self.pin.set_high()
    }

    fn write(&mut self, high: bool) -> Result<(), E> {
        if high {
            self.pin.set_high()
        } else {
            self.pin.set_low()
        }
    }

    fn read(&mut self) -> Result<bool, E> {
        self.pin.is_high()
    }
}
