//! Simulated hardware for the unit tests.
//!
//! All simulated parts share one microsecond clock. Time only advances when
//! something waits (a delay) or when a counter read is configured to cost
//! time, so tests are fully deterministic.

use std::cell::Cell;
use std::convert::Infallible;
use std::rc::Rc;

use embedded_hal::blocking::delay::{DelayMs, DelayUs};

use crate::delay::MicrosCounter;
use crate::dht11::timing::{ONE_PULSE_US, ZERO_PULSE_US};
use crate::line::SensorLine;

/// Sensor response after the host released the line.
const RESPONSE_DELAY_US: u64 = 30;
const RESPONSE_LOW_US: u64 = 80;
const RESPONSE_HIGH_US: u64 = 80;
/// Low pulse starting every bit, and ending the frame.
const BIT_START_US: u64 = 50;
/// Minimum low time for the sensor to recognize a reset.
const RESET_MIN_US: u64 = 18_000;

/// A segment of the line waveform: how long it lasts and the line level.
pub type Segment = (u64, bool);

#[derive(Clone, Default)]
pub struct SimClock(Rc<Cell<u64>>);

impl SimClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn now(&self) -> u64 {
        self.0.get()
    }

    pub fn advance(&self, us: u64) {
        self.0.set(self.0.get() + us);
    }
}

/// Free-running 16-bit counter at 1 MHz. Every read takes `cost` µs.
pub struct SimCounter {
    clock: SimClock,
    offset: u16,
    cost: u64,
    reads: usize,
}

impl SimCounter {
    pub fn new(clock: &SimClock, offset: u16, cost: u64) -> Self {
        Self {
            clock: clock.clone(),
            offset,
            cost,
            reads: 0,
        }
    }

    pub fn reads(&self) -> usize {
        self.reads
    }
}

impl MicrosCounter for SimCounter {
    fn now_us(&mut self) -> u16 {
        let value = (u64::from(self.offset) + self.clock.now()) as u16;
        self.reads += 1;
        self.clock.advance(self.cost);
        value
    }
}

/// Delay that advances the simulated clock by exactly the requested time.
pub struct SimDelay {
    clock: SimClock,
}

impl SimDelay {
    pub fn new(clock: &SimClock) -> Self {
        Self {
            clock: clock.clone(),
        }
    }
}

impl DelayUs<u16> for SimDelay {
    fn delay_us(&mut self, us: u16) {
        self.clock.advance(u64::from(us));
    }
}

impl DelayMs<u16> for SimDelay {
    fn delay_ms(&mut self, ms: u16) {
        self.clock.advance(u64::from(ms) * 1000);
    }
}

/// Waveform of a complete sensor answer for the given frame, starting at
/// the moment the host releases the line after a reset.
pub fn answer(frame: &[u8]) -> Vec<Segment> {
    let mut segments = vec![
        (RESPONSE_DELAY_US, true),
        (RESPONSE_LOW_US, false),
        (RESPONSE_HIGH_US, true),
    ];
    let bits = frame
        .iter()
        .flat_map(|byte| (0..8u8).rev().map(move |i| (*byte >> i) & 1 == 1));
    segments.extend(bit_pulses(bits));
    segments.push((BIT_START_US, false));
    segments
}

/// Presence pulse only, after which the line stays idle (high).
pub fn presence_only() -> Vec<Segment> {
    vec![
        (RESPONSE_DELAY_US, true),
        (RESPONSE_LOW_US, false),
        (RESPONSE_HIGH_US, true),
    ]
}

/// Pulse-width encoded bits: a low start pulse followed by a short (0) or
/// long (1) high pulse.
pub fn bit_pulses(bits: impl IntoIterator<Item = bool>) -> Vec<Segment> {
    bits.into_iter()
        .flat_map(|bit| {
            let high = if bit { ONE_PULSE_US } else { ZERO_PULSE_US };
            [(BIT_START_US, false), (u64::from(high), true)]
        })
        .collect()
}

/// The sensor end of the data line.
///
/// Once the host held the line low for at least 18 ms and released it, the
/// sensor plays back its waveform. Outside of the waveform the line is
/// pulled up.
pub struct SimSensor {
    clock: SimClock,
    waveform: Vec<Segment>,
    output_mode: bool,
    driven_high: bool,
    low_since: Option<u64>,
    last_low_us: Option<u64>,
    origin: Option<u64>,
    polls: usize,
}

impl SimSensor {
    /// A sensor that answers every reset with `waveform`.
    pub fn new(clock: &SimClock, waveform: Vec<Segment>) -> Self {
        Self {
            clock: clock.clone(),
            waveform,
            output_mode: false,
            driven_high: true,
            low_since: None,
            last_low_us: None,
            origin: None,
            polls: 0,
        }
    }

    /// Nothing connected, the line is never pulled low.
    pub fn absent(clock: &SimClock) -> Self {
        Self::new(clock, Vec::new())
    }

    /// Line in input mode, already playing back `waveform` from now on.
    pub fn playing(clock: &SimClock, waveform: Vec<Segment>) -> Self {
        let mut sensor = Self::new(clock, waveform);
        sensor.origin = Some(clock.now());
        sensor
    }

    /// Number of line reads while in input mode.
    pub fn polls(&self) -> usize {
        self.polls
    }

    /// How long the host held the line low the last time.
    pub fn last_low_us(&self) -> Option<u64> {
        self.last_low_us
    }

    fn sensor_level(&self) -> bool {
        let origin = match self.origin {
            Some(origin) => origin,
            None => return true,
        };
        let mut t = self.clock.now() - origin;
        for &(duration, level) in &self.waveform {
            if t < duration {
                return level;
            }
            t -= duration;
        }
        true
    }
}

impl SensorLine for SimSensor {
    type Error = Infallible;

    fn set_output_mode(&mut self) -> Result<(), Infallible> {
        self.output_mode = true;
        Ok(())
    }

    fn set_input_mode(&mut self) -> Result<(), Infallible> {
        self.output_mode = false;
        Ok(())
    }

    fn write(&mut self, high: bool) -> Result<(), Infallible> {
        let now = self.clock.now();
        if high {
            if let Some(since) = self.low_since.take() {
                let low_us = now - since;
                self.last_low_us = Some(low_us);
                if low_us >= RESET_MIN_US {
                    self.origin = Some(now);
                }
            }
        } else if self.driven_high {
            self.low_since = Some(now);
            self.origin = None;
        }
        self.driven_high = high;
        Ok(())
    }

    fn read(&mut self) -> Result<bool, Infallible> {
        if self.output_mode {
            return Ok(self.driven_high);
        }
        self.polls += 1;
        Ok(self.sensor_level())
    }
}
