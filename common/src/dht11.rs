//! Driver for the DHT11 humidity and temperature sensor.
//!
//! The DHT11 talks over a single shared data line. The host holds the line
//! low for at least 18 ms to request a reading. The sensor acknowledges with
//! a low and a high pulse of ~80 µs each and then sends 40 bits, MSB first.
//! Every bit starts with a ~50 µs low pulse followed by a high pulse whose
//! length encodes the value: ~27 µs for a 0, ~70 µs for a 1.
//!
//! ```text
//!  host reset      ack           bit (0)          bit (1)
//! ‾‾‾|_ _ _ _|‾‾‾|_____|‾‾‾‾‾|_____|‾‾|_____|‾‾‾‾‾‾‾|__ ...
//!     ≥18 ms        80 µs 80 µs 50 µs 27µs 50 µs  70 µs
//! ```
//!
//! The 40 bits are five bytes: humidity integer and decimal part,
//! temperature integer and decimal part (MSB is the sign), and a checksum
//! which is the sum of the four data bytes modulo 256.
//!
//! The transfer is modelled as an explicit state machine ([`Phase`]) so that
//! every phase, with its own timeout, can be driven on its own. A complete
//! transfer blocks the caller for roughly 25 ms and must not be preempted
//! for more than a few microseconds at a time.

use core::fmt;

use bitfield::{Bit, BitRange};
use embedded_hal::blocking::delay::{DelayMs, DelayUs};

use crate::line::SensorLine;

/// Number of bytes in a frame
pub const FRAME_LEN: usize = 5;

/// Number of bits in a frame
pub const FRAME_BITS: u8 = 40;

/// Protocol timing
pub mod timing {
    /// How long the host pulls the line low to reset the sensor. The sensor
    /// needs at least 18 ms.
    pub const RESET_LOW_MS: u16 = 20;

    /// How long the host keeps the line high after the reset before
    /// releasing it (20-40 µs).
    pub const RESET_RELEASE_US: u16 = 20;

    /// Polls (1 µs apart) to wait for each half of the presence pulse.
    pub const PRESENCE_POLLS: u16 = 1000;

    /// Polls (1 µs apart) to wait for each edge of a data bit.
    pub const BIT_POLLS: u16 = 100;

    /// Length of the high pulse of a 0 bit (26-28 µs).
    pub const ZERO_PULSE_US: u16 = 27;

    /// Length of the high pulse of a 1 bit.
    pub const ONE_PULSE_US: u16 = 70;

    /// Time after the rising edge of a bit at which the line is sampled.
    ///
    /// A 1 µs poll loop is too slow and jittery to measure the pulse length,
    /// so the line is sampled exactly once, in between both pulse lengths.
    pub const SAMPLE_DELAY_US: u16 = 50;

    /// Time the sensor needs after power-up before it accepts commands.
    pub const POWER_UP_MS: u16 = 1500;

    /// Minimum interval between two readings.
    pub const MIN_READ_INTERVAL_MS: u32 = 2000;

    const _: () = assert!(ZERO_PULSE_US < SAMPLE_DELAY_US && SAMPLE_DELAY_US < ONE_PULSE_US);
}

/// Sum of the given bytes modulo 256.
pub fn checksum(data: &[u8]) -> u8 {
    data.iter().fold(0, |sum, byte| sum.wrapping_add(*byte))
}

/// The received checksum byte doesn't match the data.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct ChecksumMismatch {
    /// Checksum calculated from the four data bytes
    pub computed: u8,
    /// Checksum byte sent by the sensor
    pub received: u8,
}

impl fmt::Display for ChecksumMismatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Checksum mismatch (computed 0x{:02x}, received 0x{:02x})",
            self.computed, self.received
        )
    }
}

/// A verified reading.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Reading {
    /// Relative humidity in %, integer part
    pub humidity: u8,
    /// Relative humidity, decimal part (always 0 on the DHT11)
    pub humidity_decimal: u8,
    /// Temperature in °C, integer part
    pub temperature: u8,
    /// Temperature, tenths of °C
    pub temperature_decimal: u8,
    /// Whether the temperature is below 0 °C
    pub negative: bool,
    /// Checksum byte as received
    pub checksum: u8,
}

impl Reading {
    /// Verify the checksum of a raw frame and decompose it.
    pub fn from_frame(frame: [u8; FRAME_LEN]) -> Result<Self, ChecksumMismatch> {
        let computed = checksum(&frame[..4]);
        if computed != frame[4] {
            return Err(ChecksumMismatch {
                computed,
                received: frame[4],
            });
        }

        let temperature_decimal: u8 = frame[3].bit_range(6, 0);
        Ok(Self {
            humidity: frame[0],
            humidity_decimal: frame[1],
            temperature: frame[2],
            temperature_decimal,
            negative: frame[3].bit(7),
            checksum: frame[4],
        })
    }

    /// The frame this reading was decoded from.
    pub fn raw(&self) -> [u8; FRAME_LEN] {
        let mut byte3 = self.temperature_decimal;
        byte3.set_bit(7, self.negative);
        [
            self.humidity,
            self.humidity_decimal,
            self.temperature,
            byte3,
            self.checksum,
        ]
    }

    /// Temperature in tenths of °C.
    pub fn temperature_decicelsius(&self) -> i16 {
        let value = i16::from(self.temperature) * 10 + i16::from(self.temperature_decimal);
        if self.negative {
            -value
        } else {
            value
        }
    }

    pub fn as_degrees_celsius(&self) -> f32 {
        f32::from(self.temperature_decicelsius()) / 10.0
    }

    /// Relative humidity in %.
    pub fn as_percent(&self) -> f32 {
        f32::from(self.humidity) + f32::from(self.humidity_decimal) / 10.0
    }
}

impl fmt::Display for Reading {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}{}.{}°C, {}.{}%RH",
            if self.negative { "-" } else { "" },
            self.temperature,
            self.temperature_decimal,
            self.humidity,
            self.humidity_decimal,
        )
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Error<E> {
    /// The line didn't change within the timeout. Either no sensor is
    /// connected or the wiring is broken.
    NoResponse,
    /// A corrupted transfer. Safe to retry with the next reading.
    ChecksumMismatch(ChecksumMismatch),
    /// Accessing the data line failed.
    Line(E),
}

impl<E> From<E> for Error<E> {
    fn from(e: E) -> Self {
        Self::Line(e)
    }
}

impl<E: fmt::Debug> fmt::Display for Error<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoResponse => write!(f, "No response from sensor"),
            Self::ChecksumMismatch(mismatch) => write!(f, "{}", mismatch),
            Self::Line(e) => write!(f, "Line error: {:?}", e),
        }
    }
}

/// Result of a complete read.
pub type Outcome<E> = Result<Reading, Error<E>>;

/// What to do if the line doesn't change while a data bit is expected.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum BitTimeoutPolicy {
    /// Take the bit as 0 and carry on. The checksum is the only safeguard,
    /// and an all-zero frame passes it.
    DegradeToZero,
    /// Abort the read with [`Error::NoResponse`].
    Abort,
}

impl Default for BitTimeoutPolicy {
    fn default() -> Self {
        Self::DegradeToZero
    }
}

/// Where a transfer currently is.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Resetting,
    AwaitingPresenceLow,
    AwaitingPresenceHigh,
    /// Waiting for data bit `n` (0-39, MSB of byte 0 first)
    ReadingBit(u8),
    Verifying,
    /// Transfer complete, with a valid reading or a checksum mismatch
    Done,
    /// Transfer aborted
    Failed,
}

impl Phase {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Phase::Done | Phase::Failed)
    }
}

/// Poll `line` until it reads `level`, at most `polls` times with 1 µs in
/// between. Returns whether the level was seen.
fn wait_for_level<L: SensorLine>(
    line: &mut L,
    delay: &mut impl DelayUs<u16>,
    level: bool,
    polls: u16,
) -> Result<bool, L::Error> {
    for _ in 0..polls {
        if line.read()? == level {
            return Ok(true);
        }
        delay.delay_us(1);
    }
    Ok(false)
}

pub struct Dht11<L> {
    line: L,
    phase: Phase,
    frame: [u8; FRAME_LEN],
    policy: BitTimeoutPolicy,
}

impl<L: SensorLine> Dht11<L> {
    pub fn new(line: L) -> Self {
        Self::with_policy(line, BitTimeoutPolicy::default())
    }

    pub fn with_policy(line: L, policy: BitTimeoutPolicy) -> Self {
        Self {
            line,
            phase: Phase::Idle,
            frame: [0; FRAME_LEN],
            policy,
        }
    }

    /// Return the data line.
    pub fn release(self) -> L {
        self.line
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn policy(&self) -> BitTimeoutPolicy {
        self.policy
    }

    /// Wait for the sensor to power up, then check that it responds.
    pub fn init(
        &mut self,
        delay: &mut (impl DelayUs<u16> + DelayMs<u16>),
    ) -> Result<(), Error<L::Error>> {
        self.line.set_output_mode()?;
        self.line.write(true)?;
        delay.delay_ms(timing::POWER_UP_MS);
        self.probe(delay)
    }

    /// Reset the sensor and wait for the presence pulse, without reading
    /// the data that follows.
    pub fn probe(
        &mut self,
        delay: &mut (impl DelayUs<u16> + DelayMs<u16>),
    ) -> Result<(), Error<L::Error>> {
        self.phase = Phase::Idle;
        while self.phase != Phase::ReadingBit(0) {
            self.step(delay)?;
        }
        self.phase = Phase::Idle;
        Ok(())
    }

    /// Run a complete transfer: reset, presence check, 40 data bits and
    /// checksum verification.
    ///
    /// Blocks for about 25 ms. Nothing is retried; readings should be at
    /// least [`timing::MIN_READ_INTERVAL_MS`] apart.
    pub fn read(&mut self, delay: &mut (impl DelayUs<u16> + DelayMs<u16>)) -> Outcome<L::Error> {
        self.phase = Phase::Idle;
        loop {
            if let Some(reading) = self.step(delay)? {
                return Ok(reading);
            }
        }
    }

    /// Execute the current phase and move on to the next one.
    ///
    /// Returns the reading once the frame has been verified. Stepping a
    /// finished (or failed) transfer starts a new one.
    pub fn step(
        &mut self,
        delay: &mut (impl DelayUs<u16> + DelayMs<u16>),
    ) -> Result<Option<Reading>, Error<L::Error>> {
        let result = self.advance(delay);
        match &result {
            Err(Error::ChecksumMismatch(_)) => self.phase = Phase::Done,
            Err(_) => self.phase = Phase::Failed,
            Ok(_) => {}
        }
        result
    }

    fn advance(
        &mut self,
        delay: &mut (impl DelayUs<u16> + DelayMs<u16>),
    ) -> Result<Option<Reading>, Error<L::Error>> {
        match self.phase {
            Phase::Idle | Phase::Done | Phase::Failed => {
                self.frame = [0; FRAME_LEN];
                self.phase = Phase::Resetting;
            }
            Phase::Resetting => {
                self.line.set_output_mode()?;
                self.line.write(false)?;
                delay.delay_ms(timing::RESET_LOW_MS);
                self.line.write(true)?;
                delay.delay_us(timing::RESET_RELEASE_US);
                self.phase = Phase::AwaitingPresenceLow;
            }
            Phase::AwaitingPresenceLow => {
                self.line.set_input_mode()?;
                if !wait_for_level(&mut self.line, delay, false, timing::PRESENCE_POLLS)? {
                    return Err(Error::NoResponse);
                }
                self.phase = Phase::AwaitingPresenceHigh;
            }
            Phase::AwaitingPresenceHigh => {
                if !wait_for_level(&mut self.line, delay, true, timing::PRESENCE_POLLS)? {
                    return Err(Error::NoResponse);
                }
                self.phase = Phase::ReadingBit(0);
            }
            Phase::ReadingBit(index) => {
                let bit = self.read_bit(delay)?;
                let byte = &mut self.frame[usize::from(index / 8)];
                *byte = (*byte << 1) | u8::from(bit);
                self.phase = if index + 1 < FRAME_BITS {
                    Phase::ReadingBit(index + 1)
                } else {
                    Phase::Verifying
                };
            }
            Phase::Verifying => {
                let reading = Reading::from_frame(self.frame).map_err(Error::ChecksumMismatch)?;
                self.phase = Phase::Done;
                return Ok(Some(reading));
            }
        }
        Ok(None)
    }

    fn read_bit(&mut self, delay: &mut impl DelayUs<u16>) -> Result<bool, Error<L::Error>> {
        // Falling edge starts the bit, rising edge starts the value pulse
        for level in [false, true] {
            if !wait_for_level(&mut self.line, delay, level, timing::BIT_POLLS)? {
                return match self.policy {
                    BitTimeoutPolicy::DegradeToZero => Ok(false),
                    BitTimeoutPolicy::Abort => Err(Error::NoResponse),
                };
            }
        }
        delay.delay_us(timing::SAMPLE_DELAY_US);
        Ok(self.line.read()?)
    }
}
