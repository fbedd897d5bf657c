#![cfg_attr(not(test), no_std)]
//! # Device Configuration
//!
//! The device configuration is read from EEPROM.
//!
//! ## Memory Map
//!
//! ```text
//!             0           8          16          24          32
//!             +-----------+-----------+-----------+-----------+
//! 0x0808_0000 | Version   | Magic                             |
//!             +-----------+-----------+-----------+-----------+
//! 0x0808_0004 | ReadInterval                                  |
//!             +-----------+-----------+-----------+-----------+
//! 0x0808_0008 | HeartbeatInterval     | Flags     | Reserved  |
//!             +-----------+-----------+-----------+-----------+
//! ```
//!
//! ## Fields
//!
//! ### Header (0x0808_0000 - 0x0808_0004, 4 bytes)
//!
//! - `Version`: The constant `0x01`, can be used to change the config layout
//!   in the future (1 byte)
//! - `Magic`: The sequence `0x48 0x59 0x47` ("HYG"), to detect uninitialized
//!   or corrupted EEPROM contents (3 bytes)
//!
//! ### Interval Configuration (0x0808_0004 - 0x0808_000A, 6 bytes)
//!
//! - `ReadInterval`: How often (in milliseconds) the sensor is read (4 bytes,
//!   u32, LE). Values below the sensor's minimum re-read interval of 2 s are
//!   raised to 2 s.
//! - `HeartbeatInterval`: How often (in milliseconds) the heartbeat LED
//!   toggles (2 bytes, u16, LE)
//!
//! ### Flags (0x0808_000A, 1 byte)
//!
//! - Bit 0: Strict bit timeouts. If set, a data bit that doesn't arrive in
//!   time aborts the reading instead of being read as 0.
//! - Bits 1-7 and the last byte are reserved and should be 0.
//!
//! Example: With the following values at `0x0808_0004`:
//!
//! ```text
//! +---------------------------------------------------+
//! | 00001388 | 000003e8             | 01 | 00         |
//! +---------------------------------------------------+
//! ```
//!
//! ...the sensor is read every 5 seconds with strict bit timeouts, and the
//! heartbeat LED toggles every second.

use core::{convert::TryInto, fmt};

use hygrometer_common::dht11::{timing::MIN_READ_INTERVAL_MS, BitTimeoutPolicy};

pub const BASE_ADDR: usize = 0x0808_0000;
pub const CONFIG_DATA_SIZE: usize = 12;

const MAGIC: [u8; 3] = [0x48, 0x59, 0x47];
const FLAG_STRICT_BIT_TIMEOUTS: u8 = 1 << 0;

#[derive(PartialEq, Eq, Debug, Copy, Clone)]
#[cfg_attr(feature = "serde", derive(serde_repr::Deserialize_repr))]
#[repr(u8)]
pub enum ConfigVersion {
    V1 = 1,
}

impl fmt::Display for ConfigVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::V1 => write!(f, "1"),
        }
    }
}

#[derive(PartialEq, Eq, Debug, Copy, Clone)]
pub enum ConfigError {
    /// The version byte is not supported.
    UnsupportedVersion(u8),
    /// Wrong magic bytes, the configuration data might be corrupted.
    WrongMagicBytes,
    /// Less than [`CONFIG_DATA_SIZE`] bytes of configuration data.
    TooShort(usize),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnsupportedVersion(v) => write!(f, "Unsupported config format version ({})", v),
            Self::WrongMagicBytes => write!(f, "Wrong magic bytes"),
            Self::TooShort(len) => write!(
                f,
                "Config data too short ({} instead of {} bytes)",
                len, CONFIG_DATA_SIZE
            ),
        }
    }
}

#[derive(PartialEq, Eq, Debug, Copy, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize))]
pub struct Config {
    /// Configuration format version
    pub version: ConfigVersion,
    /// How often (in milliseconds) the sensor is read
    pub read_interval_ms: u32,
    /// How often (in milliseconds) the heartbeat LED toggles
    pub heartbeat_interval_ms: u16,
    /// Abort a reading if a data bit doesn't arrive in time
    #[cfg_attr(feature = "serde", serde(default))]
    pub strict_bit_timeouts: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            version: ConfigVersion::V1,
            read_interval_ms: MIN_READ_INTERVAL_MS,
            heartbeat_interval_ms: 500,
            strict_bit_timeouts: false,
        }
    }
}

impl Config {
    /// Read current device configuration from EEPROM.
    ///
    /// Returns an error if the version field does not contain a supported
    /// value or if the magic bytes don't match.
    ///
    /// UNSAFE: This method is unsafe because it reads raw memory. When calling
    /// this, ensure that no other part of the code can write to EEPROM at the
    /// same time. An easy way to do this, is to hold a mutable reference to
    /// the `pac::FLASH` peripheral.
    pub unsafe fn read_from_eeprom() -> Result<Self, ConfigError> {
        // Note(unsafe): Read with no side effects. See function docs for more
        // information.
        let config_data: &[u8] =
            core::slice::from_raw_parts(BASE_ADDR as *const u8, CONFIG_DATA_SIZE);
        Self::parse(config_data)
    }

    /// Parse the in-memory representation.
    pub fn parse(config_data: &[u8]) -> Result<Self, ConfigError> {
        if config_data.len() < CONFIG_DATA_SIZE {
            return Err(ConfigError::TooShort(config_data.len()));
        }

        // Determine version
        let version: ConfigVersion = match config_data[0] {
            1 => ConfigVersion::V1,
            other => return Err(ConfigError::UnsupportedVersion(other)),
        };

        // Validate magic bytes
        if config_data[0x01..0x04] != MAGIC {
            return Err(ConfigError::WrongMagicBytes);
        }

        // Read interval data. The length was checked above, so the slice
        // conversions can't fail.
        let read_interval_ms = config_data[0x04..0x08]
            .try_into()
            .map(u32::from_le_bytes)
            .map_err(|_| ConfigError::TooShort(config_data.len()))?;
        let heartbeat_interval_ms = config_data[0x08..0x0A]
            .try_into()
            .map(u16::from_le_bytes)
            .map_err(|_| ConfigError::TooShort(config_data.len()))?;

        let flags = config_data[0x0A];

        Ok(Self {
            version,
            read_interval_ms,
            heartbeat_interval_ms,
            strict_bit_timeouts: flags & FLAG_STRICT_BIT_TIMEOUTS != 0,
        })
    }

    /// Serialize the configuration into the in-memory representation.
    pub fn serialize(&self) -> [u8; CONFIG_DATA_SIZE] {
        let mut data = [0; CONFIG_DATA_SIZE];

        // Write version
        data[0] = self.version as u8;

        // Write magic bytes
        data[0x01..0x04].copy_from_slice(&MAGIC);

        // Write intervals
        data[0x04..0x08].copy_from_slice(&u32::to_le_bytes(self.read_interval_ms));
        data[0x08..0x0A].copy_from_slice(&u16::to_le_bytes(self.heartbeat_interval_ms));

        // Write flags
        if self.strict_bit_timeouts {
            data[0x0A] |= FLAG_STRICT_BIT_TIMEOUTS;
        }

        data
    }

    /// The read interval, raised to the sensor's minimum re-read interval.
    pub fn effective_read_interval_ms(&self) -> u32 {
        self.read_interval_ms.max(MIN_READ_INTERVAL_MS)
    }

    pub fn bit_timeout_policy(&self) -> BitTimeoutPolicy {
        if self.strict_bit_timeouts {
            BitTimeoutPolicy::Abort
        } else {
            BitTimeoutPolicy::DegradeToZero
        }
    }
}

impl fmt::Display for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "v{}, read every {} ms, heartbeat every {} ms, {} bit timeouts",
            self.version,
            self.effective_read_interval_ms(),
            self.heartbeat_interval_ms,
            if self.strict_bit_timeouts {
                "strict"
            } else {
                "lenient"
            },
        )
    }
}
