//! Create the EEPROM config image based on a toml configfile, or inspect an
//! existing image.
//!
//! The image is written to a binary file that can be flashed to the EEPROM
//! base address (0x0808_0000) with any flashing tool.

use std::{fs, path::PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use hygrometer_config::{Config, BASE_ADDR};
use log::{debug, info, warn};

/// This doc string acts as a help message when the user runs '--help'
/// as do all doc strings on fields
#[derive(Parser)]
struct Opts {
    #[clap(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Serialize a configuration file into an EEPROM image.
    Encode {
        /// Path to a configuration file in TOML format.
        #[clap(short, long)]
        config: PathBuf,
        /// Where to write the EEPROM image.
        #[clap(short, long)]
        output: PathBuf,
    },
    /// Show the configuration stored in an EEPROM image.
    Decode {
        /// Path to an EEPROM image.
        image: PathBuf,
    },
}

/// Format `data` as rows of 16 bytes, prefixed with the EEPROM address.
fn hexdump(data: &[u8]) -> String {
    data.chunks(16)
        .enumerate()
        .map(|(i, chunk)| {
            let bytes: Vec<String> = chunk.iter().map(|b| format!("{:02x}", b)).collect();
            format!("0x{:08x}: {}\n", BASE_ADDR + i * 16, bytes.join(" "))
        })
        .collect()
}

fn encode(config_path: &PathBuf, output_path: &PathBuf) -> Result<()> {
    // Parse config
    let config_source = fs::read_to_string(config_path).context("Could not read config file")?;
    let config: Config = toml::from_str(&config_source).context("Could not parse config file")?;
    debug!("Parsed config: {:?}", config);
    if config.effective_read_interval_ms() != config.read_interval_ms {
        warn!(
            "Read interval of {} ms is below the sensor minimum, the firmware will use {} ms",
            config.read_interval_ms,
            config.effective_read_interval_ms()
        );
    }

    // Write image
    let data = config.serialize();
    fs::write(output_path, &data).context("Could not write EEPROM image")?;
    info!("Wrote {} bytes to {}", data.len(), output_path.display());

    println!("Config: {}", config);
    print!("{}", hexdump(&data));
    Ok(())
}

fn decode(image_path: &PathBuf) -> Result<()> {
    let data = fs::read(image_path).context("Could not read EEPROM image")?;
    debug!("Read {} bytes", data.len());
    print!("{}", hexdump(&data));

    let config = Config::parse(&data)
        .map_err(|e| anyhow::anyhow!("{}", e))
        .context("Invalid EEPROM image")?;
    println!("Config: {}", config);
    Ok(())
}

fn main() -> Result<()> {
    env_logger::init();

    // Parse command line args
    let opts: Opts = Opts::parse();

    match &opts.command {
        Command::Encode { config, output } => encode(config, output),
        Command::Decode { image } => decode(image),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hexdump() {
        let data: Vec<u8> = (0..20).collect();
        assert_eq!(
            hexdump(&data),
            "0x08080000: 00 01 02 03 04 05 06 07 08 09 0a 0b 0c 0d 0e 0f\n\
             0x08080010: 10 11 12 13\n"
        );
    }

    #[test]
    fn test_parse_toml_config() {
        let config: Config = toml::from_str(
            "version = 1\n\
             read_interval_ms = 5000\n\
             heartbeat_interval_ms = 1000\n\
             strict_bit_timeouts = true\n",
        )
        .unwrap();
        assert_eq!(config.read_interval_ms, 5000);
        assert_eq!(config.heartbeat_interval_ms, 1000);
        assert!(config.strict_bit_timeouts);
        assert_eq!(Config::parse(&config.serialize()), Ok(config));
    }

    #[test]
    fn test_strict_flag_defaults_to_lenient() {
        let config: Config = toml::from_str(
            "version = 1\n\
             read_interval_ms = 2000\n\
             heartbeat_interval_ms = 500\n",
        )
        .unwrap();
        assert_eq!(config, Config::default());
    }
}
