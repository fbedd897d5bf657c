//! Formatting of sensor readings for the debug serial port.

use core::fmt::{self, Write};

use hygrometer_common::dht11::{Error, Outcome};

/// Write one line describing reading number `seq`, taken at tick `at`.
///
/// With `verbose` set, successful readings also show the raw frame.
pub fn write_outcome<W, E>(
    w: &mut W,
    seq: u32,
    at: u32,
    outcome: &Outcome<E>,
    verbose: bool,
) -> fmt::Result
where
    W: Write,
    E: fmt::Debug,
{
    write!(w, "[{:>10}] Reading #{}: ", at, seq)?;
    match outcome {
        Ok(reading) => {
            write!(w, "{}, checksum 0x{:02x}", reading, reading.checksum)?;
            if verbose {
                let raw = reading.raw();
                write!(
                    w,
                    " ({:02x} {:02x} {:02x} {:02x} {:02x})",
                    raw[0], raw[1], raw[2], raw[3], raw[4]
                )?;
            }
        }
        Err(e @ Error::ChecksumMismatch(_)) => write!(w, "Corrupted: {}", e)?,
        Err(e) => write!(w, "Failed: {}", e)?,
    }
    writeln!(w)
}
