//! Decoder for the newline-delimited report lines the sensor board writes
//! to its serial port. The board emits one `+RANGE` line per measurement
//! and a single `+BOOT` line when its firmware (re)starts:
//!
//! ```text
//! +BOOT:pw-sensor-1.2
//! +RANGE:142,0.357
//! ```
//!
//! A `+RANGE` line carries the board's measurement sequence number and the
//! measured distance in meters.

use nom::{
    branch::alt,
    bytes::complete::{tag, take_while1},
    character::complete::u32,
    combinator::map,
    error::Error,
    number::complete::double,
    sequence::{preceded, tuple},
    Finish, IResult,
};

use std::str::FromStr;

/// One distance measurement reported by the board.
#[derive(Debug, Clone, PartialEq)]
pub struct RangeReport {
    /// Measurement sequence number, wrapping at the board's discretion.
    pub sequence: u32,
    /// Measured distance in meters.
    pub meters: f64,
}

/// Firmware announcement emitted once per board start.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BootReport {
    /// Firmware identifier, e.g. `pw-sensor-1.2`.
    pub firmware: String,
}

/// Any line the sensor board is allowed to emit.
#[derive(Debug, Clone, PartialEq)]
pub enum SensorEvent {
    /// A `+RANGE` measurement line.
    Range(RangeReport),
    /// A `+BOOT` firmware announcement.
    Boot(BootReport),
}

fn parse_range(s: &str) -> IResult<&str, RangeReport> {
    map(
        preceded(tag("+RANGE:"), tuple((u32, preceded(tag(","), double)))),
        |(sequence, meters)| RangeReport { sequence, meters },
    )(s)
}

fn parse_boot(s: &str) -> IResult<&str, BootReport> {
    map(
        preceded(
            tag("+BOOT:"),
            take_while1(|c: char| c.is_ascii_alphanumeric() || c == '-' || c == '.'),
        ),
        |firmware: &str| BootReport {
            firmware: firmware.to_owned(),
        },
    )(s)
}

fn parse_sensor_event(s: &str) -> IResult<&str, SensorEvent> {
    alt((
        map(parse_range, SensorEvent::Range),
        map(parse_boot, SensorEvent::Boot),
    ))(s)
}

impl FromStr for SensorEvent {
    type Err = Error<String>;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match parse_sensor_event(s).finish() {
            Ok((_remaining, event)) => Ok(event),
            Err(Error { input, code }) => Err(Error {
                input: input.to_string(),
                code,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_range_line() {
        let s = "+RANGE:142,0.357";

        let (leftover, res) = parse_range(s).unwrap();

        assert_eq!(leftover, "");
        assert_eq!(
            res,
            RangeReport {
                sequence: 142,
                meters: 0.357,
            }
        );
    }

    #[test]
    fn test_range_line_negative_reading() {
        // Boards occasionally report a small negative range right at the
        // transducer face; the parser passes it through unchanged.
        let s = "+RANGE:9,-0.004";

        let (leftover, res) = parse_range(s).unwrap();

        assert_eq!(leftover, "");
        assert_eq!(res.sequence, 9);
        assert!(res.meters < 0.0);
    }

    #[test]
    fn test_boot_line() {
        let s = "+BOOT:pw-sensor-1.2";

        let event = SensorEvent::from_str(s).unwrap();

        assert_eq!(
            event,
            SensorEvent::Boot(BootReport {
                firmware: "pw-sensor-1.2".to_owned(),
            })
        );
    }

    #[test]
    fn test_garbage_line_is_rejected() {
        assert!(SensorEvent::from_str("+UNKNOWN:1,2").is_err());
        assert!(SensorEvent::from_str("").is_err());
    }
}
