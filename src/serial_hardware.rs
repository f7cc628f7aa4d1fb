//! The production hardware backend: a small sensor board on a serial port
//! that streams `+RANGE` lines (see [`crate::line_protocol`]) and accepts
//! `LED ON` / `LED OFF` commands on the same link.

use crate::hardware::{DistanceSensor, HardwareError, Led};
use crate::line_protocol::SensorEvent;

use log::{info, warn};
use serial2::SerialPort;
use std::io::ErrorKind;
use std::str::FromStr;
use std::time::Duration;

const READ_CHUNK: usize = 256;

/// Serial-attached ultrasonic sensor board. One instance serves both the
/// [`DistanceSensor`] and [`Led`] traits; the edge binary shares it via
/// `Arc<Mutex<_>>`.
pub struct SensorBoard {
    port: SerialPort,
    carry: Vec<u8>,
    led_lit: Option<bool>,
}

impl SensorBoard {
    /// Opens the board on `device` at the given baud rate. The read
    /// timeout bounds how long one poll may block waiting for a line.
    pub fn open(device: &str, baud: u32, read_timeout: Duration) -> Result<Self, HardwareError> {
        let mut port = SerialPort::open(device, baud)?;
        port.set_read_timeout(read_timeout)?;
        Ok(Self {
            port,
            carry: Vec::new(),
            led_lit: None,
        })
    }

    fn write_led(&mut self, lit: bool) {
        // The board latches the LED, so repeating the current state is
        // just serial traffic. Skip it.
        if self.led_lit == Some(lit) {
            return;
        }
        let command: &[u8] = if lit { b"LED ON\n" } else { b"LED OFF\n" };
        match self.port.write_all(command) {
            Ok(()) => self.led_lit = Some(lit),
            Err(e) => warn!("failed to drive LED: {}", e),
        }
    }
}

impl DistanceSensor for SensorBoard {
    /// Reads until the board produces a complete `+RANGE` line, skipping
    /// boot announcements and warning on anything unparseable.
    fn read_distance_meters(&mut self) -> Result<f64, HardwareError> {
        loop {
            while let Some(line) = take_line(&mut self.carry) {
                match SensorEvent::from_str(&line) {
                    Ok(SensorEvent::Range(report)) => return Ok(report.meters),
                    Ok(SensorEvent::Boot(report)) => {
                        info!("sensor board restarted, firmware {}", report.firmware);
                    }
                    // Often happens at the beginning of transmission when
                    // there is still garbage in the hardware buffer
                    Err(e) => {
                        warn!("was unable to parse sensor line: {}", e);
                    }
                }
            }

            let mut chunk = [0u8; READ_CHUNK];
            let read_len = self.port.read(&mut chunk).map_err(|e| {
                match e.kind() {
                    ErrorKind::TimedOut | ErrorKind::WouldBlock => HardwareError::Timeout,
                    _ => HardwareError::Io(e),
                }
            })?;
            if read_len == 0 {
                return Err(HardwareError::Disconnected);
            }
            self.carry.extend_from_slice(&chunk[..read_len]);
        }
    }
}

impl Led for SensorBoard {
    fn on(&mut self) {
        self.write_led(true)
    }

    fn off(&mut self) {
        self.write_led(false)
    }
}

/// Splits the first complete line off `carry`, trimming the terminator.
/// Returns `None` until a full line has been buffered.
fn take_line(carry: &mut Vec<u8>) -> Option<String> {
    let newline = carry.iter().position(|&c| c == b'\n')?;
    let line: Vec<u8> = carry.drain(..=newline).collect();
    Some(String::from_utf8_lossy(&line).trim_end().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Bytes arriving in arbitrary chunks reassemble into whole lines, and
    /// partial tails stay buffered.
    #[test]
    fn test_take_line_buffers_partial_input() {
        let mut carry = Vec::new();
        carry.extend_from_slice(b"+RANGE:1,0.2");
        assert_eq!(take_line(&mut carry), None);

        carry.extend_from_slice(b"50\r\n+RANGE:2,");
        assert_eq!(take_line(&mut carry), Some("+RANGE:1,0.250".to_string()));
        assert_eq!(take_line(&mut carry), None);
        assert_eq!(carry, b"+RANGE:2,");
    }

    #[test]
    fn test_take_line_multiple_buffered_lines() {
        let mut carry = b"+BOOT:pw-sensor-1.2\n+RANGE:1,0.5\n".to_vec();
        assert_eq!(take_line(&mut carry), Some("+BOOT:pw-sensor-1.2".to_string()));
        assert_eq!(take_line(&mut carry), Some("+RANGE:1,0.5".to_string()));
        assert_eq!(take_line(&mut carry), None);
        assert!(carry.is_empty());
    }
}
