//! Collaborator traits for the edge hardware: the ultrasonic range sensor
//! and the alarm LED. The production implementation for both is the serial
//! sensor board in [`crate::serial_hardware`]; the simulated one lives in
//! [`crate::sim_hardware`]. Keeping the seams here lets the edge loop run
//! against scripted fakes in tests.

use log::warn;
use std::error::Error;
use std::fmt::Display;
use std::sync::{Arc, Mutex};

/// Errors surfaced by a hardware backend.
#[derive(Debug)]
pub enum HardwareError {
    /// The underlying device IO failed.
    Io(std::io::Error),
    /// No complete reading arrived within the read timeout.
    Timeout,
    /// The device closed the connection (read returned zero bytes).
    Disconnected,
}

impl Display for HardwareError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:#?}", self)
    }
}

impl Error for HardwareError {}

impl From<std::io::Error> for HardwareError {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value)
    }
}

/// An ultrasonic range sensor.
pub trait DistanceSensor {
    /// Reads one distance sample, in meters.
    fn read_distance_meters(&mut self) -> Result<f64, HardwareError>;

    /// Reads one distance sample and converts it to non-negative
    /// centimeters. A failed read substitutes `0.0`, which is below any
    /// sane threshold and so leaves the system in the alarm state until a
    /// real reading arrives.
    fn read_distance_cm(&mut self) -> f64 {
        match self.read_distance_meters() {
            Ok(meters) => (meters * 100.0).max(0.0),
            Err(e) => {
                warn!("failed to read distance: {}", e);
                0.0
            }
        }
    }
}

/// The alarm LED. Drive failures are reported by the implementation and
/// never surfaced to the loop.
pub trait Led {
    /// Lights the LED.
    fn on(&mut self);
    /// Darkens the LED.
    fn off(&mut self);
}

// The serial board serves both traits over one port, so the edge binary
// hands out shared handles to it.
impl<T: DistanceSensor> DistanceSensor for Arc<Mutex<T>> {
    fn read_distance_meters(&mut self) -> Result<f64, HardwareError> {
        self.lock().unwrap().read_distance_meters()
    }
}

impl<T: Led> Led for Arc<Mutex<T>> {
    fn on(&mut self) {
        self.lock().unwrap().on()
    }

    fn off(&mut self) {
        self.lock().unwrap().off()
    }
}

impl<T: DistanceSensor + ?Sized> DistanceSensor for Box<T> {
    fn read_distance_meters(&mut self) -> Result<f64, HardwareError> {
        (**self).read_distance_meters()
    }
}

impl<T: Led + ?Sized> Led for Box<T> {
    fn on(&mut self) {
        (**self).on()
    }

    fn off(&mut self) {
        (**self).off()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedSensor(Result<f64, HardwareError>);

    impl DistanceSensor for FixedSensor {
        fn read_distance_meters(&mut self) -> Result<f64, HardwareError> {
            std::mem::replace(&mut self.0, Err(HardwareError::Timeout))
        }
    }

    /// Checks the meters-to-centimeters conversion and the non-negative
    /// clamp on the default method.
    #[test]
    fn test_cm_conversion_clamps() {
        let mut sensor = FixedSensor(Ok(0.357));
        assert!((sensor.read_distance_cm() - 35.7).abs() < 1e-9);

        let mut sensor = FixedSensor(Ok(-0.02));
        assert_eq!(sensor.read_distance_cm(), 0.0);
    }

    /// A failed read substitutes zero distance rather than propagating.
    #[test]
    fn test_failed_read_is_zero() {
        let mut sensor = FixedSensor(Err(HardwareError::Disconnected));
        assert_eq!(sensor.read_distance_cm(), 0.0);
    }
}
