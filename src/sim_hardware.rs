//! Simulated hardware for development machines without the sensor board
//! attached. The sensor performs a noisy random walk so the alarm
//! threshold gets crossed now and then; the LED just logs its transitions.

use crate::hardware::{DistanceSensor, HardwareError, Led};

use log::debug;
use rand::prelude::*;

const WALK_STEP_M: f64 = 0.03;
const MIN_RANGE_M: f64 = 0.05;
const MAX_RANGE_M: f64 = 2.0;

/// A [`DistanceSensor`] that wanders between [`MIN_RANGE_M`] and
/// [`MAX_RANGE_M`] without any hardware attached.
pub struct SimulatedSensor {
    meters: f64,
}

impl SimulatedSensor {
    /// Starts the walk at a comfortable half meter.
    pub fn new() -> Self {
        Self { meters: 0.5 }
    }
}

impl Default for SimulatedSensor {
    fn default() -> Self {
        Self::new()
    }
}

impl DistanceSensor for SimulatedSensor {
    fn read_distance_meters(&mut self) -> Result<f64, HardwareError> {
        let mut rng = thread_rng();
        self.meters = (self.meters + rng.gen_range(-WALK_STEP_M..WALK_STEP_M))
            .clamp(MIN_RANGE_M, MAX_RANGE_M);
        Ok(self.meters)
    }
}

/// A [`Led`] substitute that records and logs its state.
#[derive(Debug, Default)]
pub struct SimulatedLed {
    lit: bool,
}

impl SimulatedLed {
    /// A dark LED.
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether the LED is currently lit.
    pub fn is_lit(&self) -> bool {
        self.lit
    }
}

impl Led for SimulatedLed {
    fn on(&mut self) {
        if !self.lit {
            debug!("LED on");
        }
        self.lit = true;
    }

    fn off(&mut self) {
        if self.lit {
            debug!("LED off");
        }
        self.lit = false;
    }
}
