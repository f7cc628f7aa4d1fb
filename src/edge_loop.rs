//! The sense-decide-act loop on the edge box. Every iteration pumps the
//! telemetry client, polls the sensor, drives the LED, maybe fires a
//! capture signal, and flushes a log record once per interval. No failure
//! in any of that stops the loop; everything is reported and retried on a
//! later tick.

use crate::alarm::Status;
use crate::capture_signal::CaptureSignaler;
use crate::distance_log::{DistanceLog, LogRecord};
use crate::hardware::{DistanceSensor, Led};
use crate::pacing::{blink_on, Clock, CooldownGate, IntervalGate};
use crate::telemetry::Telemetry;

use chrono::Local;
use log::{info, warn};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

/// Virtual channel carrying the distance in centimeters.
pub const CHANNEL_DISTANCE: u16 = 0;
/// Virtual channel carrying the alarm flag.
pub const CHANNEL_ALARM: u16 = 1;

/// Tunables for the edge loop.
#[derive(Debug, Clone)]
pub struct EdgeConfig {
    /// Alarm threshold in centimeters.
    pub threshold_cm: f64,
    /// Spacing between log/telemetry flushes.
    pub log_interval: Duration,
    /// Minimum spacing between successful capture signals.
    pub capture_cooldown: Duration,
    /// Sleep at the end of each iteration, bounding the polling rate.
    pub poll_slice: Duration,
}

impl Default for EdgeConfig {
    fn default() -> Self {
        Self {
            threshold_cm: crate::alarm::DEFAULT_THRESHOLD_CM,
            log_interval: Duration::from_secs(1),
            capture_cooldown: Duration::from_secs(5),
            poll_slice: Duration::from_millis(100),
        }
    }
}

/// The loop itself, generic over its collaborators so tests can hand it
/// scripted fakes and a hand-cranked clock.
pub struct EdgeLoop<S, L, T, G, K>
where
    S: DistanceSensor,
    L: Led,
    T: Telemetry,
    G: CaptureSignaler,
    K: Clock,
{
    sensor: S,
    led: L,
    telemetry: T,
    signaler: G,
    clock: K,
    config: EdgeConfig,
    log: DistanceLog,
    log_gate: IntervalGate,
    cooldown: CooldownGate,
}

impl<S, L, T, G, K> EdgeLoop<S, L, T, G, K>
where
    S: DistanceSensor,
    L: Led,
    T: Telemetry,
    G: CaptureSignaler,
    K: Clock,
{
    /// Wires the loop up and initializes the log file. A log that cannot
    /// be initialized is reported and the loop runs anyway; appends will
    /// keep failing and keep being reported.
    pub fn new(
        sensor: S,
        led: L,
        telemetry: T,
        signaler: G,
        clock: K,
        config: EdgeConfig,
        log: DistanceLog,
    ) -> Self {
        if let Err(e) = log.initialize() {
            warn!("failed to initialize log file: {}", e);
        }
        let now = clock.now();
        let log_gate = IntervalGate::new(config.log_interval, now);
        let cooldown = CooldownGate::new(config.capture_cooldown);
        Self {
            sensor,
            led,
            telemetry,
            signaler,
            clock,
            config,
            log,
            log_gate,
            cooldown,
        }
    }

    /// One iteration of the loop, without the trailing sleep.
    pub fn tick(&mut self) {
        if let Err(e) = self.telemetry.run() {
            warn!("telemetry pump failed: {}", e);
        }

        let distance_cm = self.sensor.read_distance_cm();
        let status = Status::from_distance(distance_cm, self.config.threshold_cm);

        if status.is_alarm() {
            if blink_on(self.clock.now()) {
                self.led.on();
            } else {
                self.led.off();
            }
        } else {
            self.led.off();
        }

        if status.is_alarm() && self.cooldown.ready(self.clock.now()) && self.signaler.signal() {
            // Re-arm from the send's completion time, not its start.
            self.cooldown.arm(self.clock.now());
        }

        if self.log_gate.ready(self.clock.now()) {
            self.flush(distance_cm, status);
        }
    }

    /// Publishes to the dashboard and appends the log record. Each half
    /// fails independently.
    fn flush(&mut self, distance_cm: f64, status: Status) {
        if let Err(e) = self.telemetry.publish(CHANNEL_DISTANCE, distance_cm) {
            warn!("failed to publish distance: {}", e);
        }
        if let Err(e) = self
            .telemetry
            .publish(CHANNEL_ALARM, f64::from(status.flag()))
        {
            warn!("failed to publish alarm flag: {}", e);
        }

        let record = LogRecord {
            timestamp: Local::now(),
            distance_cm,
            status,
        };
        match self.log.append(&record) {
            Ok(()) => info!("logged {:.2} cm, {}", distance_cm, status),
            Err(e) => warn!("failed to log distance data: {}", e),
        }
    }

    /// Runs until `stop` is raised, sleeping one poll slice per tick.
    pub fn run(&mut self, stop: &AtomicBool) {
        info!(
            "edge loop started, threshold {} cm",
            self.config.threshold_cm
        );
        let sleeper = spin_sleep::SpinSleeper::default();
        while !stop.load(Ordering::Relaxed) {
            self.tick();
            sleeper.sleep(self.config.poll_slice);
        }
        self.led.off();
        info!("edge loop stopped");
    }
}
