//! The edge binary: wires the sensor board, the dashboard client, the
//! capture signaler, and the CSV log into the polling loop and runs it
//! until the process is killed.
//!
//! ```bash
//! # stock deployment, sensor board on /dev/ttyACM0
//! proxwatch
//!
//! # development without hardware or dashboard
//! proxwatch --simulate --no-telemetry
//! ```

use clap::Parser;
use log::info;
use proxwatch::{
    args::EdgeArgs,
    capture_signal::{TcpCaptureSignaler, SIGNAL_TIMEOUT},
    distance_log::DistanceLog,
    edge_loop::{EdgeConfig, EdgeLoop},
    hardware::{DistanceSensor, Led},
    pacing::SystemClock,
    serial_hardware::SensorBoard,
    sim_hardware::{SimulatedLed, SimulatedSensor},
    telemetry::{BlynkClient, BlynkConfig, NullTelemetry, Telemetry},
};
use std::sync::atomic::AtomicBool;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// How long one sensor poll may wait for a line from the board.
const SENSOR_READ_TIMEOUT: Duration = Duration::from_secs(1);

fn main() {
    env_logger::init();
    let args = EdgeArgs::parse();

    info!(
        "proxwatch starting, threshold {} cm, capture server {}",
        args.threshold_cm, args.server
    );

    let (sensor, led): (Box<dyn DistanceSensor>, Box<dyn Led>) = if args.simulate {
        info!("using simulated hardware");
        (
            Box::new(SimulatedSensor::new()),
            Box::new(SimulatedLed::new()),
        )
    } else {
        let board = SensorBoard::open(&args.device, args.baud, SENSOR_READ_TIMEOUT)
            .expect("failed to open the sensor board");
        let board = Arc::new(Mutex::new(board));
        (Box::new(board.clone()), Box::new(board))
    };

    let telemetry: Box<dyn Telemetry> = if args.no_telemetry {
        Box::new(NullTelemetry)
    } else {
        Box::new(BlynkClient::new(BlynkConfig {
            host: args.telemetry_host.clone(),
            port: args.telemetry_port,
            token: args.token.clone(),
        }))
    };

    let signaler = TcpCaptureSignaler::new(args.server.clone(), SIGNAL_TIMEOUT);

    let config = EdgeConfig {
        threshold_cm: args.threshold_cm,
        log_interval: Duration::from_secs_f64(args.log_interval),
        capture_cooldown: Duration::from_secs_f64(args.cooldown),
        ..EdgeConfig::default()
    };

    let mut edge = EdgeLoop::new(
        sensor,
        led,
        telemetry,
        signaler,
        SystemClock,
        config,
        DistanceLog::new(args.log_file),
    );

    // Runs until the process is interrupted; there is no persistent state
    // to tear down, the log file is closed after every append.
    let stop = AtomicBool::new(false);
    edge.run(&stop);
}
