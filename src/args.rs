// Commandline argument parsers using clap, one per binary. Every default
// matches the values the deployed install runs with, so starting either
// binary with no flags gives the stock behavior.

#![allow(missing_docs)]

use clap::Parser;
use std::path::PathBuf;

#[derive(Debug, Parser, Clone)]
#[clap(version, about = "Edge loop: poll the range sensor, drive the alarm")]
pub struct EdgeArgs {
    /// Serial device the sensor board is attached to
    #[arg(short = 'd', long = "device", default_value = "/dev/ttyACM0")]
    pub device: String,

    /// Baud rate of the sensor board link
    #[arg(long = "baud", default_value_t = 115200)]
    pub baud: u32,

    /// Alarm threshold, in centimeters
    #[arg(short = 't', long = "threshold", default_value_t = 20.0)]
    pub threshold_cm: f64,

    /// Capture server to signal when motion is detected, host:port
    #[arg(short = 's', long = "server", default_value = "192.168.137.77:5000")]
    pub server: String,

    /// CSV file distance records are appended to
    #[arg(long = "log-file", default_value = "data/distance_log.csv")]
    pub log_file: PathBuf,

    /// Seconds between log/telemetry flushes
    #[arg(long = "log-interval", default_value_t = 1.0)]
    pub log_interval: f64,

    /// Minimum seconds between capture signals
    #[arg(long = "cooldown", default_value_t = 5.0)]
    pub cooldown: f64,

    /// Dashboard auth token
    #[arg(
        long = "token",
        default_value = "p9p35YSnwBZFiHwVaTbKpruU3UgGdkGi",
        hide_default_value = true
    )]
    pub token: String,

    /// Dashboard host
    #[arg(long = "telemetry-host", default_value = "blynk.cloud")]
    pub telemetry_host: String,

    /// Dashboard plaintext hardware port
    #[arg(long = "telemetry-port", default_value_t = 80)]
    pub telemetry_port: u16,

    /// Do not talk to the dashboard at all
    #[arg(long = "no-telemetry")]
    pub no_telemetry: bool,

    /// Use a simulated sensor and LED instead of the serial board
    #[arg(long = "simulate")]
    pub simulate: bool,
}

#[derive(Debug, Parser, Clone)]
#[clap(version, about = "Capture server: save one webcam photo per signal")]
pub struct ServerArgs {
    /// Address to listen on, host:port
    #[arg(short = 'l', long = "listen", default_value = "0.0.0.0:5000")]
    pub listen: String,

    /// Directory captured photos are written into
    #[arg(long = "captures-dir", default_value = "captures")]
    pub captures_dir: PathBuf,

    /// V4L2 device index of the webcam
    #[arg(long = "camera-index", default_value_t = 0)]
    pub camera_index: usize,

    /// Use synthetic frames instead of a real camera
    #[arg(long = "test-camera")]
    pub test_camera: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Running bare must reproduce the deployed constants.
    #[test]
    fn test_edge_defaults() {
        let args = EdgeArgs::parse_from(["proxwatch"]);
        assert_eq!(args.threshold_cm, 20.0);
        assert_eq!(args.server, "192.168.137.77:5000");
        assert_eq!(args.log_interval, 1.0);
        assert_eq!(args.cooldown, 5.0);
        assert!(!args.simulate);
    }

    #[test]
    fn test_server_defaults() {
        let args = ServerArgs::parse_from(["capture-server"]);
        assert_eq!(args.listen, "0.0.0.0:5000");
        assert_eq!(args.captures_dir, PathBuf::from("captures"));
        assert_eq!(args.camera_index, 0);
    }
}
