//! Proxwatch is a two-node perimeter monitor. An edge box polls an
//! ultrasonic range sensor and derives an alarm condition from a fixed
//! distance threshold. While the alarm holds, it blinks an LED, pushes the
//! reading and the alarm flag to a cloud dashboard, appends a CSV log
//! record, and asks a second machine over a raw TCP socket to photograph
//! the scene. That second machine runs [`capture_server`], a blocking
//! accept loop that saves one webcam frame per signal.
//!
//! The edge side is the `proxwatch` binary, the camera side is the
//! `capture-server` binary. Both are thin drivers around the library
//! modules here, so every hardware and network collaborator can be swapped
//! for a fake in tests (see [`sim_hardware`] and [`camera::TestCamera`]).

#![warn(missing_docs)]
pub mod alarm;
pub mod args;
pub mod camera;
pub mod capture_server;
pub mod capture_signal;
pub mod distance_log;
pub mod edge_loop;
pub mod hardware;
pub mod line_protocol;
pub mod pacing;
pub mod serial_hardware;
pub mod sim_hardware;
pub mod telemetry;
pub mod telemetry_protocol;
