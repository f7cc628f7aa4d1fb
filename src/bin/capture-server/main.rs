//! The camera-side binary: accept capture signals, photograph the scene.
//!
//! ```bash
//! # stock deployment, webcam on /dev/video0
//! capture-server
//!
//! # development without a webcam
//! capture-server --test-camera
//! ```

use clap::Parser;
use log::info;
use proxwatch::{
    args::ServerArgs,
    camera::{Camera, TestCamera},
    capture_server::CaptureServer,
};
use std::net::TcpListener;
use std::sync::atomic::AtomicBool;

#[cfg(feature = "v4l2")]
fn webcam(index: usize) -> Box<dyn Camera> {
    Box::new(proxwatch::camera::v4l2::V4l2Camera::new(index))
}

#[cfg(not(feature = "v4l2"))]
fn webcam(_index: usize) -> Box<dyn Camera> {
    panic!("built without v4l2 support; run with --test-camera");
}

fn main() {
    env_logger::init();
    let args = ServerArgs::parse();

    let camera: Box<dyn Camera> = if args.test_camera {
        info!("using synthetic test frames");
        Box::new(TestCamera::new())
    } else {
        webcam(args.camera_index)
    };

    let mut server = CaptureServer::new(camera, &args.captures_dir)
        .expect("failed to create the captures directory");
    let listener = TcpListener::bind(&args.listen).expect("failed to bind the listen address");
    info!("listening on {}", args.listen);

    let stop = AtomicBool::new(false);
    server.run(&listener, &stop);
}
