//! The capture listener: a single-threaded, blocking accept loop that
//! takes one webcam photo per valid signal. Connection handling is
//! expressed as an explicit state machine so a concurrent handler could
//! be dropped in later without changing what a single client observes:
//!
//! ```text
//! Listening -> Accepted -> (Decoded | Malformed) -> Idle -> Listening
//! ```

use crate::camera::{Camera, CameraError};
use crate::capture_signal::CAPTURE_PAYLOAD;

use chrono::Local;
use log::{debug, info, warn};
use std::error::Error;
use std::fmt::Display;
use std::io::Read;
use std::net::{TcpListener, TcpStream};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};

/// The listener reads at most this many bytes from a connection.
pub const MAX_PAYLOAD: usize = 1024;

/// Errors from the listener.
#[derive(Debug)]
pub enum ServerError {
    /// Socket or filesystem IO failed.
    Io(std::io::Error),
    /// The camera backend failed to produce a frame.
    Camera(CameraError),
}

impl Display for ServerError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:#?}", self)
    }
}

impl Error for ServerError {}

impl From<std::io::Error> for ServerError {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value)
    }
}

impl From<CameraError> for ServerError {
    fn from(value: CameraError) -> Self {
        Self::Camera(value)
    }
}

/// Where the listener is in the life of one connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListenerState {
    /// Blocked in accept, no connection in hand.
    Listening,
    /// A connection arrived; its payload has not been read yet.
    Accepted,
    /// The payload was exactly the capture command.
    Decoded,
    /// The payload was anything else; it is ignored.
    Malformed,
    /// The connection is finished and about to be closed.
    Idle,
}

/// What just happened on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListenerEvent<'a> {
    /// Accept returned a connection.
    Connected,
    /// The payload read completed with these bytes.
    Received(&'a [u8]),
    /// The connection's outcome has been acted on.
    Handled,
}

/// What the driver must do after a transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListenerAction {
    /// Nothing.
    None,
    /// Read the connection's payload.
    ReadPayload,
    /// Take and store one photo.
    CaptureFrame,
    /// Close the connection and go back to listening.
    CloseConnection,
}

/// The connection-handling state machine. Pure so the transition table
/// can be tested without sockets or a camera.
pub fn transition(state: ListenerState, event: ListenerEvent) -> (ListenerState, ListenerAction) {
    match (state, event) {
        (ListenerState::Listening, ListenerEvent::Connected) => {
            (ListenerState::Accepted, ListenerAction::ReadPayload)
        }
        (ListenerState::Accepted, ListenerEvent::Received(payload)) => {
            if payload == CAPTURE_PAYLOAD {
                (ListenerState::Decoded, ListenerAction::CaptureFrame)
            } else {
                (ListenerState::Malformed, ListenerAction::None)
            }
        }
        (ListenerState::Decoded, ListenerEvent::Handled)
        | (ListenerState::Malformed, ListenerEvent::Handled) => {
            (ListenerState::Idle, ListenerAction::CloseConnection)
        }
        (ListenerState::Idle, _) => (ListenerState::Listening, ListenerAction::None),
        // An event that does not belong to the current state changes
        // nothing.
        (state, _) => (state, ListenerAction::None),
    }
}

/// The accept-loop driver around [`transition`].
pub struct CaptureServer<C: Camera> {
    camera: C,
    captures_dir: PathBuf,
}

impl<C: Camera> CaptureServer<C> {
    /// A server saving photos into `captures_dir`, which is created here
    /// if absent.
    pub fn new<P: Into<PathBuf>>(camera: C, captures_dir: P) -> Result<Self, ServerError> {
        let captures_dir = captures_dir.into();
        std::fs::create_dir_all(&captures_dir)?;
        Ok(Self {
            camera,
            captures_dir,
        })
    }

    /// Serves connections until `stop` is raised. Connections are handled
    /// one at a time, to completion, in arrival order.
    pub fn run(&mut self, listener: &TcpListener, stop: &AtomicBool) {
        info!("waiting for capture signals");
        for connection in listener.incoming() {
            if stop.load(Ordering::Relaxed) {
                break;
            }
            match connection {
                Ok(stream) => self.handle_connection(stream),
                Err(e) => warn!("accept failed: {}", e),
            }
        }
        info!("capture server stopped");
    }

    /// Runs one connection through the state machine. The stream is
    /// closed on return no matter what happened in between.
    fn handle_connection(&mut self, mut stream: TcpStream) {
        let (state, action) = transition(ListenerState::Listening, ListenerEvent::Connected);
        debug_assert_eq!(action, ListenerAction::ReadPayload);

        // TODO: a signal split across TCP segments reads short here and
        // classifies as malformed; loop the read if that ever shows up in
        // practice.
        let mut buf = [0u8; MAX_PAYLOAD];
        let received = match stream.read(&mut buf) {
            Ok(n) => &buf[..n],
            Err(e) => {
                debug!("payload read failed: {}", e);
                &buf[..0]
            }
        };

        let (state, action) = transition(state, ListenerEvent::Received(received));
        if action == ListenerAction::CaptureFrame {
            info!("signal received, taking picture");
            match self.capture_frame() {
                Ok(path) => info!("saved {}", path.display()),
                // Not surfaced to the client; the connection still closes
                // normally below.
                Err(e) => debug!("capture failed: {}", e),
            }
        }

        let (_state, action) = transition(state, ListenerEvent::Handled);
        debug_assert_eq!(action, ListenerAction::CloseConnection);
        // stream drops here
    }

    /// Takes one photo and writes it under the captures directory with a
    /// second-resolution timestamped name.
    fn capture_frame(&mut self) -> Result<PathBuf, ServerError> {
        let jpeg = self.camera.read_jpeg_frame()?;
        let filename = format!("capture_{}.jpg", Local::now().format("%Y%m%d_%H%M%S"));
        let path = self.captures_dir.join(filename);
        std::fs::write(&path, jpeg)?;
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::camera::TestCamera;
    use std::io::Write;
    use std::sync::atomic::AtomicBool;
    use std::sync::Arc;
    use std::thread;
    use tempfile::tempdir;

    #[test]
    fn test_transition_exact_payload_captures() {
        let (state, action) = transition(ListenerState::Accepted, ListenerEvent::Received(b"capture"));
        assert_eq!(state, ListenerState::Decoded);
        assert_eq!(action, ListenerAction::CaptureFrame);
    }

    #[test]
    fn test_transition_rejects_near_misses() {
        for payload in [&b"captur"[..], &b"capturex"[..], &b"CAPTURE"[..], &b""[..]] {
            let (state, action) =
                transition(ListenerState::Accepted, ListenerEvent::Received(payload));
            assert_eq!(state, ListenerState::Malformed);
            assert_eq!(action, ListenerAction::None);
        }
    }

    #[test]
    fn test_transition_always_closes() {
        for state in [ListenerState::Decoded, ListenerState::Malformed] {
            let (next, action) = transition(state, ListenerEvent::Handled);
            assert_eq!(next, ListenerState::Idle);
            assert_eq!(action, ListenerAction::CloseConnection);
        }
    }

    /// Writes the payload, then blocks until the server closes the
    /// connection. The server only closes after the connection is fully
    /// handled, so on return any photo has already hit the disk.
    fn send_and_wait(addr: std::net::SocketAddr, payload: &[u8]) {
        let mut stream = TcpStream::connect(addr).unwrap();
        stream.write_all(payload).unwrap();
        stream.shutdown(std::net::Shutdown::Write).unwrap();
        let mut sink = Vec::new();
        stream.read_to_end(&mut sink).unwrap();
    }

    fn jpg_names(dir: &std::path::Path) -> Vec<String> {
        std::fs::read_dir(dir)
            .unwrap()
            .filter_map(|e| e.ok())
            .map(|e| e.file_name().to_string_lossy().into_owned())
            .filter(|name| name.ends_with(".jpg"))
            .collect()
    }

    /// One valid signal produces exactly one timestamped JPEG; a
    /// malformed one produces nothing and does not kill the server.
    #[test]
    fn test_end_to_end_capture() {
        let dir = tempdir().unwrap();
        let captures_dir = dir.path().to_path_buf();

        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let stop = Arc::new(AtomicBool::new(false));

        let thread_stop = stop.clone();
        let thread_dir = captures_dir.clone();
        let server = thread::spawn(move || {
            let mut server = CaptureServer::new(TestCamera::new(), thread_dir).unwrap();
            server.run(&listener, &thread_stop);
        });

        send_and_wait(addr, b"capture");
        let names = jpg_names(&captures_dir);
        assert_eq!(names.len(), 1);
        assert!(names[0].starts_with("capture_"));
        assert_eq!(names[0].len(), "capture_YYYYMMDD_HHMMSS.jpg".len());

        send_and_wait(addr, b"open sesame");
        assert_eq!(jpg_names(&captures_dir).len(), 1);

        stop.store(true, Ordering::Relaxed);
        // Unblock the accept so the loop sees the flag.
        drop(TcpStream::connect(addr).unwrap());
        server.join().unwrap();
    }
}
