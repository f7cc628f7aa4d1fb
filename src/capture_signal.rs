//! The capture-signal client: a single unframed TCP exchange that asks
//! the camera host for a photo. Connect, write the literal bytes
//! `capture`, close. The listener never replies, so success means only
//! that the bytes were handed to the network.

use log::{info, warn};
use std::io::Write;
use std::net::{SocketAddr, TcpStream, ToSocketAddrs};
use std::time::Duration;

/// The entire protocol.
pub const CAPTURE_PAYLOAD: &[u8] = b"capture";

/// Default bound on connect and send, per attempt.
pub const SIGNAL_TIMEOUT: Duration = Duration::from_secs(5);

/// Something that can request a photo from the camera host. The edge
/// loop only cares whether the request went out.
pub trait CaptureSignaler {
    /// Attempts one capture signal; true on success. Failures are
    /// reported here and retried by the caller on a later iteration.
    fn signal(&mut self) -> bool;
}

impl<T: CaptureSignaler + ?Sized> CaptureSignaler for Box<T> {
    fn signal(&mut self) -> bool {
        (**self).signal()
    }
}

/// The production signaler: one short-lived TCP connection per signal.
#[derive(Debug, Clone)]
pub struct TcpCaptureSignaler {
    server: String,
    timeout: Duration,
}

impl TcpCaptureSignaler {
    /// A signaler for `server` (`host:port`) with the given per-attempt
    /// timeout.
    pub fn new(server: String, timeout: Duration) -> Self {
        Self { server, timeout }
    }

    fn try_send(&self) -> std::io::Result<()> {
        let addr: SocketAddr = self
            .server
            .to_socket_addrs()?
            .next()
            .ok_or_else(|| std::io::Error::new(std::io::ErrorKind::NotFound, "no address"))?;
        let mut stream = TcpStream::connect_timeout(&addr, self.timeout)?;
        stream.set_write_timeout(Some(self.timeout))?;
        stream.write_all(CAPTURE_PAYLOAD)?;
        Ok(())
        // stream drops here, closing the connection whatever happened
    }
}

impl CaptureSignaler for TcpCaptureSignaler {
    fn signal(&mut self) -> bool {
        match self.try_send() {
            Ok(()) => {
                info!("capture signal sent to {}", self.server);
                true
            }
            Err(e) => {
                warn!("failed to send capture signal to {}: {}", self.server, e);
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;
    use std::net::TcpListener;
    use std::thread;

    /// The signal is exactly the seven payload bytes, after which the
    /// client has closed its end.
    #[test]
    fn test_signal_sends_payload_and_closes() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();

        let server = thread::spawn(move || {
            let (mut stream, _) = listener.accept().unwrap();
            let mut received = Vec::new();
            stream.read_to_end(&mut received).unwrap();
            received
        });

        let mut signaler =
            TcpCaptureSignaler::new(addr.to_string(), Duration::from_secs(1));
        assert!(signaler.signal());
        assert_eq!(server.join().unwrap(), CAPTURE_PAYLOAD);
    }

    #[test]
    fn test_signal_reports_failure() {
        // Bind and drop to get a port nobody is listening on.
        let addr = {
            let listener = TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap()
        };

        let mut signaler =
            TcpCaptureSignaler::new(addr.to_string(), Duration::from_millis(200));
        assert!(!signaler.signal());
    }
}
