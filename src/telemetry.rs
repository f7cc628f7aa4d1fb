//! The cloud telemetry seam and its production client. The dashboard
//! shows two virtual channels: channel 0 carries the distance in
//! centimeters, channel 1 the alarm flag. The client logs in with an auth
//! token, publishes channel writes, and keeps the session alive with
//! periodic pings from [`Telemetry::run`].

use crate::telemetry_protocol::{
    encode_frame, parse_header, FrameHeader, ProtocolError, CMD_HARDWARE, CMD_HARDWARE_LOGIN,
    CMD_PING, CMD_RESPONSE, STATUS_OK,
};

use log::{debug, info};
use std::error::Error;
use std::fmt::Display;
use std::io::{ErrorKind, Read, Write};
use std::net::{TcpStream, ToSocketAddrs};
use std::time::{Duration, Instant};

const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);
const LOGIN_TIMEOUT: Duration = Duration::from_secs(5);
const DRAIN_TIMEOUT: Duration = Duration::from_millis(10);
const HEARTBEAT: Duration = Duration::from_secs(10);
const RECONNECT_INTERVAL: Duration = Duration::from_secs(5);

/// Errors from the telemetry client.
#[derive(Debug)]
pub enum TelemetryError {
    /// Socket IO failed.
    Io(std::io::Error),
    /// The server sent a frame we could not decode.
    Protocol(ProtocolError),
    /// Not connected, and the reconnect backoff has not elapsed yet.
    NotConnected,
    /// The configured host did not resolve to any address.
    BadAddress,
    /// The server refused the auth token; the status code is attached.
    LoginRejected(u16),
}

impl Display for TelemetryError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:#?}", self)
    }
}

impl Error for TelemetryError {}

impl From<std::io::Error> for TelemetryError {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value)
    }
}

impl From<ProtocolError> for TelemetryError {
    fn from(value: ProtocolError) -> Self {
        Self::Protocol(value)
    }
}

/// One-way reporting to the dashboard. Implementations are free to drop
/// data on failure; the edge loop retries at the next flush interval.
pub trait Telemetry {
    /// Publishes one value to a virtual channel.
    fn publish(&mut self, channel: u16, value: f64) -> Result<(), TelemetryError>;

    /// Services the client's own networking: keepalives and inbound
    /// traffic. Called once per loop iteration whether or not anything
    /// was published.
    fn run(&mut self) -> Result<(), TelemetryError>;
}

impl<T: Telemetry + ?Sized> Telemetry for Box<T> {
    fn publish(&mut self, channel: u16, value: f64) -> Result<(), TelemetryError> {
        (**self).publish(channel, value)
    }

    fn run(&mut self) -> Result<(), TelemetryError> {
        (**self).run()
    }
}

/// Connection settings for [`BlynkClient`].
#[derive(Debug, Clone)]
pub struct BlynkConfig {
    /// Dashboard host name.
    pub host: String,
    /// Plaintext hardware port.
    pub port: u16,
    /// Device auth token.
    pub token: String,
}

/// Synchronous dashboard client. Connection loss is absorbed: calls fail
/// until the reconnect backoff elapses, then the next call dials again.
pub struct BlynkClient {
    config: BlynkConfig,
    conn: Option<TcpStream>,
    message_id: u16,
    last_ping: Instant,
    last_dial: Option<Instant>,
}

impl BlynkClient {
    /// A disconnected client; the first publish or pump dials.
    pub fn new(config: BlynkConfig) -> Self {
        Self {
            config,
            conn: None,
            message_id: 0,
            last_ping: Instant::now(),
            last_dial: None,
        }
    }

    fn next_id(&mut self) -> u16 {
        // message ids must be nonzero
        self.message_id = self.message_id.checked_add(1).unwrap_or(1);
        self.message_id
    }

    fn ensure_connected(&mut self) -> Result<(), TelemetryError> {
        if self.conn.is_some() {
            return Ok(());
        }
        if let Some(dialed) = self.last_dial {
            if dialed.elapsed() < RECONNECT_INTERVAL {
                return Err(TelemetryError::NotConnected);
            }
        }
        self.last_dial = Some(Instant::now());
        let stream = self.dial()?;
        self.conn = Some(stream);
        self.last_ping = Instant::now();
        info!(
            "telemetry connected to {}:{}",
            self.config.host, self.config.port
        );
        Ok(())
    }

    fn dial(&mut self) -> Result<TcpStream, TelemetryError> {
        let addr = (self.config.host.as_str(), self.config.port)
            .to_socket_addrs()?
            .next()
            .ok_or(TelemetryError::BadAddress)?;
        let mut stream = TcpStream::connect_timeout(&addr, CONNECT_TIMEOUT)?;
        stream.set_write_timeout(Some(CONNECT_TIMEOUT))?;
        stream.set_read_timeout(Some(LOGIN_TIMEOUT))?;

        let login_id = self.next_id();
        stream.write_all(&encode_frame(
            CMD_HARDWARE_LOGIN,
            login_id,
            &[&self.config.token],
        ))?;

        let mut response = [0u8; 5];
        stream.read_exact(&mut response)?;
        let header = parse_header(&response)?;
        if header.command != CMD_RESPONSE || header.length != STATUS_OK {
            return Err(TelemetryError::LoginRejected(header.length));
        }

        // After login, reads are only the drain in run(); keep them short
        // so the polling loop is never held up.
        stream.set_read_timeout(Some(DRAIN_TIMEOUT))?;
        Ok(stream)
    }

    /// Reads whatever the server sent since the last pump. Only pings get
    /// a reply; everything else is ignored.
    fn drain_incoming(&mut self) {
        let Some(stream) = self.conn.as_mut() else {
            return;
        };
        let mut buf = [0u8; 256];
        match stream.read(&mut buf) {
            Ok(0) => {
                debug!("telemetry server closed the connection");
                self.conn = None;
            }
            Ok(n) if n >= 5 => {
                if let Ok(header) = parse_header(&buf[..n]) {
                    if header.command == CMD_PING {
                        let pong = FrameHeader {
                            command: CMD_RESPONSE,
                            message_id: header.message_id,
                            length: STATUS_OK,
                        };
                        if stream.write_all(&pong.encode()).is_err() {
                            self.conn = None;
                        }
                    }
                }
            }
            Ok(_) => {}
            Err(e) if matches!(e.kind(), ErrorKind::TimedOut | ErrorKind::WouldBlock) => {}
            Err(e) => {
                debug!("telemetry read failed: {}", e);
                self.conn = None;
            }
        }
    }
}

impl Telemetry for BlynkClient {
    fn publish(&mut self, channel: u16, value: f64) -> Result<(), TelemetryError> {
        self.ensure_connected()?;
        let id = self.next_id();
        let frame = encode_frame(
            CMD_HARDWARE,
            id,
            &["vw", &channel.to_string(), &value.to_string()],
        );
        let stream = self.conn.as_mut().ok_or(TelemetryError::NotConnected)?;
        if let Err(e) = stream.write_all(&frame) {
            self.conn = None;
            return Err(e.into());
        }
        Ok(())
    }

    fn run(&mut self) -> Result<(), TelemetryError> {
        self.ensure_connected()?;
        self.drain_incoming();
        if self.conn.is_some() && self.last_ping.elapsed() >= HEARTBEAT {
            let id = self.next_id();
            let ping = encode_frame(CMD_PING, id, &[]);
            let stream = self.conn.as_mut().ok_or(TelemetryError::NotConnected)?;
            if let Err(e) = stream.write_all(&ping) {
                self.conn = None;
                return Err(e.into());
            }
            self.last_ping = Instant::now();
        }
        Ok(())
    }
}

/// A [`Telemetry`] that discards everything. Used when the dashboard is
/// disabled on the command line.
#[derive(Debug, Default)]
pub struct NullTelemetry;

impl Telemetry for NullTelemetry {
    fn publish(&mut self, _channel: u16, _value: f64) -> Result<(), TelemetryError> {
        Ok(())
    }

    fn run(&mut self) -> Result<(), TelemetryError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::TcpListener;
    use std::thread;

    fn read_frame(stream: &mut TcpStream) -> (FrameHeader, Vec<u8>) {
        let mut header = [0u8; 5];
        stream.read_exact(&mut header).unwrap();
        let header = parse_header(&header).unwrap();
        let mut body = vec![0u8; header.length as usize];
        stream.read_exact(&mut body).unwrap();
        (header, body)
    }

    /// The client logs in with the configured token before its first
    /// publish, and the publish arrives as a NUL-joined `vw` write.
    #[test]
    fn test_login_then_publish() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();

        let server = thread::spawn(move || {
            let (mut stream, _) = listener.accept().unwrap();

            let (login, token) = read_frame(&mut stream);
            assert_eq!(login.command, CMD_HARDWARE_LOGIN);
            assert_eq!(token, b"secret");

            let ok = FrameHeader {
                command: CMD_RESPONSE,
                message_id: login.message_id,
                length: STATUS_OK,
            };
            stream.write_all(&ok.encode()).unwrap();

            let (hw, body) = read_frame(&mut stream);
            assert_eq!(hw.command, CMD_HARDWARE);
            body
        });

        let mut client = BlynkClient::new(BlynkConfig {
            host: "127.0.0.1".to_string(),
            port: addr.port(),
            token: "secret".to_string(),
        });
        client.publish(0, 23.5).unwrap();

        assert_eq!(server.join().unwrap(), b"vw\x000\x0023.5");
    }

    /// A rejected token surfaces as a login error, not a publish.
    #[test]
    fn test_login_rejection() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();

        let server = thread::spawn(move || {
            let (mut stream, _) = listener.accept().unwrap();
            let (login, _) = read_frame(&mut stream);
            let denied = FrameHeader {
                command: CMD_RESPONSE,
                message_id: login.message_id,
                length: 9,
            };
            stream.write_all(&denied.encode()).unwrap();
        });

        let mut client = BlynkClient::new(BlynkConfig {
            host: "127.0.0.1".to_string(),
            port: addr.port(),
            token: "wrong".to_string(),
        });
        assert!(matches!(
            client.publish(0, 1.0),
            Err(TelemetryError::LoginRejected(9))
        ));
        server.join().unwrap();
    }

    /// With nobody listening, the first call fails with IO and the second
    /// is held back by the reconnect backoff.
    #[test]
    fn test_reconnect_backoff() {
        // Grab a port and release it so the connect is refused.
        let addr = {
            let listener = TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap()
        };

        let mut client = BlynkClient::new(BlynkConfig {
            host: "127.0.0.1".to_string(),
            port: addr.port(),
            token: "secret".to_string(),
        });
        assert!(matches!(client.publish(0, 1.0), Err(TelemetryError::Io(_))));
        assert!(matches!(
            client.publish(0, 1.0),
            Err(TelemetryError::NotConnected)
        ));
    }
}
