//! Frame codec for the dashboard's wire protocol. Every message starts
//! with a five-byte header:
//!
//! ```text
//! command:u8  message_id:u16be  length:u16be
//! ```
//!
//! For outbound commands `length` counts the body bytes that follow; body
//! fields are NUL-separated ASCII strings. For `RESPONSE` frames the
//! server reuses the length field as a status code and sends no body.

use nom::{
    combinator::map,
    error::Error,
    number::complete::{be_u16, u8},
    sequence::tuple,
    Finish, IResult,
};

use std::error::Error as StdError;
use std::fmt::Display;

/// Server acknowledgment; status in the length field.
pub const CMD_RESPONSE: u8 = 0;
/// Keepalive, sent in both directions.
pub const CMD_PING: u8 = 6;
/// Hardware data, e.g. a `vw` virtual-channel write.
pub const CMD_HARDWARE: u8 = 20;
/// Session login carrying the auth token.
pub const CMD_HARDWARE_LOGIN: u8 = 29;

/// Status code for an accepted request.
pub const STATUS_OK: u16 = 200;

/// Errors from decoding inbound frames.
#[derive(Debug)]
pub enum ProtocolError {
    /// Fewer than five header bytes were available.
    Truncated,
}

impl Display for ProtocolError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:#?}", self)
    }
}

impl StdError for ProtocolError {}

/// A decoded frame header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameHeader {
    /// One of the `CMD_` constants.
    pub command: u8,
    /// Sender-chosen, nonzero message id.
    pub message_id: u16,
    /// Body length, or the status code on `CMD_RESPONSE` frames.
    pub length: u16,
}

impl FrameHeader {
    /// The wire form of this header.
    pub fn encode(&self) -> [u8; 5] {
        let mut bytes = [0u8; 5];
        bytes[0] = self.command;
        bytes[1..3].copy_from_slice(&self.message_id.to_be_bytes());
        bytes[3..5].copy_from_slice(&self.length.to_be_bytes());
        bytes
    }
}

/// Encodes a command frame with a NUL-joined body.
pub fn encode_frame(command: u8, message_id: u16, body: &[&str]) -> Vec<u8> {
    let body = body.join("\0");
    let header = FrameHeader {
        command,
        message_id,
        length: body.len() as u16,
    };
    let mut frame = Vec::with_capacity(5 + body.len());
    frame.extend_from_slice(&header.encode());
    frame.extend_from_slice(body.as_bytes());
    frame
}

fn parse_frame_header(i: &[u8]) -> IResult<&[u8], FrameHeader> {
    map(tuple((u8, be_u16, be_u16)), |(command, message_id, length)| {
        FrameHeader {
            command,
            message_id,
            length,
        }
    })(i)
}

/// Decodes the five header bytes of an inbound frame.
pub fn parse_header(input: &[u8]) -> Result<FrameHeader, ProtocolError> {
    match parse_frame_header(input).finish() {
        Ok((_remaining, header)) => Ok(header),
        Err(Error { .. }) => Err(ProtocolError::Truncated),
    }
}
