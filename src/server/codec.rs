// src/server/codec.rs

use thiserror::Error;

/// Every message in either direction ends with a carriage return.
pub const DELIMITER: u8 = b'\r';

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    #[error("empty command")]
    Empty,
}

/// Accumulates partial reads until complete frames are available.
#[derive(Debug, Default)]
pub struct FrameBuffer {
    buf: Vec<u8>,
}

impl FrameBuffer {
    pub fn push(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    /// Pop the next complete frame, without its delimiter.
    pub fn next_frame(&mut self) -> Option<String> {
        let end = self.buf.iter().position(|&b| b == DELIMITER)?;
        let frame: Vec<u8> = self.buf.drain(..=end).take(end).collect();
        Some(String::from_utf8_lossy(&frame).into_owned())
    }

    /// Bytes received after the last complete frame.
    pub fn pending(&self) -> usize {
        self.buf.len()
    }
}

/// Append the delimiter to `text`.
pub fn encode(text: &str) -> Vec<u8> {
    let mut out = Vec::with_capacity(text.len() + 1);
    out.extend_from_slice(text.as_bytes());
    out.push(DELIMITER);
    out
}

/// `<verb> [argument...]`, split on whitespace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    pub verb: String,
    pub args: Vec<String>,
}

pub fn parse_request(line: &str) -> Result<Request, ProtocolError> {
    let mut words = line.split_whitespace();
    let verb = words.next().ok_or(ProtocolError::Empty)?;
    Ok(Request {
        verb: verb.to_string(),
        args: words.map(str::to_string).collect(),
    })
}
