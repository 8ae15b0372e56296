//! STOMP frame codec
//!
//! The gateway tunnels STOMP 1.0-1.2 over WebSocket text messages, one frame
//! per message. A frame is:
//!
//! ```text
//! COMMAND\n
//! header:value\n
//! ...\n
//! \n
//! body\0
//! ```
//!
//! Heart-beats are a bare `\n` (or `\r\n`) outside any frame; [`Frame::decode`]
//! returns `Ok(None)` for them. Header values are escaped per STOMP 1.1+
//! (`\\`, `\n`, `\r`, `\c`) except on CONNECT/CONNECTED frames, which the
//! specification exempts for 1.0 compatibility.

use std::time::Duration;

use crate::error::ProtocolError;
use crate::Result;

/// Frame commands the session sends or expects.
pub mod command {
    pub const CONNECT: &str = "CONNECT";
    pub const CONNECTED: &str = "CONNECTED";
    pub const SUBSCRIBE: &str = "SUBSCRIBE";
    pub const MESSAGE: &str = "MESSAGE";
    pub const ERROR: &str = "ERROR";
    pub const RECEIPT: &str = "RECEIPT";
    pub const DISCONNECT: &str = "DISCONNECT";
}

/// A single STOMP frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Frame command (CONNECT, MESSAGE, ...)
    pub command: String,

    /// Headers in wire order; lookups take the first match per the spec
    pub headers: Vec<(String, String)>,

    /// Frame body (empty for control frames)
    pub body: Vec<u8>,
}

impl Frame {
    /// Create a frame with no headers and no body
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            headers: Vec::new(),
            body: Vec::new(),
        }
    }

    /// Append a header (builder style)
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Set the body (builder style)
    pub fn body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = body.into();
        self
    }

    /// First value of the named header, if present
    pub fn get(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    /// Encode the frame to wire bytes, NUL-terminated.
    ///
    /// A `content-length` header is appended for non-empty bodies so
    /// receivers need not scan for the terminator.
    pub fn encode(&self) -> Vec<u8> {
        let escape = !self.is_connect_family();
        let mut out = Vec::with_capacity(64 + self.body.len());
        out.extend_from_slice(self.command.as_bytes());
        out.push(b'\n');

        for (name, value) in &self.headers {
            if escape {
                out.extend_from_slice(escape_header(name).as_bytes());
                out.push(b':');
                out.extend_from_slice(escape_header(value).as_bytes());
            } else {
                out.extend_from_slice(name.as_bytes());
                out.push(b':');
                out.extend_from_slice(value.as_bytes());
            }
            out.push(b'\n');
        }

        if !self.body.is_empty() {
            out.extend_from_slice(format!("content-length:{}\n", self.body.len()).as_bytes());
        }

        out.push(b'\n');
        out.extend_from_slice(&self.body);
        out.push(0);
        out
    }

    /// Decode one frame from a complete WebSocket message.
    ///
    /// Returns `Ok(None)` for heart-beat messages (empty, `\n`, `\r\n`).
    pub fn decode(input: &[u8]) -> Result<Option<Frame>> {
        if input.is_empty() || input == b"\n" || input == b"\r\n" {
            return Ok(None);
        }

        // Strip the trailing NUL (and any heart-beat EOLs after it).
        let end = match input.iter().position(|&b| b == 0) {
            Some(i) => i,
            None => input.len(),
        };
        let input = &input[..end];

        let header_end = find_header_end(input)
            .ok_or_else(|| ProtocolError::frame("missing blank line after headers"))?;
        let (head, body) = (&input[..header_end.0], &input[header_end.1..]);

        let head = std::str::from_utf8(head)
            .map_err(|_| ProtocolError::frame("non-utf8 command or headers"))?;
        let mut lines = head.split('\n').map(|l| l.strip_suffix('\r').unwrap_or(l));

        let command = lines
            .next()
            .filter(|c| !c.is_empty())
            .ok_or_else(|| ProtocolError::frame("empty command"))?
            .to_string();

        let unescape_values = !matches!(command.as_str(), command::CONNECT | command::CONNECTED);
        let mut headers = Vec::new();
        for line in lines {
            if line.is_empty() {
                continue;
            }
            let (name, value) = line
                .split_once(':')
                .ok_or_else(|| ProtocolError::frame(format!("header without colon: '{line}'")))?;
            if unescape_values {
                headers.push((unescape_header(name)?, unescape_header(value)?));
            } else {
                headers.push((name.to_string(), value.to_string()));
            }
        }

        Ok(Some(Frame {
            command,
            headers,
            body: body.to_vec(),
        }))
    }

    fn is_connect_family(&self) -> bool {
        matches!(
            self.command.as_str(),
            command::CONNECT | command::CONNECTED
        )
    }
}

/// Byte offsets of the header/body separator: (end of headers, start of body).
fn find_header_end(input: &[u8]) -> Option<(usize, usize)> {
    let mut i = 0;
    while i < input.len() {
        if input[i] == b'\n' {
            if input.get(i + 1) == Some(&b'\n') {
                return Some((i, i + 2));
            }
            if input.get(i + 1) == Some(&b'\r') && input.get(i + 2) == Some(&b'\n') {
                return Some((i, i + 3));
            }
        }
        i += 1;
    }
    None
}

fn escape_header(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\r' => out.push_str("\\r"),
            '\n' => out.push_str("\\n"),
            ':' => out.push_str("\\c"),
            other => out.push(other),
        }
    }
    out
}

fn unescape_header(raw: &str) -> Result<String> {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('\\') => out.push('\\'),
            Some('r') => out.push('\r'),
            Some('n') => out.push('\n'),
            Some('c') => out.push(':'),
            other => {
                return Err(ProtocolError::frame(format!(
                    "bad escape sequence '\\{}'",
                    other.map(String::from).unwrap_or_default()
                )))
            }
        }
    }
    Ok(out)
}

/// Negotiated heart-beat timings for an established session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeartBeat {
    /// Interval at which the client must emit a heart-beat (zero = never)
    pub send_interval: Duration,

    /// Window within which the server must show activity (zero = unbounded)
    pub recv_timeout: Duration,
}

/// Negotiate heart-beats from the client offer `(cx, cy)` in milliseconds and
/// the server's `heart-beat` CONNECTED header (`"sx,sy"`).
///
/// Per the STOMP spec the client sends every `max(cx, sy)` and expects server
/// activity every `max(cy, sx)`; a zero on either side of a pair disables
/// that direction.
pub fn negotiate_heart_beat(client: (u64, u64), server_header: &str) -> Result<HeartBeat> {
    let (sx, sy) = parse_heart_beat(server_header)?;
    let (cx, cy) = client;

    let send_ms = if cx == 0 || sy == 0 { 0 } else { cx.max(sy) };
    let recv_ms = if cy == 0 || sx == 0 { 0 } else { cy.max(sx) };

    Ok(HeartBeat {
        send_interval: Duration::from_millis(send_ms),
        recv_timeout: Duration::from_millis(recv_ms),
    })
}

fn parse_heart_beat(header: &str) -> Result<(u64, u64)> {
    let (sx, sy) = header
        .split_once(',')
        .ok_or_else(|| ProtocolError::HeartBeat(header.to_string()))?;
    let sx = sx
        .trim()
        .parse()
        .map_err(|_| ProtocolError::HeartBeat(header.to_string()))?;
    let sy = sy
        .trim()
        .parse()
        .map_err(|_| ProtocolError::HeartBeat(header.to_string()))?;
    Ok((sx, sy))
}
