//! RUI3 AT wire grammar: command encoding, line assembly, and line
//! classification.
//!
//! Commands go out as `<COMMAND>[=<value>[:<value>...]]` followed by CRLF.
//! Replies come back as `\n`-delimited lines. A reply is complete when a
//! line carries one of three kinds of marker:
//!
//! - the success token `OK`;
//! - an asynchronous completion event (`+EVT:TX_DONE`,
//!   `+EVT:SEND_CONFIRMED_OK`, `+EVT:TXP2P DONE`);
//! - an error token (`AT_COMMAND_NOT_FOUND`, `AT_PARAM_ERROR`,
//!   `SEND_CONFIRMED_FAILED`, `AT_NO_NETWORK_JOINED`).
//!
//! Any other line is data and is accumulated without judgement.

use bytes::{BufMut, BytesMut};

/// Line terminator appended to every outbound command.
pub const LINE_TERMINATOR: &[u8] = b"\r\n";

/// Token the module prints when a command succeeds.
pub const SUCCESS_MARKER: &str = "OK";

/// Events that complete a long-running command (uplinks).
pub const COMPLETION_MARKERS: &[&str] = &[
    "+EVT:TX_DONE",
    "+EVT:SEND_CONFIRMED_OK",
    "+EVT:TXP2P DONE",
];

/// Tokens the module prints when it rejects or fails a command.
pub const ERROR_MARKERS: &[&str] = &[
    "AT_COMMAND_NOT_FOUND",
    "AT_PARAM_ERROR",
    "SEND_CONFIRMED_FAILED",
    "AT_NO_NETWORK_JOINED",
];

/// Upper bound on a partial line held by [`LineAssembler`].
///
/// Replies are short (the longest are 32-digit keys); anything beyond this
/// without a newline is noise.
pub const MAX_LINE: usize = 8192;

/// Classification of one trimmed, non-empty line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineClass {
    /// Carries the `OK` token.
    Success,
    /// Carries an asynchronous completion event.
    Completion,
    /// Carries an error token.
    Error,
    /// Anything else: echoed values, banners, unsolicited events.
    Data,
}

impl LineClass {
    /// `true` if the line ends the response.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, LineClass::Data)
    }
}

/// Classify a line by the markers it contains.
///
/// Markers are matched as substrings, checked in the order success,
/// completion, error.
pub fn classify_line(line: &str) -> LineClass {
    if line.contains(SUCCESS_MARKER) {
        LineClass::Success
    } else if COMPLETION_MARKERS.iter().any(|m| line.contains(m)) {
        LineClass::Completion
    } else if ERROR_MARKERS.iter().any(|m| line.contains(m)) {
        LineClass::Error
    } else {
        LineClass::Data
    }
}

/// Encode a command into raw bytes ready for transmission.
///
/// # Example
///
/// ```
/// use rui3_at_io::protocol::encode_command;
///
/// assert_eq!(encode_command("AT+BAND=?"), b"AT+BAND=?\r\n");
/// ```
pub fn encode_command(command: &str) -> Vec<u8> {
    let mut buf = BytesMut::with_capacity(command.len() + LINE_TERMINATOR.len());
    buf.put_slice(command.as_bytes());
    buf.put_slice(LINE_TERMINATOR);
    buf.to_vec()
}

/// The part of a command the module echoes back in front of `=`.
///
/// # Example
///
/// ```
/// use rui3_at_io::protocol::echo_prefix;
///
/// assert_eq!(echo_prefix("AT+BAND=?"), "AT+BAND");
/// assert_eq!(echo_prefix("AT+JOIN=1:0:8:0"), "AT+JOIN");
/// assert_eq!(echo_prefix("ATZ"), "ATZ");
/// ```
pub fn echo_prefix(command: &str) -> &str {
    command.split_once('=').map_or(command, |(prefix, _)| prefix)
}

/// Splits an unbounded byte stream into trimmed, non-empty lines.
///
/// Bytes are appended with [`extend`](Self::extend) as they arrive; complete
/// lines are taken with [`next_line`](Self::next_line). A trailing partial
/// line stays buffered until its `\n` arrives or it is taken explicitly with
/// [`take_partial`](Self::take_partial).
#[derive(Debug, Default)]
pub struct LineAssembler {
    buf: Vec<u8>,
}

impl LineAssembler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append received bytes.
    ///
    /// If the pending partial line grows past [`MAX_LINE`] it is discarded.
    pub fn extend(&mut self, data: &[u8]) {
        self.buf.extend_from_slice(data);
        if self.buf.len() > MAX_LINE && !self.buf.contains(&b'\n') {
            tracing::warn!(len = self.buf.len(), "line buffer overflow, resetting");
            self.buf.clear();
        }
    }

    /// Take the next complete line, skipping lines that are blank after
    /// trimming. Returns `None` when no complete line is buffered.
    pub fn next_line(&mut self) -> Option<String> {
        while let Some(pos) = self.buf.iter().position(|&b| b == b'\n') {
            let raw: Vec<u8> = self.buf.drain(..=pos).collect();
            let line = String::from_utf8_lossy(&raw).trim().to_string();
            if !line.is_empty() {
                return Some(line);
            }
        }
        None
    }

    /// Take the buffered partial line, if it is non-blank.
    pub fn take_partial(&mut self) -> Option<String> {
        let raw = std::mem::take(&mut self.buf);
        let line = String::from_utf8_lossy(&raw).trim().to_string();
        (!line.is_empty()).then_some(line)
    }

    /// Discard everything buffered.
    pub fn clear(&mut self) {
        self.buf.clear();
    }

    /// `true` if no bytes are buffered.
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }
}
