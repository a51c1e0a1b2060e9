//! Command dispatch and response framing for the RUI3 AT protocol.
//!
//! [`AtIo`] owns the transport exclusively and runs one exchange at a time:
//! [`send`](AtIo::send) puts a command on the wire against a clean receive
//! state, and [`receive`](AtIo::receive) assembles the reply line by line
//! until a terminal line, a quiet stream, or the deadline.
//!
//! Replies are not reliably terminated: some commands print their value and
//! then go silent without `OK`. The framer therefore polls in short slices
//! ([`DEFAULT_POLL_INTERVAL`]) and treats "no bytes this slice, but at least
//! one line so far" as a finished response.

use std::time::Duration;

use tokio::time::Instant;
use tracing::{debug, trace};

use rui3_core::error::{Error, Result};
use rui3_core::transport::Transport;

use crate::protocol::{self, LineAssembler, LineClass};

/// Length of one read slice while waiting for a response.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Shortest accepted read slice. A zero slice would spin on the transport.
pub const MIN_POLL_INTERVAL: Duration = Duration::from_millis(1);

/// Stand-in deadline offset when `now + timeout` does not fit in an `Instant`.
const FAR_FUTURE: Duration = Duration::from_secs(86_400 * 365 * 30);

// ---------------------------------------------------------------------------
// Response buffer
// ---------------------------------------------------------------------------

/// How a response ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TerminalOutcome {
    /// A success or completion marker, or a quiet stream after content.
    Success(String),
    /// The stream went quiet before any line arrived; keep waiting.
    RecoverableEmptyOnStreamEnd,
    /// An error marker; carries the full text and the offending line.
    Failure { response: String, line: String },
}

/// Lines accumulated for a single command's reply.
///
/// Only trimmed, non-empty lines are ever stored. Classification looks at the
/// newest line only; the outcome carries the whole buffer.
#[derive(Debug, Default)]
pub struct ResponseBuffer {
    lines: Vec<String>,
}

impl ResponseBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a line and classify it.
    ///
    /// Blank input is ignored. Returns the outcome if the line is terminal.
    pub fn push(&mut self, line: &str) -> Option<TerminalOutcome> {
        let line = line.trim();
        if line.is_empty() {
            return None;
        }
        self.lines.push(line.to_string());

        match protocol::classify_line(line) {
            LineClass::Success | LineClass::Completion => {
                Some(TerminalOutcome::Success(self.text()))
            }
            LineClass::Error => Some(TerminalOutcome::Failure {
                response: self.text(),
                line: line.to_string(),
            }),
            LineClass::Data => None,
        }
    }

    /// Outcome when the stream goes quiet with no terminal line.
    pub fn on_stream_end(&self) -> TerminalOutcome {
        if self.lines.is_empty() {
            TerminalOutcome::RecoverableEmptyOnStreamEnd
        } else {
            TerminalOutcome::Success(self.text())
        }
    }

    /// All lines, each followed by `\n`.
    pub fn text(&self) -> String {
        self.lines.iter().fold(String::new(), |mut acc, line| {
            acc.push_str(line);
            acc.push('\n');
            acc
        })
    }

    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Engine
// ---------------------------------------------------------------------------

/// The AT protocol engine: dispatcher plus response framer.
///
/// One exchange at a time. Callers issue [`send`](Self::send) followed by
/// exactly one [`receive`](Self::receive), or use [`command`](Self::command)
/// which does both.
pub struct AtIo {
    transport: Box<dyn Transport>,
    assembler: LineAssembler,
    poll_interval: Duration,
    last_response: String,
}

impl AtIo {
    pub fn new(transport: Box<dyn Transport>) -> Self {
        AtIo {
            transport,
            assembler: LineAssembler::new(),
            poll_interval: DEFAULT_POLL_INTERVAL,
            last_response: String::new(),
        }
    }

    /// Override the quiet-detection slice (default 100 ms, floor
    /// [`MIN_POLL_INTERVAL`]).
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval.max(MIN_POLL_INTERVAL);
        self
    }

    /// Text of the most recently classified response.
    ///
    /// Updated on every success or failure, never on a timeout. Empty until
    /// the first response completes.
    pub fn last_response(&self) -> &str {
        &self.last_response
    }

    /// Send a command against a clean receive state.
    ///
    /// Discards any bytes left in the transport's input buffer and in the
    /// engine's own partial-line buffer, then writes `command` plus CRLF and
    /// flushes. Transport errors are returned as-is; nothing is retried.
    pub async fn send(&mut self, command: &str) -> Result<()> {
        self.transport.clear_input().await?;
        self.assembler.clear();

        debug!(command, "sending AT command");
        self.transport.send(&protocol::encode_command(command)).await
    }

    /// Wait for the response to the last command sent.
    ///
    /// `timeout` is a hard deadline measured from this call. Returns the
    /// full response text, [`Error::Device`] if an error marker arrives, or
    /// [`Error::Timeout`] if the deadline passes with nothing received.
    pub async fn receive(&mut self, timeout: Duration) -> Result<String> {
        let start = Instant::now();
        let deadline = start
            .checked_add(timeout)
            .unwrap_or_else(|| start + FAR_FUTURE);
        let mut response = ResponseBuffer::new();
        let mut recv_buf = [0u8; 256];

        loop {
            while let Some(line) = self.assembler.next_line() {
                trace!(line = %line, "response line");
                if let Some(outcome) = response.push(&line) {
                    return self.finish(outcome);
                }
            }

            let now = Instant::now();
            if now >= deadline {
                break;
            }
            let slice = (deadline - now).min(self.poll_interval);

            let quiet = match self.transport.receive(&mut recv_buf, slice).await {
                Ok(0) => {
                    // Nothing available; don't spin on a port that reports
                    // end-of-input immediately.
                    tokio::time::sleep(slice).await;
                    true
                }
                Ok(n) => {
                    self.assembler.extend(&recv_buf[..n]);
                    false
                }
                Err(Error::Timeout) => true,
                Err(e) => return Err(e),
            };

            if quiet {
                if let Some(outcome) = self.flush_partial(&mut response) {
                    return self.finish(outcome);
                }
                match response.on_stream_end() {
                    TerminalOutcome::RecoverableEmptyOnStreamEnd => continue,
                    outcome => {
                        debug!(lines = response.lines().len(), "stream quiet, response complete");
                        return self.finish(outcome);
                    }
                }
            }
        }

        if let Some(outcome) = self.flush_partial(&mut response) {
            return self.finish(outcome);
        }
        match response.on_stream_end() {
            TerminalOutcome::RecoverableEmptyOnStreamEnd => {
                debug!(timeout_ms = timeout.as_millis() as u64, "no response before deadline");
                Err(Error::Timeout)
            }
            outcome => self.finish(outcome),
        }
    }

    /// Send a command and wait for its response.
    pub async fn command(&mut self, command: &str, timeout: Duration) -> Result<String> {
        self.send(command).await?;
        self.receive(timeout).await
    }

    /// Close the underlying transport.
    pub async fn close(&mut self) -> Result<()> {
        self.assembler.clear();
        self.transport.close().await
    }

    /// Whether the underlying transport is connected.
    pub fn is_connected(&self) -> bool {
        self.transport.is_connected()
    }

    /// Give the transport back.
    pub fn into_transport(self) -> Box<dyn Transport> {
        self.transport
    }

    /// Promote a buffered partial line to a full line once the stream is quiet.
    fn flush_partial(&mut self, response: &mut ResponseBuffer) -> Option<TerminalOutcome> {
        let line = self.assembler.take_partial()?;
        trace!(line = %line, "unterminated response line");
        response.push(&line)
    }

    fn finish(&mut self, outcome: TerminalOutcome) -> Result<String> {
        match outcome {
            TerminalOutcome::Success(text) => {
                self.last_response.clone_from(&text);
                Ok(text)
            }
            TerminalOutcome::Failure { response, line } => {
                debug!(line = %line, "device reported error");
                self.last_response.clone_from(&response);
                Err(Error::Device { line, response })
            }
            TerminalOutcome::RecoverableEmptyOnStreamEnd => Err(Error::Timeout),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use rui3_test_harness::{MockTransport, Reply};

    const CMD_TIMEOUT: Duration = Duration::from_secs(5);

    fn engine(mock: MockTransport) -> AtIo {
        AtIo::new(Box::new(mock))
    }

    fn wire(command: &str) -> Vec<u8> {
        protocol::encode_command(command)
    }

    // =======================================================================
    // ResponseBuffer
    // =======================================================================

    #[test]
    fn buffer_classifies_newest_line_only() {
        let mut buf = ResponseBuffer::new();
        assert_eq!(buf.push("AT+SN=123"), None);
        assert_eq!(
            buf.push("OK"),
            Some(TerminalOutcome::Success("AT+SN=123\nOK\n".into()))
        );
    }

    #[test]
    fn buffer_failure_carries_line_and_text() {
        let mut buf = ResponseBuffer::new();
        buf.push("some banner");
        assert_eq!(
            buf.push("AT_PARAM_ERROR"),
            Some(TerminalOutcome::Failure {
                response: "some banner\nAT_PARAM_ERROR\n".into(),
                line: "AT_PARAM_ERROR".into(),
            })
        );
    }

    #[test]
    fn buffer_ignores_blank_lines() {
        let mut buf = ResponseBuffer::new();
        assert_eq!(buf.push("   "), None);
        assert_eq!(buf.push(""), None);
        assert!(buf.is_empty());
        assert_eq!(buf.on_stream_end(), TerminalOutcome::RecoverableEmptyOnStreamEnd);
    }

    #[test]
    fn buffer_stream_end_with_content_is_success() {
        let mut buf = ResponseBuffer::new();
        buf.push("  RAKwireless RAK3172  ");
        assert_eq!(
            buf.on_stream_end(),
            TerminalOutcome::Success("RAKwireless RAK3172\n".into())
        );
    }

    // =======================================================================
    // send
    // =======================================================================

    #[tokio::test(start_paused = true)]
    async fn send_clears_input_and_appends_crlf() {
        let mut mock = MockTransport::new();
        mock.expect(&wire("AT"), b"OK\r\n");
        let mut io = engine(mock);

        io.send("AT").await.unwrap();
        assert_eq!(io.receive(CMD_TIMEOUT).await.unwrap(), "OK\n");
    }

    #[tokio::test(start_paused = true)]
    async fn stale_input_does_not_leak_into_next_response() {
        let mut mock = MockTransport::new();
        // Leftover from an exchange that was abandoned mid-reply.
        mock.inject_stale(b"AT+BAND=5\r\nOK\r\n");
        mock.expect(&wire("AT+BAND=?"), b"AT+BAND=4:868000000\r\nOK\r\n");
        let mut io = engine(mock);

        let text = io.command("AT+BAND=?", CMD_TIMEOUT).await.unwrap();
        assert_eq!(text, "AT+BAND=4:868000000\nOK\n");
    }

    #[tokio::test(start_paused = true)]
    async fn partial_line_from_previous_exchange_is_discarded() {
        let mut mock = MockTransport::new();
        mock.expect(&wire("AT+SN=?"), b"AT+SN=123\r\nOK\r\nAT+EXTRA=tail");
        mock.expect(&wire("AT+VER=?"), b"AT+VER=4.1.0\r\nOK\r\n");
        let mut io = engine(mock);

        io.command("AT+SN=?", CMD_TIMEOUT).await.unwrap();
        let text = io.command("AT+VER=?", CMD_TIMEOUT).await.unwrap();
        assert_eq!(text, "AT+VER=4.1.0\nOK\n");
    }

    #[tokio::test]
    async fn send_failure_is_returned_without_retry() {
        let mut mock = MockTransport::new();
        mock.set_connected(false);
        let mut io = engine(mock);

        let result = io.send("AT").await;
        assert!(matches!(result, Err(Error::NotConnected)));
        assert!(!io.is_connected());
    }

    // =======================================================================
    // receive: terminal markers
    // =======================================================================

    #[tokio::test(start_paused = true)]
    async fn ok_returns_full_text_and_updates_last_response() {
        let mut mock = MockTransport::new();
        mock.expect(&wire("AT+DEVEUI=?"), b"AT+DEVEUI=AC1F09FFFE000001\r\nOK\r\n");
        let mut io = engine(mock);
        assert_eq!(io.last_response(), "");

        let text = io.command("AT+DEVEUI=?", CMD_TIMEOUT).await.unwrap();
        assert_eq!(text, "AT+DEVEUI=AC1F09FFFE000001\nOK\n");
        assert_eq!(io.last_response(), text);
    }

    #[tokio::test(start_paused = true)]
    async fn completion_events_end_the_response() {
        for event in ["+EVT:TX_DONE", "+EVT:SEND_CONFIRMED_OK", "+EVT:TXP2P DONE"] {
            let mut mock = MockTransport::new();
            let reply = format!("+EVT:SENDING\r\n{event}\r\n+EVT:AFTER\r\n");
            mock.expect(&wire("AT+PSEND=00"), reply.as_bytes());
            let mut io = engine(mock);

            let text = io.command("AT+PSEND=00", CMD_TIMEOUT).await.unwrap();
            assert_eq!(text, format!("+EVT:SENDING\n{event}\n"));
        }
    }

    #[tokio::test(start_paused = true)]
    async fn error_marker_is_device_error_with_exact_line() {
        let mut mock = MockTransport::new();
        mock.expect(&wire("AT+JOIN=?"), b"AT_NO_NETWORK_JOINED\r\n");
        let mut io = engine(mock);

        let err = io.command("AT+JOIN=?", CMD_TIMEOUT).await.unwrap_err();
        match err {
            Error::Device { line, response } => {
                assert_eq!(line, "AT_NO_NETWORK_JOINED");
                assert_eq!(response, "AT_NO_NETWORK_JOINED\n");
            }
            other => panic!("expected Device, got {other:?}"),
        }
        assert_eq!(io.last_response(), "AT_NO_NETWORK_JOINED\n");
    }

    #[tokio::test(start_paused = true)]
    async fn error_after_accumulated_lines() {
        let mut mock = MockTransport::new();
        mock.expect(
            &wire("AT+SEND=1:00"),
            b"+EVT:RX_1\r\n\r\n+EVT:SEND_CONFIRMED_FAILED(4)\r\n",
        );
        let mut io = engine(mock);

        let err = io.command("AT+SEND=1:00", CMD_TIMEOUT).await.unwrap_err();
        assert_eq!(err.device_line(), Some("+EVT:SEND_CONFIRMED_FAILED(4)"));
        assert_eq!(
            io.last_response(),
            "+EVT:RX_1\n+EVT:SEND_CONFIRMED_FAILED(4)\n"
        );
    }

    #[tokio::test(start_paused = true)]
    async fn blank_lines_never_reach_the_response() {
        let mut mock = MockTransport::new();
        mock.expect(&wire("AT+VER=?"), b"\r\n  \r\nAT+VER=4.1.0\r\n\t\r\n\r\nOK\r\n");
        let mut io = engine(mock);

        let text = io.command("AT+VER=?", CMD_TIMEOUT).await.unwrap();
        assert_eq!(text, "AT+VER=4.1.0\nOK\n");
        assert!(text.lines().all(|l| !l.trim().is_empty()));
    }

    #[tokio::test(start_paused = true)]
    async fn lines_split_across_reads() {
        let mut mock = MockTransport::new();
        mock.expect_chunks(&wire("AT+BAND=?"), &[b"AT+BA", b"ND=4:8680", b"00000\r", b"\nO", b"K\r\n"]);
        let mut io = engine(mock);

        let text = io.command("AT+BAND=?", CMD_TIMEOUT).await.unwrap();
        assert_eq!(text, "AT+BAND=4:868000000\nOK\n");
    }

    #[tokio::test(start_paused = true)]
    async fn uplink_waits_for_tx_done_after_slow_event() {
        let mut mock = MockTransport::new();
        mock.expect_script(
            &wire("AT+PSEND=48"),
            vec![
                Reply::Pause(Duration::from_secs(2)),
                Reply::Data(b"+EVT:TXP2P DONE\r\n".to_vec()),
            ],
        );
        let mut io = engine(mock);

        let start = Instant::now();
        let text = io
            .command("AT+PSEND=48", Duration::from_secs(30))
            .await
            .unwrap();
        assert_eq!(text, "+EVT:TXP2P DONE\n");
        assert_eq!(start.elapsed(), Duration::from_secs(2));
    }

    // =======================================================================
    // receive: quiet stream and deadline
    // =======================================================================

    // The quiet-stream rule cannot tell a finished reply from one that is
    // paused mid-transmission. These tests pin the current behavior.

    #[tokio::test(start_paused = true)]
    async fn quiet_stream_after_content_completes_early() {
        let mut mock = MockTransport::new();
        mock.expect(&wire("AT+HWMODEL=?"), b"AT+HWMODEL=rak3172\r\n");
        let mut io = engine(mock);

        let start = Instant::now();
        let text = io.command("AT+HWMODEL=?", CMD_TIMEOUT).await.unwrap();
        assert_eq!(text, "AT+HWMODEL=rak3172\n");
        assert_eq!(start.elapsed(), DEFAULT_POLL_INTERVAL);
        assert_eq!(io.last_response(), text);
    }

    #[tokio::test(start_paused = true)]
    async fn quiet_stream_truncates_a_paused_reply() {
        let mut mock = MockTransport::new();
        mock.expect_script(
            &wire("AT+SN=?"),
            vec![
                Reply::Data(b"AT+SN=1\r\n".to_vec()),
                Reply::Pause(Duration::from_millis(300)),
                Reply::Data(b"OK\r\n".to_vec()),
            ],
        );
        let mut io = engine(mock);

        let text = io.command("AT+SN=?", CMD_TIMEOUT).await.unwrap();
        assert_eq!(text, "AT+SN=1\n");
    }

    #[tokio::test(start_paused = true)]
    async fn unterminated_line_is_taken_when_quiet() {
        let mut mock = MockTransport::new();
        mock.expect(&wire("AT+CLASS=?"), b"AT+CLASS=A");
        let mut io = engine(mock);

        let text = io.command("AT+CLASS=?", CMD_TIMEOUT).await.unwrap();
        assert_eq!(text, "AT+CLASS=A\n");
    }

    #[tokio::test(start_paused = true)]
    async fn unterminated_error_line_is_classified() {
        let mut mock = MockTransport::new();
        mock.expect(&wire("AT+FOO=?"), b"AT_COMMAND_NOT_FOUND");
        let mut io = engine(mock);

        let err = io.command("AT+FOO=?", CMD_TIMEOUT).await.unwrap_err();
        assert_eq!(err.device_line(), Some("AT_COMMAND_NOT_FOUND"));
    }

    #[tokio::test(start_paused = true)]
    async fn quiet_stream_without_content_keeps_waiting() {
        let mut mock = MockTransport::new();
        mock.expect_delayed(&wire("AT+SN=?"), Duration::from_secs(3), b"AT+SN=42\r\nOK\r\n");
        let mut io = engine(mock);

        let start = Instant::now();
        let text = io.command("AT+SN=?", CMD_TIMEOUT).await.unwrap();
        assert_eq!(text, "AT+SN=42\nOK\n");
        assert_eq!(start.elapsed(), Duration::from_secs(3));
    }

    #[tokio::test(start_paused = true)]
    async fn no_device_times_out_exactly_at_deadline() {
        let mut mock = MockTransport::new();
        mock.expect(&wire("AT+SN=?"), b"");
        let mut io = engine(mock);

        let start = Instant::now();
        let result = io.command("AT+SN=?", CMD_TIMEOUT).await;
        assert!(matches!(result, Err(Error::Timeout)));
        assert_eq!(start.elapsed(), CMD_TIMEOUT);
        assert_eq!(io.last_response(), "");
    }

    #[tokio::test(start_paused = true)]
    async fn reply_after_deadline_is_a_timeout() {
        let mut mock = MockTransport::new();
        mock.expect_delayed(&wire("AT+SN=?"), Duration::from_secs(6), b"AT+SN=42\r\nOK\r\n");
        let mut io = engine(mock);

        let start = Instant::now();
        let result = io.command("AT+SN=?", CMD_TIMEOUT).await;
        assert!(matches!(result, Err(Error::Timeout)));
        assert_eq!(start.elapsed(), CMD_TIMEOUT);
    }

    #[tokio::test(start_paused = true)]
    async fn timeout_leaves_previous_last_response() {
        let mut mock = MockTransport::new();
        mock.expect(&wire("AT"), b"OK\r\n");
        mock.expect(&wire("AT+SN=?"), b"");
        let mut io = engine(mock);

        io.command("AT", CMD_TIMEOUT).await.unwrap();
        assert!(io.command("AT+SN=?", CMD_TIMEOUT).await.is_err());
        assert_eq!(io.last_response(), "OK\n");
    }

    #[tokio::test(start_paused = true)]
    async fn steady_chatter_is_cut_off_at_deadline() {
        let mut script = Vec::new();
        for i in 0..100 {
            script.push(Reply::Data(format!("+EVT:LINE{i}\r\n").into_bytes()));
            script.push(Reply::Pause(Duration::from_millis(50)));
        }
        let mut mock = MockTransport::new();
        mock.expect_script(&wire("ATZ"), script);
        let mut io = engine(mock);

        let start = Instant::now();
        let text = io.command("ATZ", Duration::from_secs(1)).await.unwrap();
        assert_eq!(start.elapsed(), Duration::from_secs(1));
        assert!(text.starts_with("+EVT:LINE0\n"));
        // One line every 50 ms, the last landing exactly on the deadline.
        assert_eq!(text.lines().count(), 21);
        assert!(text.ends_with("+EVT:LINE20\n"));
    }

    #[tokio::test(start_paused = true)]
    async fn custom_poll_interval_shortens_quiet_detection() {
        let mut mock = MockTransport::new();
        mock.expect(&wire("AT+APIVER=?"), b"AT+APIVER=3.2.0");
        let mut io = engine(mock).with_poll_interval(Duration::from_millis(20));

        let start = Instant::now();
        io.command("AT+APIVER=?", CMD_TIMEOUT).await.unwrap();
        assert_eq!(start.elapsed(), Duration::from_millis(20));
    }

    #[tokio::test(start_paused = true)]
    async fn zero_poll_interval_is_raised_to_minimum() {
        let mut mock = MockTransport::new();
        mock.expect(&wire("AT+APIVER=?"), b"AT+APIVER=3.2.0");
        let mut io = engine(mock).with_poll_interval(Duration::ZERO);

        let start = Instant::now();
        let text = io.command("AT+APIVER=?", CMD_TIMEOUT).await.unwrap();
        assert_eq!(text, "AT+APIVER=3.2.0\n");
        assert_eq!(start.elapsed(), MIN_POLL_INTERVAL);
    }

    #[tokio::test(start_paused = true)]
    async fn unbounded_timeout_still_completes() {
        let mut mock = MockTransport::new();
        mock.expect(&wire("AT"), b"OK\r\n");
        let mut io = engine(mock);

        assert_eq!(io.command("AT", Duration::MAX).await.unwrap(), "OK\n");
        assert_eq!(io.last_response(), "OK\n");
    }

    #[tokio::test(start_paused = true)]
    async fn invalid_utf8_is_replaced_not_rejected() {
        let mut mock = MockTransport::new();
        mock.expect(&wire("AT+SN=?"), b"\xff\xfeAT+SN=1\r\nOK\r\n");
        let mut io = engine(mock);

        let text = io.command("AT+SN=?", CMD_TIMEOUT).await.unwrap();
        assert_eq!(text, "\u{fffd}\u{fffd}AT+SN=1\nOK\n");
    }

    #[tokio::test(start_paused = true)]
    async fn transport_error_during_receive_is_returned() {
        let mut mock = MockTransport::new();
        mock.expect(&wire("AT"), b"");
        let mut io = engine(mock);
        io.send("AT").await.unwrap();
        io.close().await.unwrap();

        let result = io.receive(CMD_TIMEOUT).await;
        assert!(matches!(result, Err(Error::NotConnected)));
    }
}
