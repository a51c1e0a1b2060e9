//! Mock transport for deterministic testing of the AT protocol engine.
//!
//! [`MockTransport`] implements the [`Transport`] trait with pre-loaded
//! request/response pairs. Responses can be delivered all at once, in
//! separate chunks, or with pauses in between, which lets tests drive the
//! framer through split lines, quiet periods, and deadlines.
//!
//! Reads honour the caller's timeout through `tokio::time::sleep`, so tests
//! should run with a paused clock (`#[tokio::test(start_paused = true)]`) to
//! keep them fast and exact.
//!
//! # Example
//!
//! ```
//! use rui3_test_harness::MockTransport;
//! use std::time::Duration;
//!
//! let mut mock = MockTransport::new();
//! // When the engine sends this request, reply with this response.
//! mock.expect(b"AT+BAND=?\r\n", b"AT+BAND=4:868000000\r\nOK\r\n");
//! // A late reply: nothing for 2 s, then the data.
//! mock.expect_delayed(b"AT+SN=?\r\n", Duration::from_secs(2), b"AT+SN=123\r\nOK\r\n");
//! ```

use async_trait::async_trait;
use std::collections::VecDeque;
use std::time::Duration;

use rui3_core::error::{Error, Result};
use rui3_core::transport::Transport;

/// One step of a scripted reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    /// Bytes made available to the next `receive()` call(s).
    Data(Vec<u8>),
    /// The line stays quiet for this long before the next step.
    Pause(Duration),
}

/// A pre-loaded request/reply script for the mock transport.
#[derive(Debug, Clone)]
struct Expectation {
    /// The exact bytes we expect to be sent.
    request: Vec<u8>,
    /// Steps played back after the matching request.
    reply: Vec<Reply>,
}

/// A mock [`Transport`] for testing protocol engines without hardware.
///
/// Expectations are consumed in order. When `send()` is called, the sent
/// data is recorded and matched against the next expectation; its reply
/// script is then played back by subsequent `receive()` calls. When the
/// script is exhausted, `receive()` waits out the caller's timeout and
/// returns [`Error::Timeout`], like a real port with nothing attached.
#[derive(Debug)]
pub struct MockTransport {
    /// Ordered queue of expected request/reply pairs.
    expectations: VecDeque<Expectation>,
    /// Steps still to be played back for the current exchange.
    pending: VecDeque<Reply>,
    /// Bytes sitting in the input buffer that no command asked for.
    stale: Vec<u8>,
    /// Whether the transport is "connected".
    connected: bool,
    /// Log of all bytes sent through this transport.
    sent_log: Vec<Vec<u8>>,
    /// Number of `clear_input()` calls.
    input_clears: usize,
}

impl MockTransport {
    /// Create a new mock transport in the connected state.
    pub fn new() -> Self {
        MockTransport {
            expectations: VecDeque::new(),
            pending: VecDeque::new(),
            stale: Vec::new(),
            connected: true,
            sent_log: Vec::new(),
            input_clears: 0,
        }
    }

    /// Add an expected request with a reply delivered immediately.
    ///
    /// An empty `response` scripts a silent device.
    pub fn expect(&mut self, request: &[u8], response: &[u8]) {
        let reply = if response.is_empty() {
            Vec::new()
        } else {
            vec![Reply::Data(response.to_vec())]
        };
        self.expect_script(request, reply);
    }

    /// Add an expected request whose reply arrives after `delay`.
    pub fn expect_delayed(&mut self, request: &[u8], delay: Duration, response: &[u8]) {
        self.expect_script(
            request,
            vec![Reply::Pause(delay), Reply::Data(response.to_vec())],
        );
    }

    /// Add an expected request whose reply arrives in separate chunks, each
    /// returned by its own `receive()` call.
    pub fn expect_chunks(&mut self, request: &[u8], chunks: &[&[u8]]) {
        let reply = chunks.iter().map(|c| Reply::Data(c.to_vec())).collect();
        self.expect_script(request, reply);
    }

    /// Add an expected request with an arbitrary reply script.
    pub fn expect_script(&mut self, request: &[u8], reply: Vec<Reply>) {
        self.expectations.push_back(Expectation {
            request: request.to_vec(),
            reply,
        });
    }

    /// Place unsolicited bytes in the input buffer, as if left over from an
    /// earlier exchange. They are served by `receive()` until cleared.
    pub fn inject_stale(&mut self, data: &[u8]) {
        self.stale.extend_from_slice(data);
    }

    /// Return a reference to all data that has been sent through this transport.
    ///
    /// Each element is the byte slice from one `send()` call.
    pub fn sent_data(&self) -> &[Vec<u8>] {
        &self.sent_log
    }

    /// Return the number of expectations that have not yet been consumed.
    pub fn remaining_expectations(&self) -> usize {
        self.expectations.len()
    }

    /// Return how many times the input buffer has been cleared.
    pub fn input_clears(&self) -> usize {
        self.input_clears
    }

    /// Set the connected state of the mock transport.
    ///
    /// When set to `false`, subsequent calls return [`Error::NotConnected`].
    pub fn set_connected(&mut self, connected: bool) {
        self.connected = connected;
    }
}

impl Default for MockTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn send(&mut self, data: &[u8]) -> Result<()> {
        if !self.connected {
            return Err(Error::NotConnected);
        }

        self.sent_log.push(data.to_vec());

        if let Some(expectation) = self.expectations.pop_front() {
            if data != expectation.request.as_slice() {
                return Err(Error::Transport(format!(
                    "unexpected send data: expected {:?}, got {:?}",
                    String::from_utf8_lossy(&expectation.request),
                    String::from_utf8_lossy(data)
                )));
            }
            self.pending = expectation.reply.into();
            Ok(())
        } else {
            Err(Error::Transport(
                "no more expectations in mock transport".into(),
            ))
        }
    }

    async fn receive(&mut self, buf: &mut [u8], timeout: Duration) -> Result<usize> {
        if !self.connected {
            return Err(Error::NotConnected);
        }

        if !self.stale.is_empty() {
            let n = self.stale.len().min(buf.len());
            buf[..n].copy_from_slice(&self.stale[..n]);
            self.stale.drain(..n);
            return Ok(n);
        }

        let mut budget = timeout;
        loop {
            match self.pending.pop_front() {
                Some(Reply::Pause(pause)) => {
                    if pause > budget {
                        tokio::time::sleep(budget).await;
                        self.pending.push_front(Reply::Pause(pause - budget));
                        return Err(Error::Timeout);
                    }
                    tokio::time::sleep(pause).await;
                    budget -= pause;
                }
                Some(Reply::Data(data)) => {
                    if data.is_empty() {
                        continue;
                    }
                    let n = data.len().min(buf.len());
                    buf[..n].copy_from_slice(&data[..n]);
                    if n < data.len() {
                        self.pending.push_front(Reply::Data(data[n..].to_vec()));
                    }
                    return Ok(n);
                }
                None => {
                    tokio::time::sleep(budget).await;
                    return Err(Error::Timeout);
                }
            }
        }
    }

    async fn clear_input(&mut self) -> Result<()> {
        if !self.connected {
            return Err(Error::NotConnected);
        }
        self.input_clears += 1;
        self.stale.clear();
        Ok(())
    }

    async fn close(&mut self) -> Result<()> {
        self.connected = false;
        self.pending.clear();
        self.stale.clear();
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.connected
    }
}
