//! Transport trait for module communication.
//!
//! The [`Transport`] trait abstracts over the physical link to a RUI3 module.
//! The serial implementation lives in `rui3-transport`; a scripted mock for
//! tests lives in `rui3-test-harness`.
//!
//! The AT protocol engine in `rui3-at-io` operates on a `Transport` rather
//! than directly on a serial port, enabling both real hardware control and
//! deterministic unit testing.

use async_trait::async_trait;
use std::time::Duration;

use crate::error::Result;

/// Asynchronous byte-level transport to a module.
///
/// Implementations handle buffering and error recovery at the physical
/// layer. Line framing and response classification belong to the protocol
/// engine that consumes this trait.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Send raw bytes to the module.
    ///
    /// Implementations write every byte and flush before returning.
    async fn send(&mut self, data: &[u8]) -> Result<()>;

    /// Receive bytes from the module into the provided buffer.
    ///
    /// Returns the number of bytes actually read. Waits at most `timeout`
    /// for data to arrive and returns [`Error::Timeout`](crate::error::Error::Timeout)
    /// if nothing is received within that window. The read never outlives
    /// the call.
    async fn receive(&mut self, buf: &mut [u8], timeout: Duration) -> Result<usize>;

    /// Discard any bytes already received but not yet read.
    ///
    /// Called before every command so that leftovers from an earlier,
    /// improperly terminated exchange cannot leak into the next response.
    async fn clear_input(&mut self) -> Result<()>;

    /// Close the transport connection.
    ///
    /// After calling `close()`, subsequent `send()` and `receive()` calls
    /// should return [`Error::NotConnected`](crate::error::Error::NotConnected).
    async fn close(&mut self) -> Result<()>;

    /// Check whether the transport is currently connected.
    fn is_connected(&self) -> bool;
}
