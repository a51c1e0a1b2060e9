//! Rui3Builder -- fluent builder for constructing [`Rui3Device`] instances.
//!
//! Separates configuration from construction so that callers can set the
//! serial port, line settings, and per-command timeouts before the port is
//! opened.
//!
//! # Example
//!
//! ```no_run
//! use rui3_device::builder::Rui3Builder;
//! use std::time::Duration;
//!
//! # async fn example() -> rui3_core::Result<()> {
//! let device = Rui3Builder::new()
//!     .serial_port("/dev/ttyUSB0")
//!     .baud_rate(115_200)
//!     .command_timeout(Duration::from_secs(3))
//!     .build()
//!     .await?;
//! println!("{}", device.firmware_version().await?);
//! # Ok(())
//! # }
//! ```

use std::time::Duration;

use rui3_at_io::io::{AtIo, DEFAULT_POLL_INTERVAL};
use rui3_core::error::{Error, Result};
use rui3_core::transport::Transport;
use rui3_transport::{DEFAULT_BAUD_RATE, SerialConfig, SerialTransport};

use crate::device::Rui3Device;

/// Default timeout for ordinary commands.
pub const DEFAULT_COMMAND_TIMEOUT: Duration = Duration::from_secs(5);
/// Default timeout for uplinks, which wait for the radio.
pub const DEFAULT_SEND_TIMEOUT: Duration = Duration::from_secs(30);
/// Default timeout for `ATZ`, which waits for the module to reboot.
pub const DEFAULT_RESET_TIMEOUT: Duration = Duration::from_secs(15);

/// Fluent builder for [`Rui3Device`].
///
/// All settings have defaults, so the simplest usage is:
///
/// ```ignore
/// let device = Rui3Builder::new()
///     .serial_port("/dev/ttyUSB0")
///     .build()
///     .await?;
/// ```
#[derive(Debug, Clone)]
pub struct Rui3Builder {
    serial_port: Option<String>,
    serial_config: SerialConfig,
    command_timeout: Duration,
    send_timeout: Duration,
    reset_timeout: Duration,
    poll_interval: Duration,
}

impl Rui3Builder {
    pub fn new() -> Self {
        Rui3Builder {
            serial_port: None,
            serial_config: SerialConfig::default(),
            command_timeout: DEFAULT_COMMAND_TIMEOUT,
            send_timeout: DEFAULT_SEND_TIMEOUT,
            reset_timeout: DEFAULT_RESET_TIMEOUT,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }

    /// Set the serial port path (e.g. `/dev/ttyUSB0` or `COM3`).
    pub fn serial_port(mut self, port: &str) -> Self {
        self.serial_port = Some(port.to_string());
        self
    }

    /// Override the baud rate (default: 115200).
    pub fn baud_rate(mut self, baud: u32) -> Self {
        self.serial_config.baud_rate = baud;
        self
    }

    /// Replace the full line configuration.
    pub fn serial_config(mut self, config: SerialConfig) -> Self {
        self.serial_config = config;
        self
    }

    /// Timeout for ordinary commands (default: 5s).
    pub fn command_timeout(mut self, timeout: Duration) -> Self {
        self.command_timeout = timeout;
        self
    }

    /// Timeout for `AT+SEND` and `AT+PSEND` (default: 30s).
    pub fn send_timeout(mut self, timeout: Duration) -> Self {
        self.send_timeout = timeout;
        self
    }

    /// Timeout for `ATZ` (default: 15s).
    pub fn reset_timeout(mut self, timeout: Duration) -> Self {
        self.reset_timeout = timeout;
        self
    }

    /// Length of one read slice; a slice with no bytes after some content
    /// ends the response (default: 100ms).
    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Build a [`Rui3Device`] with a caller-provided transport.
    ///
    /// This is the entry point for testing (pass a `MockTransport` from
    /// `rui3-test-harness`) and for callers that manage the transport
    /// themselves.
    pub async fn build_with_transport(self, transport: Box<dyn Transport>) -> Result<Rui3Device> {
        for (name, value) in [
            ("command_timeout", self.command_timeout),
            ("send_timeout", self.send_timeout),
            ("reset_timeout", self.reset_timeout),
            ("poll_interval", self.poll_interval),
        ] {
            if value.is_zero() {
                return Err(Error::InvalidParameter(format!("{name} must be non-zero")));
            }
        }

        let io = AtIo::new(transport).with_poll_interval(self.poll_interval);
        Ok(Rui3Device::new(
            io,
            self.command_timeout,
            self.send_timeout,
            self.reset_timeout,
        ))
    }

    /// Build a [`Rui3Device`] on a serial port.
    ///
    /// Requires that [`serial_port()`](Self::serial_port) has been called.
    pub async fn build(self) -> Result<Rui3Device> {
        let port = self
            .serial_port
            .as_deref()
            .ok_or_else(|| Error::InvalidParameter("serial_port is required for build()".into()))?;

        let transport = SerialTransport::open_with_config(port, self.serial_config.clone()).await?;
        self.build_with_transport(Box::new(transport)).await
    }
}

impl Default for Rui3Builder {
    fn default() -> Self {
        Self::new()
    }
}

/// Open a device on `port` at the default baud rate with default timeouts.
pub async fn open(port: &str) -> Result<Rui3Device> {
    Rui3Builder::new()
        .serial_port(port)
        .baud_rate(DEFAULT_BAUD_RATE)
        .build()
        .await
}
