//! Serial port transport for RUI3 modules.
//!
//! This module provides [`SerialTransport`], which implements the [`Transport`]
//! trait for the UART (or USB virtual COM port) of a RAKwireless RUI3 module.
//! The module's AT interface runs at 115200 baud, 8 data bits, no parity,
//! 1 stop bit, with no flow control.
//!
//! # Example
//!
//! ```no_run
//! use rui3_transport::SerialTransport;
//! use rui3_core::transport::Transport;
//! use std::time::Duration;
//!
//! # async fn example() -> rui3_core::Result<()> {
//! let mut transport = SerialTransport::open("/dev/ttyS0", 115_200).await?;
//!
//! transport.clear_input().await?;
//! transport.send(b"AT+SN=?\r\n").await?;
//!
//! let mut buf = [0u8; 256];
//! let n = transport.receive(&mut buf, Duration::from_millis(100)).await?;
//! # Ok(())
//! # }
//! ```

use async_trait::async_trait;
use rui3_core::error::{Error, Result};
use rui3_core::transport::Transport;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio_serial::{ClearBuffer, SerialPort, SerialPortBuilderExt, SerialStream};

/// Baud rate of the RUI3 AT command interface.
pub const DEFAULT_BAUD_RATE: u32 = 115_200;

/// Line settings for the module's AT port.
///
/// Framing is fixed at 8N1 without flow control; only the rate and the
/// handling of the modem-control lines vary between boards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SerialConfig {
    pub baud_rate: u32,
    /// Drive DTR and RTS low after opening. Several RAK carrier boards route
    /// them to the module's reset and boot pins.
    pub release_control_lines: bool,
}

impl Default for SerialConfig {
    fn default() -> Self {
        Self {
            baud_rate: DEFAULT_BAUD_RATE,
            release_control_lines: true,
        }
    }
}

fn map_io_error(e: std::io::Error) -> Error {
    if e.kind() == std::io::ErrorKind::BrokenPipe || e.kind() == std::io::ErrorKind::NotConnected
    {
        Error::ConnectionLost
    } else {
        Error::Io(e)
    }
}

/// Serial port transport for a RUI3 module.
pub struct SerialTransport {
    /// The underlying serial port stream
    port: Option<SerialStream>,
    /// Port name for logging/debugging
    port_name: String,
}

impl SerialTransport {
    /// Open a serial port with the given baud rate and 8N1 framing.
    ///
    /// # Arguments
    ///
    /// * `port` - Serial port path (e.g., "/dev/ttyS0" on Linux, "COM3" on Windows)
    /// * `baud_rate` - Baud rate, normally [`DEFAULT_BAUD_RATE`]
    pub async fn open(port: &str, baud_rate: u32) -> Result<Self> {
        let config = SerialConfig {
            baud_rate,
            ..Default::default()
        };
        Self::open_with_config(port, config).await
    }

    /// Open a serial port with explicit line settings.
    pub async fn open_with_config(port: &str, config: SerialConfig) -> Result<Self> {
        tracing::debug!(port = %port, ?config, "opening AT port");

        let mut stream = tokio_serial::new(port, config.baud_rate)
            .data_bits(tokio_serial::DataBits::Eight)
            .stop_bits(tokio_serial::StopBits::One)
            .parity(tokio_serial::Parity::None)
            .flow_control(tokio_serial::FlowControl::None)
            .open_native_async()
            .map_err(|e| Error::Transport(format!("failed to open serial port {port}: {e}")))?;

        if config.release_control_lines {
            let released = stream
                .write_data_terminal_ready(false)
                .and_then(|()| stream.write_request_to_send(false));
            if let Err(e) = released {
                tracing::warn!(port = %port, error = %e, "could not release DTR/RTS");
            }
        }

        tracing::info!(port = %port, baud_rate = config.baud_rate, "AT port open");

        Ok(Self {
            port: Some(stream),
            port_name: port.to_string(),
        })
    }

    /// Get the name of the serial port.
    pub fn port_name(&self) -> &str {
        &self.port_name
    }
}

#[async_trait]
impl Transport for SerialTransport {
    async fn send(&mut self, data: &[u8]) -> Result<()> {
        let port = self.port.as_mut().ok_or(Error::NotConnected)?;

        tracing::trace!(
            port = %self.port_name,
            bytes = data.len(),
            data = %String::from_utf8_lossy(data).trim_end(),
            "Sending data"
        );

        port.write_all(data).await.map_err(|e| {
            tracing::error!(port = %self.port_name, error = %e, "Failed to send data");
            map_io_error(e)
        })?;

        port.flush().await.map_err(|e| {
            tracing::error!(port = %self.port_name, error = %e, "Failed to flush serial port");
            map_io_error(e)
        })?;

        Ok(())
    }

    async fn receive(&mut self, buf: &mut [u8], timeout: Duration) -> Result<usize> {
        let port = self.port.as_mut().ok_or(Error::NotConnected)?;

        match tokio::time::timeout(timeout, port.read(buf)).await {
            Ok(Ok(n)) => {
                tracing::trace!(
                    port = %self.port_name,
                    bytes = n,
                    data = %String::from_utf8_lossy(&buf[..n]),
                    "Received data"
                );
                Ok(n)
            }
            Ok(Err(e)) => {
                tracing::error!(port = %self.port_name, error = %e, "Failed to receive data");
                Err(map_io_error(e))
            }
            Err(_) => Err(Error::Timeout),
        }
    }

    async fn clear_input(&mut self) -> Result<()> {
        let port = self.port.as_mut().ok_or(Error::NotConnected)?;
        port.clear(ClearBuffer::Input).map_err(|e| {
            tracing::warn!(port = %self.port_name, error = %e, "Failed to clear input buffer");
            Error::Transport(format!("failed to clear input buffer: {e}"))
        })
    }

    async fn close(&mut self) -> Result<()> {
        // Dropping the stream releases the OS handle; pending output is
        // already flushed by every send.
        if self.port.take().is_some() {
            tracing::info!(port = %self.port_name, "AT port closed");
        }
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.port.is_some()
    }
}
