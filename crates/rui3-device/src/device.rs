//! Rui3Device -- typed driver for a RAKwireless RUI3 module.
//!
//! This module ties the AT protocol engine ([`AtIo`]) to the command table
//! ([`commands`]) to produce a working driver. Every operation is one
//! exchange: encode, send, receive, then decode the echoed value or check
//! for an acknowledgement.
//!
//! The engine sits behind a [`tokio::sync::Mutex`] held for the whole
//! exchange, so a device can be shared between tasks and their commands
//! are serialized rather than interleaved on the wire.

use std::time::Duration;

use tokio::sync::Mutex;
use tracing::debug;

use rui3_at_io::io::AtIo;
use rui3_at_io::protocol::{self, LineClass};
use rui3_core::error::{Error, Result};
use rui3_core::types::*;

use crate::commands::{self, Query, Setting};

/// A connected RUI3 module controlled over AT commands.
///
/// Constructed via [`Rui3Builder`](crate::builder::Rui3Builder).
pub struct Rui3Device {
    io: Mutex<AtIo>,
    command_timeout: Duration,
    send_timeout: Duration,
    reset_timeout: Duration,
}

impl Rui3Device {
    /// Create a device from a ready engine and its timeouts.
    ///
    /// Called by [`Rui3Builder`](crate::builder::Rui3Builder); callers should
    /// use the builder API instead.
    pub(crate) fn new(
        io: AtIo,
        command_timeout: Duration,
        send_timeout: Duration,
        reset_timeout: Duration,
    ) -> Self {
        Rui3Device {
            io: Mutex::new(io),
            command_timeout,
            send_timeout,
            reset_timeout,
        }
    }

    /// Timeout applied to ordinary commands.
    pub fn command_timeout(&self) -> Duration {
        self.command_timeout
    }

    /// Timeout applied to uplinks (`AT+SEND`, `AT+PSEND`).
    pub fn send_timeout(&self) -> Duration {
        self.send_timeout
    }

    // ---------------------------------------------------------------
    // Exchange helpers
    // ---------------------------------------------------------------

    /// Send a command and wait for its response, holding the engine for the
    /// whole exchange.
    async fn exchange(&self, command: &str, timeout: Duration) -> Result<String> {
        let mut io = self.io.lock().await;
        io.command(command, timeout).await
    }

    /// Run a query and decode its echoed value.
    async fn query<T>(&self, query: &Query<T>) -> Result<T> {
        let response = self.exchange(&query.encode(), self.command_timeout).await?;
        query.decode(&response)
    }

    /// Validate, send, and confirm a setting.
    async fn apply<T: ?Sized>(&self, setting: &Setting<T>, value: &T) -> Result<()> {
        let command = setting.encode(value)?;
        self.execute(&command, self.command_timeout).await?;
        Ok(())
    }

    /// Send an action and require an `OK` or completion event in the reply.
    async fn execute(&self, command: &str, timeout: Duration) -> Result<String> {
        let response = self.exchange(command, timeout).await?;
        if acknowledged(&response) {
            Ok(response)
        } else {
            debug!(command, "response carried no acknowledgement");
            Err(Error::NotAcknowledged {
                command: command.to_string(),
                response,
            })
        }
    }

    // ---------------------------------------------------------------
    // General
    // ---------------------------------------------------------------

    /// Check the module is responsive (`AT`).
    ///
    /// Returns the first line starting with `AT` if the module echoes one,
    /// otherwise the full response text.
    pub async fn attention(&self) -> Result<String> {
        let response = self
            .exchange(commands::CMD_ATTENTION, self.command_timeout)
            .await?;
        let echoed = response
            .lines()
            .map(str::trim)
            .find(|line| line.starts_with("AT"))
            .map(str::to_string);
        Ok(echoed.unwrap_or(response))
    }

    /// Soft-reset the module (`ATZ`).
    ///
    /// The module reboots and prints a banner rather than `OK`; whatever
    /// arrives before the line goes quiet is returned.
    pub async fn reset(&self) -> Result<String> {
        debug!("resetting module");
        self.exchange(commands::CMD_RESET, self.reset_timeout).await
    }

    pub async fn hardware_model(&self) -> Result<String> {
        self.query(&commands::HARDWARE_MODEL).await
    }

    pub async fn hardware_id(&self) -> Result<String> {
        self.query(&commands::HARDWARE_ID).await
    }

    pub async fn serial_number(&self) -> Result<String> {
        self.query(&commands::SERIAL_NUMBER).await
    }

    pub async fn firmware_version(&self) -> Result<String> {
        self.query(&commands::FIRMWARE_VERSION).await
    }

    pub async fn api_version(&self) -> Result<String> {
        self.query(&commands::API_VERSION).await
    }

    pub async fn alias(&self) -> Result<String> {
        self.query(&commands::ALIAS).await
    }

    /// Set the module alias (1-16 printable characters).
    pub async fn set_alias(&self, alias: &str) -> Result<()> {
        self.apply(&commands::SET_ALIAS, alias).await
    }

    // ---------------------------------------------------------------
    // Keys and identifiers
    // ---------------------------------------------------------------

    pub async fn dev_eui(&self) -> Result<String> {
        self.query(&commands::DEV_EUI).await
    }

    /// Set the device EUI (16 hex digits).
    pub async fn set_dev_eui(&self, eui: &str) -> Result<()> {
        self.apply(&commands::SET_DEV_EUI, eui).await
    }

    pub async fn app_eui(&self) -> Result<String> {
        self.query(&commands::APP_EUI).await
    }

    /// Set the application (join) EUI (16 hex digits).
    pub async fn set_app_eui(&self, eui: &str) -> Result<()> {
        self.apply(&commands::SET_APP_EUI, eui).await
    }

    pub async fn app_key(&self) -> Result<String> {
        self.query(&commands::APP_KEY).await
    }

    /// Set the OTAA application key (32 hex digits).
    pub async fn set_app_key(&self, key: &str) -> Result<()> {
        self.apply(&commands::SET_APP_KEY, key).await
    }

    pub async fn dev_addr(&self) -> Result<String> {
        self.query(&commands::DEV_ADDR).await
    }

    /// Set the ABP device address (8 hex digits).
    pub async fn set_dev_addr(&self, addr: &str) -> Result<()> {
        self.apply(&commands::SET_DEV_ADDR, addr).await
    }

    pub async fn apps_key(&self) -> Result<String> {
        self.query(&commands::APPS_KEY).await
    }

    /// Set the ABP application session key (32 hex digits).
    pub async fn set_apps_key(&self, key: &str) -> Result<()> {
        self.apply(&commands::SET_APPS_KEY, key).await
    }

    pub async fn nwks_key(&self) -> Result<String> {
        self.query(&commands::NWKS_KEY).await
    }

    /// Set the ABP network session key (32 hex digits).
    pub async fn set_nwks_key(&self, key: &str) -> Result<()> {
        self.apply(&commands::SET_NWKS_KEY, key).await
    }

    // ---------------------------------------------------------------
    // Join
    // ---------------------------------------------------------------

    /// Start a join with the stored parameters (`AT+JOIN=?`).
    ///
    /// Success means the module accepted the request, not that the join
    /// completed; poll [`join_status`](Self::join_status) for that.
    pub async fn join_network(&self) -> Result<()> {
        self.execute(commands::CMD_JOIN, self.command_timeout).await?;
        Ok(())
    }

    /// Start or stop a join with explicit parameters.
    pub async fn configure_join(&self, config: &JoinConfig) -> Result<()> {
        self.apply(&commands::CONFIGURE_JOIN, config).await
    }

    /// `true` once the module has joined a network.
    pub async fn join_status(&self) -> Result<bool> {
        self.query(&commands::JOIN_STATUS).await
    }

    pub async fn join_mode(&self) -> Result<JoinMode> {
        self.query(&commands::JOIN_MODE).await
    }

    pub async fn set_join_mode(&self, mode: JoinMode) -> Result<()> {
        self.apply(&commands::SET_JOIN_MODE, &mode).await
    }

    // ---------------------------------------------------------------
    // LoRaWAN settings
    // ---------------------------------------------------------------

    /// `true` if uplinks are sent as confirmed messages.
    pub async fn confirm_mode(&self) -> Result<bool> {
        self.query(&commands::CONFIRM_MODE).await
    }

    pub async fn set_confirm_mode(&self, confirmed: bool) -> Result<()> {
        self.apply(&commands::SET_CONFIRM_MODE, &confirmed).await
    }

    pub async fn class(&self) -> Result<DeviceClass> {
        self.query(&commands::CLASS).await
    }

    pub async fn set_class(&self, class: DeviceClass) -> Result<()> {
        self.apply(&commands::SET_CLASS, &class).await
    }

    pub async fn adaptive_data_rate(&self) -> Result<bool> {
        self.query(&commands::ADAPTIVE_DATA_RATE).await
    }

    pub async fn set_adaptive_data_rate(&self, enabled: bool) -> Result<()> {
        self.apply(&commands::SET_ADAPTIVE_DATA_RATE, &enabled).await
    }

    pub async fn channel_mask(&self) -> Result<ChannelMask> {
        self.query(&commands::CHANNEL_MASK).await
    }

    pub async fn set_channel_mask(&self, mask: ChannelMask) -> Result<()> {
        self.apply(&commands::SET_CHANNEL_MASK, &mask).await
    }

    pub async fn region_band(&self) -> Result<RegionBand> {
        self.query(&commands::REGION_BAND).await
    }

    pub async fn set_region_band(&self, band: RegionBand) -> Result<()> {
        self.apply(&commands::SET_REGION_BAND, &band).await
    }

    pub async fn data_rate(&self) -> Result<u8> {
        self.query(&commands::DATA_RATE).await
    }

    /// Set the data-rate index (0-15; valid range depends on the band).
    pub async fn set_data_rate(&self, dr: u8) -> Result<()> {
        self.apply(&commands::SET_DATA_RATE, &dr).await
    }

    pub async fn tx_power(&self) -> Result<u8> {
        self.query(&commands::TX_POWER).await
    }

    /// Set the TX power index (0-15; 0 is maximum power).
    pub async fn set_tx_power(&self, index: u8) -> Result<()> {
        self.apply(&commands::SET_TX_POWER, &index).await
    }

    /// RSSI of the last received downlink, in dBm.
    pub async fn rssi(&self) -> Result<i16> {
        self.query(&commands::RSSI).await
    }

    /// SNR of the last received downlink, in dB.
    pub async fn snr(&self) -> Result<i16> {
        self.query(&commands::SNR).await
    }

    // ---------------------------------------------------------------
    // Uplinks
    // ---------------------------------------------------------------

    /// Send a LoRaWAN uplink on `port` (1-223).
    pub async fn send(&self, port: u8, payload: &[u8]) -> Result<()> {
        let command = commands::cmd_send(port, payload)?;
        debug!(port, len = payload.len(), "sending uplink");
        self.execute(&command, self.send_timeout).await?;
        Ok(())
    }

    /// Send a UTF-8 string as an uplink on port 1.
    pub async fn send_text(&self, text: &str) -> Result<()> {
        self.send(commands::TEXT_APP_PORT, text.as_bytes()).await
    }

    // ---------------------------------------------------------------
    // P2P
    // ---------------------------------------------------------------

    pub async fn work_mode(&self) -> Result<WorkMode> {
        self.query(&commands::WORK_MODE).await
    }

    /// Switch between LoRa P2P and LoRaWAN. The module restarts its stack.
    pub async fn set_work_mode(&self, mode: WorkMode) -> Result<()> {
        self.apply(&commands::SET_WORK_MODE, &mode).await
    }

    /// Transmit a raw LoRa P2P frame.
    pub async fn p2p_send(&self, payload: &[u8]) -> Result<()> {
        let command = commands::cmd_p2p_send(payload)?;
        debug!(len = payload.len(), "sending P2P frame");
        self.execute(&command, self.send_timeout).await?;
        Ok(())
    }

    // ---------------------------------------------------------------
    // Diagnostics
    // ---------------------------------------------------------------

    /// Text of the most recently completed response.
    pub async fn last_response(&self) -> String {
        self.io.lock().await.last_response().to_string()
    }

    /// Send an arbitrary command and return the raw response text.
    pub async fn raw_command(&self, command: &str, timeout: Duration) -> Result<String> {
        self.exchange(command, timeout).await
    }

    /// Close the underlying transport.
    pub async fn close(&self) -> Result<()> {
        self.io.lock().await.close().await
    }

    pub async fn is_connected(&self) -> bool {
        self.io.lock().await.is_connected()
    }
}

/// `true` if any line of `response` is an `OK` or a completion event.
fn acknowledged(response: &str) -> bool {
    response.lines().any(|line| {
        matches!(
            protocol::classify_line(line.trim()),
            LineClass::Success | LineClass::Completion
        )
    })
}
