//! RUI3 AT command table: encoders and echoed-value decoders.
//!
//! Every readable setting is a [`Query`] and every writable one a
//! [`Setting`]. Both are plain `const` entries pairing a command prefix with
//! a conversion function, so the driver needs only two generic methods
//! rather than one hand-written exchange per command.
//!
//! All functions here are pure. The caller sends the encoded command and
//! feeds the full response text back into [`Query::decode`].
//!
//! # Echoed values
//!
//! The module answers a query by echoing the command with its value:
//!
//! ```text
//! AT+BAND=?            ->  AT+BAND=4:868000000
//!                          OK
//! ```
//!
//! The value is everything after the first `=` on the line that starts with
//! `<COMMAND>=`. Enumerated and numeric fields use only the part before the
//! first `:`; identifiers and free text use the whole value.

use rui3_core::{
    ChannelMask, DeviceClass, Error, JoinConfig, JoinMode, RegionBand, Result, WorkMode,
};

/// Lowest application port accepted by `AT+SEND`.
pub const MIN_APP_PORT: u8 = 1;
/// Highest application port accepted by `AT+SEND`.
pub const MAX_APP_PORT: u8 = 223;
/// Application port used for text uplinks.
pub const TEXT_APP_PORT: u8 = 1;

/// Highest data-rate index (`AT+DR`).
pub const MAX_DATA_RATE: u8 = 15;
/// Highest TX power index (`AT+TXP`).
pub const MAX_TX_POWER: u8 = 15;
/// Longest alias the module stores.
pub const MAX_ALIAS_LEN: usize = 16;

/// Attention: the module answers `OK`.
pub const CMD_ATTENTION: &str = "AT";
/// Soft reset.
pub const CMD_RESET: &str = "ATZ";
/// Start a join with the stored parameters.
pub const CMD_JOIN: &str = "AT+JOIN=?";

// ---------------------------------------------------------------
// Echoed-value extraction
// ---------------------------------------------------------------

/// Find the value the module echoed for `command`.
///
/// Scans for the first line starting with `<command>=` and returns the
/// trimmed text after the `=`.
///
/// # Errors
///
/// [`Error::MissingField`] if no such line is present.
pub fn echoed_value<'a>(response: &'a str, command: &str) -> Result<&'a str> {
    response
        .lines()
        .map(str::trim)
        .find_map(|line| line.strip_prefix(command)?.strip_prefix('='))
        .map(str::trim)
        .ok_or_else(|| Error::MissingField {
            field: command.to_string(),
            response: response.to_string(),
        })
}

/// The part of an echoed value before the first `:`.
///
/// `AT+BAND` echoes `4:868000000`; the band is `4`.
pub fn semantic_value(value: &str) -> &str {
    value.split_once(':').map_or(value, |(head, _)| head).trim()
}

// ---------------------------------------------------------------
// Query / Setting
// ---------------------------------------------------------------

/// A readable setting: `<command>=?` and a decoder for the echoed value.
pub struct Query<T> {
    /// Command prefix, e.g. `AT+BAND`.
    pub command: &'static str,
    parse: fn(&str) -> Result<T>,
}

impl<T> Query<T> {
    const fn new(command: &'static str, parse: fn(&str) -> Result<T>) -> Self {
        Query { command, parse }
    }

    /// The query command, e.g. `AT+BAND=?`.
    pub fn encode(&self) -> String {
        format!("{}=?", self.command)
    }

    /// Decode the full response text.
    pub fn decode(&self, response: &str) -> Result<T> {
        (self.parse)(echoed_value(response, self.command)?)
    }
}

/// A writable setting: `<command>=<value>`, validated before sending.
pub struct Setting<T: ?Sized> {
    /// Command prefix, e.g. `AT+MASK`.
    pub command: &'static str,
    format: fn(&T) -> Result<String>,
}

impl<T: ?Sized> Setting<T> {
    const fn new(command: &'static str, format: fn(&T) -> Result<String>) -> Self {
        Setting { command, format }
    }

    /// Encode the set command for `value`.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidParameter`] if `value` is out of range for the command.
    pub fn encode(&self, value: &T) -> Result<String> {
        Ok(format!("{}={}", self.command, (self.format)(value)?))
    }
}

// ---------------------------------------------------------------
// General
// ---------------------------------------------------------------

pub const HARDWARE_MODEL: Query<String> = Query::new("AT+HWMODEL", parse_text);
pub const HARDWARE_ID: Query<String> = Query::new("AT+HWID", parse_text);
pub const SERIAL_NUMBER: Query<String> = Query::new("AT+SN", parse_text);
pub const FIRMWARE_VERSION: Query<String> = Query::new("AT+VER", parse_text);
pub const API_VERSION: Query<String> = Query::new("AT+APIVER", parse_text);
pub const ALIAS: Query<String> = Query::new("AT+ALIAS", parse_text);
pub const SET_ALIAS: Setting<str> = Setting::new("AT+ALIAS", format_alias);

// ---------------------------------------------------------------
// Keys and identifiers
// ---------------------------------------------------------------

pub const DEV_EUI: Query<String> = Query::new("AT+DEVEUI", parse_text);
pub const APP_EUI: Query<String> = Query::new("AT+APPEUI", parse_text);
pub const APP_KEY: Query<String> = Query::new("AT+APPKEY", parse_text);
pub const DEV_ADDR: Query<String> = Query::new("AT+DEVADDR", parse_text);
pub const APPS_KEY: Query<String> = Query::new("AT+APPSKEY", parse_text);
pub const NWKS_KEY: Query<String> = Query::new("AT+NWKSKEY", parse_text);

pub const SET_DEV_EUI: Setting<str> = Setting::new("AT+DEVEUI", format_eui);
pub const SET_APP_EUI: Setting<str> = Setting::new("AT+APPEUI", format_eui);
pub const SET_APP_KEY: Setting<str> = Setting::new("AT+APPKEY", format_key);
pub const SET_DEV_ADDR: Setting<str> = Setting::new("AT+DEVADDR", format_dev_addr);
pub const SET_APPS_KEY: Setting<str> = Setting::new("AT+APPSKEY", format_key);
pub const SET_NWKS_KEY: Setting<str> = Setting::new("AT+NWKSKEY", format_key);

// ---------------------------------------------------------------
// Join
// ---------------------------------------------------------------

pub const CONFIGURE_JOIN: Setting<JoinConfig> = Setting::new("AT+JOIN", format_join_config);
pub const JOIN_STATUS: Query<bool> = Query::new("AT+NJS", parse_flag);
pub const JOIN_MODE: Query<JoinMode> = Query::new("AT+NJM", parse_enum);
pub const SET_JOIN_MODE: Setting<JoinMode> = Setting::new("AT+NJM", format_enum);

// ---------------------------------------------------------------
// LoRaWAN
// ---------------------------------------------------------------

pub const CONFIRM_MODE: Query<bool> = Query::new("AT+CFM", parse_flag);
pub const SET_CONFIRM_MODE: Setting<bool> = Setting::new("AT+CFM", format_flag);
pub const CLASS: Query<DeviceClass> = Query::new("AT+CLASS", parse_enum);
pub const SET_CLASS: Setting<DeviceClass> = Setting::new("AT+CLASS", format_enum);
pub const ADAPTIVE_DATA_RATE: Query<bool> = Query::new("AT+ADR", parse_flag);
pub const SET_ADAPTIVE_DATA_RATE: Setting<bool> = Setting::new("AT+ADR", format_flag);
pub const CHANNEL_MASK: Query<ChannelMask> = Query::new("AT+MASK", parse_enum);
pub const SET_CHANNEL_MASK: Setting<ChannelMask> = Setting::new("AT+MASK", format_enum);
pub const REGION_BAND: Query<RegionBand> = Query::new("AT+BAND", parse_enum);
pub const SET_REGION_BAND: Setting<RegionBand> = Setting::new("AT+BAND", format_enum);
pub const DATA_RATE: Query<u8> = Query::new("AT+DR", parse_data_rate);
pub const SET_DATA_RATE: Setting<u8> = Setting::new("AT+DR", format_data_rate);
pub const TX_POWER: Query<u8> = Query::new("AT+TXP", parse_tx_power);
pub const SET_TX_POWER: Setting<u8> = Setting::new("AT+TXP", format_tx_power);
pub const RSSI: Query<i16> = Query::new("AT+RSSI", parse_rssi);
pub const SNR: Query<i16> = Query::new("AT+SNR", parse_snr);

// ---------------------------------------------------------------
// P2P
// ---------------------------------------------------------------

pub const WORK_MODE: Query<WorkMode> = Query::new("AT+NWM", parse_enum);
pub const SET_WORK_MODE: Setting<WorkMode> = Setting::new("AT+NWM", format_enum);

// ---------------------------------------------------------------
// Uplinks
// ---------------------------------------------------------------

/// Build a LoRaWAN uplink command (`AT+SEND=<port>:<hex>`).
///
/// # Errors
///
/// [`Error::InvalidParameter`] if `port` is outside 1-223 or the payload is
/// empty.
pub fn cmd_send(port: u8, payload: &[u8]) -> Result<String> {
    if !(MIN_APP_PORT..=MAX_APP_PORT).contains(&port) {
        return Err(Error::InvalidParameter(format!(
            "application port {port} out of range {MIN_APP_PORT}-{MAX_APP_PORT}"
        )));
    }
    if payload.is_empty() {
        return Err(Error::InvalidParameter("uplink payload is empty".into()));
    }
    Ok(format!("AT+SEND={port}:{}", hex::encode(payload)))
}

/// Build a P2P transmit command (`AT+PSEND=<hex>`).
pub fn cmd_p2p_send(payload: &[u8]) -> Result<String> {
    if payload.is_empty() {
        return Err(Error::InvalidParameter("P2P payload is empty".into()));
    }
    Ok(format!("AT+PSEND={}", hex::encode(payload)))
}

// ---------------------------------------------------------------
// Value conversions
// ---------------------------------------------------------------

fn parse_text(value: &str) -> Result<String> {
    Ok(value.to_string())
}

fn parse_flag(value: &str) -> Result<bool> {
    match semantic_value(value) {
        "1" => Ok(true),
        "0" => Ok(false),
        other => Err(Error::UnknownVariant {
            field: "flag".into(),
            value: other.to_string(),
        }),
    }
}

fn format_flag(on: &bool) -> Result<String> {
    Ok(if *on { "1" } else { "0" }.into())
}

fn parse_index(value: &str, field: &str, max: u8) -> Result<u8> {
    let raw = semantic_value(value);
    match raw.parse::<u8>() {
        Ok(n) if n <= max => Ok(n),
        _ => Err(Error::UnknownVariant {
            field: field.into(),
            value: raw.to_string(),
        }),
    }
}

fn format_index(value: u8, field: &str, max: u8) -> Result<String> {
    if value > max {
        return Err(Error::InvalidParameter(format!(
            "{field} {value} out of range 0-{max}"
        )));
    }
    Ok(value.to_string())
}

fn parse_data_rate(value: &str) -> Result<u8> {
    parse_index(value, "data rate", MAX_DATA_RATE)
}

fn format_data_rate(value: &u8) -> Result<String> {
    format_index(*value, "data rate", MAX_DATA_RATE)
}

fn parse_tx_power(value: &str) -> Result<u8> {
    parse_index(value, "TX power", MAX_TX_POWER)
}

fn format_tx_power(value: &u8) -> Result<String> {
    format_index(*value, "TX power", MAX_TX_POWER)
}

fn parse_signed(value: &str, field: &str) -> Result<i16> {
    let raw = semantic_value(value);
    raw.parse().map_err(|_| Error::UnknownVariant {
        field: field.into(),
        value: raw.to_string(),
    })
}

fn format_hex(value: &str, field: &str, digits: usize) -> Result<String> {
    if value.len() != digits || !value.bytes().all(|b| b.is_ascii_hexdigit()) {
        return Err(Error::InvalidParameter(format!(
            "{field} must be {digits} hex digits, got {value:?}"
        )));
    }
    Ok(value.to_ascii_uppercase())
}

fn format_eui(value: &str) -> Result<String> {
    format_hex(value, "EUI", 16)
}

fn format_key(value: &str) -> Result<String> {
    format_hex(value, "key", 32)
}

fn format_dev_addr(value: &str) -> Result<String> {
    format_hex(value, "device address", 8)
}

fn format_alias(value: &str) -> Result<String> {
    if value.is_empty() || value.len() > MAX_ALIAS_LEN {
        return Err(Error::InvalidParameter(format!(
            "alias must be 1-{MAX_ALIAS_LEN} characters"
        )));
    }
    if value.chars().any(|c| c.is_control() || c == '=') {
        return Err(Error::InvalidParameter(
            "alias must not contain control characters or '='".into(),
        ));
    }
    Ok(value.to_string())
}

fn format_join_config(config: &JoinConfig) -> Result<String> {
    config.validate()?;
    Ok(config.encode())
}

fn parse_rssi(value: &str) -> Result<i16> {
    parse_signed(value, "RSSI")
}

fn parse_snr(value: &str) -> Result<i16> {
    parse_signed(value, "SNR")
}

/// An enumerated setting with a fixed wire code per variant.
trait WireEnum: Sized {
    fn code(&self) -> &'static str;
    fn from_code(code: &str) -> Result<Self>;
}

fn parse_enum<T: WireEnum>(value: &str) -> Result<T> {
    T::from_code(semantic_value(value))
}

fn format_enum<T: WireEnum>(value: &T) -> Result<String> {
    Ok(value.code().to_string())
}

macro_rules! wire_enum {
    ($($ty:ty),* $(,)?) => {
        $(
            impl WireEnum for $ty {
                fn code(&self) -> &'static str {
                    <$ty>::code(self)
                }

                fn from_code(code: &str) -> Result<Self> {
                    <$ty>::from_code(code)
                }
            }
        )*
    };
}

wire_enum!(DeviceClass, RegionBand, ChannelMask, JoinMode, WorkMode);
