//! Typed values carried by RUI3 AT commands.
//!
//! Every enumerated setting maps between a human-readable token (used by
//! `Display`/`FromStr`, e.g. `"EU868"`) and the module's compact wire code
//! (e.g. `"4"`) through an explicit table. Unknown wire codes decode to
//! [`Error::UnknownVariant`].
//!
//! # Example
//!
//! ```
//! use rui3_core::RegionBand;
//!
//! let band = RegionBand::from_code("4").unwrap();
//! assert_eq!(band, RegionBand::EU868);
//! assert_eq!(band.code(), "4");
//! assert_eq!(band.to_string(), "EU868");
//! assert_eq!("as923-2".parse::<RegionBand>().unwrap(), RegionBand::AS923_2);
//! ```

use std::fmt;
use std::str::FromStr;

use crate::error::{Error, Result};

fn unknown(field: &str, value: &str) -> Error {
    Error::UnknownVariant {
        field: field.to_string(),
        value: value.to_string(),
    }
}

fn unknown_token(field: &str, token: &str) -> Error {
    Error::InvalidParameter(format!("unknown {field} {token:?}"))
}

// ---------------------------------------------------------------------------
// Device class
// ---------------------------------------------------------------------------

/// LoRaWAN device class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeviceClass {
    /// Class A: receive windows only after an uplink.
    A,
    /// Class B: scheduled receive slots synchronised by beacons.
    B,
    /// Class C: continuously listening.
    C,
}

impl DeviceClass {
    /// All device classes.
    pub const ALL: [DeviceClass; 3] = [DeviceClass::A, DeviceClass::B, DeviceClass::C];

    /// The wire code (`A`, `B` or `C`).
    pub fn code(&self) -> &'static str {
        match self {
            DeviceClass::A => "A",
            DeviceClass::B => "B",
            DeviceClass::C => "C",
        }
    }

    /// Decode a wire code.
    pub fn from_code(code: &str) -> Result<Self> {
        match code {
            "A" => Ok(DeviceClass::A),
            "B" => Ok(DeviceClass::B),
            "C" => Ok(DeviceClass::C),
            other => Err(unknown("device class", other)),
        }
    }
}

impl fmt::Display for DeviceClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for DeviceClass {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        DeviceClass::from_code(&s.trim().to_ascii_uppercase())
            .map_err(|_| unknown_token("device class", s))
    }
}

// ---------------------------------------------------------------------------
// Region band
// ---------------------------------------------------------------------------

/// LoRaWAN regional frequency plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[allow(non_camel_case_types)]
pub enum RegionBand {
    EU433,
    CN470,
    RU864,
    IN865,
    EU868,
    US915,
    AU915,
    KR920,
    AS923,
    AS923_2,
    AS923_3,
    AS923_4,
    LA915,
}

impl RegionBand {
    /// All region bands in wire-code order (`0` through `12`).
    pub const ALL: [RegionBand; 13] = [
        RegionBand::EU433,
        RegionBand::CN470,
        RegionBand::RU864,
        RegionBand::IN865,
        RegionBand::EU868,
        RegionBand::US915,
        RegionBand::AU915,
        RegionBand::KR920,
        RegionBand::AS923,
        RegionBand::AS923_2,
        RegionBand::AS923_3,
        RegionBand::AS923_4,
        RegionBand::LA915,
    ];

    /// The decimal wire code.
    pub fn code(&self) -> &'static str {
        match self {
            RegionBand::EU433 => "0",
            RegionBand::CN470 => "1",
            RegionBand::RU864 => "2",
            RegionBand::IN865 => "3",
            RegionBand::EU868 => "4",
            RegionBand::US915 => "5",
            RegionBand::AU915 => "6",
            RegionBand::KR920 => "7",
            RegionBand::AS923 => "8",
            RegionBand::AS923_2 => "9",
            RegionBand::AS923_3 => "10",
            RegionBand::AS923_4 => "11",
            RegionBand::LA915 => "12",
        }
    }

    /// Decode a decimal wire code.
    pub fn from_code(code: &str) -> Result<Self> {
        RegionBand::ALL
            .iter()
            .copied()
            .find(|band| band.code() == code)
            .ok_or_else(|| unknown("region band", code))
    }

    /// The human-readable name (e.g. `"AS923-2"`).
    pub fn name(&self) -> &'static str {
        match self {
            RegionBand::EU433 => "EU433",
            RegionBand::CN470 => "CN470",
            RegionBand::RU864 => "RU864",
            RegionBand::IN865 => "IN865",
            RegionBand::EU868 => "EU868",
            RegionBand::US915 => "US915",
            RegionBand::AU915 => "AU915",
            RegionBand::KR920 => "KR920",
            RegionBand::AS923 => "AS923",
            RegionBand::AS923_2 => "AS923-2",
            RegionBand::AS923_3 => "AS923-3",
            RegionBand::AS923_4 => "AS923-4",
            RegionBand::LA915 => "LA915",
        }
    }
}

impl fmt::Display for RegionBand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for RegionBand {
    type Err = Error;

    /// Accepts names case-insensitively, with `-` or `_` before the AS923
    /// sub-plan digit.
    fn from_str(s: &str) -> Result<Self> {
        let normalized = s.trim().to_ascii_uppercase().replace('_', "-");
        RegionBand::ALL
            .iter()
            .copied()
            .find(|band| band.name() == normalized)
            .ok_or_else(|| unknown_token("region band", s))
    }
}

// ---------------------------------------------------------------------------
// Channel mask
// ---------------------------------------------------------------------------

/// Sub-band channel mask.
///
/// `All` enables every sub-band; `SubBand1`..`SubBand12` restrict the radio
/// to one block of channels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChannelMask {
    All,
    SubBand1,
    SubBand2,
    SubBand3,
    SubBand4,
    SubBand5,
    SubBand6,
    SubBand7,
    SubBand8,
    SubBand9,
    SubBand10,
    SubBand11,
    SubBand12,
}

/// Older firmware reports "all sub-bands" as `00FF`. Accepted on decode only.
const LEGACY_ALL_MASK: &str = "00FF";

impl ChannelMask {
    /// All masks, `All` first, then sub-bands 1 through 12.
    pub const ALL: [ChannelMask; 13] = [
        ChannelMask::All,
        ChannelMask::SubBand1,
        ChannelMask::SubBand2,
        ChannelMask::SubBand3,
        ChannelMask::SubBand4,
        ChannelMask::SubBand5,
        ChannelMask::SubBand6,
        ChannelMask::SubBand7,
        ChannelMask::SubBand8,
        ChannelMask::SubBand9,
        ChannelMask::SubBand10,
        ChannelMask::SubBand11,
        ChannelMask::SubBand12,
    ];

    /// The 4-hex-digit wire bitmask.
    pub fn code(&self) -> &'static str {
        match self {
            ChannelMask::All => "0000",
            ChannelMask::SubBand1 => "0001",
            ChannelMask::SubBand2 => "0002",
            ChannelMask::SubBand3 => "0004",
            ChannelMask::SubBand4 => "0008",
            ChannelMask::SubBand5 => "0010",
            ChannelMask::SubBand6 => "0020",
            ChannelMask::SubBand7 => "0040",
            ChannelMask::SubBand8 => "0080",
            ChannelMask::SubBand9 => "0100",
            ChannelMask::SubBand10 => "0200",
            ChannelMask::SubBand11 => "0400",
            ChannelMask::SubBand12 => "0800",
        }
    }

    /// Decode a wire bitmask. Hex digits are matched case-insensitively.
    pub fn from_code(code: &str) -> Result<Self> {
        let upper = code.to_ascii_uppercase();
        if upper == LEGACY_ALL_MASK {
            return Ok(ChannelMask::All);
        }
        ChannelMask::ALL
            .iter()
            .copied()
            .find(|mask| mask.code() == upper)
            .ok_or_else(|| unknown("channel mask", code))
    }

    /// Sub-band number (1-12), or `None` for `All`.
    pub fn sub_band(&self) -> Option<u8> {
        ChannelMask::ALL
            .iter()
            .position(|mask| mask == self)
            .filter(|&idx| idx > 0)
            .map(|idx| idx as u8)
    }

    /// Mask for a sub-band number; `0` selects `All`.
    pub fn from_sub_band(n: u8) -> Result<Self> {
        ChannelMask::ALL
            .get(n as usize)
            .copied()
            .ok_or_else(|| Error::InvalidParameter(format!("sub-band {n} out of range 0-12")))
    }
}

impl fmt::Display for ChannelMask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.sub_band() {
            Some(n) => write!(f, "sub-band {n}"),
            None => f.write_str("all"),
        }
    }
}

impl FromStr for ChannelMask {
    type Err = Error;

    /// Accepts `all` or a sub-band number `1`-`12`.
    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        if s.eq_ignore_ascii_case("all") {
            return Ok(ChannelMask::All);
        }
        match s.parse::<u8>() {
            Ok(n) if (1..=12).contains(&n) => ChannelMask::from_sub_band(n),
            _ => Err(unknown_token("channel mask", s)),
        }
    }
}

// ---------------------------------------------------------------------------
// Join and work modes
// ---------------------------------------------------------------------------

/// Network join mode (`AT+NJM`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JoinMode {
    /// Activation by personalisation: session keys provisioned up front.
    Abp,
    /// Over-the-air activation.
    Otaa,
}

impl JoinMode {
    pub fn code(&self) -> &'static str {
        match self {
            JoinMode::Abp => "0",
            JoinMode::Otaa => "1",
        }
    }

    pub fn from_code(code: &str) -> Result<Self> {
        match code {
            "0" => Ok(JoinMode::Abp),
            "1" => Ok(JoinMode::Otaa),
            other => Err(unknown("join mode", other)),
        }
    }
}

impl fmt::Display for JoinMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JoinMode::Abp => f.write_str("ABP"),
            JoinMode::Otaa => f.write_str("OTAA"),
        }
    }
}

/// Radio work mode (`AT+NWM`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WorkMode {
    /// Raw LoRa point-to-point.
    P2p,
    /// LoRaWAN stack.
    LoRaWan,
}

impl WorkMode {
    pub fn code(&self) -> &'static str {
        match self {
            WorkMode::P2p => "0",
            WorkMode::LoRaWan => "1",
        }
    }

    pub fn from_code(code: &str) -> Result<Self> {
        match code {
            "0" => Ok(WorkMode::P2p),
            "1" => Ok(WorkMode::LoRaWan),
            other => Err(unknown("work mode", other)),
        }
    }
}

impl fmt::Display for WorkMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WorkMode::P2p => f.write_str("P2P"),
            WorkMode::LoRaWan => f.write_str("LoRaWAN"),
        }
    }
}

// ---------------------------------------------------------------------------
// Join configuration
// ---------------------------------------------------------------------------

/// Parameters of the `AT+JOIN=<join>:<auto>:<interval>:<attempts>` command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JoinConfig {
    /// Start a join now (`true`) or stop an ongoing one.
    pub join: bool,
    /// Join automatically on power-up.
    pub auto_join: bool,
    /// Seconds between join attempts (7-255).
    pub retry_interval_secs: u8,
    /// Number of attempts; `0` retries indefinitely.
    pub attempts: u8,
}

impl JoinConfig {
    /// Minimum retry interval accepted by the module.
    pub const MIN_RETRY_INTERVAL_SECS: u8 = 7;

    /// Check that the retry interval is within the module's accepted range.
    pub fn validate(&self) -> Result<()> {
        if self.retry_interval_secs < Self::MIN_RETRY_INTERVAL_SECS {
            return Err(Error::InvalidParameter(format!(
                "invalid retry interval: {}",
                self.retry_interval_secs
            )));
        }
        Ok(())
    }

    /// Colon-delimited parameter string (`1:0:8:0`).
    pub fn encode(&self) -> String {
        format!(
            "{}:{}:{}:{}",
            u8::from(self.join),
            u8::from(self.auto_join),
            self.retry_interval_secs,
            self.attempts
        )
    }
}

impl Default for JoinConfig {
    fn default() -> Self {
        JoinConfig {
            join: true,
            auto_join: false,
            retry_interval_secs: 8,
            attempts: 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn device_class_round_trip() {
        for class in DeviceClass::ALL {
            assert_eq!(DeviceClass::from_code(class.code()).unwrap(), class);
        }
    }

    #[test]
    fn device_class_unknown_code() {
        let err = DeviceClass::from_code("D").unwrap_err();
        assert!(matches!(err, Error::UnknownVariant { ref value, .. } if value == "D"));
    }

    #[test]
    fn device_class_parse_lowercase() {
        assert_eq!("c".parse::<DeviceClass>().unwrap(), DeviceClass::C);
        assert!("x".parse::<DeviceClass>().is_err());
    }

    #[test]
    fn region_band_codes_are_sequential() {
        for (i, band) in RegionBand::ALL.iter().enumerate() {
            assert_eq!(band.code(), i.to_string());
            assert_eq!(RegionBand::from_code(band.code()).unwrap(), *band);
        }
    }

    #[test]
    fn region_band_unknown_code() {
        assert!(matches!(
            RegionBand::from_code("13"),
            Err(Error::UnknownVariant { .. })
        ));
        assert!(RegionBand::from_code("").is_err());
    }

    #[test]
    fn region_band_names_round_trip() {
        for band in RegionBand::ALL {
            assert_eq!(band.to_string().parse::<RegionBand>().unwrap(), band);
        }
        assert_eq!("eu868".parse::<RegionBand>().unwrap(), RegionBand::EU868);
        assert_eq!("AS923_3".parse::<RegionBand>().unwrap(), RegionBand::AS923_3);
        assert!("EU999".parse::<RegionBand>().is_err());
    }

    #[test]
    fn channel_mask_codes() {
        assert_eq!(ChannelMask::All.code(), "0000");
        assert_eq!(ChannelMask::SubBand2.code(), "0002");
        assert_eq!(ChannelMask::SubBand5.code(), "0010");
        assert_eq!(ChannelMask::SubBand12.code(), "0800");
    }

    #[test]
    fn channel_mask_round_trip() {
        for mask in ChannelMask::ALL {
            assert_eq!(ChannelMask::from_code(mask.code()).unwrap(), mask);
        }
    }

    #[test]
    fn channel_mask_legacy_all_decodes() {
        assert_eq!(ChannelMask::from_code("00FF").unwrap(), ChannelMask::All);
        assert_eq!(ChannelMask::from_code("00ff").unwrap(), ChannelMask::All);
        // No mask encodes to the legacy code.
        assert!(ChannelMask::ALL.iter().all(|m| m.code() != "00FF"));
    }

    #[test]
    fn channel_mask_unknown_code() {
        assert!(matches!(
            ChannelMask::from_code("0003"),
            Err(Error::UnknownVariant { .. })
        ));
    }

    #[test]
    fn channel_mask_sub_band_numbers() {
        assert_eq!(ChannelMask::All.sub_band(), None);
        assert_eq!(ChannelMask::SubBand1.sub_band(), Some(1));
        assert_eq!(ChannelMask::SubBand12.sub_band(), Some(12));
        assert_eq!(ChannelMask::from_sub_band(0).unwrap(), ChannelMask::All);
        assert_eq!(ChannelMask::from_sub_band(9).unwrap(), ChannelMask::SubBand9);
        assert!(ChannelMask::from_sub_band(13).is_err());
    }

    #[test]
    fn channel_mask_parse() {
        assert_eq!("all".parse::<ChannelMask>().unwrap(), ChannelMask::All);
        assert_eq!("2".parse::<ChannelMask>().unwrap(), ChannelMask::SubBand2);
        assert!("0".parse::<ChannelMask>().is_err());
        assert!("13".parse::<ChannelMask>().is_err());
        assert_eq!(ChannelMask::SubBand2.to_string(), "sub-band 2");
    }

    #[test]
    fn join_and_work_modes() {
        assert_eq!(JoinMode::from_code("1").unwrap(), JoinMode::Otaa);
        assert_eq!(JoinMode::Abp.code(), "0");
        assert!(JoinMode::from_code("2").is_err());
        assert_eq!(WorkMode::from_code("0").unwrap(), WorkMode::P2p);
        assert_eq!(WorkMode::LoRaWan.code(), "1");
        assert_eq!(WorkMode::LoRaWan.to_string(), "LoRaWAN");
    }

    #[test]
    fn join_config_encode() {
        let config = JoinConfig {
            join: true,
            auto_join: false,
            retry_interval_secs: 10,
            attempts: 5,
        };
        assert_eq!(config.encode(), "1:0:10:5");
        assert!(config.validate().is_ok());
        assert_eq!(JoinConfig::default().encode(), "1:0:8:0");
    }

    #[test]
    fn join_config_rejects_short_interval() {
        let config = JoinConfig {
            retry_interval_secs: 6,
            ..JoinConfig::default()
        };
        assert!(matches!(config.validate(), Err(Error::InvalidParameter(_))));
    }
}
