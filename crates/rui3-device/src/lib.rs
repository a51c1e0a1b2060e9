//! rui3-device: Typed driver for RAKwireless RUI3 LoRaWAN modules.
//!
//! Wraps the AT protocol engine from `rui3-at-io` in a [`Rui3Device`] with
//! one async method per module setting or action: identity queries, keys,
//! join control, LoRaWAN radio settings, uplinks, and LoRa P2P.
//!
//! # Quick start
//!
//! ```no_run
//! use rui3_device::Rui3Builder;
//! use rui3_core::RegionBand;
//!
//! # async fn example() -> rui3_core::Result<()> {
//! let device = Rui3Builder::new().serial_port("/dev/ttyUSB0").build().await?;
//! device.set_region_band(RegionBand::EU868).await?;
//! device.join_network().await?;
//! # Ok(())
//! # }
//! ```

pub mod builder;
pub mod commands;
pub mod device;

pub use builder::Rui3Builder;
pub use device::Rui3Device;
