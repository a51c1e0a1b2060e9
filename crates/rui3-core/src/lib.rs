//! rui3-core: Core traits, types, and error definitions for the RUI3 driver.
//!
//! This crate holds the pieces shared by every layer of the workspace: the
//! byte-level [`Transport`] the protocol engine runs on, the typed settings
//! exchanged with the module, and the common [`Error`] type.
//!
//! # Key types
//!
//! - [`Transport`] -- byte-level communication channel
//! - [`RegionBand`], [`ChannelMask`], [`DeviceClass`] -- enumerated settings
//! - [`Error`] / [`Result`] -- error handling

pub mod error;
pub mod transport;
pub mod types;

pub use error::{Error, Result};
pub use transport::Transport;
pub use types::*;
