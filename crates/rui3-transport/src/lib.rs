//! Transport implementations for the RUI3 driver.
//!
//! Provides [`SerialTransport`], the [`Transport`](rui3_core::Transport)
//! implementation for the module's UART / USB virtual COM port.

pub mod serial;

pub use serial::{
    DEFAULT_BAUD_RATE, SerialConfig, SerialTransport,
};
