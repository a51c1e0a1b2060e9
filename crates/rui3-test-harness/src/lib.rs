//! rui3-test-harness: Test utilities for the RUI3 driver.
//!
//! This crate provides [`MockTransport`] for deterministic unit testing of
//! the AT protocol engine and the typed driver without real hardware.

pub mod mock_serial;

pub use mock_serial::{MockTransport, Reply};
