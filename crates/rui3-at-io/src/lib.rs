//! AT protocol engine for RAKwireless RUI3 modules.
//!
//! This crate turns a byte-level [`Transport`](rui3_core::Transport) into a
//! command/response channel: each command is written with a CRLF terminator
//! against a cleared input buffer, and the reply is framed into lines and
//! classified until it completes, fails, goes quiet, or runs out of time.
//!
//! # Architecture
//!
//! - [`protocol`] -- wire grammar: encoding, line assembly, line markers
//! - [`io`] -- the [`AtIo`](io::AtIo) engine and its response framer

pub mod io;
pub mod protocol;

pub use io::{AtIo, DEFAULT_POLL_INTERVAL, MIN_POLL_INTERVAL};
