//! Error types for the RUI3 driver.
//!
//! All fallible operations across the workspace return [`Result<T>`], which
//! uses [`Error`] as the error type. Transport-layer, protocol-layer, and
//! codec-layer errors are all captured here.

/// The error type for all RUI3 operations.
///
/// Variants fall into three groups:
///
/// - transport failures ([`Transport`](Error::Transport), [`Io`](Error::Io),
///   [`ConnectionLost`](Error::ConnectionLost), [`NotConnected`](Error::NotConnected)),
///   fatal to the current call;
/// - protocol outcomes ([`Timeout`](Error::Timeout), [`Device`](Error::Device)),
///   produced by the response framer;
/// - codec failures ([`MissingField`](Error::MissingField),
///   [`UnknownVariant`](Error::UnknownVariant),
///   [`NotAcknowledged`](Error::NotAcknowledged),
///   [`InvalidParameter`](Error::InvalidParameter)), produced while encoding
///   arguments or decoding an otherwise successful response.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A transport-level error (opening or configuring the serial port).
    #[error("transport error: {0}")]
    Transport(String),

    /// No terminal line arrived before the deadline.
    ///
    /// This typically indicates the module is unpowered, the baud rate is
    /// wrong, or nothing is attached to the port.
    #[error("timeout waiting for response")]
    Timeout,

    /// The module explicitly rejected or failed the command.
    ///
    /// `line` is the offending line (e.g. `AT_PARAM_ERROR`); `response` is
    /// the full text accumulated up to and including it.
    #[error("device error: {line}")]
    Device {
        /// The line that matched an error marker.
        line: String,
        /// Every line received for the command, newline-separated.
        response: String,
    },

    /// The response completed but did not carry the expected echoed value.
    #[error("{field} not found in response: {response:?}")]
    MissingField {
        /// Command prefix whose echoed value was expected (e.g. `AT+BAND`).
        field: String,
        /// The full response text.
        response: String,
    },

    /// The echoed value does not map to a known enumerated code.
    #[error("unknown {field} value: {value:?}")]
    UnknownVariant {
        /// Name of the enumerated field (e.g. `region band`).
        field: String,
        /// The raw code the module returned.
        value: String,
    },

    /// A setting or action completed without an `OK` or completion event.
    ///
    /// The response went quiet with content but no acknowledgement, so the
    /// module cannot be assumed to have applied the command.
    #[error("{command} not acknowledged: {response:?}")]
    NotAcknowledged {
        /// The command as sent, without terminator.
        command: String,
        /// The full response text.
        response: String,
    },

    /// An invalid argument was passed to a command builder.
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    /// The transport has been closed or was never opened.
    #[error("not connected")]
    NotConnected,

    /// The connection to the module was lost unexpectedly.
    #[error("connection lost")]
    ConnectionLost,

    /// An underlying I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Returns `true` for failures of the underlying link rather than of the
    /// protocol exchange or the codec.
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            Error::Transport(_) | Error::Io(_) | Error::ConnectionLost | Error::NotConnected
        )
    }

    /// The offending device line, if this is a [`Device`](Error::Device) error.
    pub fn device_line(&self) -> Option<&str> {
        match self {
            Error::Device { line, .. } => Some(line),
            _ => None,
        }
    }
}

/// A convenience `Result` alias using [`Error`] as the error type.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_transport() {
        let e = Error::Transport("port busy".into());
        assert_eq!(e.to_string(), "transport error: port busy");
    }

    #[test]
    fn error_display_timeout() {
        assert_eq!(Error::Timeout.to_string(), "timeout waiting for response");
    }

    #[test]
    fn error_display_device() {
        let e = Error::Device {
            line: "AT_NO_NETWORK_JOINED".into(),
            response: "AT_NO_NETWORK_JOINED\n".into(),
        };
        assert_eq!(e.to_string(), "device error: AT_NO_NETWORK_JOINED");
        assert_eq!(e.device_line(), Some("AT_NO_NETWORK_JOINED"));
    }

    #[test]
    fn error_display_missing_field() {
        let e = Error::MissingField {
            field: "AT+DEVEUI".into(),
            response: "OK\n".into(),
        };
        assert_eq!(e.to_string(), "AT+DEVEUI not found in response: \"OK\\n\"");
    }

    #[test]
    fn error_display_unknown_variant() {
        let e = Error::UnknownVariant {
            field: "region band".into(),
            value: "42".into(),
        };
        assert_eq!(e.to_string(), "unknown region band value: \"42\"");
    }

    #[test]
    fn error_display_not_acknowledged() {
        let e = Error::NotAcknowledged {
            command: "AT+CLASS=C".into(),
            response: "AT+CLASS=A\n".into(),
        };
        assert_eq!(e.to_string(), "AT+CLASS=C not acknowledged: \"AT+CLASS=A\\n\"");
        assert!(!e.is_transport());
    }

    #[test]
    fn error_display_invalid_parameter() {
        let e = Error::InvalidParameter("port out of range".into());
        assert_eq!(e.to_string(), "invalid parameter: port out of range");
    }

    #[test]
    fn error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::BrokenPipe, "pipe broken");
        let e: Error = io_err.into();
        assert!(matches!(e, Error::Io(_)));
        assert!(e.to_string().contains("pipe broken"));
        assert!(e.is_transport());
    }

    #[test]
    fn protocol_errors_are_not_transport() {
        assert!(!Error::Timeout.is_transport());
        assert!(Error::Timeout.device_line().is_none());
        assert!(Error::NotConnected.is_transport());
        assert!(Error::ConnectionLost.is_transport());
    }

    #[test]
    fn error_is_send_sync() {
        fn assert_send<T: Send>() {}
        fn assert_sync<T: Sync>() {}
        assert_send::<Error>();
        assert_sync::<Error>();
    }
}
