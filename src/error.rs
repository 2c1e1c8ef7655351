use bytes::Bytes;
use thiserror::Error;

/// Errors that can occur when driving a hub through its REPL
#[derive(Error, Debug)]
pub enum HubError {
    /// Serial port related errors
    #[error("Serial port error: {0}")]
    Serial(#[from] tokio_serial::Error),

    /// No hub found during port discovery
    #[error("Hub not found on any serial port")]
    DeviceNotFound,

    /// Opening the connection or entering the raw REPL failed
    #[error("Failed to connect to hub: {0}")]
    ConnectionFailed(String),

    /// The connection was closed, by us or by the hub
    #[error("Hub disconnected")]
    Disconnected,

    /// Waiting for the hub timed out
    #[error("Timed out after {timeout_ms}ms waiting for {waiting_for}")]
    Timeout {
        /// Timeout duration in milliseconds
        timeout_ms: u64,
        /// What the transport was waiting for
        waiting_for: String,
    },

    /// The remote interpreter raised, or its reply is not a literal
    #[error("Remote evaluation failed: {reason}")]
    RemoteEvaluation {
        /// Traceback or parse failure description
        reason: String,
        /// Raw reply bytes as printed by the hub
        reply: Bytes,
    },

    /// A reply decoded fine but has the wrong shape for the operation
    #[error("Unexpected reply: expected {expected}, got {found}")]
    UnexpectedReply {
        /// Expected value shape
        expected: &'static str,
        /// Rendered value actually received
        found: String,
    },

    /// An argument cannot be expressed in the remote language
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// The hub answered outside of the REPL protocol
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// The pair name for these ports is already bound to a live pair
    #[error("Pair name {name} is already in use")]
    PairNameInUse {
        /// Bound variable name that collided
        name: String,
    },

    /// The motor pair was unpaired and can no longer be used
    #[error("Motor pair {name} has been unpaired")]
    PairReleased {
        /// Bound variable name of the released pair
        name: String,
    },

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for hub operations
pub type Result<T> = std::result::Result<T, HubError>;

impl HubError {
    /// Build a [`HubError::RemoteEvaluation`] from a reason and the raw reply
    pub fn remote(reason: impl Into<String>, reply: impl Into<Bytes>) -> Self {
        Self::RemoteEvaluation {
            reason: reason.into(),
            reply: reply.into(),
        }
    }

    /// Check if this error indicates the connection is unusable
    #[must_use]
    pub const fn is_connection_error(&self) -> bool {
        matches!(
            self,
            Self::Serial(_)
                | Self::ConnectionFailed(_)
                | Self::Disconnected
                | Self::DeviceNotFound
                | Self::Timeout { .. }
                | Self::Io(_)
        )
    }

    /// Check if this error was raised by the hub's own interpreter
    #[must_use]
    pub const fn is_remote_error(&self) -> bool {
        matches!(self, Self::RemoteEvaluation { .. })
    }

    /// Raw reply attached to a remote evaluation failure
    #[must_use]
    pub const fn reply(&self) -> Option<&Bytes> {
        match self {
            Self::RemoteEvaluation { reply, .. } => Some(reply),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_classification() {
        let connection_error = HubError::ConnectionFailed("test".to_string());
        assert!(connection_error.is_connection_error());
        assert!(!connection_error.is_remote_error());

        let timeout_error = HubError::Timeout {
            timeout_ms: 5000,
            waiting_for: "prompt".to_string(),
        };
        assert!(timeout_error.is_connection_error());

        let remote_error = HubError::remote("ValueError", &b"Traceback"[..]);
        assert!(!remote_error.is_connection_error());
        assert!(remote_error.is_remote_error());
        assert_eq!(remote_error.reply().map(|b| &b[..]), Some(&b"Traceback"[..]));

        let pair_error = HubError::PairNameInUse {
            name: "pairAB".to_string(),
        };
        assert!(!pair_error.is_connection_error());
        assert!(pair_error.reply().is_none());
    }

    #[test]
    fn test_error_display() {
        let error = HubError::InvalidArgument("bad keyword name".to_string());
        let error_string = format!("{error}");
        assert!(error_string.contains("Invalid argument"));
        assert!(error_string.contains("bad keyword name"));

        let error = HubError::PairReleased {
            name: "pairCD".to_string(),
        };
        assert_eq!(error.to_string(), "Motor pair pairCD has been unpaired");
    }
}
