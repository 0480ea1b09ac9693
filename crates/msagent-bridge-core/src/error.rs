//! Error types for the MSAgent bridge.
//!
//! IPC failures are representable outcomes, not crashes: every variant can be
//! folded into the `ERROR:`-prefixed sentinel line the HTTP layer reports.

use std::time::Duration;
use thiserror::Error;

/// Main error type for the bridge core.
#[derive(Debug, Error)]
pub enum BridgeError {
    // Connection errors
    #[error("Could not connect to {peer}. Is it running?")]
    PeerUnreachable {
        peer: String,
        /// Underlying refusal or timeout description
        cause: Option<String>,
    },

    #[error("No response from {peer} within {timeout:?}")]
    ResponseTimeout { peer: String, timeout: Duration },

    // Protocol errors
    #[error("Invalid response encoding: {message}")]
    ProtocolDecode { message: String },

    #[error("Invalid command: {message}")]
    InvalidCommand { message: String },

    // IO errors
    #[error("IO error: {message}")]
    Io {
        message: String,
        #[source]
        source: Option<std::io::Error>,
    },

    // Configuration errors
    #[error("Configuration error: {message}")]
    Config { message: String },
}

/// Result type alias for bridge operations.
pub type Result<T> = std::result::Result<T, BridgeError>;

impl From<std::io::Error> for BridgeError {
    fn from(err: std::io::Error) -> Self {
        BridgeError::Io {
            message: err.to_string(),
            source: Some(err),
        }
    }
}

impl BridgeError {
    /// Create a `PeerUnreachable` error with a cause description.
    pub fn unreachable(peer: impl Into<String>, cause: impl ToString) -> Self {
        BridgeError::PeerUnreachable {
            peer: peer.into(),
            cause: Some(cause.to_string()),
        }
    }

    /// Render the error as the single-line sentinel response.
    ///
    /// Callers detect peer failures by matching the `ERROR:` prefix.
    pub fn to_sentinel(&self) -> String {
        let line = format!("{}{}", crate::config::ProtocolConfig::ERROR_PREFIX, self);
        line.replace(['\r', '\n'], " ")
    }

    /// Whether the peer was never reached (as opposed to failing mid-exchange).
    pub fn is_unreachable(&self) -> bool {
        matches!(self, BridgeError::PeerUnreachable { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unreachable_sentinel() {
        let err = BridgeError::unreachable("MSAgent-AI", "connection refused");
        assert_eq!(
            err.to_sentinel(),
            "ERROR:Could not connect to MSAgent-AI. Is it running?"
        );
        assert!(err.is_unreachable());
    }

    #[test]
    fn test_io_sentinel_keeps_message() {
        let err: BridgeError =
            std::io::Error::new(std::io::ErrorKind::BrokenPipe, "pipe closed").into();
        assert_eq!(err.to_sentinel(), "ERROR:IO error: pipe closed");
        assert!(!err.is_unreachable());
    }

    #[test]
    fn test_sentinel_is_single_line() {
        let err = BridgeError::ProtocolDecode {
            message: "bad\nbytes".into(),
        };
        assert!(!err.to_sentinel().contains('\n'));
    }
}
