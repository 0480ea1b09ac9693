//! Centralized configuration for the MSAgent bridge.
//!
//! Protocol constants live on unit structs; runtime knobs that the binary
//! exposes as flags live on [`IpcConfig`].

use crate::ipc::PeerEndpoint;
use std::time::Duration;

/// Line protocol constants shared with the assistant process.
pub struct ProtocolConfig;

impl ProtocolConfig {
    /// Rendezvous name both processes agree on.
    pub const RENDEZVOUS_NAME: &'static str = "MSAgentAI";
    /// Human-readable peer name used in sentinel messages.
    pub const PEER_LABEL: &'static str = "MSAgent-AI";
    /// Maximum bytes read for a single response.
    pub const MAX_RESPONSE_BYTES: usize = 1024;
    pub const FRAME_TERMINATOR: u8 = b'\n';
    pub const ERROR_PREFIX: &'static str = "ERROR:";
    pub const OK_PREFIX: &'static str = "OK:";
    pub const PONG: &'static str = "PONG";
    /// Windows named pipe namespace.
    pub const PIPE_PREFIX: &'static str = r"\\.\pipe\";
    /// Scheme selecting a TCP endpoint instead of a named channel.
    pub const TCP_SCHEME: &'static str = "tcp:";
    pub const SOCKET_EXTENSION: &'static str = "sock";
}

/// HTTP listener defaults.
pub struct ServerConfig;

impl ServerConfig {
    pub const DEFAULT_PORT: u16 = 5000;
    pub const DEFAULT_HOST: &'static str = "0.0.0.0";
    /// Line printed to stdout announcing the bound port.
    pub const PORT_ANNOUNCE_PREFIX: &'static str = "BRIDGE_PORT=";
}

/// Timeouts for one IPC round trip.
pub struct TimeoutConfig;

impl TimeoutConfig {
    pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);
    pub const RESPONSE_TIMEOUT: Duration = Duration::from_secs(30);
    /// Delay between attempts while a Windows pipe reports busy.
    pub const PIPE_BUSY_RETRY: Duration = Duration::from_millis(50);
}

/// Runtime configuration for the IPC client.
#[derive(Debug, Clone)]
pub struct IpcConfig {
    pub endpoint: PeerEndpoint,
    /// Name used in `Could not connect to ...` messages.
    pub peer_label: String,
    pub connect_timeout: Duration,
    pub response_timeout: Duration,
    pub max_response_bytes: usize,
}

impl Default for IpcConfig {
    fn default() -> Self {
        Self {
            endpoint: PeerEndpoint::default(),
            peer_label: ProtocolConfig::PEER_LABEL.to_string(),
            connect_timeout: TimeoutConfig::CONNECT_TIMEOUT,
            response_timeout: TimeoutConfig::RESPONSE_TIMEOUT,
            max_response_bytes: ProtocolConfig::MAX_RESPONSE_BYTES,
        }
    }
}

impl IpcConfig {
    /// Configuration for a specific endpoint with default timeouts.
    pub fn for_endpoint(endpoint: PeerEndpoint) -> Self {
        Self {
            endpoint,
            ..Self::default()
        }
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn with_response_timeout(mut self, timeout: Duration) -> Self {
        self.response_timeout = timeout;
        self
    }
}
