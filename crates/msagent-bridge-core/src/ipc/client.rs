//! IPC client for the assistant process.
//!
//! Every call opens a fresh connection, writes one command line, performs one
//! bounded read, and closes the connection. Nothing is shared between calls,
//! so the client is safe to use from any number of tasks without locking.

use super::endpoint::PeerEndpoint;
use super::protocol::{read_response, write_command};
use crate::command::Command;
use crate::config::{IpcConfig, ProtocolConfig};
use crate::{BridgeError, Result};
use tokio::io::AsyncWriteExt;
use tracing::{debug, error, info, info_span, Instrument, Span};

/// Client for the assistant's line protocol.
#[derive(Debug, Clone)]
pub struct IpcClient {
    config: IpcConfig,
    span: Span,
}

impl IpcClient {
    /// Create a client that logs under its own `peer` span.
    pub fn new(config: IpcConfig) -> Self {
        let span = info_span!("peer", endpoint = %config.endpoint);
        Self { config, span }
    }

    /// Record all round trips inside the given span instead.
    pub fn with_span(mut self, span: Span) -> Self {
        self.span = span;
        self
    }

    pub fn config(&self) -> &IpcConfig {
        &self.config
    }

    pub fn endpoint(&self) -> &PeerEndpoint {
        &self.config.endpoint
    }

    /// Send a command and return the peer's reply.
    ///
    /// Failures never surface as `Err`: they become `ERROR:`-prefixed lines,
    /// so an absent peer is an ordinary outcome for callers.
    pub async fn send(&self, command: &Command) -> String {
        match self.try_send(command).await {
            Ok(response) => response,
            Err(e) => e.to_sentinel(),
        }
    }

    /// Send a command, keeping the failure typed.
    pub async fn try_send(&self, command: &Command) -> Result<String> {
        let result = self.round_trip(command).instrument(self.span.clone()).await;

        let span = &self.span;
        match &result {
            Ok(response) => info!(parent: span, "Sent: {}, Received: {}", command, response),
            Err(e) if e.is_unreachable() => {
                error!(parent: span, "Peer connection error sending {}: {:?}", command.verb(), e)
            }
            Err(e) => error!(parent: span, "Error sending {} to peer: {}", command.verb(), e),
        }
        result
    }

    /// Send `PING` and report whether the peer answered `PONG`.
    pub async fn ping(&self) -> (bool, String) {
        let response = self.send(&Command::ping()).await;
        let connected = response.contains(ProtocolConfig::PONG);
        (connected, response)
    }

    async fn round_trip(&self, command: &Command) -> Result<String> {
        let peer = &self.config.peer_label;

        let mut stream = tokio::time::timeout(
            self.config.connect_timeout,
            self.config.endpoint.connect(),
        )
        .await
        .map_err(|_| {
            BridgeError::unreachable(
                peer.clone(),
                format!("connect timed out after {:?}", self.config.connect_timeout),
            )
        })?
        .map_err(|e| BridgeError::unreachable(peer.clone(), e))?;

        debug!("Connected to {}", self.config.endpoint);

        write_command(&mut stream, command).await?;

        let response = tokio::time::timeout(
            self.config.response_timeout,
            read_response(&mut stream, self.config.max_response_bytes),
        )
        .await
        .map_err(|_| BridgeError::ResponseTimeout {
            peer: peer.clone(),
            timeout: self.config.response_timeout,
        })??;

        if let Err(e) = stream.shutdown().await {
            debug!("Peer connection close: {}", e);
        }

        Ok(response)
    }
}
