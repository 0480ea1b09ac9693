//! MSAgent Bridge Core - event formatting and IPC with the MSAgent-AI assistant.
//!
//! This crate turns game events into commands of the assistant's line
//! protocol and delivers them over the assistant's local IPC channel. It has
//! no HTTP dependency; the `msagent-bridge-http` crate exposes it over HTTP.
//!
//! # Example
//!
//! ```rust,ignore
//! use msagent_bridge_core::{format_command, EventKind, IpcClient, IpcConfig};
//! use serde_json::json;
//!
//! #[tokio::main]
//! async fn main() {
//!     let client = IpcClient::new(IpcConfig::default());
//!
//!     let command = format_command(EventKind::Scratch, &json!({"vehicle_name": "Covet"}));
//!     let reply = client.send(&command).await;
//!     println!("Assistant replied: {}", reply);
//! }
//! ```

pub mod command;
pub mod config;
pub mod error;
pub mod events;
pub mod ipc;

// Re-export commonly used types
pub use command::{Command, Verb};
pub use config::{IpcConfig, ProtocolConfig, ServerConfig, TimeoutConfig};
pub use error::{BridgeError, Result};
pub use events::{format_command, EventKind};
pub use ipc::{IpcClient, MockPeer, PeerDispatch, PeerEndpoint, PeerServer, PeerServerHandle};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
