//! Local IPC with the assistant process.
//!
//! The assistant speaks a newline-delimited UTF-8 line protocol over a named
//! local channel: one command in, one reply out, one connection per exchange.
//!
//! # Architecture
//!
//! - **Endpoint**: resolves the rendezvous name to a pipe, socket or TCP address
//! - **Client**: performs the bounded round trip and folds failures into `ERROR:` lines
//! - **Server**: a listener speaking the peer side, for mock mode and tests
//! - **Protocol**: framing shared by both sides

pub mod client;
pub mod endpoint;
pub mod protocol;
pub mod server;

pub use client::IpcClient;
pub use endpoint::{PeerEndpoint, PeerListener, PeerStream};
pub use server::{MockPeer, PeerDispatch, PeerServer, PeerServerHandle};
