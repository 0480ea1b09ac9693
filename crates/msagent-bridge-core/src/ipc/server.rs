//! Line-protocol listener that stands in for the assistant process.
//!
//! Accepts connections on a [`PeerEndpoint`], reads one command line per
//! connection, answers it through a [`PeerDispatch`] and closes. Used by the
//! `mock-peer` mode of the bridge binary and by tests.
//!
//! # Thread Safety
//!
//! Each connection is handled in its own spawned task. Dispatchers are shared
//! via `Arc` and must do their own synchronization.

use super::endpoint::{PeerEndpoint, PeerListener, PeerStream};
use super::protocol::{read_command_line, write_response};
use crate::command::{Command, Verb};
use crate::config::ProtocolConfig;
use crate::Result;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::io::BufReader;
use tokio::sync::{oneshot, watch, Mutex};
use tracing::{debug, error, info, warn};

/// Upper bound on simultaneously served connections.
pub const MAX_PEER_CONNECTIONS: usize = 64;

/// Longest command line the listener accepts.
pub const MAX_COMMAND_BYTES: usize = 64 * 1024;

/// Handle to a running peer server. Dropping shuts it down.
pub struct PeerServerHandle {
    endpoint: PeerEndpoint,
    shutdown_tx: Option<oneshot::Sender<()>>,
    conn_shutdown_tx: watch::Sender<bool>,
    task_handle: Option<tokio::task::JoinHandle<()>>,
}

impl PeerServerHandle {
    /// The endpoint clients should connect to.
    pub fn endpoint(&self) -> &PeerEndpoint {
        &self.endpoint
    }

    /// Stop accepting connections and close the active ones.
    pub fn shutdown(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        let _ = self.conn_shutdown_tx.send(true);
    }

    /// Wait until the accept loop has exited.
    pub async fn join(mut self) {
        if let Some(handle) = self.task_handle.take() {
            let _ = handle.await;
        }
    }
}

impl Drop for PeerServerHandle {
    fn drop(&mut self) {
        self.shutdown();
        if let Some(handle) = self.task_handle.take() {
            handle.abort();
        }
    }
}

/// Produces the reply line for one received command line.
#[async_trait::async_trait]
pub trait PeerDispatch: Send + Sync + 'static {
    async fn dispatch(&self, line: &str) -> String;
}

/// Peer server that answers the line protocol.
pub struct PeerServer;

impl PeerServer {
    /// Bind `endpoint` and serve in background tasks.
    pub async fn start<D: PeerDispatch>(
        endpoint: &PeerEndpoint,
        dispatch: Arc<D>,
    ) -> Result<PeerServerHandle> {
        let listener = endpoint.bind().await?;
        let endpoint = listener.endpoint().clone();

        info!("Peer server listening on {}", endpoint);

        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        let (conn_shutdown_tx, conn_shutdown_rx) = watch::channel(false);
        let active_connections = Arc::new(AtomicUsize::new(0));

        let task_handle = tokio::spawn(Self::accept_loop(
            listener,
            dispatch,
            shutdown_rx,
            conn_shutdown_rx,
            active_connections,
        ));

        Ok(PeerServerHandle {
            endpoint,
            shutdown_tx: Some(shutdown_tx),
            conn_shutdown_tx,
            task_handle: Some(task_handle),
        })
    }

    async fn accept_loop<D: PeerDispatch>(
        mut listener: PeerListener,
        dispatch: Arc<D>,
        mut shutdown_rx: oneshot::Receiver<()>,
        conn_shutdown_rx: watch::Receiver<bool>,
        active_connections: Arc<AtomicUsize>,
    ) {
        loop {
            tokio::select! {
                _ = &mut shutdown_rx => {
                    info!("Peer server shutting down");
                    break;
                }
                accept_result = listener.accept() => {
                    match accept_result {
                        Ok(stream) => {
                            if !try_reserve_slot(&active_connections, MAX_PEER_CONNECTIONS) {
                                warn!(
                                    "Rejecting peer connection: at max capacity ({})",
                                    MAX_PEER_CONNECTIONS
                                );
                                continue;
                            }

                            let dispatch = dispatch.clone();
                            let conns = active_connections.clone();
                            let mut conn_shutdown = conn_shutdown_rx.clone();

                            tokio::spawn(async move {
                                if let Err(e) = Self::handle_connection(stream, &*dispatch, &mut conn_shutdown).await {
                                    debug!("Peer connection ended: {}", e);
                                }
                                conns.fetch_sub(1, Ordering::AcqRel);
                            });
                        }
                        Err(e) => {
                            error!("Peer accept error: {}", e);
                        }
                    }
                }
            }
        }
    }

    async fn handle_connection<D: PeerDispatch>(
        stream: Box<dyn PeerStream>,
        dispatch: &D,
        shutdown_rx: &mut watch::Receiver<bool>,
    ) -> Result<()> {
        let mut reader = BufReader::new(stream);

        let line = tokio::select! {
            result = read_command_line(&mut reader, MAX_COMMAND_BYTES) => {
                match result? {
                    Some(line) => line,
                    None => return Ok(()),
                }
            }
            _ = shutdown_rx.changed() => {
                return Ok(());
            }
        };

        let response = dispatch.dispatch(&line).await;
        debug!("Peer received {:?}, replying {:?}", line, response);
        write_response(reader.get_mut(), &response).await
    }
}

/// Dispatcher that imitates the assistant: answers every documented verb
/// and records what it received.
#[derive(Debug, Default)]
pub struct MockPeer {
    version: String,
    received: Mutex<Vec<String>>,
}

impl MockPeer {
    pub fn new(version: impl Into<String>) -> Self {
        Self {
            version: version.into(),
            received: Mutex::new(Vec::new()),
        }
    }

    /// Every command line received so far, in arrival order.
    pub async fn received(&self) -> Vec<String> {
        self.received.lock().await.clone()
    }

    /// Reply for a line, without recording it.
    pub fn reply_for(&self, line: &str) -> String {
        match line.parse::<Command>() {
            Ok(command) => match command.verb() {
                Verb::Ping => ProtocolConfig::PONG.to_string(),
                Verb::Version => format!("MSAgent-AI mock {}", self.version),
                verb => format!("{}MOCK {}", ProtocolConfig::OK_PREFIX, verb),
            },
            Err(e) => format!("{}{}", ProtocolConfig::ERROR_PREFIX, e),
        }
    }
}

#[async_trait::async_trait]
impl PeerDispatch for MockPeer {
    async fn dispatch(&self, line: &str) -> String {
        info!("[MOCK] Received: {}", line);
        self.received.lock().await.push(line.to_string());
        self.reply_for(line)
    }
}

/// Take one connection slot if fewer than `max` are in use.
fn try_reserve_slot(active: &AtomicUsize, max: usize) -> bool {
    active
        .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| (n < max).then_some(n + 1))
        .is_ok()
}

#[cfg(test)]
mod tests {
    #[test]
    fn test_slot_reservation_respects_cap() {
        let active = AtomicUsize::new(0);
        assert!(try_reserve_slot(&active, 2));
        assert!(try_reserve_slot(&active, 2));
        assert!(!try_reserve_slot(&active, 2));
        assert_eq!(active.load(Ordering::Acquire), 2);

        active.fetch_sub(1, Ordering::AcqRel);
        assert!(try_reserve_slot(&active, 2));
    }

    #[tokio::test]
    async fn test_concurrent_reservations_never_exceed_cap() {
        let active = Arc::new(AtomicUsize::new(0));
        let mut tasks = Vec::new();
        for _ in 0..32 {
            let active = active.clone();
            tasks.push(tokio::spawn(async move { try_reserve_slot(&active, 8) }));
        }
        let mut granted = 0;
        for task in tasks {
            if task.await.unwrap() {
                granted += 1;
            }
        }
        assert_eq!(granted, 8);
        assert_eq!(active.load(Ordering::Acquire), 8);
    }

    use super::*;
    use crate::ipc::IpcClient;
    use crate::IpcConfig;

    async fn start_mock() -> (PeerServerHandle, Arc<MockPeer>) {
        let mock = Arc::new(MockPeer::new("test"));
        let endpoint: PeerEndpoint = "tcp:127.0.0.1:0".parse().unwrap();
        let handle = PeerServer::start(&endpoint, mock.clone()).await.unwrap();
        (handle, mock)
    }

    #[tokio::test]
    async fn test_server_start_and_shutdown() {
        let (mut handle, _mock) = start_mock().await;
        match handle.endpoint() {
            PeerEndpoint::Tcp(addr) => assert!(addr.port() > 0),
            other => panic!("Expected TCP endpoint, got {:?}", other),
        }
        handle.shutdown();
    }

    #[tokio::test]
    async fn test_mock_answers_protocol() {
        let (mut handle, mock) = start_mock().await;
        let client = IpcClient::new(IpcConfig::for_endpoint(handle.endpoint().clone()));

        assert_eq!(client.send(&Command::ping()).await, "PONG");
        assert_eq!(client.send(&Command::version()).await, "MSAgent-AI mock test");
        assert_eq!(
            client.send(&Command::animation("Wave")).await,
            "OK:MOCK ANIMATION"
        );
        assert_eq!(
            mock.received().await,
            vec!["PING", "VERSION", "ANIMATION:Wave"]
        );

        handle.shutdown();
    }

    #[test]
    fn test_mock_rejects_unknown_verb() {
        let mock = MockPeer::new("test");
        assert!(mock.reply_for("DANCE").starts_with("ERROR:"));
        assert_eq!(mock.reply_for("SHOW"), "OK:MOCK SHOW");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_serves_named_socket() {
        let dir = tempfile::tempdir().unwrap();
        let endpoint = PeerEndpoint::Named(
            dir.path().join("peer.sock").to_string_lossy().into_owned(),
        );
        let mock = Arc::new(MockPeer::new("test"));
        let mut handle = PeerServer::start(&endpoint, mock).await.unwrap();

        let client = IpcClient::new(IpcConfig::for_endpoint(endpoint));
        assert!(client.ping().await.0);

        handle.shutdown();
    }

    #[tokio::test]
    async fn test_client_sees_shutdown() {
        let (mut handle, _mock) = start_mock().await;
        let client = IpcClient::new(IpcConfig::for_endpoint(handle.endpoint().clone()));
        assert!(client.ping().await.0);

        handle.shutdown();

        let mut detected_shutdown = false;
        for _ in 0..20 {
            tokio::time::sleep(std::time::Duration::from_millis(50)).await;
            if !client.ping().await.0 {
                detected_shutdown = true;
                break;
            }
        }
        assert!(detected_shutdown, "Client should detect server shutdown");
    }
}
