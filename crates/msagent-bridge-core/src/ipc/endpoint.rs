//! Rendezvous endpoints for the assistant's IPC channel.
//!
//! A named endpoint maps to the platform's local duplex channel: a named pipe
//! (`\\.\pipe\<name>`) on Windows, a Unix domain socket elsewhere. A `tcp:`
//! endpoint talks to a peer over loopback TCP instead.

use crate::config::{ProtocolConfig, TimeoutConfig};
use crate::{BridgeError, Result};
use std::fmt;
use std::io;
use std::net::SocketAddr;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::{TcpListener, TcpStream};
use tracing::{debug, warn};

#[cfg(unix)]
use std::os::unix::fs::FileTypeExt;
#[cfg(unix)]
use std::path::PathBuf;
#[cfg(unix)]
use tokio::net::{UnixListener, UnixStream};

#[cfg(windows)]
use tokio::net::windows::named_pipe::{ClientOptions, NamedPipeServer, ServerOptions};

/// A connected duplex byte stream to or from the peer.
pub trait PeerStream: AsyncRead + AsyncWrite + Unpin + Send {}

impl<T: AsyncRead + AsyncWrite + Unpin + Send> PeerStream for T {}

/// Where the assistant process listens.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PeerEndpoint {
    /// Platform-local channel identified by a rendezvous name (or, on Unix,
    /// an explicit socket path).
    Named(String),
    /// Loopback or LAN TCP address.
    Tcp(SocketAddr),
}

impl Default for PeerEndpoint {
    fn default() -> Self {
        PeerEndpoint::Named(ProtocolConfig::RENDEZVOUS_NAME.to_string())
    }
}

impl fmt::Display for PeerEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PeerEndpoint::Named(name) => f.write_str(name),
            PeerEndpoint::Tcp(addr) => write!(f, "{}{}", ProtocolConfig::TCP_SCHEME, addr),
        }
    }
}

impl std::str::FromStr for PeerEndpoint {
    type Err = BridgeError;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        if s.is_empty() {
            return Err(BridgeError::Config {
                message: "Peer endpoint must not be empty".to_string(),
            });
        }

        if let Some(addr) = s.strip_prefix(ProtocolConfig::TCP_SCHEME) {
            let addr = addr.parse::<SocketAddr>().map_err(|e| BridgeError::Config {
                message: format!("Invalid TCP peer address '{}': {}", addr, e),
            })?;
            return Ok(PeerEndpoint::Tcp(addr));
        }

        Ok(PeerEndpoint::Named(s.to_string()))
    }
}

impl PeerEndpoint {
    /// Socket path a named endpoint resolves to.
    ///
    /// A name containing a path separator is used verbatim; a bare name lives
    /// in the user's runtime directory (or the temp dir when there is none).
    #[cfg(unix)]
    pub fn socket_path(&self) -> Option<PathBuf> {
        match self {
            PeerEndpoint::Named(name) if name.contains('/') => Some(PathBuf::from(name)),
            PeerEndpoint::Named(name) => {
                let dir = dirs::runtime_dir().unwrap_or_else(std::env::temp_dir);
                Some(dir.join(format!("{}.{}", name, ProtocolConfig::SOCKET_EXTENSION)))
            }
            PeerEndpoint::Tcp(_) => None,
        }
    }

    /// Full pipe path a named endpoint resolves to.
    #[cfg(windows)]
    pub fn pipe_name(&self) -> Option<String> {
        match self {
            PeerEndpoint::Named(name) if name.starts_with(ProtocolConfig::PIPE_PREFIX) => {
                Some(name.clone())
            }
            PeerEndpoint::Named(name) => Some(format!("{}{}", ProtocolConfig::PIPE_PREFIX, name)),
            PeerEndpoint::Tcp(_) => None,
        }
    }

    /// Open one connection to the peer. Has no deadline of its own; callers
    /// wrap it in a timeout.
    pub async fn connect(&self) -> io::Result<Box<dyn PeerStream>> {
        match self {
            PeerEndpoint::Tcp(addr) => {
                let stream = TcpStream::connect(*addr).await?;
                stream.set_nodelay(true)?;
                Ok(Box::new(stream))
            }
            PeerEndpoint::Named(_) => self.connect_named().await,
        }
    }

    #[cfg(unix)]
    async fn connect_named(&self) -> io::Result<Box<dyn PeerStream>> {
        let path = self
            .socket_path()
            .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "not a named endpoint"))?;
        let stream = UnixStream::connect(&path).await?;
        Ok(Box::new(stream))
    }

    #[cfg(windows)]
    async fn connect_named(&self) -> io::Result<Box<dyn PeerStream>> {
        use windows_sys::Win32::Foundation::ERROR_PIPE_BUSY;

        let name = self
            .pipe_name()
            .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "not a named endpoint"))?;
        loop {
            match ClientOptions::new().open(&name) {
                Ok(client) => return Ok(Box::new(client)),
                Err(e) if e.raw_os_error() == Some(ERROR_PIPE_BUSY as i32) => {
                    debug!("Pipe {} busy, waiting", name);
                }
                Err(e) => return Err(e),
            }
            tokio::time::sleep(TimeoutConfig::PIPE_BUSY_RETRY).await;
        }
    }

    /// Start listening on this endpoint, as the peer would.
    pub async fn bind(&self) -> Result<PeerListener> {
        match self {
            PeerEndpoint::Tcp(addr) => {
                let listener = TcpListener::bind(*addr).await?;
                let local = listener.local_addr()?;
                Ok(PeerListener {
                    endpoint: PeerEndpoint::Tcp(local),
                    inner: ListenerInner::Tcp(listener),
                })
            }
            PeerEndpoint::Named(_) => self.bind_named().await,
        }
    }

    #[cfg(unix)]
    async fn bind_named(&self) -> Result<PeerListener> {
        let path = self.socket_path().ok_or_else(|| BridgeError::Config {
            message: format!("{} is not a named endpoint", self),
        })?;

        if let Ok(metadata) = std::fs::symlink_metadata(&path) {
            if !metadata.file_type().is_socket() {
                return Err(BridgeError::Config {
                    message: format!("{} exists and is not a socket", path.display()),
                });
            }

            // A live peer answers; a stale socket file from a crashed run does not.
            let probe = tokio::time::timeout(
                TimeoutConfig::PIPE_BUSY_RETRY,
                UnixStream::connect(&path),
            )
            .await;
            if matches!(probe, Ok(Ok(_))) {
                return Err(BridgeError::Config {
                    message: format!("Another peer is already listening on {}", path.display()),
                });
            }
            warn!("Removing stale socket {}", path.display());
            std::fs::remove_file(&path)?;
        }

        let listener = UnixListener::bind(&path)?;
        Ok(PeerListener {
            endpoint: self.clone(),
            inner: ListenerInner::Unix { listener, path },
        })
    }

    #[cfg(windows)]
    async fn bind_named(&self) -> Result<PeerListener> {
        let name = self.pipe_name().ok_or_else(|| BridgeError::Config {
            message: format!("{} is not a named endpoint", self),
        })?;
        let next = ServerOptions::new().first_pipe_instance(true).create(&name)?;
        Ok(PeerListener {
            endpoint: self.clone(),
            inner: ListenerInner::Pipe { name, next },
        })
    }
}

/// Listening side of an endpoint.
pub struct PeerListener {
    endpoint: PeerEndpoint,
    inner: ListenerInner,
}

enum ListenerInner {
    Tcp(TcpListener),
    #[cfg(unix)]
    Unix {
        listener: UnixListener,
        path: PathBuf,
    },
    #[cfg(windows)]
    Pipe {
        name: String,
        next: NamedPipeServer,
    },
}

impl PeerListener {
    /// The bound endpoint (a TCP endpoint carries the OS-assigned port).
    pub fn endpoint(&self) -> &PeerEndpoint {
        &self.endpoint
    }

    /// Wait for the next client connection.
    pub async fn accept(&mut self) -> io::Result<Box<dyn PeerStream>> {
        match &mut self.inner {
            ListenerInner::Tcp(listener) => {
                let (stream, addr) = listener.accept().await?;
                debug!("Peer connection from {}", addr);
                Ok(Box::new(stream))
            }
            #[cfg(unix)]
            ListenerInner::Unix { listener, .. } => {
                let (stream, _) = listener.accept().await?;
                Ok(Box::new(stream))
            }
            #[cfg(windows)]
            ListenerInner::Pipe { name, next } => {
                next.connect().await?;
                let fresh = ServerOptions::new().create(&*name)?;
                let connected = std::mem::replace(next, fresh);
                Ok(Box::new(connected))
            }
        }
    }
}

impl Drop for PeerListener {
    fn drop(&mut self) {
        #[cfg(unix)]
        if let ListenerInner::Unix { path, .. } = &self.inner {
            let _ = std::fs::remove_file(path);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_named_and_tcp() {
        assert_eq!(
            "MSAgentAI".parse::<PeerEndpoint>().unwrap(),
            PeerEndpoint::Named("MSAgentAI".into())
        );
        assert_eq!(
            "tcp:127.0.0.1:9100".parse::<PeerEndpoint>().unwrap(),
            PeerEndpoint::Tcp("127.0.0.1:9100".parse().unwrap())
        );
        assert!("tcp:nonsense".parse::<PeerEndpoint>().is_err());
        assert!("   ".parse::<PeerEndpoint>().is_err());
    }

    #[test]
    fn test_display_round_trips() {
        let endpoint: PeerEndpoint = "tcp:127.0.0.1:9100".parse().unwrap();
        assert_eq!(endpoint.to_string(), "tcp:127.0.0.1:9100");
    }

    #[cfg(unix)]
    #[test]
    fn test_socket_path_resolution() {
        let explicit = PeerEndpoint::Named("/tmp/agent/peer.sock".into());
        assert_eq!(
            explicit.socket_path(),
            Some(PathBuf::from("/tmp/agent/peer.sock"))
        );

        let bare = PeerEndpoint::default().socket_path().unwrap();
        assert_eq!(bare.file_name().unwrap(), "MSAgentAI.sock");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_bind_replaces_stale_socket() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stale.sock");
        // Dropping a std listener leaves its socket file behind
        drop(std::os::unix::net::UnixListener::bind(&path).unwrap());
        assert!(path.exists());

        let endpoint = PeerEndpoint::Named(path.to_string_lossy().into_owned());
        let listener = endpoint.bind().await.unwrap();
        assert!(path.exists());

        drop(listener);
        assert!(!path.exists());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_bind_leaves_regular_file_alone() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("notes.txt");
        std::fs::write(&path, b"important user data").unwrap();

        let endpoint = PeerEndpoint::Named(path.to_string_lossy().into_owned());
        let result = endpoint.bind().await;

        assert!(matches!(result, Err(BridgeError::Config { .. })));
        assert_eq!(std::fs::read(&path).unwrap(), b"important user data");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_bind_refuses_live_socket() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("live.sock");
        let endpoint = PeerEndpoint::Named(path.to_string_lossy().into_owned());

        let _first = endpoint.bind().await.unwrap();
        let second = endpoint.bind().await;
        assert!(matches!(second, Err(BridgeError::Config { .. })));
    }

    #[tokio::test]
    async fn test_tcp_bind_reports_assigned_port() {
        let endpoint: PeerEndpoint = "tcp:127.0.0.1:0".parse().unwrap();
        let listener = endpoint.bind().await.unwrap();
        match listener.endpoint() {
            PeerEndpoint::Tcp(addr) => assert_ne!(addr.port(), 0),
            other => panic!("Expected TCP endpoint, got {:?}", other),
        }
    }
}
