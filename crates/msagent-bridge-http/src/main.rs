//! MSAgent Bridge - HTTP front-end forwarding game events to MSAgent-AI.
//!
//! The game mod posts events over HTTP; this binary turns each one into a
//! command of the assistant's line protocol and delivers it over the
//! assistant's local IPC channel.

mod handler;
mod probe;
mod selftest;
mod server;

use anyhow::Result;
use clap::{Parser, Subcommand};
use msagent_bridge_core::{
    IpcClient, IpcConfig, MockPeer, PeerEndpoint, PeerServer, ProtocolConfig, ServerConfig,
};
use server::DispatchOptions;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, info_span, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[derive(Parser, Debug)]
#[command(name = "msagent-bridge", version)]
#[command(about = "HTTP bridge from game mods to the MSAgent-AI assistant")]
struct Args {
    #[command(subcommand)]
    mode: Option<Mode>,

    #[command(flatten)]
    serve: ServeArgs,

    #[command(flatten)]
    peer: PeerArgs,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    debug: bool,
}

#[derive(Subcommand, Debug)]
enum Mode {
    /// Run the bridge (default)
    Serve(ServeArgs),
    /// Exercise every endpoint of a running bridge; exit 0 iff all return 200
    Selftest {
        /// Bridge base URL
        #[arg(long, default_value = "http://127.0.0.1:5000")]
        url: String,
    },
    /// Send raw protocol commands to the assistant and print the replies
    Probe {
        /// Commands such as PING or SPEAK:Hello (defaults to a standard sequence)
        commands: Vec<String>,
    },
    /// Answer the line protocol like the assistant, for development without it
    MockPeer,
}

#[derive(clap::Args, Debug, Clone)]
struct ServeArgs {
    /// Port to listen on (0 = auto-assign)
    #[arg(short, long, env = "PORT", default_value_t = ServerConfig::DEFAULT_PORT)]
    port: u16,

    /// Host to bind to
    #[arg(long, env = "BRIDGE_HOST", default_value = ServerConfig::DEFAULT_HOST)]
    host: String,

    /// Report delivery failures in event responses (status stays 200)
    #[arg(long)]
    report_delivery: bool,
}

#[derive(clap::Args, Debug, Clone)]
struct PeerArgs {
    /// Assistant endpoint: a rendezvous name, a socket path, or tcp:HOST:PORT
    #[arg(long, env = "MSAGENT_PEER", global = true, default_value = ProtocolConfig::RENDEZVOUS_NAME)]
    peer: PeerEndpoint,

    /// Connect timeout in milliseconds
    #[arg(long, global = true, default_value_t = 5_000)]
    connect_timeout_ms: u64,

    /// Response timeout in milliseconds
    #[arg(long, global = true, default_value_t = 30_000)]
    response_timeout_ms: u64,
}

impl PeerArgs {
    fn ipc_config(&self) -> IpcConfig {
        IpcConfig::for_endpoint(self.peer.clone())
            .with_connect_timeout(Duration::from_millis(self.connect_timeout_ms))
            .with_response_timeout(Duration::from_millis(self.response_timeout_ms))
    }
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let args = Args::parse();

    // Set up logging
    let log_level = if args.debug { "debug" } else { "info" };
    FmtSubscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level)),
        )
        .with_target(false)
        .with_thread_ids(false)
        .compact()
        .init();

    match args.mode {
        None => serve(args.serve, &args.peer).await,
        Some(Mode::Serve(serve_args)) => serve(serve_args, &args.peer).await,
        Some(Mode::Selftest { url }) => {
            let results = selftest::run(&url, &selftest::default_cases()).await?;
            Ok(exit_code(selftest::all_passed(&results)))
        }
        Some(Mode::Probe { commands }) => {
            let commands = if commands.is_empty() {
                probe::default_commands()
            } else {
                probe::parse_commands(&commands)?
            };
            let client = IpcClient::new(args.peer.ipc_config());
            Ok(exit_code(probe::run(&client, &commands).await))
        }
        Some(Mode::MockPeer) => mock_peer(&args.peer).await,
    }
}

async fn serve(serve_args: ServeArgs, peer: &PeerArgs) -> Result<ExitCode> {
    info!("Starting MSAgent bridge on port {}", serve_args.port);
    info!("Forwarding to peer: {}", peer.peer);
    info!("Make sure MSAgent-AI is running!");

    let client =
        IpcClient::new(peer.ipc_config()).with_span(info_span!("bridge", peer = %peer.peer));
    let options = DispatchOptions {
        report_delivery: serve_args.report_delivery,
    };

    let addr = server::start_server(client, options, &serve_args.host, serve_args.port).await?;

    // Supervising tools read the bound port from stdout
    println!("{}{}", ServerConfig::PORT_ANNOUNCE_PREFIX, addr.port());

    info!("Bridge running on {}", addr);

    // Wait for shutdown signal
    tokio::signal::ctrl_c().await?;
    info!("Shutdown signal received, exiting");

    Ok(ExitCode::SUCCESS)
}

async fn mock_peer(peer: &PeerArgs) -> Result<ExitCode> {
    warn!("Running mock peer; replies are canned, nothing is spoken");

    let mock = Arc::new(MockPeer::new(msagent_bridge_core::VERSION));
    let mut handle = PeerServer::start(&peer.peer, mock).await?;

    println!("PEER_ENDPOINT={}", handle.endpoint());

    tokio::signal::ctrl_c().await?;
    info!("Shutdown signal received, stopping mock peer");
    handle.shutdown();
    handle.join().await;

    Ok(ExitCode::SUCCESS)
}

fn exit_code(passed: bool) -> ExitCode {
    if passed {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}
