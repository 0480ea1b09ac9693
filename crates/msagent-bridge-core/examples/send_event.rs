//! Send one game event straight to the assistant, without the HTTP bridge.
//!
//! Run with: cargo run --example send_event -- crash '{"vehicle_name":"D-Series","speed_before":80}'

use msagent_bridge_core::{format_command, EventKind, IpcClient, IpcConfig};
use serde_json::Value;

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let mut args = std::env::args().skip(1);
    let kind = args
        .next()
        .and_then(|k| EventKind::from_str(&k))
        .unwrap_or(EventKind::Health);
    let payload: Value = args
        .next()
        .and_then(|p| serde_json::from_str(&p).ok())
        .unwrap_or(Value::Null);

    let client = IpcClient::new(IpcConfig::default());
    let command = format_command(kind, &payload);

    println!("> {}", command);
    println!("< {}", client.send(&command).await);
}
