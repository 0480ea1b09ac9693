//! Raw protocol probe: sends commands straight to the assistant.

use msagent_bridge_core::{Command, IpcClient, ProtocolConfig};

/// Commands sent when none are given on the command line.
pub fn default_commands() -> Vec<Command> {
    vec![
        Command::ping(),
        Command::version(),
        Command::speak("Testing MSAgent integration from the bridge!"),
        Command::animation("Wave"),
        Command::bare(msagent_bridge_core::Verb::Hide),
        Command::bare(msagent_bridge_core::Verb::Show),
    ]
}

/// Parse command-line arguments into commands.
pub fn parse_commands(raw: &[String]) -> msagent_bridge_core::Result<Vec<Command>> {
    raw.iter().map(|s| s.parse::<Command>()).collect()
}

/// Send each command in turn and print the replies.
///
/// Returns false if any reply was an error or empty.
pub async fn run(client: &IpcClient, commands: &[Command]) -> bool {
    let config = client.config();
    println!(
        "MSAgent-AI protocol probe ({}, connect timeout {} ms)",
        client.endpoint(),
        config.connect_timeout.as_millis()
    );
    println!("{}", "=".repeat(50));

    let mut ok = true;
    for (i, command) in commands.iter().enumerate() {
        let reply = client.send(command).await;
        let errored = reply.starts_with(ProtocolConfig::ERROR_PREFIX);
        ok &= !(errored || reply.is_empty());

        println!("> {}", command);
        println!("< {}", if reply.is_empty() { "(no reply)" } else { reply.as_str() });

        if errored && i == 0 {
            println!("\nMake sure MSAgent-AI is running before probing.");
            break;
        }
    }
    ok
}
