//! Console read-out of clients and commands.

use command_bus::{Command, CLIENT_INTRO};
use relay_server::{ConnectionInfo, RelayServer};
use serde_json::Value;
use tokio::sync::mpsc;
use tracing::{debug, info};

/// Placeholder for metadata a client has not announced.
const UNKNOWN: &str = "unknown";

/// One line per client: `- [address] <userAgent> <version>`.
pub fn format_client(client: &ConnectionInfo, prefix: &str) -> String {
    let address = client
        .address
        .map(|addr| addr.to_string())
        .unwrap_or_else(|| UNKNOWN.to_string());
    format!(
        "{} [{}] <{}> <{}>",
        prefix,
        address,
        client.user_agent.as_deref().unwrap_or(UNKNOWN),
        client.version.as_deref().unwrap_or(UNKNOWN)
    )
}

/// The client list, one line each, in connection order.
pub fn format_clients(clients: &[ConnectionInfo], prefix: &str) -> String {
    clients
        .iter()
        .map(|client| format_client(client, prefix))
        .collect::<Vec<_>>()
        .join("\n")
}

/// A one-line summary of a stamped command.
///
/// The well-known command types get a short title; anything else shows its
/// type and raw payload.
pub fn describe_command(command: &Command) -> String {
    let payload = &command.payload;
    let body = match command.kind.as_str() {
        CLIENT_INTRO => format!("CONNECTION {}", text(&payload["name"])),
        "state.action.complete" => format!(
            "ACTION {} ({} ms) {}",
            text(&payload["name"]),
            text(&payload["ms"]),
            payload["action"]
        ),
        "api.response" => format!(
            "API RESPONSE ({} ms) {} -> {}",
            text(&payload["duration"]),
            payload["request"],
            payload["response"]
        ),
        "log" => format!("LOG [{}] {}", text(&payload["level"]), text(&payload["message"])),
        other => format!("{} {}", other, payload),
    };
    format!("#{} {}", command.message_id, body)
}

/// Relay events forwarded from the server callbacks to the console task.
#[derive(Debug, Clone)]
pub enum ConsoleEvent {
    /// A client connected
    Connected(ConnectionInfo),
    /// A client disconnected
    Disconnected(ConnectionInfo),
    /// A command was stamped
    Command(Command),
    /// The relay has stopped; everything queued before this was printed
    Stopped,
}

/// Prints relay events until [`ConsoleEvent::Stopped`] arrives or every
/// sender is gone.
///
/// Runs as its own task so the relay callbacks never wait on the console.
/// The client list is re-read from the server after every change, including
/// a `client.intro` that filled in a client's metadata.
///
/// # Returns
///
/// The number of events printed.
pub async fn run_console(
    server: RelayServer,
    mut events: mpsc::UnboundedReceiver<ConsoleEvent>,
    echo_commands: bool,
) -> usize {
    let mut printed = 0;
    while let Some(event) = events.recv().await {
        match event {
            ConsoleEvent::Stopped => break,
            ConsoleEvent::Connected(client) => {
                info!("🔗 {}", format_client(&client, "Client connected:"));
                log_clients(&server).await;
            }
            ConsoleEvent::Disconnected(client) => {
                info!("🔌 {}", format_client(&client, "Client disconnected:"));
                log_clients(&server).await;
            }
            ConsoleEvent::Command(command) => {
                if echo_commands {
                    info!("📨 {}", describe_command(&command));
                } else {
                    debug!("📨 {}", describe_command(&command));
                }
                if command.kind == CLIENT_INTRO {
                    log_clients(&server).await;
                }
            }
        }
        printed += 1;
    }
    printed
}

async fn log_clients(server: &RelayServer) {
    let clients = server.connections().await;
    if clients.is_empty() {
        info!("👥 No clients connected");
    } else {
        info!("👥 Clients ({}):\n{}", clients.len(), format_clients(&clients, "   -"));
    }
}

/// Strings without their JSON quotes; everything else as JSON.
fn text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => UNKNOWN.to_string(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use command_bus::{ClientIntro, Envelope};
    use serde_json::json;

    fn command(kind: &str, payload: Value, id: u64) -> Command {
        Command::stamp(Envelope::new(kind, payload), id, command_bus::now())
    }

    #[tokio::test]
    async fn test_console_prints_everything_queued_before_stop() {
        let (events, receiver) = mpsc::unbounded_channel();
        events.send(ConsoleEvent::Connected(ConnectionInfo::new(1, None))).expect("send");
        events.send(ConsoleEvent::Command(command("log", json!({}), 1))).expect("send");
        events.send(ConsoleEvent::Disconnected(ConnectionInfo::new(1, None))).expect("send");
        events.send(ConsoleEvent::Stopped).expect("send");
        events.send(ConsoleEvent::Command(command("log", json!({}), 2))).expect("send");

        assert_eq!(run_console(RelayServer::new(), receiver, true).await, 3);
    }

    #[test]
    fn test_format_client() {
        let mut client = ConnectionInfo::new(1, Some("10.0.0.7:52100".parse().expect("addr")));
        assert_eq!(format_client(&client, "-"), "- [10.0.0.7:52100] <unknown> <unknown>");

        client.apply_intro(&ClientIntro {
            name: Some("demo".to_string()),
            user_agent: Some("ios".to_string()),
            version: Some("1.0".to_string()),
        });
        assert_eq!(format_client(&client, "-"), "- [10.0.0.7:52100] <ios> <1.0>");
    }

    #[test]
    fn test_format_clients() {
        let clients = vec![ConnectionInfo::new(1, None), ConnectionInfo::new(2, None)];
        assert_eq!(
            format_clients(&clients, "   "),
            "    [unknown] <unknown> <unknown>\n    [unknown] <unknown> <unknown>"
        );
        assert_eq!(format_clients(&[], "-"), "");
    }

    #[test]
    fn test_describe_command() {
        assert_eq!(
            describe_command(&command("state.action.complete", json!({ "name": "repo.receive", "ms": 4, "action": { "n": 1 } }), 3)),
            "#3 ACTION repo.receive (4 ms) {\"n\":1}"
        );
        assert_eq!(
            describe_command(&command("log", json!({ "level": "warn", "message": "careful" }), 4)),
            "#4 LOG [warn] careful"
        );
        assert_eq!(
            describe_command(&command("custom.thing", json!([1, 2]), 5)),
            "#5 custom.thing [1,2]"
        );
        assert_eq!(
            describe_command(&command("client.intro", json!({ "name": "demo" }), 1)),
            "#1 CONNECTION demo"
        );
    }
}
