//! # Relay Server
//!
//! The server half of the debugging command bus. Instrumented applications
//! connect over WebSocket and stream `{type, payload}` envelopes; the relay
//! numbers each one, records it, hands it to a user-supplied handler, and
//! can push control commands back to every connected client.
//!
//! ## Architecture Overview
//!
//! * **Configuration Validator** ([`config`]) - merged options are checked
//!   before they take effect
//! * **Command History** ([`history`]) - the sequencer assigning gap-free
//!   message ids
//! * **Connection Registry** ([`connection`]) - live connections and the
//!   metadata clients announce
//! * **Relay Server** ([`server`]) - accept loop, per-connection tasks,
//!   broadcast and lifecycle
//!
//! ### Message Flow
//!
//! 1. Client sends a WebSocket text frame `{"type": ..., "payload": ...}`
//! 2. The connection task decodes it and hands it to the sequencer
//! 3. The command is stamped with `messageId` and `date` and recorded
//! 4. `on_command` runs, then in-process observers receive the command
//!
//! ## Usage
//!
//! ```rust,no_run
//! use relay_server::{create_server_with_options, ServerOptions};
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let server = create_server_with_options(
//!     ServerOptions::new()
//!         .port(9090u16)
//!         .on_command(|command| println!("#{} {}", command.message_id, command.kind)),
//! )?;
//! server.start().await?;
//! server.send("state.values.request", serde_json::json!({ "path": "user" })).await;
//! server.stop().await;
//! # Ok(())
//! # }
//! ```
//!
//! ## Error Handling
//!
//! * [`ConfigError`] - a rejected configuration, naming the field
//! * [`ServerError`] - bind failures and lifecycle misuse
//!
//! ## Thread Safety
//!
//! * The registry is an `RwLock<HashMap>`; broadcasts read a consistent snapshot
//! * The history is a mutex held only while stamping and appending
//! * Each connection has its own reader task and writer task, so a slow
//!   client never stalls the sequencer or other clients

pub use config::{validate, PortValue, ServerConfig, ServerOptions};
pub use connection::{ConnectionId, ConnectionInfo};
pub use error::{ConfigError, ServerError};
pub use history::CommandHistory;
pub use server::RelayServer;
pub use utils::{create_server, create_server_with_options};

pub mod config;
pub mod connection;
pub mod error;
pub mod history;
pub mod server;
pub mod utils;
