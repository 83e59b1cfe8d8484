//! Client connection representation.
//!
//! A [`ConnectionInfo`] is the read-only record handed to callbacks and
//! observers; a [`ClientConnection`] pairs it with the connection's outbound
//! queue inside the registry.

use super::ConnectionId;
use chrono::{DateTime, Utc};
use command_bus::ClientIntro;
use serde::Serialize;
use std::net::SocketAddr;
use tokio::sync::{mpsc, watch};
use tokio_tungstenite::tungstenite::Message;

/// Metadata about one live connection.
///
/// `address` is resolved when the socket is accepted and may be `None` if
/// the transport could not report it. The remaining optional fields are
/// filled in by the client's `client.intro` handshake.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionInfo {
    /// Registry-assigned identifier
    pub id: ConnectionId,

    /// Remote network address of the client
    pub address: Option<SocketAddr>,

    /// Application name announced by the client
    pub name: Option<String>,

    /// Platform description announced by the client
    pub user_agent: Option<String>,

    /// Client library version announced by the client
    pub version: Option<String>,

    /// When the connection was registered
    pub connected_at: DateTime<Utc>,
}

impl ConnectionInfo {
    /// Creates a record for a freshly accepted connection.
    pub fn new(id: ConnectionId, address: Option<SocketAddr>) -> Self {
        Self {
            id,
            address,
            name: None,
            user_agent: None,
            version: None,
            connected_at: Utc::now(),
        }
    }

    /// Folds handshake metadata into the record.
    ///
    /// Fields the intro leaves out keep their previous value.
    pub fn apply_intro(&mut self, intro: &ClientIntro) {
        if let Some(name) = &intro.name {
            self.name = Some(name.clone());
        }
        if let Some(user_agent) = &intro.user_agent {
            self.user_agent = Some(user_agent.clone());
        }
        if let Some(version) = &intro.version {
            self.version = Some(version.clone());
        }
    }
}

/// A registered connection: its record, the queue its writer drains and the
/// signal that tears it down.
#[derive(Debug)]
pub struct ClientConnection {
    /// Current record for this connection
    pub info: ConnectionInfo,

    outbound: mpsc::Sender<Message>,

    /// Flipped to `true` to end the connection's tasks, whatever the queue holds
    closer: watch::Sender<bool>,
}

impl ClientConnection {
    /// Creates a registry entry.
    pub fn new(info: ConnectionInfo, outbound: mpsc::Sender<Message>, closer: watch::Sender<bool>) -> Self {
        Self { info, outbound, closer }
    }

    /// Queues a frame without waiting.
    ///
    /// Fails if the queue is full or the writer has already gone away; the
    /// frame is dropped in both cases.
    pub fn try_send(&self, message: Message) -> Result<(), mpsc::error::TrySendError<Message>> {
        self.outbound.try_send(message)
    }

    /// Ends the connection.
    ///
    /// A close frame is queued when there is room for it; the close signal is
    /// raised regardless, so a stalled client is dropped even with a full queue.
    pub fn close(&self) {
        if self.outbound.try_send(Message::Close(None)).is_err() {
            tracing::debug!("Connection {} queue full or gone, closing without a close frame", self.info.id);
        }
        self.closer.send_replace(true);
    }
}
