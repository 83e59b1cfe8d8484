//! Connection registry for tracking and messaging client connections.
//!
//! Every mutation (register, remove, intro update, close-all) takes the
//! registry's write lock, and every broadcast takes a read lock, so a
//! broadcast always sees a consistent snapshot: a connection is visible from
//! the moment registration returns until the moment removal returns.

use super::{client::ClientConnection, ConnectionId, ConnectionInfo};
use command_bus::ClientIntro;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::{mpsc, watch, RwLock};
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, info, warn};

#[derive(Debug, Default)]
struct Registry {
    /// Whether new connections may register
    open: bool,
    connections: HashMap<ConnectionId, ClientConnection>,
}

/// Central registry of all live connections.
///
/// # Architecture
///
/// * `RwLock<HashMap>` for connection storage
/// * Atomic connection ID generation
/// * A bounded outbound queue per connection, fed with `try_send` so that a
///   stalled connection never holds up delivery to the others
#[derive(Debug)]
pub struct ConnectionManager {
    registry: RwLock<Registry>,

    /// Atomic counter for generating unique connection IDs
    next_id: AtomicUsize,
}

impl Default for ConnectionManager {
    fn default() -> Self {
        Self::new()
    }
}

impl ConnectionManager {
    /// Creates an empty, closed registry.
    pub fn new() -> Self {
        Self {
            registry: RwLock::new(Registry::default()),
            next_id: AtomicUsize::new(1),
        }
    }

    /// Starts admitting new connections.
    pub async fn open(&self) {
        self.registry.write().await.open = true;
    }

    /// Whether new connections are currently admitted.
    pub async fn is_open(&self) -> bool {
        self.registry.read().await.open
    }

    /// Registers a connection and returns its record.
    ///
    /// Returns `None` once [`close_all`](Self::close_all) has run, so a
    /// connection accepted during shutdown is never left behind.
    pub async fn add_connection(
        &self,
        address: Option<SocketAddr>,
        outbound: mpsc::Sender<Message>,
        closer: watch::Sender<bool>,
    ) -> Option<ConnectionInfo> {
        let mut registry = self.registry.write().await;
        if !registry.open {
            return None;
        }

        let connection_id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let info = ConnectionInfo::new(connection_id, address);
        registry
            .connections
            .insert(connection_id, ClientConnection::new(info.clone(), outbound, closer));

        match address {
            Some(addr) => info!("🔗 Connection {} from {}", connection_id, addr),
            None => info!("🔗 Connection {} from unknown address", connection_id),
        }
        Some(info)
    }

    /// Removes a connection, returning its last registry entry.
    ///
    /// Removing an unknown or already removed connection returns `None`.
    pub async fn remove_connection(&self, connection_id: ConnectionId) -> Option<ClientConnection> {
        let removed = self.registry.write().await.connections.remove(&connection_id);
        if let Some(connection) = &removed {
            info!("❌ Connection {} disconnected", connection.info.id);
        }
        removed
    }

    /// Stops admitting connections and removes every registered one.
    pub async fn close_all(&self) -> Vec<ClientConnection> {
        let mut registry = self.registry.write().await;
        registry.open = false;
        let mut drained: Vec<_> = registry.connections.drain().map(|(_, c)| c).collect();
        drained.sort_by_key(|c| c.info.id);
        drained
    }

    /// Folds a client's intro into its record.
    pub async fn apply_intro(&self, connection_id: ConnectionId, intro: &ClientIntro) -> Option<ConnectionInfo> {
        let mut registry = self.registry.write().await;
        let connection = registry.connections.get_mut(&connection_id)?;
        connection.info.apply_intro(intro);
        Some(connection.info.clone())
    }

    /// Whether a connection is currently registered.
    pub async fn contains(&self, connection_id: ConnectionId) -> bool {
        self.registry.read().await.connections.contains_key(&connection_id)
    }

    /// Returns the record of one connection.
    pub async fn get(&self, connection_id: ConnectionId) -> Option<ConnectionInfo> {
        let registry = self.registry.read().await;
        registry.connections.get(&connection_id).map(|c| c.info.clone())
    }

    /// Returns a snapshot of every record, ordered by connection ID.
    pub async fn connections(&self) -> Vec<ConnectionInfo> {
        let registry = self.registry.read().await;
        let mut infos: Vec<_> = registry.connections.values().map(|c| c.info.clone()).collect();
        infos.sort_by_key(|info| info.id);
        infos
    }

    /// Number of registered connections.
    pub async fn len(&self) -> usize {
        self.registry.read().await.connections.len()
    }

    /// Whether no connection is registered.
    pub async fn is_empty(&self) -> bool {
        self.registry.read().await.connections.is_empty()
    }

    /// Queues a text frame for one connection.
    pub async fn send_to_connection(&self, connection_id: ConnectionId, text: &str) -> bool {
        let registry = self.registry.read().await;
        match registry.connections.get(&connection_id) {
            Some(connection) => deliver(connection, text),
            None => false,
        }
    }

    /// Queues a text frame for every registered connection.
    ///
    /// A connection whose queue is full or whose writer is gone is skipped
    /// and keeps its registry entry; only a disconnect removes it.
    ///
    /// # Returns
    ///
    /// The number of connections the frame was queued for.
    pub async fn broadcast_to_all(&self, text: &str) -> usize {
        let registry = self.registry.read().await;
        let delivered = registry
            .connections
            .values()
            .filter(|connection| deliver(connection, text))
            .count();

        debug!(
            "📡 Broadcasted message to {}/{} connections",
            delivered,
            registry.connections.len()
        );
        delivered
    }
}

fn deliver(connection: &ClientConnection, text: &str) -> bool {
    match connection.try_send(Message::text(text)) {
        Ok(()) => true,
        Err(mpsc::error::TrySendError::Full(_)) => {
            warn!(
                "⚠️ Outbound queue full for connection {}, dropping message",
                connection.info.id
            );
            false
        }
        Err(mpsc::error::TrySendError::Closed(_)) => {
            debug!("Connection {} is closing, skipping message", connection.info.id);
            false
        }
    }
}
