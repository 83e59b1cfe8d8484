//! Core relay server implementation.
//!
//! This module contains the [`RelayServer`] handle, which owns the listen
//! socket, the connection registry and the command history, and drives the
//! `stopped → started → stopped` lifecycle.

use crate::{
    config::{validate, ServerConfig, ServerOptions},
    connection::{ConnectionId, ConnectionInfo, ConnectionManager},
    error::{ConfigError, ServerError},
    history::CommandHistory,
    server::handlers::handle_connection,
};
use command_bus::{ClientIntro, Command, Envelope, ShutdownState, CLIENT_INTRO};
use serde_json::Value;
use std::net::SocketAddr;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::{broadcast, mpsc, watch, Mutex};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, error, info, warn};

/// Capacity of the in-process observer channel.
const OBSERVER_CAPACITY: usize = 1024;

/// Pause after a failed accept (e.g. file descriptor exhaustion).
const ACCEPT_BACKOFF: Duration = Duration::from_millis(50);

/// A running accept loop.
struct Listening {
    local_addr: SocketAddr,
    shutdown_state: ShutdownState,
    shutdown_sender: broadcast::Sender<()>,
    accept_task: JoinHandle<()>,
}

/// The relay server.
///
/// `RelayServer` is a cheap, cloneable handle; every clone drives the same
/// listener, registry and history.
///
/// # Architecture
///
/// * **Connection registry**: live connections and their intro metadata
/// * **Command history**: the single sequencer assigning message ids
/// * **Observer channel**: every stamped command for in-process consumers
/// * **Accept loop**: one task per listener, one task per connection
///
/// # Lifecycle
///
/// `start` binds the configured address and begins accepting; `stop` closes
/// every connection (firing `on_disconnect` for each), then releases the
/// listener, then fires `on_stop`.
#[derive(Clone)]
pub struct RelayServer {
    /// Merged, validated configuration
    config: Arc<RwLock<ServerConfig>>,

    /// Registry of live connections
    connection_manager: Arc<ConnectionManager>,

    /// Inbound command log and message counter
    history: Arc<CommandHistory>,

    /// Fan-out of stamped commands to in-process observers
    observers: broadcast::Sender<Command>,

    /// Held while a command is stamped and delivered, so `on_command` and
    /// observers see message ids in order across connections
    sequencer: Arc<Mutex<()>>,

    /// Present while the server is started
    listening: Arc<Mutex<Option<Listening>>>,
}

impl Default for RelayServer {
    fn default() -> Self {
        Self::new()
    }
}

impl RelayServer {
    /// Creates a stopped server with the default configuration.
    pub fn new() -> Self {
        let (observers, _) = broadcast::channel(OBSERVER_CAPACITY);
        Self {
            config: Arc::new(RwLock::new(ServerConfig::default())),
            connection_manager: Arc::new(ConnectionManager::new()),
            history: Arc::new(CommandHistory::new()),
            observers,
            sequencer: Arc::new(Mutex::new(())),
            listening: Arc::new(Mutex::new(None)),
        }
    }

    /// Merges `options` over the current configuration and applies the result.
    ///
    /// The merged configuration is validated first; on failure the current
    /// configuration is left exactly as it was. Callback changes take effect
    /// for the next event; listen address changes take effect on the next
    /// `start`.
    pub fn configure(&self, options: ServerOptions) -> Result<&Self, ConfigError> {
        let mut current = self.config.write().unwrap_or_else(PoisonError::into_inner);
        let merged = options.merge_into(&current);
        if let Err(e) = validate(&merged) {
            warn!("⚠️ Rejected server configuration: {}", e);
            return Err(e);
        }
        *current = merged;
        debug!("🔧 Server configuration applied: {:?}", *current);
        Ok(self)
    }

    /// Returns a snapshot of the current configuration.
    pub fn config(&self) -> ServerConfig {
        self.config.read().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Starts listening and accepting connections.
    ///
    /// # Returns
    ///
    /// The bound local address, or [`ServerError::AlreadyStarted`] if the
    /// server is running, or [`ServerError::Network`] if the address cannot
    /// be bound.
    pub async fn start(&self) -> Result<SocketAddr, ServerError> {
        let mut listening = self.listening.lock().await;
        if listening.is_some() {
            return Err(ServerError::AlreadyStarted);
        }

        let config = self.config();
        let bind_address = config.listen_addr()?;
        let listener = TcpListener::bind(bind_address)
            .await
            .map_err(|e| ServerError::Network(format!("Failed to bind {bind_address}: {e}")))?;
        let local_addr = listener
            .local_addr()
            .map_err(|e| ServerError::Network(format!("Failed to read local address: {e}")))?;

        self.connection_manager.open().await;

        let shutdown_state = ShutdownState::new();
        let (shutdown_sender, shutdown_receiver) = broadcast::channel(1);
        let accept_task = tokio::spawn(accept_loop(
            listener,
            self.clone(),
            shutdown_state.clone(),
            shutdown_receiver,
        ));

        *listening = Some(Listening {
            local_addr,
            shutdown_state,
            shutdown_sender,
            accept_task,
        });
        drop(listening);

        info!("🚀 Relay server listening on {}", local_addr);
        (config.on_start)();
        Ok(local_addr)
    }

    /// Stops the server.
    ///
    /// Every registered connection is closed and reported through
    /// `on_disconnect` before the listener is released; `on_stop` fires last.
    /// A command already being sequenced finishes first; nothing is stamped
    /// for a closed connection afterwards. Stopping a stopped server does
    /// nothing.
    ///
    /// Must not be awaited from inside `on_command`.
    pub async fn stop(&self) {
        let mut listening = self.listening.lock().await;
        let Some(running) = listening.take() else {
            debug!("Stop requested on a stopped server");
            return;
        };

        info!("🛑 Shutting down relay server on {}...", running.local_addr);
        let config = self.config();

        running.shutdown_state.initiate_shutdown();

        let closing = self.connection_manager.close_all().await;
        info!("🧹 Closing {} connection(s)", closing.len());
        for connection in &closing {
            connection.close();
        }

        // Wait out an in-flight command; later ones find no registration
        drop(self.sequencer.lock().await);
        for connection in &closing {
            (config.on_disconnect)(&connection.info);
        }

        let _ = running.shutdown_sender.send(());
        if let Err(e) = running.accept_task.await {
            error!("Accept loop ended abnormally: {}", e);
        }
        running.shutdown_state.complete_shutdown();
        drop(listening);

        info!("✅ Relay server stopped");
        (config.on_stop)();
    }

    /// Shutdown flags of the current run, while started.
    pub async fn shutdown_state(&self) -> Option<ShutdownState> {
        self.listening.lock().await.as_ref().map(|l| l.shutdown_state.clone())
    }

    /// Whether the server is currently started.
    pub async fn is_started(&self) -> bool {
        self.listening.lock().await.is_some()
    }

    /// The bound address while started.
    pub async fn local_addr(&self) -> Option<SocketAddr> {
        self.listening.lock().await.as_ref().map(|l| l.local_addr)
    }

    /// Broadcasts a command to every live connection.
    ///
    /// Broadcast commands are not stamped and are not part of the history.
    ///
    /// # Returns
    ///
    /// The number of connections the command was queued for.
    pub async fn send(&self, kind: &str, payload: Value) -> usize {
        match Envelope::new(kind, payload).to_json() {
            Ok(text) => self.connection_manager.broadcast_to_all(&text).await,
            Err(e) => {
                error!("Failed to encode outbound command {}: {}", kind, e);
                0
            }
        }
    }

    /// Sends a command to a single connection.
    pub async fn send_to(&self, connection_id: ConnectionId, kind: &str, payload: Value) -> bool {
        match Envelope::new(kind, payload).to_json() {
            Ok(text) => self.connection_manager.send_to_connection(connection_id, &text).await,
            Err(e) => {
                error!("Failed to encode outbound command {}: {}", kind, e);
                false
            }
        }
    }

    /// Returns a snapshot of the live connections.
    pub async fn connections(&self) -> Vec<ConnectionInfo> {
        self.connection_manager.connections().await
    }

    /// Returns a snapshot of every recorded command.
    pub fn history(&self) -> Vec<Command> {
        self.history.commands()
    }

    /// Drops the recorded commands. Message ids keep counting.
    pub fn clear_history(&self) {
        self.history.clear();
    }

    /// Subscribes to stamped commands as they are recorded.
    pub fn subscribe(&self) -> broadcast::Receiver<Command> {
        self.observers.subscribe()
    }

    /// Registers a freshly accepted connection and fires `on_connect`.
    ///
    /// Returns `None` when the server is shutting down.
    pub(crate) async fn register(
        &self,
        address: Option<SocketAddr>,
        outbound: mpsc::Sender<Message>,
        closer: watch::Sender<bool>,
    ) -> Option<ConnectionInfo> {
        let info = self
            .connection_manager
            .add_connection(address, outbound, closer)
            .await?;
        (self.config().on_connect)(&info);
        Some(info)
    }

    /// Sequences one inbound envelope from `connection_id`.
    ///
    /// The envelope is stamped and recorded, handed to `on_command`, then
    /// published to observers, all in one turn of the sequencer so every
    /// consumer sees ids in order. A `client.intro` envelope additionally
    /// updates the connection's record first.
    ///
    /// # Returns
    ///
    /// The stamped command, or `None` if the connection is no longer
    /// registered (it was disconnected or the server stopped).
    pub async fn receive(&self, connection_id: ConnectionId, envelope: Envelope) -> Option<Command> {
        let _turn = self.sequencer.lock().await;
        if !self.connection_manager.contains(connection_id).await {
            debug!("Dropping '{}' from closed connection {}", envelope.kind, connection_id);
            return None;
        }

        if envelope.kind == CLIENT_INTRO {
            let intro = ClientIntro::from_payload(&envelope.payload);
            if let Some(info) = self.connection_manager.apply_intro(connection_id, &intro).await {
                info!(
                    "👋 Connection {} introduced itself as {:?} ({:?} {:?})",
                    info.id, info.name, info.user_agent, info.version
                );
            }
        }

        let command = self.history.record(envelope);
        debug!(
            "📨 Command #{} '{}' from connection {}",
            command.message_id, command.kind, connection_id
        );

        (self.config().on_command)(&command);
        let _ = self.observers.send(command.clone());
        Some(command)
    }

    /// Removes a connection and fires `on_disconnect` with its last record.
    ///
    /// # Returns
    ///
    /// `true` if the connection was registered; a repeated disconnect of the
    /// same connection returns `false` and fires nothing.
    pub async fn disconnect(&self, connection_id: ConnectionId) -> bool {
        match self.connection_manager.remove_connection(connection_id).await {
            Some(connection) => {
                connection.close();
                (self.config().on_disconnect)(&connection.info);
                true
            }
            None => false,
        }
    }

    pub(crate) fn outbound_queue(&self) -> usize {
        self.config().outbound_queue
    }
}

async fn accept_loop(
    listener: TcpListener,
    server: RelayServer,
    shutdown_state: ShutdownState,
    mut shutdown_receiver: broadcast::Receiver<()>,
) {
    loop {
        tokio::select! {
            _ = shutdown_receiver.recv() => {
                info!("🛑 Accept loop stopping - shutdown requested");
                break;
            }
            accepted = listener.accept() => match accepted {
                Ok((stream, addr)) => {
                    if shutdown_state.is_shutdown_initiated() {
                        debug!("Dropping connection from {} - shutdown initiated", addr);
                        continue;
                    }
                    debug!("Accepted TCP connection from {}", addr);
                    let server = server.clone();
                    let shutdown_state = shutdown_state.clone();
                    tokio::spawn(async move {
                        if let Err(e) = handle_connection(stream, server, shutdown_state).await {
                            warn!("Connection error: {}", e);
                        }
                    });
                }
                Err(e) => {
                    error!("Failed to accept connection: {}", e);
                    tokio::time::sleep(ACCEPT_BACKOFF).await;
                }
            }
        }
    }
}
