//! Connection handling logic for WebSocket clients.
//!
//! This module manages the lifecycle of one client connection, from the
//! WebSocket handshake through message processing to cleanup.

use crate::{error::ServerError, server::RelayServer};
use command_bus::{Envelope, ShutdownState};
use futures::{SinkExt, StreamExt};
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::{mpsc, watch};
use tokio_tungstenite::{accept_async, tungstenite::Message};
use tracing::{debug, trace, warn};

/// How long a closed connection gets to flush its close frame before the
/// socket is dropped.
const CLOSE_GRACE: Duration = Duration::from_millis(100);

/// Handles a single client connection from establishment to cleanup.
///
/// # Connection Flow
///
/// 1. Resolve the remote address (best effort)
/// 2. Perform the WebSocket handshake
/// 3. Register the connection and fire `on_connect`
/// 4. Run the incoming and outgoing tasks until either finishes, or until
///    the connection is closed and the grace period runs out
/// 5. Unregister the connection and fire `on_disconnect` (unless `stop`
///    already did)
///
/// # Message Handling
///
/// * **Incoming**: each text frame is decoded as an envelope and sequenced
///   through [`RelayServer::receive`], strictly in arrival order
/// * **Outgoing**: frames queued by broadcasts, pongs and close requests are
///   written to the socket in queue order
pub async fn handle_connection(
    stream: TcpStream,
    server: RelayServer,
    shutdown_state: ShutdownState,
) -> Result<(), ServerError> {
    let address = match stream.peer_addr() {
        Ok(addr) => Some(addr),
        Err(e) => {
            warn!("⚠️ Could not resolve remote address: {}", e);
            None
        }
    };

    let ws_stream = accept_async(stream)
        .await
        .map_err(|e| ServerError::Network(format!("WebSocket handshake failed: {e}")))?;
    let (mut ws_sender, mut ws_receiver) = ws_stream.split();

    if shutdown_state.is_shutdown_initiated() {
        debug!("Refusing connection from {:?} - server is shutting down", address);
        let _ = ws_sender.send(Message::Close(None)).await;
        return Ok(());
    }

    let (outbound_sender, mut outbound_receiver) = mpsc::channel(server.outbound_queue());
    let (closer, mut closed) = watch::channel(false);
    let Some(info) = server.register(address, outbound_sender.clone(), closer).await else {
        debug!("Refusing connection from {:?} - server is shutting down", address);
        let _ = ws_sender.send(Message::Close(None)).await;
        return Ok(());
    };
    let connection_id = info.id;

    // Incoming message task - sequences commands from this client
    let incoming_task = {
        let server = server.clone();
        async move {
            while let Some(msg) = ws_receiver.next().await {
                match msg {
                    Ok(Message::Text(text)) => match Envelope::from_json(&text) {
                        Ok(envelope) => {
                            server.receive(connection_id, envelope).await;
                        }
                        Err(e) => {
                            warn!("⚠️ Dropping malformed frame from connection {}: {}", connection_id, e);
                        }
                    },
                    Ok(Message::Ping(data)) => {
                        let _ = outbound_sender.try_send(Message::Pong(data));
                    }
                    Ok(Message::Close(_)) => {
                        debug!("🔌 Client {} requested close", connection_id);
                        break;
                    }
                    Err(e) => {
                        debug!("WebSocket error for connection {}: {}", connection_id, e);
                        break;
                    }
                    _ => {}
                }
            }
        }
    };

    // Outgoing message task - drains this connection's queue
    let outgoing_task = async move {
        while let Some(message) = outbound_receiver.recv().await {
            let closing = message.is_close();
            if let Err(e) = ws_sender.send(message).await {
                debug!("Failed to write to connection {}: {}", connection_id, e);
                break;
            }
            if closing {
                trace!("Close frame sent to connection {}", connection_id);
                break;
            }
        }
    };

    // Closing does not depend on queue space; a stalled peer is cut off
    let close_signal = async move {
        let _ = closed.wait_for(|closed| *closed).await;
        tokio::time::sleep(CLOSE_GRACE).await;
    };

    // Run both tasks concurrently until one completes
    tokio::select! {
        _ = incoming_task => {},
        _ = outgoing_task => {},
        _ = close_signal => {
            debug!("⏱️ Dropping connection {} after close", connection_id);
        },
    }

    server.disconnect(connection_id).await;
    Ok(())
}
