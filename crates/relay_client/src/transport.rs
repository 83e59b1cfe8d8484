//! Transports that carry encoded envelopes to the relay

use crate::client::Client;
use crate::error::ClientError;
use async_trait::async_trait;
use command_bus::Envelope;
use futures::{SinkExt, StreamExt};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, PoisonError};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::{debug, info, trace, warn};

/// A duplex link to the relay.
///
/// `send` must not block: the client calls it while holding its send lock.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Write one encoded envelope
    fn send(&self, frame: String) -> Result<(), ClientError>;

    /// Close the link, flushing what was already written
    async fn close(&self);
}

/// WebSocket transport backed by a writer task and a reader task.
///
/// Frames handed to [`Transport::send`] go into an unbounded channel that
/// the writer task drains into the socket, so sends never wait on the
/// network. The reader task decodes every text frame from the relay and
/// dispatches it to the client's `on_command` hooks.
pub struct WebSocketTransport {
    outbound: mpsc::UnboundedSender<Message>,
    writer: tokio::sync::Mutex<Option<JoinHandle<()>>>,
    reader: JoinHandle<()>,
}

impl WebSocketTransport {
    /// Connect to `url` and start the reader and writer tasks.
    ///
    /// Inbound envelopes are dispatched to `client`.
    pub async fn connect(url: &str, client: Client) -> Result<Self, ClientError> {
        let (ws_stream, _) = connect_async(url)
            .await
            .map_err(|e| ClientError::Connect(format!("{url}: {e}")))?;
        let (mut ws_sender, mut ws_receiver) = ws_stream.split();
        let (outbound, mut outbound_receiver) = mpsc::unbounded_channel::<Message>();

        let writer = tokio::spawn(async move {
            while let Some(message) = outbound_receiver.recv().await {
                let closing = message.is_close();
                if let Err(e) = ws_sender.send(message).await {
                    warn!("⚠️ Failed to write to relay: {}", e);
                    break;
                }
                if closing {
                    trace!("Close frame sent to relay");
                    break;
                }
            }
        });

        let reader = tokio::spawn(async move {
            while let Some(msg) = ws_receiver.next().await {
                match msg {
                    Ok(Message::Text(text)) => match Envelope::from_json(&text) {
                        Ok(envelope) => client.dispatch_inbound(&envelope),
                        Err(e) => warn!("⚠️ Ignoring malformed frame from relay: {}", e),
                    },
                    Ok(Message::Close(_)) => {
                        info!("🔌 Relay closed the connection");
                        break;
                    }
                    Err(e) => {
                        debug!("Relay connection error: {}", e);
                        break;
                    }
                    _ => {}
                }
            }
        });

        Ok(Self {
            outbound,
            writer: tokio::sync::Mutex::new(Some(writer)),
            reader,
        })
    }
}

#[async_trait]
impl Transport for WebSocketTransport {
    fn send(&self, frame: String) -> Result<(), ClientError> {
        self.outbound
            .send(Message::text(frame))
            .map_err(|_| ClientError::Closed)
    }

    async fn close(&self) {
        let _ = self.outbound.send(Message::Close(None));
        if let Some(writer) = self.writer.lock().await.take() {
            if let Err(e) = writer.await {
                debug!("Writer task ended abnormally: {}", e);
            }
        }
        self.reader.abort();
    }
}

impl Drop for WebSocketTransport {
    fn drop(&mut self) {
        self.reader.abort();
    }
}

/// In-memory transport that records every frame.
///
/// Useful for exercising plugins without a relay.
#[derive(Default)]
pub struct MemoryTransport {
    frames: Mutex<Vec<String>>,
    closed: AtomicBool,
}

impl MemoryTransport {
    /// Create an open, empty transport
    pub fn new() -> Self {
        Self::default()
    }

    /// Every frame written so far
    pub fn frames(&self) -> Vec<String> {
        self.frames.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Every frame written so far, decoded
    pub fn envelopes(&self) -> Vec<Envelope> {
        self.frames()
            .iter()
            .filter_map(|frame| Envelope::from_json(frame).ok())
            .collect()
    }

    /// Whether `close` was called
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }
}

#[async_trait]
impl Transport for MemoryTransport {
    fn send(&self, frame: String) -> Result<(), ClientError> {
        if self.is_closed() {
            return Err(ClientError::Closed);
        }
        self.frames.lock().unwrap_or_else(PoisonError::into_inner).push(frame);
        Ok(())
    }

    async fn close(&self) {
        self.closed.store(true, Ordering::Release);
    }
}
