//! The client: plugin host, send pipeline and transport attachment

use crate::context::PluginContext;
use crate::error::{ClientError, PluginError};
use crate::manager::PluginManager;
use crate::plugin::{Disposition, Plugin};
use crate::transport::{Transport, WebSocketTransport};
use crate::utils::isolate;
use command_bus::Envelope;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, PoisonError};
use tracing::{debug, error, info, warn};

/// Identity a client announces to the relay.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientOptions {
    /// Human-readable application name
    pub name: String,
    /// Runtime or platform identifier
    pub user_agent: Option<String>,
    /// Application version
    pub version: Option<String>,
}

impl ClientOptions {
    /// Options with just an application name
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Set the user agent
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = Some(user_agent.into());
        self
    }

    /// Set the version
    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = Some(version.into());
        self
    }
}

/// Outcome of [`Client::send`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// Written to the transport
    Sent,
    /// Held until a transport is attached
    Queued,
    /// Dropped by a `before_send` hook
    Suppressed,
}

/// Transport state and frames waiting for one
#[derive(Default)]
struct Link {
    transport: Option<Arc<dyn Transport>>,
    /// Set while the `on_connect` hooks of an attach are running
    connecting: bool,
    /// Frames sent by `on_connect` hooks; they go out before `pending`
    greeting: VecDeque<String>,
    pending: VecDeque<String>,
}

struct ClientInner {
    options: ClientOptions,
    plugins: PluginManager,
    link: Mutex<Link>,
}

/// A debugging client.
///
/// `Client` is a cheap, cloneable handle. Plugins are added with
/// [`Client::use_plugin`]; their capabilities are invoked by name with
/// [`Client::invoke`]. Everything a plugin or the application sends goes
/// through [`Client::send`], which runs the `before_send` hooks and then
/// either writes the frame or queues it until a transport is attached.
///
/// # Examples
///
/// ```rust,no_run
/// use relay_client::{ApiResponseExt, ApiResponsePlugin, Client, ClientIntroPlugin, ClientOptions};
/// use serde_json::json;
///
/// # async fn run() -> Result<(), Box<dyn std::error::Error>> {
/// let client = Client::new(ClientOptions::new("Demo App"));
/// client.use_plugin(ClientIntroPlugin)?.use_plugin(ApiResponsePlugin)?;
/// client.connect("ws://127.0.0.1:9090").await?;
/// client.api_response(json!({ "url": "/users" }), json!({ "status": 200 }), 12)?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct Client {
    inner: Arc<ClientInner>,
}

impl Default for Client {
    fn default() -> Self {
        Self::new(ClientOptions::default())
    }
}

impl Client {
    /// Create a disconnected client with no plugins
    pub fn new(options: ClientOptions) -> Self {
        Self {
            inner: Arc::new(ClientInner {
                options,
                plugins: PluginManager::new(),
                link: Mutex::new(Link::default()),
            }),
        }
    }

    /// The identity this client announces
    pub fn options(&self) -> &ClientOptions {
        &self.inner.options
    }

    /// The installed plugins and capabilities
    pub fn plugins(&self) -> &PluginManager {
        &self.inner.plugins
    }

    /// Add a plugin. Chainable.
    pub fn use_plugin<P: Plugin>(&self, plugin: P) -> Result<&Self, PluginError> {
        self.add_plugin(Arc::new(plugin))?;
        Ok(self)
    }

    /// Add a shared plugin instance
    pub fn add_plugin(&self, plugin: Arc<dyn Plugin>) -> Result<(), PluginError> {
        self.inner.plugins.add_plugin(plugin)
    }

    /// Invoke a capability by name.
    ///
    /// The handler runs isolated: a panic is reported as
    /// [`PluginError::Panicked`] and the client stays usable.
    pub fn invoke(&self, name: &str, args: Vec<Value>) -> Result<(), PluginError> {
        self.invoke_with(name, args, &self.context())
    }

    pub(crate) fn invoke_with(&self, name: &str, args: Vec<Value>, context: &PluginContext) -> Result<(), PluginError> {
        let handler = self
            .inner
            .plugins
            .capability(name)
            .ok_or_else(|| PluginError::CapabilityNotFound(name.to_string()))?;

        isolate(|| handler(context, &args)).map_err(|e| {
            error!("❌ Capability '{}' failed: {}", name, e);
            e
        })
    }

    /// Send a command to the relay.
    ///
    /// While a transport is being attached, sends are queued behind the
    /// frames already waiting so the relay sees them in call order.
    ///
    /// # Returns
    ///
    /// Whether the frame was written, queued for a later transport, or
    /// suppressed by a plugin.
    pub fn send(&self, kind: &str, payload: Value) -> Result<Delivery, ClientError> {
        self.route(kind, payload, false)
    }

    /// The send pipeline; `from_on_connect` marks sends made by `on_connect`
    /// hooks, which jump ahead of the queue during an attach.
    pub(crate) fn route(&self, kind: &str, payload: Value, from_on_connect: bool) -> Result<Delivery, ClientError> {
        let mut envelope = Envelope::new(kind, payload);
        if self.inner.plugins.run_before_send(&mut envelope) == Disposition::Suppress {
            return Ok(Delivery::Suppressed);
        }
        let frame = envelope.to_json()?;

        // Written under the lock so a concurrent flush cannot interleave
        let mut link = self.lock_link();
        if link.connecting {
            if from_on_connect {
                link.greeting.push_back(frame);
            } else {
                link.pending.push_back(frame);
            }
            debug!("📥 Holding '{}' until the attach completes", envelope.kind);
            return Ok(Delivery::Queued);
        }
        if let Some(transport) = link.transport.clone() {
            transport.send(frame)?;
            return Ok(Delivery::Sent);
        }
        link.pending.push_back(frame);
        debug!("📥 Queued '{}' until a transport is attached", envelope.kind);
        Ok(Delivery::Queued)
    }

    /// Attach a ready transport.
    ///
    /// Runs the `on_connect` hooks, then writes what they sent followed by
    /// the queued frames in order. The transport only becomes visible to
    /// other senders once the flush is done, under the same lock.
    ///
    /// # Returns
    ///
    /// The number of queued frames that were flushed, not counting frames
    /// sent by the hooks. If the transport fails mid-flush, the unsent
    /// frames stay queued and the client stays disconnected.
    pub fn attach_transport(&self, transport: Arc<dyn Transport>) -> Result<usize, ClientError> {
        {
            let mut link = self.lock_link();
            link.transport = None;
            link.connecting = true;
        }

        self.inner
            .plugins
            .run_on_connect(&PluginContext::connecting(self.clone()));

        let mut link = self.lock_link();
        link.connecting = false;
        let greeting = std::mem::take(&mut link.greeting);
        let greeting_len = greeting.len();
        for frame in greeting.into_iter().rev() {
            link.pending.push_front(frame);
        }

        let mut written: usize = 0;
        while let Some(frame) = link.pending.pop_front() {
            if let Err(e) = transport.send(frame.clone()) {
                link.pending.push_front(frame);
                warn!("⚠️ Flush stopped with {} frame(s) still queued: {}", link.pending.len(), e);
                return Err(e);
            }
            written += 1;
        }
        link.transport = Some(transport);

        let flushed = written.saturating_sub(greeting_len);
        if flushed > 0 {
            info!("📤 Flushed {} queued command(s)", flushed);
        }
        Ok(flushed)
    }

    /// Detach the current transport; later sends are queued again
    pub fn detach_transport(&self) -> Option<Arc<dyn Transport>> {
        self.lock_link().transport.take()
    }

    /// Whether a transport is attached
    pub fn is_connected(&self) -> bool {
        self.lock_link().transport.is_some()
    }

    /// Number of frames waiting for a transport
    pub fn pending_len(&self) -> usize {
        self.lock_link().pending.len()
    }

    /// Hand an envelope received from the relay to every `on_command` hook
    pub fn dispatch_inbound(&self, command: &Envelope) {
        debug!("📨 Received '{}' from relay", command.kind);
        self.inner.plugins.run_on_command(&self.context(), command);
    }

    /// Connect to a relay over WebSocket and attach the connection.
    pub async fn connect(&self, url: &str) -> Result<(), ClientError> {
        let transport = WebSocketTransport::connect(url, self.clone()).await?;
        info!("🔗 Connected to relay at {}", url);
        self.attach_transport(Arc::new(transport))?;
        Ok(())
    }

    /// Detach and close the current transport, if any
    pub async fn disconnect(&self) {
        if let Some(transport) = self.detach_transport() {
            transport.close().await;
            info!("👋 Disconnected from relay");
        }
    }

    fn context(&self) -> PluginContext {
        PluginContext::new(self.clone())
    }

    fn lock_link(&self) -> std::sync::MutexGuard<'_, Link> {
        self.inner.link.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
