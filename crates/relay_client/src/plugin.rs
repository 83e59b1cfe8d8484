//! Plugin trait definitions and capability handlers

use crate::context::PluginContext;
use crate::error::PluginError;
use command_bus::Envelope;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;

/// What a `before_send` hook decided about an outbound envelope.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// Pass the (possibly rewritten) envelope on
    Send,
    /// Drop the envelope; later hooks do not see it
    Suppress,
}

/// Handler behind a named capability.
///
/// Receives the invocation context and the positional arguments the caller
/// passed to [`Client::invoke`](crate::Client::invoke).
pub type CapabilityHandler = Arc<dyn Fn(&PluginContext, &[Value]) -> Result<(), PluginError> + Send + Sync>;

/// A named operation a plugin adds to the client.
#[derive(Clone)]
pub struct Capability {
    /// Name the capability is invoked by
    pub name: String,
    /// The operation itself
    pub handler: CapabilityHandler,
}

impl Capability {
    /// Create a capability from a closure
    pub fn new<F>(name: impl Into<String>, handler: F) -> Self
    where
        F: Fn(&PluginContext, &[Value]) -> Result<(), PluginError> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            handler: Arc::new(handler),
        }
    }
}

impl fmt::Debug for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Capability").field("name", &self.name).finish_non_exhaustive()
    }
}

/// A client plugin.
///
/// Plugins contribute named capabilities and observe the client through
/// three hooks, each called in plugin registration order. Every hook has a
/// no-op default, so a plugin only implements what it needs.
///
/// Hooks run on the caller's thread and must not block. A hook that returns
/// an error or panics is logged and skipped; it never stops the other
/// plugins or the client.
pub trait Plugin: Send + Sync + 'static {
    /// Unique name of this plugin
    fn name(&self) -> &str;

    /// Capabilities installed when the plugin is added
    fn capabilities(&self) -> Vec<Capability> {
        Vec::new()
    }

    /// Called once the transport is ready, before queued sends are flushed
    fn on_connect(&self, _context: &PluginContext) -> Result<(), PluginError> {
        Ok(())
    }

    /// Called with every envelope received from the relay
    fn on_command(&self, _context: &PluginContext, _command: &Envelope) -> Result<(), PluginError> {
        Ok(())
    }

    /// Called with every outbound envelope before it is written.
    ///
    /// The hook may rewrite the envelope in place. If it fails, any partial
    /// rewrite is discarded.
    fn before_send(&self, _envelope: &mut Envelope) -> Result<Disposition, PluginError> {
        Ok(Disposition::Send)
    }
}
