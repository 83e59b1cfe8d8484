//! Plugin context handed to hooks and capabilities

use crate::client::{Client, ClientOptions, Delivery};
use crate::error::PluginError;
use serde_json::Value;

/// Access to the client from inside a hook or capability.
///
/// The context is cheap to create and is built fresh for every invocation.
/// A context handed to `on_connect` hooks sends ahead of the queued frames,
/// and so does every capability it invokes.
#[derive(Clone)]
pub struct PluginContext {
    client: Client,
    connecting: bool,
}

impl PluginContext {
    pub(crate) fn new(client: Client) -> Self {
        Self { client, connecting: false }
    }

    pub(crate) fn connecting(client: Client) -> Self {
        Self { client, connecting: true }
    }

    /// Send a command through the client's full send pipeline
    pub fn send(&self, kind: &str, payload: Value) -> Result<Delivery, PluginError> {
        Ok(self.client.route(kind, payload, self.connecting)?)
    }

    /// Invoke another capability
    pub fn invoke(&self, name: &str, args: Vec<Value>) -> Result<(), PluginError> {
        self.client.invoke_with(name, args, self)
    }

    /// The identity the client announces
    pub fn options(&self) -> &ClientOptions {
        self.client.options()
    }

    /// The client this context belongs to
    pub fn client(&self) -> &Client {
        &self.client
    }
}
