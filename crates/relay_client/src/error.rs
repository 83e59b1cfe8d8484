//! Error types for the client and its plugins

use command_bus::WireError;

/// Errors raised by plugins, their hooks and their capabilities.
///
/// A hook or capability failure is always isolated to the invocation that
/// raised it; the client logs it and carries on.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PluginError {
    /// A plugin with the same name is already installed
    #[error("Plugin already exists: {0}")]
    AlreadyExists(String),

    /// No installed plugin provides the capability
    #[error("Capability not found: {0}")]
    CapabilityNotFound(String),

    /// The capability was called with arguments it cannot use
    #[error("Invalid arguments for {capability}: {reason}")]
    InvalidArguments {
        /// Name of the capability
        capability: String,
        /// What was wrong with the arguments
        reason: String,
    },

    /// A hook or capability reported a failure
    #[error("Plugin failure: {0}")]
    Failed(String),

    /// A hook or capability panicked
    #[error("Plugin panicked: {0}")]
    Panicked(String),

    /// Sending from inside a hook or capability failed
    #[error("Send failed: {0}")]
    Send(String),
}

/// Errors raised by the client's send pipeline and transports.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// The relay could not be reached
    #[error("Connection failed: {0}")]
    Connect(String),

    /// The transport is gone; the frame was not written
    #[error("Transport closed")]
    Closed,

    /// An outbound envelope could not be encoded
    #[error("Wire error: {0}")]
    Wire(#[from] WireError),
}

impl From<ClientError> for PluginError {
    fn from(err: ClientError) -> Self {
        PluginError::Send(err.to_string())
    }
}

impl From<serde_json::Error> for ClientError {
    fn from(err: serde_json::Error) -> Self {
        ClientError::Wire(WireError::InvalidJson(err))
    }
}
