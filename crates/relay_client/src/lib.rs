//! # Relay Client
//!
//! The client half of the debugging command bus. An instrumented
//! application creates a [`Client`], composes it from plugins, and connects
//! it to a relay. Plugins contribute named capabilities (for example
//! `apiResponse`) and observe the client through three hooks:
//!
//! - `on_connect`: the transport is ready; queued commands flush right after
//! - `on_command`: an envelope arrived from the relay
//! - `before_send`: an outbound envelope may be rewritten or suppressed
//!
//! Hooks run in plugin registration order. A hook or capability that fails
//! or panics is logged and isolated; it never takes the client down.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use relay_client::*;
//! use serde_json::json;
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let client = Client::new(ClientOptions::new("React Native Demo"));
//! client
//!     .use_plugin(ClientIntroPlugin)?
//!     .use_plugin(ApiResponsePlugin)?
//!     .use_plugin(LoggerPlugin)?;
//!
//! // Queued until the connection is up
//! client.log("booting")?;
//!
//! client.connect("ws://127.0.0.1:9090").await?;
//! client.api_response(json!({ "url": "/repos" }), json!({ "status": 200 }), 38)?;
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod context;
pub mod error;
pub mod manager;
pub mod plugin;
pub mod plugins;
pub mod transport;
pub mod utils;

// Re-exports for convenience
pub use client::{Client, ClientOptions, Delivery};
pub use context::PluginContext;
pub use error::{ClientError, PluginError};
pub use manager::PluginManager;
pub use plugin::{Capability, CapabilityHandler, Disposition, Plugin};
pub use plugins::{
    ApiResponseExt, ApiResponsePlugin, ClientIntroPlugin, LoggerExt, LoggerPlugin, StateActionExt,
    StateActionPlugin,
};
pub use transport::{MemoryTransport, Transport, WebSocketTransport};

#[cfg(test)]
mod tests;
