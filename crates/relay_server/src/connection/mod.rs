//! Connection management for client connections.
//!
//! This module tracks the live set of duplex connections, the metadata each
//! client announced about itself, and the outbound queue feeding each
//! connection's socket writer.

pub mod client;
pub mod manager;

pub use client::{ClientConnection, ConnectionInfo};
pub use manager::ConnectionManager;

/// Type alias for connection identifiers.
///
/// Identifiers are handed out by the [`ConnectionManager`] and are never
/// reused within one server value.
pub type ConnectionId = usize;
