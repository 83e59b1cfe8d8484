//! # Command Bus
//!
//! Shared vocabulary for the debugging command bus. An instrumented
//! application streams [`Envelope`]s to the relay server, which stamps each
//! one into a [`Command`] carrying a server-assigned `messageId` and receipt
//! date before handing it to observers.
//!
//! ## Key Types
//!
//! - [`Envelope`] - the `{type, payload}` unit exchanged on the wire
//! - [`Command`] - an inbound envelope after the relay sequenced it
//! - [`ClientIntro`] - the one-time handshake payload describing a client
//! - [`ShutdownState`] - cross-task shutdown coordination
//!
//! ## Wire Format
//!
//! Every frame is a single JSON object:
//!
//! ```json
//! { "type": "api.response", "payload": { "request": {}, "response": {}, "duration": 12 } }
//! ```
//!
//! Stamped commands relayed to observers additionally carry `messageId` and
//! `date`.

pub mod shutdown;
pub mod types;
pub mod utils;

pub use shutdown::ShutdownState;
pub use types::{ClientIntro, Command, Envelope, MessageId, WireError};
pub use utils::now;

/// Command type sent by clients once their connection is ready.
pub const CLIENT_INTRO: &str = "client.intro";
