//! # Core Type Definitions
//!
//! The envelope shapes exchanged between clients, the relay and observers.
//!
//! - [`Envelope`] - what a client sends, and what the relay broadcasts
//! - [`Command`] - an envelope the relay has sequenced into its history
//! - [`ClientIntro`] - metadata a client announces about itself

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Server-assigned sequence number of an inbound command.
///
/// Starts at 1 and increases by exactly one per recorded command.
pub type MessageId = u64;

/// Errors raised while decoding frames off the wire.
#[derive(Debug, thiserror::Error)]
pub enum WireError {
    /// The frame was not a JSON object with the expected fields
    #[error("Invalid envelope JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),

    /// The frame carried an empty `type`
    #[error("Envelope type must not be empty")]
    EmptyType,
}

/// The unit of communication: a type tag and an arbitrary payload.
///
/// Type tags are namespaced by convention (`state.action.complete`,
/// `api.response`). A frame without a `payload` decodes with `Value::Null`.
///
/// # Examples
///
/// ```rust
/// use command_bus::Envelope;
/// use serde_json::json;
///
/// let envelope = Envelope::new("log", json!({ "level": "debug", "message": "hi" }));
/// let text = envelope.to_json()?;
/// assert_eq!(Envelope::from_json(&text)?, envelope);
/// # Ok::<(), command_bus::WireError>(())
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    /// Namespaced command type
    #[serde(rename = "type")]
    pub kind: String,

    /// Structured command body
    #[serde(default)]
    pub payload: Value,
}

impl Envelope {
    /// Creates an envelope from a type tag and payload.
    pub fn new(kind: impl Into<String>, payload: Value) -> Self {
        Self {
            kind: kind.into(),
            payload,
        }
    }

    /// Decodes one text frame.
    pub fn from_json(text: &str) -> Result<Self, WireError> {
        let envelope: Envelope = serde_json::from_str(text)?;
        if envelope.kind.is_empty() {
            return Err(WireError::EmptyType);
        }
        Ok(envelope)
    }

    /// Encodes the envelope as a text frame.
    pub fn to_json(&self) -> Result<String, WireError> {
        Ok(serde_json::to_string(self)?)
    }
}

/// An inbound envelope after the relay stamped it.
///
/// `message_id` and `date` are server metadata and are absent from what the
/// client originally sent. Once stamped a command is never renumbered.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Command {
    /// Namespaced command type, copied from the envelope
    #[serde(rename = "type")]
    pub kind: String,

    /// Command body, copied from the envelope
    pub payload: Value,

    /// Position of this command in the server-wide order
    pub message_id: MessageId,

    /// When the relay received the command
    pub date: DateTime<Utc>,
}

impl Command {
    /// Stamps an envelope with its sequence number and receipt time.
    pub fn stamp(envelope: Envelope, message_id: MessageId, date: DateTime<Utc>) -> Self {
        Self {
            kind: envelope.kind,
            payload: envelope.payload,
            message_id,
            date,
        }
    }

    /// Strips the server metadata again.
    pub fn envelope(&self) -> Envelope {
        Envelope::new(self.kind.clone(), self.payload.clone())
    }

    /// Encodes the stamped command for observers.
    pub fn to_json(&self) -> Result<String, WireError> {
        Ok(serde_json::to_string(self)?)
    }
}

/// Handshake metadata a client sends in its `client.intro` command.
///
/// Every field is optional; unknown fields are ignored.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientIntro {
    /// Human readable application name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Runtime or platform description of the client
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_agent: Option<String>,

    /// Version of the client library
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
}

impl ClientIntro {
    /// Reads intro metadata from a command payload.
    ///
    /// Malformed payloads yield an empty intro rather than an error, since the
    /// handshake only ever enriches a connection record.
    pub fn from_payload(payload: &Value) -> Self {
        serde_json::from_value(payload.clone()).unwrap_or_default()
    }

    /// Encodes the intro as a command payload.
    pub fn to_payload(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_envelope_uses_type_key_on_the_wire() {
        let envelope = Envelope::new("api.response", json!({ "duration": 12 }));
        let text = envelope.to_json().unwrap();
        let raw: Value = serde_json::from_str(&text).unwrap();

        assert_eq!(raw["type"], "api.response");
        assert_eq!(raw["payload"]["duration"], 12);
    }

    #[test]
    fn test_missing_payload_decodes_as_null() {
        let envelope = Envelope::from_json(r#"{"type":"clear"}"#).unwrap();
        assert_eq!(envelope.kind, "clear");
        assert_eq!(envelope.payload, Value::Null);
    }

    #[test]
    fn test_rejects_missing_or_empty_type() {
        assert!(matches!(
            Envelope::from_json(r#"{"payload":{}}"#),
            Err(WireError::InvalidJson(_))
        ));
        assert!(matches!(
            Envelope::from_json(r#"{"type":"","payload":{}}"#),
            Err(WireError::EmptyType)
        ));
        assert!(Envelope::from_json("not json").is_err());
    }

    #[test]
    fn test_stamped_command_carries_server_metadata() {
        let date = Utc::now();
        let command = Command::stamp(Envelope::new("log", json!({ "message": "x" })), 7, date);
        let raw: Value = serde_json::from_str(&command.to_json().unwrap()).unwrap();

        assert_eq!(raw["type"], "log");
        assert_eq!(raw["messageId"], 7);
        assert!(raw["date"].is_string());
        assert_eq!(command.envelope(), Envelope::new("log", json!({ "message": "x" })));
    }

    #[test]
    fn test_client_intro_reads_camel_case_fields() {
        let intro = ClientIntro::from_payload(&json!({
            "name": "React Native Demo",
            "userAgent": "ios",
            "version": "1.2.0",
            "extra": true
        }));

        assert_eq!(intro.name.as_deref(), Some("React Native Demo"));
        assert_eq!(intro.user_agent.as_deref(), Some("ios"));
        assert_eq!(intro.version.as_deref(), Some("1.2.0"));
    }

    #[test]
    fn test_client_intro_tolerates_garbage() {
        assert_eq!(ClientIntro::from_payload(&json!("nope")), ClientIntro::default());
        assert_eq!(ClientIntro::from_payload(&json!({ "version": 3 })), ClientIntro::default());
    }
}
