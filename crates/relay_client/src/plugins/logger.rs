//! Free-form log messages

use crate::client::Client;
use crate::context::PluginContext;
use crate::error::PluginError;
use crate::plugin::{Capability, Plugin};
use crate::utils::message_of;
use serde_json::{json, Value};

/// Command type emitted for log messages
pub const LOG: &str = "log";

/// Capability name and the level it reports
const LEVELS: [(&str, &str); 4] = [("log", "debug"), ("debug", "debug"), ("warn", "warn"), ("error", "error")];

/// Adds the `log`, `debug`, `warn` and `error` capabilities.
///
/// Each sends a `log` command with `{level, message}`. A single argument is
/// the message; several arguments are sent together as an array.
#[derive(Debug, Clone, Copy, Default)]
pub struct LoggerPlugin;

impl Plugin for LoggerPlugin {
    fn name(&self) -> &str {
        "logger"
    }

    fn capabilities(&self) -> Vec<Capability> {
        LEVELS
            .iter()
            .map(|&(capability, level)| {
                Capability::new(capability, move |context: &PluginContext, args: &[Value]| {
                    context.send(LOG, json!({ "level": level, "message": message_of(args) }))?;
                    Ok(())
                })
            })
            .collect()
    }
}

/// Typed access to the logger capabilities
pub trait LoggerExt {
    /// Log at debug level
    fn log(&self, message: impl Into<Value>) -> Result<(), PluginError>;
    /// Log at debug level through the `debug` capability
    fn debug(&self, message: impl Into<Value>) -> Result<(), PluginError>;
    /// Log a warning
    fn warn(&self, message: impl Into<Value>) -> Result<(), PluginError>;
    /// Log an error
    fn error(&self, message: impl Into<Value>) -> Result<(), PluginError>;
}

impl LoggerExt for Client {
    fn log(&self, message: impl Into<Value>) -> Result<(), PluginError> {
        self.invoke("log", vec![message.into()])
    }

    fn debug(&self, message: impl Into<Value>) -> Result<(), PluginError> {
        self.invoke("debug", vec![message.into()])
    }

    fn warn(&self, message: impl Into<Value>) -> Result<(), PluginError> {
        self.invoke("warn", vec![message.into()])
    }

    fn error(&self, message: impl Into<Value>) -> Result<(), PluginError> {
        self.invoke("error", vec![message.into()])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::MemoryTransport;
    use std::sync::Arc;

    #[test]
    fn test_levels() {
        let client = Client::default();
        client.use_plugin(LoggerPlugin).expect("add plugin");
        let transport = Arc::new(MemoryTransport::new());
        client.attach_transport(transport.clone()).expect("attach");

        client.log("hello").expect("log");
        client.warn("careful").expect("warn");
        client.error(json!({ "code": 7 })).expect("error");
        client.invoke("debug", vec![json!("a"), json!(1)]).expect("debug");
        client.debug("detail").expect("debug");

        let sent: Vec<Value> = transport.envelopes().into_iter().map(|e| e.payload).collect();
        assert_eq!(
            sent,
            vec![
                json!({ "level": "debug", "message": "hello" }),
                json!({ "level": "warn", "message": "careful" }),
                json!({ "level": "error", "message": { "code": 7 } }),
                json!({ "level": "debug", "message": ["a", 1] }),
                json!({ "level": "debug", "message": "detail" }),
            ]
        );
    }
}
