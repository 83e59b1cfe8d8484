//! Reports completed state actions

use crate::client::Client;
use crate::context::PluginContext;
use crate::error::PluginError;
use crate::plugin::{Capability, Plugin};
use crate::utils::arg;
use serde_json::{json, Value};

/// Command type emitted for a completed state action
pub const STATE_ACTION_COMPLETE: &str = "state.action.complete";

/// Capability name
pub const STATE_ACTION_CAPABILITY: &str = "stateActionComplete";

/// Adds `stateActionComplete(name, action, ms)`, which sends
/// `state.action.complete` with `{name, action, ms}`.
///
/// `name` must be a string; the action object and duration are passed
/// through.
#[derive(Debug, Clone, Copy, Default)]
pub struct StateActionPlugin;

impl StateActionPlugin {
    fn report(context: &PluginContext, args: &[Value]) -> Result<(), PluginError> {
        let name = arg(args, 0);
        if !name.is_string() {
            return Err(PluginError::InvalidArguments {
                capability: STATE_ACTION_CAPABILITY.to_string(),
                reason: format!("action name must be a string, got {name}"),
            });
        }
        let payload = json!({ "name": name, "action": arg(args, 1), "ms": arg(args, 2) });
        context.send(STATE_ACTION_COMPLETE, payload)?;
        Ok(())
    }
}

impl Plugin for StateActionPlugin {
    fn name(&self) -> &str {
        "state-action"
    }

    fn capabilities(&self) -> Vec<Capability> {
        vec![Capability::new(STATE_ACTION_CAPABILITY, Self::report)]
    }
}

/// Typed access to the `stateActionComplete` capability
pub trait StateActionExt {
    /// Report that action `name` finished after `ms` milliseconds
    fn state_action_complete(&self, name: &str, action: Value, ms: u64) -> Result<(), PluginError>;
}

impl StateActionExt for Client {
    fn state_action_complete(&self, name: &str, action: Value, ms: u64) -> Result<(), PluginError> {
        self.invoke(STATE_ACTION_CAPABILITY, vec![json!(name), action, json!(ms)])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::MemoryTransport;
    use std::sync::Arc;

    #[test]
    fn test_state_action_payload() {
        let client = Client::default();
        client.use_plugin(StateActionPlugin).expect("add plugin");
        let transport = Arc::new(MemoryTransport::new());
        client.attach_transport(transport.clone()).expect("attach");

        client
            .state_action_complete("repo.receive", json!({ "type": "repo.receive", "count": 3 }), 4)
            .expect("capability");

        let sent = transport.envelopes();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].kind, "state.action.complete");
        assert_eq!(
            sent[0].payload,
            json!({ "name": "repo.receive", "action": { "type": "repo.receive", "count": 3 }, "ms": 4 })
        );
    }

    #[test]
    fn test_non_string_name_rejected() {
        let client = Client::default();
        client.use_plugin(StateActionPlugin).expect("add plugin");
        let transport = Arc::new(MemoryTransport::new());
        client.attach_transport(transport.clone()).expect("attach");

        let err = client
            .invoke("stateActionComplete", vec![json!(5), json!({}), json!(1)])
            .unwrap_err();
        assert!(matches!(err, PluginError::InvalidArguments { .. }));
        assert!(transport.frames().is_empty());
    }
}
