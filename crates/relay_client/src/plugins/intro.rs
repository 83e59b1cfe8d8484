//! Announces the client to the relay

use crate::context::PluginContext;
use crate::error::PluginError;
use crate::plugin::Plugin;
use command_bus::{ClientIntro, CLIENT_INTRO};

/// Sends `client.intro` with the client's name, user agent and version as
/// soon as the transport is ready, ahead of any queued commands.
#[derive(Debug, Clone, Copy, Default)]
pub struct ClientIntroPlugin;

impl Plugin for ClientIntroPlugin {
    fn name(&self) -> &str {
        "client-intro"
    }

    fn on_connect(&self, context: &PluginContext) -> Result<(), PluginError> {
        let options = context.options();
        let intro = ClientIntro {
            name: Some(options.name.clone()),
            user_agent: options.user_agent.clone(),
            version: options.version.clone(),
        };
        context.send(CLIENT_INTRO, intro.to_payload())?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::{Client, ClientOptions, Delivery};
    use crate::transport::MemoryTransport;
    use serde_json::json;
    use std::sync::Arc;

    #[test]
    fn test_intro_goes_out_before_queued_commands() {
        let client = Client::new(
            ClientOptions::new("React Native Demo")
                .with_user_agent("rust-test")
                .with_version("0.1.0"),
        );
        client.use_plugin(ClientIntroPlugin).expect("add plugin");

        assert_eq!(client.send("log", json!({ "message": "early" })).expect("send"), Delivery::Queued);

        let transport = Arc::new(MemoryTransport::new());
        assert_eq!(client.attach_transport(transport.clone()).expect("attach"), 1);

        let sent = transport.envelopes();
        assert_eq!(sent.len(), 2);
        assert_eq!(sent[0].kind, "client.intro");
        assert_eq!(
            sent[0].payload,
            json!({ "name": "React Native Demo", "userAgent": "rust-test", "version": "0.1.0" })
        );
        assert_eq!(sent[1].kind, "log");
    }
}
