//! Plugin manager: installed plugins, the capability registry and hook dispatch

use crate::context::PluginContext;
use crate::error::PluginError;
use crate::plugin::{CapabilityHandler, Disposition, Plugin};
use crate::utils::isolate;
use command_bus::Envelope;
use dashmap::DashMap;
use std::sync::{Arc, PoisonError, RwLock};
use tracing::{debug, error, info, warn};

/// A capability and the plugin that installed it
struct RegisteredCapability {
    plugin: String,
    handler: CapabilityHandler,
}

/// Holds the installed plugins in registration order and the capabilities
/// they contributed.
///
/// Capabilities are resolved by name at call time. When two plugins
/// contribute the same capability name, the one added last wins.
pub struct PluginManager {
    /// Installed plugins, in registration order
    plugins: RwLock<Vec<Arc<dyn Plugin>>>,
    /// Capability name to handler
    capabilities: DashMap<String, RegisteredCapability>,
}

impl Default for PluginManager {
    fn default() -> Self {
        Self::new()
    }
}

impl PluginManager {
    /// Create an empty plugin manager
    pub fn new() -> Self {
        Self {
            plugins: RwLock::new(Vec::new()),
            capabilities: DashMap::new(),
        }
    }

    /// Install a plugin and its capabilities.
    ///
    /// # Returns
    ///
    /// [`PluginError::AlreadyExists`] if a plugin with the same name is
    /// installed; nothing is changed in that case.
    pub fn add_plugin(&self, plugin: Arc<dyn Plugin>) -> Result<(), PluginError> {
        let mut plugins = self.plugins.write().unwrap_or_else(PoisonError::into_inner);
        let plugin_name = plugin.name().to_string();

        if plugins.iter().any(|p| p.name() == plugin_name) {
            return Err(PluginError::AlreadyExists(plugin_name));
        }

        let capabilities = isolate(|| Ok(plugin.capabilities())).map_err(|e| {
            error!("❌ Plugin {} failed to list its capabilities: {}", plugin_name, e);
            e
        })?;

        for capability in capabilities {
            let registered = RegisteredCapability {
                plugin: plugin_name.clone(),
                handler: capability.handler,
            };
            if let Some(previous) = self.capabilities.insert(capability.name.clone(), registered) {
                warn!(
                    "⚠️ Capability '{}' from plugin {} replaced by plugin {}",
                    capability.name, previous.plugin, plugin_name
                );
            }
        }

        plugins.push(plugin);
        info!("🔌 Plugin added: {}", plugin_name);
        Ok(())
    }

    /// Get the number of installed plugins
    pub fn plugin_count(&self) -> usize {
        self.plugins.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Names of the installed plugins, in registration order
    pub fn plugin_names(&self) -> Vec<String> {
        self.snapshot().iter().map(|p| p.name().to_string()).collect()
    }

    /// Check if a plugin with the given name is installed
    pub fn is_plugin_loaded(&self, plugin_name: &str) -> bool {
        self.snapshot().iter().any(|p| p.name() == plugin_name)
    }

    /// Names of every installed capability, sorted
    pub fn capability_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.capabilities.iter().map(|entry| entry.key().clone()).collect();
        names.sort();
        names
    }

    /// Check if some plugin provides `name`
    pub fn has_capability(&self, name: &str) -> bool {
        self.capabilities.contains_key(name)
    }

    /// The plugin that currently provides `name`
    pub fn capability_owner(&self, name: &str) -> Option<String> {
        self.capabilities.get(name).map(|entry| entry.plugin.clone())
    }

    /// Look up the handler for `name`.
    ///
    /// The handler is cloned out so no registry lock is held while it runs.
    pub fn capability(&self, name: &str) -> Option<CapabilityHandler> {
        self.capabilities.get(name).map(|entry| entry.handler.clone())
    }

    /// Run every `on_connect` hook in registration order
    pub fn run_on_connect(&self, context: &PluginContext) {
        for plugin in self.snapshot() {
            if let Err(e) = isolate(|| plugin.on_connect(context)) {
                error!("❌ on_connect hook of plugin {} failed: {}", plugin.name(), e);
            }
        }
    }

    /// Run every `on_command` hook in registration order
    pub fn run_on_command(&self, context: &PluginContext, command: &Envelope) {
        for plugin in self.snapshot() {
            if let Err(e) = isolate(|| plugin.on_command(context, command)) {
                error!(
                    "❌ on_command hook of plugin {} failed on '{}': {}",
                    plugin.name(),
                    command.kind,
                    e
                );
            }
        }
    }

    /// Run every `before_send` hook in registration order.
    ///
    /// A failing hook leaves the envelope as it was before that hook ran.
    /// The first hook to suppress ends the chain.
    pub fn run_before_send(&self, envelope: &mut Envelope) -> Disposition {
        for plugin in self.snapshot() {
            let before = envelope.clone();
            match isolate(|| plugin.before_send(envelope)) {
                Ok(Disposition::Send) => {}
                Ok(Disposition::Suppress) => {
                    debug!("🔇 Plugin {} suppressed '{}'", plugin.name(), envelope.kind);
                    return Disposition::Suppress;
                }
                Err(e) => {
                    error!(
                        "❌ before_send hook of plugin {} failed on '{}': {}",
                        plugin.name(),
                        before.kind,
                        e
                    );
                    *envelope = before;
                }
            }
        }
        Disposition::Send
    }

    /// Copy of the plugin list so hooks run without holding the lock
    fn snapshot(&self) -> Vec<Arc<dyn Plugin>> {
        self.plugins.read().unwrap_or_else(PoisonError::into_inner).clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plugin::Capability;
    use serde_json::json;

    struct Named {
        name: &'static str,
        capabilities: Vec<&'static str>,
    }

    impl Plugin for Named {
        fn name(&self) -> &str {
            self.name
        }

        fn capabilities(&self) -> Vec<Capability> {
            self.capabilities.iter().map(|c| Capability::new(*c, |_, _| Ok(()))).collect()
        }
    }

    struct Rewriter(&'static str);

    impl Plugin for Rewriter {
        fn name(&self) -> &str {
            self.0
        }

        fn before_send(&self, envelope: &mut Envelope) -> Result<Disposition, PluginError> {
            envelope.payload["seen"] = json!(self.0);
            Ok(Disposition::Send)
        }
    }

    struct HalfRewriteThenFail;

    impl Plugin for HalfRewriteThenFail {
        fn name(&self) -> &str {
            "half"
        }

        fn before_send(&self, envelope: &mut Envelope) -> Result<Disposition, PluginError> {
            envelope.kind = "garbled".to_string();
            Err(PluginError::Failed("gave up".to_string()))
        }
    }

    #[test]
    fn test_duplicate_plugin_name_rejected() {
        let manager = PluginManager::new();
        manager
            .add_plugin(Arc::new(Named { name: "a", capabilities: vec!["one"] }))
            .expect("first add");

        let err = manager
            .add_plugin(Arc::new(Named { name: "a", capabilities: vec!["two"] }))
            .unwrap_err();
        assert_eq!(err, PluginError::AlreadyExists("a".to_string()));
        assert_eq!(manager.plugin_count(), 1);
        assert!(!manager.has_capability("two"));
    }

    #[test]
    fn test_last_registered_capability_wins() {
        let manager = PluginManager::new();
        manager
            .add_plugin(Arc::new(Named { name: "first", capabilities: vec!["shared", "only_first"] }))
            .expect("add first");
        manager
            .add_plugin(Arc::new(Named { name: "second", capabilities: vec!["shared"] }))
            .expect("add second");

        assert_eq!(manager.capability_owner("shared").as_deref(), Some("second"));
        assert_eq!(manager.capability_owner("only_first").as_deref(), Some("first"));
        assert_eq!(manager.capability_names(), vec!["only_first", "shared"]);
        assert_eq!(manager.plugin_names(), vec!["first", "second"]);
    }

    #[test]
    fn test_before_send_runs_in_order_and_rolls_back_failures() {
        let manager = PluginManager::new();
        manager.add_plugin(Arc::new(Rewriter("one"))).expect("add");
        manager.add_plugin(Arc::new(HalfRewriteThenFail)).expect("add");
        manager.add_plugin(Arc::new(Rewriter("three"))).expect("add");

        let mut envelope = Envelope::new("log", json!({}));
        assert_eq!(manager.run_before_send(&mut envelope), Disposition::Send);
        assert_eq!(envelope.kind, "log");
        assert_eq!(envelope.payload["seen"], "three");
    }
}
