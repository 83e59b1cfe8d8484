//! Server configuration types, defaults and validation.
//!
//! The relay keeps one merged [`ServerConfig`]. Callers change it by handing
//! a partial [`ServerOptions`] to `RelayServer::configure`, which merges the
//! options over the current configuration and runs [`validate`] on the
//! result. Only a configuration that passes validation is ever applied.

use crate::connection::ConnectionInfo;
use crate::error::ConfigError;
use command_bus::Command;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

/// Default listen port.
pub const DEFAULT_PORT: u16 = 9090;

/// Default per-connection outbound queue length.
pub const DEFAULT_OUTBOUND_QUEUE: usize = 1024;

/// Handler for every stamped inbound command.
pub type CommandCallback = Arc<dyn Fn(&Command) + Send + Sync>;

/// Handler for connection lifecycle notifications.
pub type ConnectionCallback = Arc<dyn Fn(&ConnectionInfo) + Send + Sync>;

/// Handler for server start and stop notifications.
pub type LifecycleCallback = Arc<dyn Fn() + Send + Sync>;

/// A port as it arrives from a configuration source.
///
/// Configuration files and JSON documents may carry a port as a number or,
/// mistakenly, as a string. Only numbers in `0..=65535` validate; `0` asks
/// the OS for an ephemeral port.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PortValue {
    /// A numeric port
    Number(i64),
    /// A non-numeric value that was supplied where a port was expected
    Text(String),
}

impl From<u16> for PortValue {
    fn from(port: u16) -> Self {
        PortValue::Number(i64::from(port))
    }
}

impl From<&str> for PortValue {
    fn from(port: &str) -> Self {
        PortValue::Text(port.to_string())
    }
}

/// The merged configuration of a relay server.
#[derive(Clone)]
pub struct ServerConfig {
    /// IP address to listen on
    pub host: String,

    /// Port to listen on; required
    pub port: Option<PortValue>,

    /// Frames buffered per connection before broadcasts to it are dropped
    pub outbound_queue: usize,

    /// Called with every stamped inbound command
    pub on_command: CommandCallback,

    /// Called after the listener is bound
    pub on_start: LifecycleCallback,

    /// Called after every connection was closed and the listener released
    pub on_stop: LifecycleCallback,

    /// Called when a connection is registered
    pub on_connect: ConnectionCallback,

    /// Called when a connection is removed
    pub on_disconnect: ConnectionCallback,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: Some(PortValue::from(DEFAULT_PORT)),
            outbound_queue: DEFAULT_OUTBOUND_QUEUE,
            on_command: Arc::new(|_| {}),
            on_start: Arc::new(|| {}),
            on_stop: Arc::new(|| {}),
            on_connect: Arc::new(|_| {}),
            on_disconnect: Arc::new(|_| {}),
        }
    }
}

impl fmt::Debug for ServerConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServerConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("outbound_queue", &self.outbound_queue)
            .finish_non_exhaustive()
    }
}

impl ServerConfig {
    /// Resolves the socket address to bind.
    ///
    /// Fails with the same error [`validate`] would report.
    pub fn listen_addr(&self) -> Result<SocketAddr, ConfigError> {
        let ip = parse_host(&self.host)?;
        let port = parse_port(self.port.as_ref())?;
        Ok(SocketAddr::new(ip, port))
    }
}

/// A partial configuration to merge over the current one.
///
/// Options that are not set keep their current value. The port can also be
/// cleared explicitly with [`ServerOptions::without_port`], which makes the
/// merged configuration invalid.
///
/// # Examples
///
/// ```rust
/// use relay_server::ServerOptions;
///
/// let options = ServerOptions::new()
///     .port(9090u16)
///     .on_command(|command| println!("{} #{}", command.kind, command.message_id));
/// # let _ = options;
/// ```
#[derive(Clone, Default)]
pub struct ServerOptions {
    host: Option<String>,
    port: Option<Option<PortValue>>,
    outbound_queue: Option<usize>,
    on_command: Option<CommandCallback>,
    on_start: Option<LifecycleCallback>,
    on_stop: Option<LifecycleCallback>,
    on_connect: Option<ConnectionCallback>,
    on_disconnect: Option<ConnectionCallback>,
}

impl ServerOptions {
    /// Creates an empty set of options.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the listen address.
    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.host = Some(host.into());
        self
    }

    /// Sets the listen port.
    pub fn port(mut self, port: impl Into<PortValue>) -> Self {
        self.port = Some(Some(port.into()));
        self
    }

    /// Clears the listen port.
    pub fn without_port(mut self) -> Self {
        self.port = Some(None);
        self
    }

    /// Sets the per-connection outbound queue length.
    pub fn outbound_queue(mut self, len: usize) -> Self {
        self.outbound_queue = Some(len);
        self
    }

    /// Sets the inbound command handler.
    pub fn on_command<F>(mut self, callback: F) -> Self
    where
        F: Fn(&Command) + Send + Sync + 'static,
    {
        self.on_command = Some(Arc::new(callback));
        self
    }

    /// Sets the start notification.
    pub fn on_start<F>(mut self, callback: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.on_start = Some(Arc::new(callback));
        self
    }

    /// Sets the stop notification.
    pub fn on_stop<F>(mut self, callback: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.on_stop = Some(Arc::new(callback));
        self
    }

    /// Sets the connect notification.
    pub fn on_connect<F>(mut self, callback: F) -> Self
    where
        F: Fn(&ConnectionInfo) + Send + Sync + 'static,
    {
        self.on_connect = Some(Arc::new(callback));
        self
    }

    /// Sets the disconnect notification.
    pub fn on_disconnect<F>(mut self, callback: F) -> Self
    where
        F: Fn(&ConnectionInfo) + Send + Sync + 'static,
    {
        self.on_disconnect = Some(Arc::new(callback));
        self
    }

    /// Produces a new configuration with these options laid over `base`.
    ///
    /// `base` itself is left untouched.
    pub fn merge_into(&self, base: &ServerConfig) -> ServerConfig {
        let mut merged = base.clone();
        if let Some(host) = &self.host {
            merged.host = host.clone();
        }
        if let Some(port) = &self.port {
            merged.port = port.clone();
        }
        if let Some(len) = self.outbound_queue {
            merged.outbound_queue = len;
        }
        if let Some(callback) = &self.on_command {
            merged.on_command = callback.clone();
        }
        if let Some(callback) = &self.on_start {
            merged.on_start = callback.clone();
        }
        if let Some(callback) = &self.on_stop {
            merged.on_stop = callback.clone();
        }
        if let Some(callback) = &self.on_connect {
            merged.on_connect = callback.clone();
        }
        if let Some(callback) = &self.on_disconnect {
            merged.on_disconnect = callback.clone();
        }
        merged
    }
}

/// Validates a merged configuration.
///
/// Rejects a missing or non-numeric port, a port outside `0..=65535`, a host
/// that is not an IP address and an empty outbound queue. Callback slots are
/// always valid.
pub fn validate(config: &ServerConfig) -> Result<(), ConfigError> {
    parse_port(config.port.as_ref())?;
    parse_host(&config.host)?;

    if config.outbound_queue == 0 {
        return Err(ConfigError::Invalid {
            field: "outbound_queue",
            reason: "must be greater than 0".to_string(),
        });
    }

    Ok(())
}

fn parse_port(port: Option<&PortValue>) -> Result<u16, ConfigError> {
    match port {
        None => Err(ConfigError::Missing { field: "port" }),
        Some(PortValue::Text(text)) => Err(ConfigError::Invalid {
            field: "port",
            reason: format!("expected a number, got the string {text:?}"),
        }),
        Some(PortValue::Number(number)) => u16::try_from(*number).map_err(|_| ConfigError::Invalid {
            field: "port",
            reason: format!("{number} is outside 0..=65535"),
        }),
    }
}

fn parse_host(host: &str) -> Result<IpAddr, ConfigError> {
    host.parse::<IpAddr>().map_err(|e| ConfigError::Invalid {
        field: "host",
        reason: format!("{host:?} is not an IP address ({e})"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_default_config_is_valid() {
        let config = ServerConfig::default();
        assert!(validate(&config).is_ok());
        assert_eq!(config.listen_addr().unwrap(), "0.0.0.0:9090".parse().unwrap());
    }

    #[test]
    fn test_missing_port_is_rejected() {
        let config = ServerOptions::new().without_port().merge_into(&ServerConfig::default());
        let err = validate(&config).unwrap_err();
        assert_eq!(err, ConfigError::Missing { field: "port" });
    }

    #[test]
    fn test_non_numeric_port_is_rejected() {
        let config = ServerOptions::new().port("9090").merge_into(&ServerConfig::default());
        let err = validate(&config).unwrap_err();
        assert_eq!(err.field(), "port");
        assert!(err.to_string().contains("expected a number"));
    }

    #[test]
    fn test_out_of_range_port_is_rejected() {
        for bad in [-1_i64, 65_536, i64::MAX] {
            let mut config = ServerConfig::default();
            config.port = Some(PortValue::Number(bad));
            assert_eq!(validate(&config).unwrap_err().field(), "port", "port {bad}");
        }
    }

    #[test]
    fn test_invalid_host_and_queue_are_rejected() {
        let config = ServerOptions::new().host("localhost:80").merge_into(&ServerConfig::default());
        assert_eq!(validate(&config).unwrap_err().field(), "host");

        let config = ServerOptions::new().outbound_queue(0).merge_into(&ServerConfig::default());
        assert_eq!(validate(&config).unwrap_err().field(), "outbound_queue");
    }

    #[test]
    fn test_merge_keeps_unset_options() {
        let base = ServerOptions::new()
            .host("127.0.0.1")
            .port(4000u16)
            .merge_into(&ServerConfig::default());
        let merged = ServerOptions::new().outbound_queue(8).merge_into(&base);

        assert_eq!(merged.host, "127.0.0.1");
        assert_eq!(merged.port, Some(PortValue::Number(4000)));
        assert_eq!(merged.outbound_queue, 8);
        assert_eq!(base.outbound_queue, DEFAULT_OUTBOUND_QUEUE);
    }

    #[test]
    fn test_merge_replaces_callbacks() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let merged = ServerOptions::new()
            .on_start(move || {
                counter.fetch_add(1, Ordering::SeqCst);
            })
            .merge_into(&ServerConfig::default());

        (merged.on_start)();
        (ServerConfig::default().on_start)();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_port_value_deserializes_numbers_and_strings() {
        let number: PortValue = serde_json::from_str("9090").unwrap();
        let text: PortValue = serde_json::from_str("\"abc\"").unwrap();
        assert_eq!(number, PortValue::Number(9090));
        assert_eq!(text, PortValue::Text("abc".to_string()));
    }
}
