//! Convenience constructors for the relay server.

use crate::{config::ServerOptions, error::ConfigError, server::RelayServer};

/// Creates a stopped server with the default configuration.
pub fn create_server() -> RelayServer {
    RelayServer::new()
}

/// Creates a stopped server configured with `options`.
///
/// Fails if the options, merged over the defaults, do not validate.
pub fn create_server_with_options(options: ServerOptions) -> Result<RelayServer, ConfigError> {
    let server = RelayServer::new();
    server.configure(options)?;
    Ok(server)
}
