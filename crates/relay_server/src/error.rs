//! Error types and handling for the relay server.
//!
//! Configuration problems are reported as [`ConfigError`] and never alter the
//! configuration that was already applied. Runtime failures of the server
//! itself are [`ServerError`]s.

/// A rejected configuration, naming the offending option.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    /// A required option was absent from the merged configuration
    #[error("Missing required option `{field}`")]
    Missing {
        /// Name of the option
        field: &'static str,
    },

    /// An option was present but unusable
    #[error("Invalid option `{field}`: {reason}")]
    Invalid {
        /// Name of the option
        field: &'static str,
        /// Why the value was rejected
        reason: String,
    },
}

impl ConfigError {
    /// Returns the name of the option that failed validation.
    pub fn field(&self) -> &'static str {
        match self {
            ConfigError::Missing { field } | ConfigError::Invalid { field, .. } => field,
        }
    }
}

/// Enumeration of possible server errors.
///
/// Only a failure to bind the listen socket is fatal for `start`; everything
/// else on a live server degrades per connection.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    /// Network-related errors such as binding failures or handshake problems
    #[error("Network error: {0}")]
    Network(String),

    /// `start` was called on a server that is already listening
    #[error("Server is already started")]
    AlreadyStarted,

    /// The current configuration cannot be used to start the server
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}
