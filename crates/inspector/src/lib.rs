//! # Inspector
//!
//! The inspector process: runs the relay server, prints every debugging
//! command it receives and keeps a read-out of the connected clients.
//!
//! ## Quick Start
//!
//! ```bash
//! # Run with default configuration (inspector.toml, created if missing)
//! inspector
//!
//! # Specify custom configuration
//! inspector --config staging.toml
//!
//! # Override specific settings
//! inspector --host 127.0.0.1 --port 9191 --log-level debug
//!
//! # JSON logging
//! inspector --json-logs
//! ```
//!
//! ## Signal Handling
//!
//! The relay stops gracefully on SIGINT (Ctrl+C) or SIGTERM; a second
//! signal exits immediately.

pub mod app;
pub mod cli;
pub mod config;
pub mod console;
pub mod logging;
pub mod signals;

use app::Application;
use cli::CliArgs;
use config::AppConfig;
use tracing::error;

pub use config::{HistorySettings, LoggingSettings, ServerSettings};

/// Entry point for the inspector binary.
///
/// Handles the complete application lifecycle:
/// 1. Command-line argument parsing
/// 2. Configuration loading, CLI overrides and validation
/// 3. Logging system initialization
/// 4. Application creation and execution
///
/// # Exit Codes
///
/// * **0**: Successful execution and shutdown
/// * **1**: Error during startup, configuration, or runtime
pub async fn init() -> Result<(), Box<dyn std::error::Error>> {
    let args = CliArgs::parse();

    let mut config = match AppConfig::load_from_file(&args.config_path).await {
        Ok(config) => config,
        Err(e) => {
            eprintln!("❌ Failed to load {}: {e}", args.config_path.display());
            std::process::exit(1);
        }
    };
    config.apply_cli(&args);

    if let Err(e) = config.validate() {
        eprintln!("❌ Configuration validation failed: {e}");
        std::process::exit(1);
    }

    if let Err(e) = logging::setup_logging(&config.logging) {
        eprintln!("❌ Failed to setup logging: {e}");
        std::process::exit(1);
    }

    match Application::new(config) {
        Ok(app) => {
            if let Err(e) = app.run().await {
                error!("❌ Application error: {e}");
                std::process::exit(1);
            }
        }
        Err(e) => {
            error!("❌ Failed to start application: {e}");
            std::process::exit(1);
        }
    }

    Ok(())
}
